//! Status-gated parcel storage.
//!
//! The database is the only copy of a parcel. Nothing is cached; every gated
//! decision re-reads the current status.

use parcel_db::{BackendError, DbConnection, DbRow, DbValue};
use tracing::{debug, info, warn};

use crate::config::{StoreConfig, StoreUrl};
use crate::error::{storage, Result, StoreError, Target};
use crate::types::{ClientId, Parcel, ParcelNumber, ParcelStatus};

/// Column order used by every parcel SELECT; `row_to_parcel` relies on it.
const PARCEL_COLUMNS: &str = "number, client, status, address, created_at";

const SCHEMA_SQL: &str = r#"
    CREATE SEQUENCE IF NOT EXISTS parcel_number_seq START 1;
    CREATE TABLE IF NOT EXISTS parcel (
        number BIGINT PRIMARY KEY DEFAULT nextval('parcel_number_seq'),
        client BIGINT NOT NULL,
        status TEXT NOT NULL,
        address TEXT NOT NULL,
        created_at TIMESTAMP NOT NULL
    );
"#;

/// Storage for parcels.
///
/// All operations are synchronous and go straight to the database. Clones
/// share one connection.
///
/// `set_address` and `delete` are gated on the `registered` status. They read
/// the status first so a refusal can name the status that blocked it, then
/// repeat the status predicate inside the write itself. A concurrent writer
/// that moves the parcel between the two round trips therefore makes the
/// write a no-op instead of slipping past the gate.
#[derive(Debug, Clone)]
pub struct ParcelStore {
    conn: DbConnection,
}

impl ParcelStore {
    /// Create a store over an existing connection. Does not touch the schema.
    pub fn new(conn: DbConnection) -> Self {
        Self { conn }
    }

    /// Open the configured database and make sure the parcel table exists.
    ///
    /// Read-only stores skip schema creation.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        let url = config.url.to_string();
        let conn = match (&config.url, config.read_only) {
            (StoreUrl::Memory, false) => DbConnection::open_duckdb_memory(),
            (StoreUrl::Memory, true) => {
                return Err(StoreError::Config(
                    "in-memory stores cannot be opened read-only".to_string(),
                ))
            }
            (StoreUrl::DuckDb(path), false) => DbConnection::open_duckdb(path),
            (StoreUrl::DuckDb(path), true) => DbConnection::open_duckdb_readonly(path),
        }
        .map_err(storage("open", Target::Url(&url)))?;

        let store = Self::new(conn);
        if !config.read_only {
            store.init_schema()?;
        }
        info!(url = %url, read_only = config.read_only, "Parcel store opened");
        Ok(store)
    }

    /// Open a fresh in-memory store with the schema in place.
    pub fn open_in_memory() -> Result<Self> {
        Self::open(&StoreConfig::memory())
    }

    /// Create the parcel table and its number sequence if missing.
    pub fn init_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(SCHEMA_SQL)
            .map_err(storage("init_schema", Target::Table))
    }

    // ========================================================================
    // Create / Read
    // ========================================================================

    /// Insert a parcel and return the number the database assigned.
    ///
    /// `parcel.number` is ignored.
    pub fn add(&self, parcel: &Parcel) -> Result<ParcelNumber> {
        let sql = r#"
            INSERT INTO parcel (client, status, address, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING number
        "#;

        let number: i64 = self
            .conn
            .query_scalar(
                sql,
                &[
                    DbValue::from(parcel.client),
                    DbValue::from(&parcel.status),
                    DbValue::from(parcel.address.as_str()),
                    DbValue::from(parcel.created_at),
                ],
            )
            .map_err(storage("add", Target::Client(parcel.client)))?;

        let number = ParcelNumber::new(number);
        debug!(%number, client = %parcel.client, status = %parcel.status, "Parcel added");
        Ok(number)
    }

    /// Get a parcel by number.
    pub fn get(&self, number: ParcelNumber) -> Result<Parcel> {
        let sql = format!("SELECT {PARCEL_COLUMNS} FROM parcel WHERE number = ?");

        let row = self
            .conn
            .query_optional(&sql, &[DbValue::from(number)])
            .map_err(storage("get", Target::Parcel(number)))?
            .ok_or(StoreError::NotFound { number })?;

        row_to_parcel(&row).map_err(storage("get", Target::Parcel(number)))
    }

    /// All parcels owned by a client, ordered by number. Empty when none.
    pub fn get_by_client(&self, client: ClientId) -> Result<Vec<Parcel>> {
        let sql = format!("SELECT {PARCEL_COLUMNS} FROM parcel WHERE client = ? ORDER BY number");

        let rows = self
            .conn
            .query_all(&sql, &[DbValue::from(client)])
            .map_err(storage("get_by_client", Target::Client(client)))?;

        rows.iter()
            .map(row_to_parcel)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(storage("get_by_client", Target::Client(client)))
    }

    /// Current status of a parcel, read fresh from the database.
    pub fn get_status(&self, number: ParcelNumber) -> Result<ParcelStatus> {
        let row = self
            .conn
            .query_optional(
                "SELECT status FROM parcel WHERE number = ?",
                &[DbValue::from(number)],
            )
            .map_err(storage("get_status", Target::Parcel(number)))?
            .ok_or(StoreError::NotFound { number })?;

        row.get::<String>(0)
            .map(ParcelStatus::from)
            .map_err(storage("get_status", Target::Parcel(number)))
    }

    /// Number of parcels per status label, ordered by label.
    pub fn status_counts(&self) -> Result<Vec<(ParcelStatus, u64)>> {
        let sql = r#"
            SELECT status, COUNT(*) AS parcels
            FROM parcel
            GROUP BY status
            ORDER BY status
        "#;

        let rows = self
            .conn
            .query_all(sql, &[])
            .map_err(storage("status_counts", Target::Table))?;

        rows.iter()
            .map(|row| -> std::result::Result<_, BackendError> {
                Ok((ParcelStatus::from(row.get::<String>(0)?), row.get::<u64>(1)?))
            })
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(storage("status_counts", Target::Table))
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Set the status unconditionally.
    ///
    /// No transition rules are checked here; any label is accepted. A missing
    /// parcel is detected from the affected-row count, not a prior read.
    pub fn set_status(&self, number: ParcelNumber, status: &ParcelStatus) -> Result<()> {
        let affected = self
            .conn
            .execute(
                "UPDATE parcel SET status = ? WHERE number = ?",
                &[DbValue::from(status), DbValue::from(number)],
            )
            .map_err(storage("set_status", Target::Parcel(number)))?;

        if affected == 0 {
            return Err(StoreError::NotFound { number });
        }

        debug!(%number, %status, "Parcel status updated");
        Ok(())
    }

    /// Change the delivery address. Only legal while `registered`.
    pub fn set_address(&self, number: ParcelNumber, address: &str) -> Result<()> {
        self.ensure_registered(number)?;

        let affected = self
            .conn
            .execute(
                "UPDATE parcel SET address = ? WHERE number = ? AND status = ?",
                &[
                    DbValue::from(address),
                    DbValue::from(number),
                    DbValue::from(ParcelStatus::REGISTERED),
                ],
            )
            .map_err(storage("set_address", Target::Parcel(number)))?;

        if affected == 0 {
            return Err(self.gate_lost("set_address", number));
        }

        debug!(%number, "Parcel address updated");
        Ok(())
    }

    /// Remove a parcel permanently. Only legal while `registered`.
    pub fn delete(&self, number: ParcelNumber) -> Result<()> {
        self.ensure_registered(number)?;

        let affected = self
            .conn
            .execute(
                "DELETE FROM parcel WHERE number = ? AND status = ?",
                &[DbValue::from(number), DbValue::from(ParcelStatus::REGISTERED)],
            )
            .map_err(storage("delete", Target::Parcel(number)))?;

        if affected == 0 {
            return Err(self.gate_lost("delete", number));
        }

        debug!(%number, "Parcel deleted");
        Ok(())
    }

    // ========================================================================
    // Gate helpers
    // ========================================================================

    fn ensure_registered(&self, number: ParcelNumber) -> Result<()> {
        let status = self.get_status(number)?;
        if status.is_registered() {
            Ok(())
        } else {
            Err(StoreError::WrongStatus { number, status })
        }
    }

    /// Explain a guarded write that matched no row after the gate passed.
    fn gate_lost(&self, operation: &'static str, number: ParcelNumber) -> StoreError {
        warn!(%number, operation, "Parcel changed between status check and write");
        match self.ensure_registered(number) {
            Err(err) => err,
            // Moved away and back again; the write still did not happen.
            Ok(()) => StoreError::Storage {
                operation,
                target: Target::Parcel(number).to_string(),
                source: BackendError::Transaction(
                    "parcel changed concurrently; write not applied".to_string(),
                ),
            },
        }
    }
}

/// Parse a database row into a Parcel.
///
/// Column order must match `PARCEL_COLUMNS`:
/// 0: number, 1: client, 2: status, 3: address, 4: created_at
fn row_to_parcel(row: &DbRow) -> std::result::Result<Parcel, BackendError> {
    Ok(Parcel {
        number: Some(ParcelNumber::new(row.get(0)?)),
        client: ClientId::new(row.get(1)?),
        status: ParcelStatus::from(row.get::<String>(2)?),
        address: row.get(3)?,
        created_at: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn parcel(client: i64, address: &str) -> Parcel {
        Parcel::new(
            ClientId::new(client),
            ParcelStatus::registered(),
            address,
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        )
    }

    #[test]
    fn init_schema_is_idempotent() {
        let store = ParcelStore::open_in_memory().unwrap();
        store.init_schema().unwrap();
        let number = store.add(&parcel(1, "A")).unwrap();
        store.init_schema().unwrap();
        assert!(store.get(number).is_ok());
    }

    #[test]
    fn add_ignores_caller_supplied_number() {
        let store = ParcelStore::open_in_memory().unwrap();
        let first = store.add(&parcel(1, "A")).unwrap();
        let bogus = parcel(1, "B").with_number(first);
        let second = store.add(&bogus).unwrap();
        assert_ne!(first, second);
        assert_eq!(store.get(first).unwrap().address, "A");
    }

    #[test]
    fn operations_without_schema_are_storage_errors() {
        let store = ParcelStore::new(DbConnection::open_duckdb_memory().unwrap());
        let err = store.get(ParcelNumber::new(1)).unwrap_err();
        assert!(err.is_storage(), "{err}");
        assert!(err.to_string().contains("parcel 1"));

        let err = store.add(&parcel(3, "A")).unwrap_err();
        assert!(matches!(err, StoreError::Storage { operation: "add", .. }));
    }

    #[test]
    fn status_counts_group_by_label() {
        let store = ParcelStore::open_in_memory().unwrap();
        let a = store.add(&parcel(1, "A")).unwrap();
        store.add(&parcel(1, "B")).unwrap();
        store.add(&parcel(2, "C")).unwrap();
        store.set_status(a, &ParcelStatus::sent()).unwrap();

        let counts = store.status_counts().unwrap();
        assert_eq!(
            counts,
            vec![(ParcelStatus::registered(), 2), (ParcelStatus::sent(), 1)]
        );
    }

    #[test]
    fn zero_row_write_is_explained_by_a_fresh_read() {
        let store = ParcelStore::open_in_memory().unwrap();

        let moved = store.add(&parcel(1, "A")).unwrap();
        store.set_status(moved, &ParcelStatus::sent()).unwrap();
        let err = store.gate_lost("set_address", moved);
        assert_eq!(err.wrong_status(), Some(&ParcelStatus::sent()));

        let removed = store.add(&parcel(1, "B")).unwrap();
        store.delete(removed).unwrap();
        assert!(store.gate_lost("delete", removed).is_not_found());

        // Left and came back to registered between the check and the write.
        let returned = store.add(&parcel(1, "C")).unwrap();
        match store.gate_lost("set_address", returned) {
            StoreError::Storage {
                operation: "set_address",
                source: BackendError::Transaction(_),
                ..
            } => {}
            other => panic!("expected a transaction storage error, got {other:?}"),
        }
        assert_eq!(store.get(returned).unwrap().address, "C");
    }

    #[test]
    fn read_only_memory_store_is_a_config_error() {
        let err = ParcelStore::open(&StoreConfig {
            url: StoreUrl::Memory,
            read_only: true,
        })
        .unwrap_err();
        assert!(matches!(err, StoreError::Config(_)), "{err}");
    }

    #[test]
    fn read_only_store_rejects_mutation() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("parcels.duckdb");
        let number = {
            let store = ParcelStore::open(&StoreConfig {
                url: StoreUrl::DuckDb(path.clone()),
                read_only: false,
            })
            .unwrap();
            store.add(&parcel(1, "A")).unwrap()
        };

        let ro = ParcelStore::open(&StoreConfig {
            url: StoreUrl::DuckDb(path),
            read_only: true,
        })
        .unwrap();
        assert_eq!(ro.get(number).unwrap().address, "A");

        let err = ro.set_status(number, &ParcelStatus::sent()).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Storage {
                source: BackendError::ReadOnly,
                ..
            }
        ));
    }
}
