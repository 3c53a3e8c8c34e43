//! Database backend abstraction layer.
//!
//! DuckDB-only synchronous backend.
//! - One connection per handle, guarded by a mutex for the length of a call
//! - Single-writer enforced via file lock for on-disk databases

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug_span, info};

use crate::lock::{LockError, WriterLock};

/// URL that selects an in-memory database.
pub const MEMORY_URL: &str = "duckdb::memory:";

/// Errors from database backend operations.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Database is locked: {0}")]
    Locked(String),

    #[error("Operation requires write access but database is read-only")]
    ReadOnly,

    #[error("Query error: {0}")]
    Query(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Type conversion error: {0}")]
    TypeConversion(String),

    #[error("Backend not available: {0}")]
    NotAvailable(String),

    #[error("Connection mutex poisoned by a panicking caller")]
    Poisoned,

    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),
}

impl From<LockError> for BackendError {
    fn from(err: LockError) -> Self {
        match err {
            held @ LockError::Held { .. } => BackendError::Locked(held.to_string()),
            io @ LockError::Io { .. } => BackendError::Database(io.to_string()),
        }
    }
}

/// Database access mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Read-write access (requires exclusive lock for on-disk databases)
    ReadWrite,
    /// Read-only access (can coexist with other readers)
    ReadOnly,
}

/// UTC timestamp as stored in a DuckDB `TIMESTAMP` column.
///
/// The column keeps microseconds, so every constructor truncates to
/// microseconds. A value read back compares equal to the one written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DbTimestamp(chrono::DateTime<chrono::Utc>);

impl DbTimestamp {
    pub fn from_rfc3339(value: &str) -> Result<Self, BackendError> {
        chrono::DateTime::parse_from_rfc3339(value)
            .map(|dt| Self::from(dt.with_timezone(&chrono::Utc)))
            .map_err(|e| BackendError::TypeConversion(format!("Bad timestamp '{value}': {e}")))
    }

    pub fn from_unix_micros(micros: i64) -> Result<Self, BackendError> {
        chrono::DateTime::from_timestamp_micros(micros)
            .map(Self)
            .ok_or_else(|| {
                BackendError::TypeConversion(format!("Timestamp out of range: {micros}us"))
            })
    }

    pub fn unix_micros(self) -> i64 {
        self.0.timestamp_micros()
    }

    pub fn into_chrono(self) -> chrono::DateTime<chrono::Utc> {
        self.0
    }
}

impl From<chrono::DateTime<chrono::Utc>> for DbTimestamp {
    fn from(dt: chrono::DateTime<chrono::Utc>) -> Self {
        use chrono::SubsecRound;
        Self(dt.trunc_subsecs(6))
    }
}

impl std::fmt::Display for DbTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl Serialize for DbTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DbTimestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        chrono::DateTime::<chrono::Utc>::deserialize(deserializer).map(Self::from)
    }
}

/// A statement parameter or a result cell.
///
/// Covers what the parcel schema stores: integers, text and timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbValue {
    Null,
    Integer(i64),
    Text(String),
    Timestamp(DbTimestamp),
}

impl From<i64> for DbValue {
    fn from(v: i64) -> Self {
        DbValue::Integer(v)
    }
}

impl From<String> for DbValue {
    fn from(v: String) -> Self {
        DbValue::Text(v)
    }
}

impl From<&str> for DbValue {
    fn from(v: &str) -> Self {
        DbValue::Text(v.to_owned())
    }
}

impl From<DbTimestamp> for DbValue {
    fn from(v: DbTimestamp) -> Self {
        DbValue::Timestamp(v)
    }
}

impl From<chrono::DateTime<chrono::Utc>> for DbValue {
    fn from(v: chrono::DateTime<chrono::Utc>) -> Self {
        DbValue::Timestamp(v.into())
    }
}

impl<T: Into<DbValue>> From<Option<T>> for DbValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(DbValue::Null, Into::into)
    }
}

/// One buffered result row. Column names are shared across the rows of a
/// result set.
#[derive(Debug, Clone)]
pub struct DbRow {
    columns: Arc<[String]>,
    values: Vec<DbValue>,
}

impl DbRow {
    pub fn new(columns: impl Into<Arc<[String]>>, values: Vec<DbValue>) -> Self {
        Self {
            columns: columns.into(),
            values,
        }
    }

    pub fn get<T: FromDbValue>(&self, index: usize) -> Result<T, BackendError> {
        let value = self.values.get(index).ok_or_else(|| {
            BackendError::TypeConversion(format!(
                "Row has {} columns, asked for index {}",
                self.values.len(),
                index
            ))
        })?;
        T::from_db_value(value)
    }

    pub fn get_by_name<T: FromDbValue>(&self, name: &str) -> Result<T, BackendError> {
        match self.columns.iter().position(|c| c == name) {
            Some(index) => self.get(index),
            None => Err(BackendError::TypeConversion(format!("No column named '{}'", name))),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }
}

/// Conversion from a result cell into a Rust value.
pub trait FromDbValue: Sized {
    fn from_db_value(value: &DbValue) -> Result<Self, BackendError>;
}

fn mismatch(expected: &str, found: &DbValue) -> BackendError {
    match found {
        DbValue::Null => BackendError::TypeConversion(format!(
            "Expected {expected}, found NULL (read it as Option<{expected}>)"
        )),
        other => BackendError::TypeConversion(format!("Expected {expected}, found {other:?}")),
    }
}

impl FromDbValue for i64 {
    fn from_db_value(value: &DbValue) -> Result<Self, BackendError> {
        match value {
            DbValue::Integer(v) => Ok(*v),
            other => Err(mismatch("i64", other)),
        }
    }
}

impl FromDbValue for u64 {
    fn from_db_value(value: &DbValue) -> Result<Self, BackendError> {
        let v = i64::from_db_value(value)?;
        u64::try_from(v).map_err(|_| BackendError::TypeConversion(format!("Negative count: {v}")))
    }
}

impl FromDbValue for String {
    fn from_db_value(value: &DbValue) -> Result<Self, BackendError> {
        match value {
            DbValue::Text(v) => Ok(v.clone()),
            other => Err(mismatch("String", other)),
        }
    }
}

impl FromDbValue for DbTimestamp {
    fn from_db_value(value: &DbValue) -> Result<Self, BackendError> {
        match value {
            DbValue::Timestamp(v) => Ok(*v),
            DbValue::Text(v) => DbTimestamp::from_rfc3339(v),
            other => Err(mismatch("DbTimestamp", other)),
        }
    }
}

impl<T: FromDbValue> FromDbValue for Option<T> {
    fn from_db_value(value: &DbValue) -> Result<Self, BackendError> {
        if *value == DbValue::Null {
            return Ok(None);
        }
        T::from_db_value(value).map(Some)
    }
}

/// Unified database connection.
///
/// Cloning shares the underlying connection. Every call takes the mutex for
/// its own duration only, so two calls from the same caller are never atomic
/// with respect to other clones unless they run inside [`DbConnection::transaction`].
#[derive(Clone)]
pub struct DbConnection {
    conn: Arc<Mutex<duckdb::Connection>>,
    access_mode: AccessMode,
    /// Released when the last clone drops.
    #[allow(dead_code)]
    writer_lock: Option<Arc<WriterLock>>,
}

impl std::fmt::Debug for DbConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConnection")
            .field("backend", &"DuckDB")
            .field("access_mode", &self.access_mode)
            .finish()
    }
}

impl DbConnection {
    /// Open a database from a URL: `duckdb:<path>` or `duckdb::memory:`.
    pub fn open_from_url(url: &str) -> Result<Self, BackendError> {
        match file_path_from_url(url)? {
            Some(path) => Self::open_duckdb(path),
            None => Self::open_duckdb_memory(),
        }
    }

    /// Like [`DbConnection::open_from_url`], but without taking the writer lock.
    pub fn open_from_url_readonly(url: &str) -> Result<Self, BackendError> {
        let path = file_path_from_url(url)?.ok_or_else(|| {
            BackendError::NotAvailable("in-memory databases cannot be opened read-only".into())
        })?;
        Self::open_duckdb_readonly(path)
    }

    /// Open a DuckDB database with exclusive write lock.
    ///
    /// DuckDB only allows one writer process at a time, so the lock is taken
    /// before the database file is touched.
    pub fn open_duckdb(path: &Path) -> Result<Self, BackendError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                BackendError::Database(format!(
                    "Failed to create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let writer_lock = WriterLock::acquire(path)?;
        let conn = duckdb::Connection::open(path)?;
        info!(path = %path.display(), "Opened DuckDB database with exclusive lock");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            access_mode: AccessMode::ReadWrite,
            writer_lock: Some(Arc::new(writer_lock)),
        })
    }

    /// Open a DuckDB database in read-only mode (no lock required).
    pub fn open_duckdb_readonly(path: &Path) -> Result<Self, BackendError> {
        use duckdb::{AccessMode as DuckAccessMode, Config};

        let config = Config::default().access_mode(DuckAccessMode::ReadOnly)?;
        let conn = duckdb::Connection::open_with_flags(path, config)?;
        info!(path = %path.display(), "Opened DuckDB database (read-only)");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            access_mode: AccessMode::ReadOnly,
            writer_lock: None,
        })
    }

    /// Open an in-memory DuckDB database.
    pub fn open_duckdb_memory() -> Result<Self, BackendError> {
        let conn = duckdb::Connection::open_in_memory()?;
        info!("Opened in-memory DuckDB database");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            access_mode: AccessMode::ReadWrite,
            writer_lock: None,
        })
    }

    pub fn access_mode(&self) -> AccessMode {
        self.access_mode
    }

    pub fn is_writable(&self) -> bool {
        self.access_mode == AccessMode::ReadWrite
    }

    fn lock(&self) -> Result<MutexGuard<'_, duckdb::Connection>, BackendError> {
        self.conn.lock().map_err(|_| BackendError::Poisoned)
    }

    fn ensure_writable(&self) -> Result<(), BackendError> {
        if self.access_mode == AccessMode::ReadOnly {
            return Err(BackendError::ReadOnly);
        }
        Ok(())
    }

    /// Execute a SQL statement and return the number of affected rows.
    pub fn execute(&self, sql: &str, params: &[DbValue]) -> Result<u64, BackendError> {
        self.ensure_writable()?;
        let conn = self.lock()?;
        execute_on_conn(&conn, sql, params)
    }

    /// Execute a batch of SQL statements.
    pub fn execute_batch(&self, sql: &str) -> Result<(), BackendError> {
        self.ensure_writable()?;
        let conn = self.lock()?;
        execute_batch_on_conn(&conn, sql)
    }

    /// Query and return all rows.
    ///
    /// The result set is fully materialized before the connection is released.
    pub fn query_all(&self, sql: &str, params: &[DbValue]) -> Result<Vec<DbRow>, BackendError> {
        let conn = self.lock()?;
        query_on_conn(&conn, sql, params)
    }

    /// Query and return the first row, if any.
    pub fn query_optional(
        &self,
        sql: &str,
        params: &[DbValue],
    ) -> Result<Option<DbRow>, BackendError> {
        let rows = self.query_all(sql, params)?;
        Ok(rows.into_iter().next())
    }

    /// Query and return exactly one row.
    pub fn query_one(&self, sql: &str, params: &[DbValue]) -> Result<DbRow, BackendError> {
        self.query_optional(sql, params)?
            .ok_or_else(|| BackendError::Query("Expected one row, got none".to_string()))
    }

    /// Query and return a single scalar value.
    pub fn query_scalar<T: FromDbValue>(
        &self,
        sql: &str,
        params: &[DbValue],
    ) -> Result<T, BackendError> {
        let row = self.query_one(sql, params)?;
        row.get(0)
    }

    /// Run `op` inside a transaction.
    ///
    /// The connection mutex is held for the whole closure. `Ok` commits,
    /// `Err` rolls back and returns the original error.
    pub fn transaction<T, F>(&self, op: F) -> Result<T, BackendError>
    where
        F: FnOnce(&mut DbTransaction<'_>) -> Result<T, BackendError>,
    {
        self.ensure_writable()?;
        let conn = self.lock()?;
        conn.execute_batch("BEGIN TRANSACTION")?;
        let mut tx = DbTransaction { conn: &*conn };

        match op(&mut tx) {
            Ok(value) => {
                conn.execute_batch("COMMIT")?;
                Ok(value)
            }
            Err(err) => match conn.execute_batch("ROLLBACK") {
                Ok(()) => Err(err),
                Err(rollback_err) => Err(BackendError::Transaction(format!(
                    "Transaction failed: {}; rollback failed: {}",
                    err, rollback_err
                ))),
            },
        }
    }
}

/// Statement surface available inside [`DbConnection::transaction`].
pub struct DbTransaction<'a> {
    conn: &'a duckdb::Connection,
}

impl DbTransaction<'_> {
    pub fn execute(&mut self, sql: &str, params: &[DbValue]) -> Result<u64, BackendError> {
        execute_on_conn(self.conn, sql, params)
    }

    pub fn query_all(&mut self, sql: &str, params: &[DbValue]) -> Result<Vec<DbRow>, BackendError> {
        query_on_conn(self.conn, sql, params)
    }

    pub fn query_optional(
        &mut self,
        sql: &str,
        params: &[DbValue],
    ) -> Result<Option<DbRow>, BackendError> {
        let rows = self.query_all(sql, params)?;
        Ok(rows.into_iter().next())
    }

    pub fn query_scalar<T: FromDbValue>(
        &mut self,
        sql: &str,
        params: &[DbValue],
    ) -> Result<T, BackendError> {
        self.query_optional(sql, params)?
            .ok_or_else(|| BackendError::Query("Expected one row, got none".to_string()))?
            .get(0)
    }
}

/// `None` for the in-memory URL, the file path otherwise.
fn file_path_from_url(url: &str) -> Result<Option<&Path>, BackendError> {
    if url == MEMORY_URL {
        return Ok(None);
    }
    match url.strip_prefix("duckdb:") {
        Some(path) if !path.is_empty() => Ok(Some(Path::new(path))),
        _ => Err(BackendError::NotAvailable(format!(
            "Unsupported database URL: {url}"
        ))),
    }
}

fn execute_on_conn(
    conn: &duckdb::Connection,
    sql: &str,
    params: &[DbValue],
) -> Result<u64, BackendError> {
    let span = debug_span!(
        "db.exec",
        op = sql_op_name(sql),
        sql_hash = %hash_sql(sql),
        duration_ms = tracing::field::Empty
    );
    let _entered = span.enter();
    let started = Instant::now();

    let affected = conn
        .prepare(sql)?
        .execute(duckdb::params_from_iter(params.iter().map(to_duckdb_value)))?;

    span.record("duration_ms", elapsed_ms(started));
    Ok(affected as u64)
}

fn execute_batch_on_conn(conn: &duckdb::Connection, sql: &str) -> Result<(), BackendError> {
    let span = debug_span!(
        "db.exec",
        op = "BATCH",
        sql_hash = %hash_sql(sql),
        duration_ms = tracing::field::Empty
    );
    let _entered = span.enter();
    let started = Instant::now();

    conn.execute_batch(sql)?;

    span.record("duration_ms", elapsed_ms(started));
    Ok(())
}

/// Run a query and buffer every row before returning.
fn query_on_conn(
    conn: &duckdb::Connection,
    sql: &str,
    params: &[DbValue],
) -> Result<Vec<DbRow>, BackendError> {
    let span = debug_span!(
        "db.query",
        op = sql_op_name(sql),
        sql_hash = %hash_sql(sql),
        rows = tracing::field::Empty,
        duration_ms = tracing::field::Empty
    );
    let _entered = span.enter();
    let started = Instant::now();

    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(duckdb::params_from_iter(params.iter().map(to_duckdb_value)))?;
    let Some(columns) = rows.as_ref().map(|stmt| Arc::<[String]>::from(stmt.column_names()))
    else {
        return Ok(Vec::new());
    };

    let mut buffered = Vec::new();
    while let Some(row) = rows.next()? {
        let cells = (0..columns.len())
            .map(|index| read_cell(row, index))
            .collect::<Result<Vec<_>, _>>()?;
        buffered.push(DbRow::new(Arc::clone(&columns), cells));
    }

    span.record("rows", buffered.len() as u64);
    span.record("duration_ms", elapsed_ms(started));
    Ok(buffered)
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn to_duckdb_value(value: &DbValue) -> duckdb::types::Value {
    use duckdb::types::{TimeUnit, Value};

    match value {
        DbValue::Null => Value::Null,
        DbValue::Integer(v) => Value::BigInt(*v),
        DbValue::Text(v) => Value::Text(v.clone()),
        DbValue::Timestamp(ts) => Value::Timestamp(TimeUnit::Microsecond, ts.unix_micros()),
    }
}

fn read_cell(row: &duckdb::Row<'_>, index: usize) -> Result<DbValue, BackendError> {
    use duckdb::types::{TimeUnit, ValueRef};

    let out_of_range =
        |kind: &str| BackendError::TypeConversion(format!("{kind} at column {index} exceeds i64"));

    Ok(match row.get_ref(index)? {
        ValueRef::Null => DbValue::Null,
        ValueRef::TinyInt(v) => DbValue::Integer(i64::from(v)),
        ValueRef::SmallInt(v) => DbValue::Integer(i64::from(v)),
        ValueRef::Int(v) => DbValue::Integer(i64::from(v)),
        ValueRef::BigInt(v) => DbValue::Integer(v),
        ValueRef::UTinyInt(v) => DbValue::Integer(i64::from(v)),
        ValueRef::USmallInt(v) => DbValue::Integer(i64::from(v)),
        ValueRef::UInt(v) => DbValue::Integer(i64::from(v)),
        ValueRef::UBigInt(v) => {
            DbValue::Integer(i64::try_from(v).map_err(|_| out_of_range("UBIGINT"))?)
        }
        ValueRef::HugeInt(v) => {
            DbValue::Integer(i64::try_from(v).map_err(|_| out_of_range("HUGEINT"))?)
        }
        ValueRef::Text(bytes) => match std::str::from_utf8(bytes) {
            Ok(text) => DbValue::Text(text.to_owned()),
            Err(e) => {
                return Err(BackendError::TypeConversion(format!(
                    "Invalid UTF-8 at column {index}: {e}"
                )))
            }
        },
        ValueRef::Timestamp(unit, v) => {
            let micros = match unit {
                TimeUnit::Second => v.checked_mul(1_000_000),
                TimeUnit::Millisecond => v.checked_mul(1_000),
                TimeUnit::Microsecond => Some(v),
                TimeUnit::Nanosecond => Some(v / 1_000),
            }
            .ok_or_else(|| out_of_range("TIMESTAMP"))?;
            DbValue::Timestamp(DbTimestamp::from_unix_micros(micros)?)
        }
        other => {
            return Err(BackendError::TypeConversion(format!(
                "Unsupported DuckDB type {:?} at column {index}",
                other.data_type()
            )))
        }
    })
}

/// Leading keyword, used as the span's `op` field.
fn sql_op_name(sql: &str) -> &str {
    sql.split_whitespace().next().unwrap_or("EMPTY")
}

/// FNV-1a 64: a stable id for a statement without logging its text.
fn hash_sql(sql: &str) -> String {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let hash = sql
        .bytes()
        .fold(OFFSET, |h, byte| (h ^ u64::from(byte)).wrapping_mul(PRIME));
    format!("{hash:016x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_with_table() -> DbConnection {
        let conn = DbConnection::open_duckdb_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id BIGINT, name TEXT, seen TIMESTAMP)")
            .unwrap();
        conn
    }

    #[test]
    fn execute_reports_affected_rows() {
        let conn = memory_with_table();
        conn.execute(
            "INSERT INTO t (id, name) VALUES (?, ?), (?, ?)",
            &[1_i64.into(), "alpha".into(), 2_i64.into(), "beta".into()],
        )
        .unwrap();

        let updated = conn
            .execute("UPDATE t SET name = ? WHERE id = ?", &["gamma".into(), 2_i64.into()])
            .unwrap();
        assert_eq!(updated, 1);

        let missing = conn
            .execute("UPDATE t SET name = ? WHERE id = ?", &["delta".into(), 99_i64.into()])
            .unwrap();
        assert_eq!(missing, 0);
    }

    #[test]
    fn query_rows_expose_columns_by_name() {
        let conn = memory_with_table();
        conn.execute("INSERT INTO t (id, name) VALUES (?, ?)", &[7_i64.into(), "seven".into()])
            .unwrap();

        let row = conn.query_one("SELECT id, name, seen FROM t", &[]).unwrap();
        assert_eq!(row.column_names(), &["id", "name", "seen"]);
        assert_eq!(row.get_by_name::<i64>("id").unwrap(), 7);
        assert_eq!(row.get_by_name::<String>("name").unwrap(), "seven");
        assert_eq!(row.get_by_name::<Option<DbTimestamp>>("seen").unwrap(), None);
        assert!(row.get_by_name::<i64>("missing").is_err());
    }

    #[test]
    fn timestamps_round_trip_at_microsecond_precision() {
        let conn = memory_with_table();
        let ts = DbTimestamp::from_unix_micros(1_700_000_000_123_456).unwrap();
        conn.execute("INSERT INTO t (id, seen) VALUES (?, ?)", &[1_i64.into(), ts.into()])
            .unwrap();

        let back: DbTimestamp = conn.query_scalar("SELECT seen FROM t", &[]).unwrap();
        assert_eq!(back, ts);
    }

    #[test]
    fn timestamps_drop_sub_microsecond_digits_on_every_path() {
        use chrono::TimeZone;

        let precise = chrono::Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        let expected = DbTimestamp::from_unix_micros(1_700_000_000_123_456).unwrap();

        assert_eq!(DbTimestamp::from(precise), expected);
        assert_eq!(
            DbTimestamp::from_rfc3339("2023-11-14T22:13:20.123456789Z").unwrap(),
            expected
        );
        let parsed: DbTimestamp =
            serde_json::from_str("\"2023-11-14T22:13:20.123456789Z\"").unwrap();
        assert_eq!(parsed, expected);
        assert_eq!(
            serde_json::to_value(expected).unwrap(),
            serde_json::json!("2023-11-14T22:13:20.123456Z")
        );
    }

    #[test]
    fn query_optional_returns_none_for_empty_result() {
        let conn = memory_with_table();
        let row = conn
            .query_optional("SELECT id FROM t WHERE id = ?", &[1_i64.into()])
            .unwrap();
        assert!(row.is_none());

        let err = conn.query_one("SELECT id FROM t", &[]).unwrap_err();
        assert!(matches!(err, BackendError::Query(_)));
    }

    #[test]
    fn transaction_rolls_back_on_error() {
        let conn = memory_with_table();
        let result: Result<(), BackendError> = conn.transaction(|tx| {
            tx.execute("INSERT INTO t (id) VALUES (?)", &[1_i64.into()])?;
            Err(BackendError::Query("abort".to_string()))
        });
        assert!(result.is_err());

        let count: i64 = conn.query_scalar("SELECT COUNT(*) FROM t", &[]).unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn transaction_commits_on_success() {
        let conn = memory_with_table();
        let seen = conn
            .transaction(|tx| {
                tx.execute("INSERT INTO t (id) VALUES (?)", &[1_i64.into()])?;
                tx.execute("INSERT INTO t (id) VALUES (?)", &[2_i64.into()])?;
                tx.query_scalar::<i64>("SELECT COUNT(*) FROM t", &[])
            })
            .unwrap();
        assert_eq!(seen, 2);

        let count: i64 = conn.query_scalar("SELECT COUNT(*) FROM t", &[]).unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn open_from_url_rejects_unknown_scheme() {
        let err = DbConnection::open_from_url("postgres://localhost/parcels").unwrap_err();
        assert!(matches!(err, BackendError::NotAvailable(_)));

        let conn = DbConnection::open_from_url(MEMORY_URL).unwrap();
        assert!(conn.is_writable());
    }

    #[test]
    fn null_into_non_optional_is_an_error() {
        let err = i64::from_db_value(&DbValue::Null).unwrap_err();
        assert!(err.to_string().contains("Option<i64>"));
    }

    #[test]
    fn sql_helpers_are_stable() {
        assert_eq!(sql_op_name("  SELECT * FROM t"), "SELECT");
        assert_eq!(sql_op_name(""), "EMPTY");
        assert_eq!(hash_sql("SELECT 1"), hash_sql("SELECT 1"));
        assert_ne!(hash_sql("SELECT 1"), hash_sql("SELECT 2"));
    }
}
