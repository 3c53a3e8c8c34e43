//! Database access layer for the parcel tracker.
//!
//! A small synchronous surface over DuckDB: parameterized statements that
//! report affected rows, buffered queries, and closures run in a transaction.
//!
//! # Example
//!
//! ```rust,ignore
//! use parcel_db::DbConnection;
//!
//! let conn = DbConnection::open_from_url("duckdb:./parcels.duckdb")?;
//!
//! conn.execute("UPDATE parcel SET status = ? WHERE number = ?", &["sent".into(), 5_i64.into()])?;
//! let rows = conn.query_all("SELECT * FROM parcel WHERE client = ?", &[1_i64.into()])?;
//! ```

pub mod backend;
pub mod lock;

pub use backend::{
    AccessMode, BackendError, DbConnection, DbRow, DbTimestamp, DbTransaction,
    DbValue, FromDbValue, MEMORY_URL,
};
pub use lock::{is_held, lock_file_path, read_holder, LockError, LockHolder, WriterLock};
