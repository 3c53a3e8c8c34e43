//! Store configuration and default paths.
//!
//! All local state lives under `~/.parcel_tracker/` unless `PARCEL_HOME`
//! points elsewhere.

use parcel_db::MEMORY_URL;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::StoreError;

/// Overrides the home directory.
pub const HOME_ENV: &str = "PARCEL_HOME";
/// Overrides the database URL.
pub const DB_URL_ENV: &str = "PARCEL_DB_URL";

const DEFAULT_DB_FILE: &str = "parcels.duckdb";

/// Get the parcel tracker home directory: ~/.parcel_tracker
pub fn parcel_home() -> PathBuf {
    if let Ok(override_path) = std::env::var(HOME_ENV) {
        return PathBuf::from(override_path);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".parcel_tracker")
}

/// Get the logs directory: ~/.parcel_tracker/logs
pub fn logs_dir() -> PathBuf {
    parcel_home().join("logs")
}

/// Get the default database path: ~/.parcel_tracker/parcels.duckdb
pub fn default_db_path() -> PathBuf {
    parcel_home().join(DEFAULT_DB_FILE)
}

/// Parsed store URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreUrl {
    DuckDb(PathBuf),
    Memory,
}

impl StoreUrl {
    pub fn parse(raw: &str) -> Result<Self, StoreError> {
        let raw = raw.trim();
        if raw == MEMORY_URL {
            return Ok(Self::Memory);
        }
        if let Some(rest) = raw.strip_prefix("duckdb:") {
            let path = rest.trim();
            if path.is_empty() {
                return Err(StoreError::Config(format!("duckdb URL missing path: {raw}")));
            }
            return Ok(Self::DuckDb(PathBuf::from(path)));
        }
        Err(StoreError::Config(format!("Unsupported store URL: {raw}")))
    }
}

impl FromStr for StoreUrl {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for StoreUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreUrl::DuckDb(path) => write!(f, "duckdb:{}", path.display()),
            StoreUrl::Memory => f.write_str(MEMORY_URL),
        }
    }
}

/// How to reach the parcel database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub url: StoreUrl,
    /// Open without the writer lock; mutations fail.
    pub read_only: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: StoreUrl::DuckDb(default_db_path()),
            read_only: false,
        }
    }
}

impl StoreConfig {
    pub fn memory() -> Self {
        Self {
            url: StoreUrl::Memory,
            read_only: false,
        }
    }

    /// Resolve the database URL.
    ///
    /// Priority:
    /// 1. Explicit URL (e.g. a command-line flag)
    /// 2. `PARCEL_DB_URL`
    /// 3. `duckdb:<home>/parcels.duckdb`
    pub fn resolve(explicit: Option<&str>) -> Result<Self, StoreError> {
        let env_url = std::env::var(DB_URL_ENV).ok();
        Self::from_sources(explicit, env_url.as_deref())
    }

    fn from_sources(explicit: Option<&str>, env_url: Option<&str>) -> Result<Self, StoreError> {
        match explicit.or(env_url).filter(|s| !s.trim().is_empty()) {
            Some(raw) => Ok(Self {
                url: StoreUrl::parse(raw)?,
                read_only: false,
            }),
            None => Ok(Self::default()),
        }
    }
}
