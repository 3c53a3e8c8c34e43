//! Parcel tracking store.
//!
//! Persists parcels in a single DuckDB table and enforces the lifecycle
//! rules at the point of mutation: a parcel's address can change, and the
//! parcel can be deleted, only while its status is `registered`.
//!
//! # Usage
//!
//! ```rust,ignore
//! use parcel_store::{ClientId, Parcel, ParcelStatus, ParcelStore, StoreConfig};
//!
//! let store = ParcelStore::open(&StoreConfig::resolve(None)?)?;
//!
//! let number = store.add(&Parcel::registered(ClientId::new(1), "Main St 1"))?;
//! store.set_status(number, &ParcelStatus::sent())?;
//!
//! // Refused: the parcel already left `registered`.
//! let err = store.set_address(number, "Elm St 2").unwrap_err();
//! assert_eq!(err.wrong_status(), Some(&ParcelStatus::sent()));
//! ```

pub mod config;
mod error;
mod service;
mod store;
mod types;

pub use config::{StoreConfig, StoreUrl};
pub use parcel_db::DbTimestamp;
pub use error::{Result, StoreError};
pub use service::ParcelService;
pub use store::ParcelStore;
pub use types::{ClientId, Parcel, ParcelNumber, ParcelStatus};
