//! Command implementations for the `parcel` binary.

pub mod config;
pub mod error;
pub mod output;
pub mod parcels;
