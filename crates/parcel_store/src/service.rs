//! Lifecycle policy on top of the parcel store.
//!
//! The store accepts any status change. This layer owns the standard delivery
//! path and is where stricter transition rules belong.

use chrono::Utc;
use tracing::info;

use crate::error::Result;
use crate::store::ParcelStore;
use crate::types::{ClientId, Parcel, ParcelNumber, ParcelStatus};

/// Client-facing parcel operations.
#[derive(Debug, Clone)]
pub struct ParcelService {
    store: ParcelStore,
}

impl ParcelService {
    pub fn new(store: ParcelStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &ParcelStore {
        &self.store
    }

    /// Register a new parcel for `client`, created now.
    pub fn register(&self, client: ClientId, address: &str) -> Result<Parcel> {
        let parcel = Parcel::new(client, ParcelStatus::registered(), address, Utc::now());
        let number = self.store.add(&parcel)?;

        info!(%number, %client, address, "Parcel registered");
        Ok(parcel.with_number(number))
    }

    pub fn client_parcels(&self, client: ClientId) -> Result<Vec<Parcel>> {
        self.store.get_by_client(client)
    }

    /// Advance one step along `registered -> sent -> delivered`.
    ///
    /// Returns the new status, or `None` without writing when the parcel has
    /// no successor status.
    pub fn next_status(&self, number: ParcelNumber) -> Result<Option<ParcelStatus>> {
        let current = self.store.get_status(number)?;
        let Some(next) = current.next() else {
            info!(%number, status = %current, "Parcel has no next status");
            return Ok(None);
        };

        self.store.set_status(number, &next)?;
        info!(%number, from = %current, to = %next, "Parcel status advanced");
        Ok(Some(next))
    }

    pub fn change_address(&self, number: ParcelNumber, address: &str) -> Result<()> {
        self.store.set_address(number, address)?;
        info!(%number, address, "Parcel address changed");
        Ok(())
    }

    pub fn delete(&self, number: ParcelNumber) -> Result<()> {
        self.store.delete(number)?;
        info!(%number, "Parcel deleted");
        Ok(())
    }
}
