//! Parcel value types.

use chrono::{DateTime, Utc};
use parcel_db::{DbTimestamp, DbValue};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

// ============================================================================
// Identifiers - Newtypes to prevent mixing parcel numbers with client ids
// ============================================================================

/// Parcel identifier, assigned by the database on insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParcelNumber(i64);

impl ParcelNumber {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for ParcelNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ParcelNumber {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

impl From<ParcelNumber> for DbValue {
    fn from(number: ParcelNumber) -> Self {
        DbValue::Integer(number.0)
    }
}

/// Identifier of the client that owns a parcel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(i64);

impl ClientId {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ClientId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

impl From<ClientId> for DbValue {
    fn from(client: ClientId) -> Self {
        DbValue::Integer(client.0)
    }
}

// ============================================================================
// Status
// ============================================================================

/// Lifecycle status label.
///
/// The store treats the label as opaque text. Only `registered` carries
/// meaning there: it is the one status that still allows address changes
/// and deletion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParcelStatus(String);

impl ParcelStatus {
    pub const REGISTERED: &'static str = "registered";
    pub const SENT: &'static str = "sent";
    pub const DELIVERED: &'static str = "delivered";

    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn registered() -> Self {
        Self::new(Self::REGISTERED)
    }

    pub fn sent() -> Self {
        Self::new(Self::SENT)
    }

    pub fn delivered() -> Self {
        Self::new(Self::DELIVERED)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Address changes and deletion are only legal in this status.
    pub fn is_registered(&self) -> bool {
        self.0 == Self::REGISTERED
    }

    /// Successor on the standard delivery path.
    ///
    /// `registered -> sent -> delivered`. Delivered parcels and labels outside
    /// the standard path have no successor.
    pub fn next(&self) -> Option<ParcelStatus> {
        match self.as_str() {
            Self::REGISTERED => Some(Self::sent()),
            Self::SENT => Some(Self::delivered()),
            _ => None,
        }
    }
}

impl fmt::Display for ParcelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParcelStatus {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

impl From<String> for ParcelStatus {
    fn from(label: String) -> Self {
        Self(label)
    }
}

impl From<&ParcelStatus> for DbValue {
    fn from(status: &ParcelStatus) -> Self {
        DbValue::Text(status.0.clone())
    }
}

// ============================================================================
// Parcel - The stored record
// ============================================================================

/// A parcel record.
///
/// `number` is `None` until the store assigns one. `created_at` holds
/// microseconds however the record is built (constructor, struct literal or
/// JSON), which is what the database stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parcel {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<ParcelNumber>,
    pub client: ClientId,
    pub status: ParcelStatus,
    pub address: String,
    pub created_at: DbTimestamp,
}

impl Parcel {
    /// Build an unsaved parcel.
    pub fn new(
        client: ClientId,
        status: ParcelStatus,
        address: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            number: None,
            client,
            status,
            address: address.into(),
            created_at: created_at.into(),
        }
    }

    /// Build an unsaved parcel in the `registered` status, created now.
    pub fn registered(client: ClientId, address: impl Into<String>) -> Self {
        Self::new(client, ParcelStatus::registered(), address, Utc::now())
    }

    pub fn with_number(mut self, number: ParcelNumber) -> Self {
        self.number = Some(number);
        self
    }
}
