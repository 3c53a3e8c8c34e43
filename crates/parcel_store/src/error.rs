//! Error types for the parcel store.

use parcel_db::BackendError;
use std::fmt;
use thiserror::Error;

use crate::types::{ClientId, ParcelNumber, ParcelStatus};

/// Parcel store result type.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Parcel store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No parcel with this number
    #[error("Parcel {number} not found")]
    NotFound { number: ParcelNumber },

    /// The operation requires `registered`; carries the status actually found
    #[error("Parcel {number} has status '{status}', operation requires 'registered'")]
    WrongStatus {
        number: ParcelNumber,
        status: ParcelStatus,
    },

    /// Backend failure, tagged with the operation and what it was acting on
    #[error("Storage error during {operation} ({target}): {source}")]
    Storage {
        operation: &'static str,
        target: String,
        #[source]
        source: BackendError,
    },

    /// Unusable store configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// The status that blocked a gated operation, if that is what failed.
    pub fn wrong_status(&self) -> Option<&ParcelStatus> {
        match self {
            Self::WrongStatus { status, .. } => Some(status),
            _ => None,
        }
    }

    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage { .. })
    }
}

/// What a store operation was acting on, for error context.
#[derive(Debug, Clone)]
pub(crate) enum Target<'a> {
    Parcel(ParcelNumber),
    Client(ClientId),
    Table,
    Url(&'a str),
}

impl fmt::Display for Target<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Parcel(number) => write!(f, "parcel {}", number),
            Target::Client(client) => write!(f, "client {}", client),
            Target::Table => f.write_str("parcel table"),
            Target::Url(url) => write!(f, "{}", url),
        }
    }
}

/// Wrap a backend error with operation context: `.map_err(storage("get", Target::Parcel(n)))`.
pub(crate) fn storage<'a>(
    operation: &'static str,
    target: Target<'a>,
) -> impl FnOnce(BackendError) -> StoreError + 'a {
    move |source| StoreError::Storage {
        operation,
        target: target.to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_error_names_operation_and_target() {
        let err = storage("get", Target::Parcel(ParcelNumber::new(5)))(BackendError::Query(
            "boom".to_string(),
        ));
        let msg = err.to_string();
        assert!(msg.contains("get"), "{msg}");
        assert!(msg.contains("parcel 5"), "{msg}");
        assert!(msg.contains("boom"), "{msg}");
        assert!(err.is_storage());
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn wrong_status_exposes_actual_status() {
        let err = StoreError::WrongStatus {
            number: ParcelNumber::new(5),
            status: ParcelStatus::sent(),
        };
        assert_eq!(err.wrong_status(), Some(&ParcelStatus::sent()));
        assert!(!err.is_not_found());
        assert!(err.to_string().contains("'sent'"));
    }
}
