//! Error reporting at the process boundary.

use parcel_store::StoreError;

use super::output::OutputMode;

/// Short machine-readable classification of a command failure.
pub fn error_kind(err: &anyhow::Error) -> &'static str {
    match err.chain().find_map(|cause| cause.downcast_ref::<StoreError>()) {
        Some(StoreError::NotFound { .. }) => "not_found",
        Some(StoreError::WrongStatus { .. }) => "wrong_status",
        Some(StoreError::Storage { .. }) => "storage",
        Some(StoreError::Config(_)) => "config",
        None => "error",
    }
}

pub fn json_error(err: &anyhow::Error) -> serde_json::Value {
    let status = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<StoreError>())
        .and_then(StoreError::wrong_status)
        .map(|status| status.to_string());

    let mut value = serde_json::json!({
        "error": {
            "kind": error_kind(err),
            "message": format!("{:#}", err),
        }
    });
    if let Some(status) = status {
        value["error"]["status"] = serde_json::Value::String(status);
    }
    value
}

/// Print a failed command's error to stderr.
pub fn print_error(err: &anyhow::Error, mode: OutputMode) {
    match mode {
        OutputMode::Json => eprintln!("{}", json_error(err)),
        OutputMode::Human => eprintln!("ERROR: {:#}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use parcel_store::{ParcelNumber, ParcelStatus};

    #[test]
    fn classifies_store_errors_through_context() {
        let err = Err::<(), _>(StoreError::NotFound {
            number: ParcelNumber::new(3),
        })
        .context("Failed to load parcel 3")
        .unwrap_err();
        assert_eq!(error_kind(&err), "not_found");

        let plain = anyhow::anyhow!("something else");
        assert_eq!(error_kind(&plain), "error");
    }

    #[test]
    fn json_error_carries_blocking_status() {
        let err = anyhow::Error::new(StoreError::WrongStatus {
            number: ParcelNumber::new(5),
            status: ParcelStatus::sent(),
        });
        let value = json_error(&err);
        assert_eq!(value["error"]["kind"], "wrong_status");
        assert_eq!(value["error"]["status"], "sent");
        assert!(value["error"]["message"]
            .as_str()
            .unwrap()
            .contains("Parcel 5"));
    }
}
