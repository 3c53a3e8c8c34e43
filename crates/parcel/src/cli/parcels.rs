//! Parcel commands.

use anyhow::{Context, Result};
use parcel_store::{ClientId, ParcelNumber, ParcelService, ParcelStatus};
use serde_json::json;

use super::output::{
    parcel_row, print_json, print_table, status_counts_json, OutputMode, PARCEL_HEADERS,
};

pub fn register(
    service: &ParcelService,
    client: ClientId,
    address: &str,
    mode: OutputMode,
) -> Result<()> {
    let parcel = service
        .register(client, address)
        .with_context(|| format!("Failed to register parcel for client {}", client))?;

    match mode {
        OutputMode::Json => print_json(&parcel),
        OutputMode::Human => {
            if let Some(number) = parcel.number {
                println!("Registered parcel {}", number);
            }
            Ok(())
        }
    }
}

pub fn get(service: &ParcelService, number: ParcelNumber, mode: OutputMode) -> Result<()> {
    let parcel = service
        .store()
        .get(number)
        .with_context(|| format!("Failed to load parcel {}", number))?;

    match mode {
        OutputMode::Json => print_json(&parcel),
        OutputMode::Human => {
            print_table(&PARCEL_HEADERS, vec![parcel_row(&parcel)]);
            Ok(())
        }
    }
}

pub fn list(service: &ParcelService, client: ClientId, mode: OutputMode) -> Result<()> {
    let parcels = service
        .client_parcels(client)
        .with_context(|| format!("Failed to list parcels of client {}", client))?;

    match mode {
        OutputMode::Json => print_json(&parcels),
        OutputMode::Human if parcels.is_empty() => {
            println!("No parcels for client {}", client);
            Ok(())
        }
        OutputMode::Human => {
            print_table(&PARCEL_HEADERS, parcels.iter().map(parcel_row).collect());
            Ok(())
        }
    }
}

pub fn status(service: &ParcelService, number: ParcelNumber, mode: OutputMode) -> Result<()> {
    let status = service
        .store()
        .get_status(number)
        .with_context(|| format!("Failed to read status of parcel {}", number))?;

    match mode {
        OutputMode::Json => print_json(&json!({ "number": number, "status": status })),
        OutputMode::Human => {
            println!("{}", status);
            Ok(())
        }
    }
}

pub fn set_status(
    service: &ParcelService,
    number: ParcelNumber,
    status: &str,
    mode: OutputMode,
) -> Result<()> {
    let status = ParcelStatus::from(status);
    service
        .store()
        .set_status(number, &status)
        .with_context(|| format!("Failed to set status of parcel {}", number))?;

    match mode {
        OutputMode::Json => print_json(&json!({ "number": number, "status": status })),
        OutputMode::Human => {
            println!("Parcel {} is now {}", number, status);
            Ok(())
        }
    }
}

pub fn next(service: &ParcelService, number: ParcelNumber, mode: OutputMode) -> Result<()> {
    let advanced = service
        .next_status(number)
        .with_context(|| format!("Failed to advance parcel {}", number))?;

    match (mode, advanced) {
        (OutputMode::Json, advanced) => print_json(&json!({
            "number": number,
            "advanced": advanced.is_some(),
            "status": advanced,
        })),
        (OutputMode::Human, Some(status)) => {
            println!("Parcel {} is now {}", number, status);
            Ok(())
        }
        (OutputMode::Human, None) => {
            println!("Parcel {} has no next status", number);
            Ok(())
        }
    }
}

pub fn set_address(
    service: &ParcelService,
    number: ParcelNumber,
    address: &str,
    mode: OutputMode,
) -> Result<()> {
    service
        .change_address(number, address)
        .with_context(|| format!("Failed to change address of parcel {}", number))?;

    match mode {
        OutputMode::Json => print_json(&json!({ "number": number, "address": address })),
        OutputMode::Human => {
            println!("Parcel {} will be delivered to {}", number, address);
            Ok(())
        }
    }
}

pub fn delete(service: &ParcelService, number: ParcelNumber, mode: OutputMode) -> Result<()> {
    service
        .delete(number)
        .with_context(|| format!("Failed to delete parcel {}", number))?;

    match mode {
        OutputMode::Json => print_json(&json!({ "number": number, "deleted": true })),
        OutputMode::Human => {
            println!("Deleted parcel {}", number);
            Ok(())
        }
    }
}

pub fn stats(service: &ParcelService, mode: OutputMode) -> Result<()> {
    let counts = service
        .store()
        .status_counts()
        .context("Failed to count parcels")?;

    match mode {
        OutputMode::Json => print_json(&status_counts_json(&counts)),
        OutputMode::Human => {
            let rows = counts
                .iter()
                .map(|(status, count)| vec![status.to_string(), count.to_string()])
                .collect();
            print_table(&["STATUS", "COUNT"], rows);
            Ok(())
        }
    }
}
