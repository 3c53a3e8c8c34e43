//! Output formatting for CLI commands
//!
//! Human output is a table or a short line; `--json` prints one JSON
//! document to stdout.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Color, ContentArrangement, Table};
use parcel_store::{Parcel, ParcelStatus};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

impl OutputMode {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            OutputMode::Json
        } else {
            OutputMode::Human
        }
    }
}

/// Print a value as pretty JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to serialize JSON output")?;
    println!("{}", text);
    Ok(())
}

/// Print a simple table with headers
pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    println!("{}", build_table(headers, rows));
}

fn build_table(headers: &[&str], rows: Vec<Vec<String>>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let header_cells: Vec<Cell> = headers
        .iter()
        .map(|h| Cell::new(h).fg(Color::Cyan))
        .collect();
    table.set_header(header_cells);

    for row in rows {
        table.add_row(row);
    }
    table
}

pub const PARCEL_HEADERS: [&str; 5] = ["NUMBER", "CLIENT", "STATUS", "ADDRESS", "CREATED"];

pub fn parcel_row(parcel: &Parcel) -> Vec<String> {
    vec![
        parcel
            .number
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".to_string()),
        parcel.client.to_string(),
        parcel.status.to_string(),
        parcel.address.clone(),
        format_timestamp(&parcel.created_at.into_chrono()),
    ]
}

/// Format a timestamp for table output, e.g. "2024-03-01 12:30:05 UTC"
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Status counts as a JSON object keyed by label.
pub fn status_counts_json(counts: &[(ParcelStatus, u64)]) -> serde_json::Value {
    let map: serde_json::Map<String, serde_json::Value> = counts
        .iter()
        .map(|(status, count)| (status.to_string(), serde_json::Value::from(*count)))
        .collect();
    serde_json::Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use parcel_store::{ClientId, ParcelNumber};

    #[test]
    fn formats_timestamp_without_fraction() {
        let ts = Utc.timestamp_opt(1_700_000_000, 123_000_000).unwrap();
        assert_eq!(format_timestamp(&ts), "2023-11-14 22:13:20 UTC");
    }

    #[test]
    fn parcel_row_shows_dash_for_unsaved_parcel() {
        let ts = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let parcel = Parcel::new(ClientId::new(4), ParcelStatus::sent(), "Elm St 2", ts);
        assert_eq!(parcel_row(&parcel)[0], "-");

        let row = parcel_row(&parcel.with_number(ParcelNumber::new(9)));
        assert_eq!(row[..4], ["9", "4", "sent", "Elm St 2"]);
    }

    #[test]
    fn table_contains_headers_and_cells() {
        let rendered = build_table(&["STATUS", "COUNT"], vec![vec!["sent".into(), "3".into()]])
            .to_string();
        assert!(rendered.contains("STATUS"));
        assert!(rendered.contains("sent"));
    }

    #[test]
    fn status_counts_become_object() {
        let value = status_counts_json(&[(ParcelStatus::registered(), 2), (ParcelStatus::sent(), 1)]);
        assert_eq!(value, serde_json::json!({ "registered": 2, "sent": 1 }));
    }
}
