//! `parcel config`: show where state lives.

use anyhow::Result;
use parcel_store::config::{logs_dir, parcel_home, DB_URL_ENV, HOME_ENV};
use parcel_store::StoreConfig;
use serde_json::json;

use super::output::{print_json, print_table, OutputMode};

pub fn run(config: &StoreConfig, mode: OutputMode) -> Result<()> {
    let home = parcel_home();
    let logs = logs_dir();
    let log_file = parcel_logging::log_file_path(&logs, crate::APP_NAME);
    let url = config.url.to_string();

    match mode {
        OutputMode::Json => print_json(&json!({
            "home": home,
            "logs_dir": logs,
            "log_file": log_file,
            "db_url": url,
            "env": {
                HOME_ENV: std::env::var(HOME_ENV).ok(),
                DB_URL_ENV: std::env::var(DB_URL_ENV).ok(),
            },
        })),
        OutputMode::Human => {
            print_table(
                &["SETTING", "VALUE"],
                vec![
                    vec!["home".to_string(), home.display().to_string()],
                    vec!["logs".to_string(), logs.display().to_string()],
                    vec!["log file".to_string(), log_file.display().to_string()],
                    vec!["database".to_string(), url],
                ],
            );
            Ok(())
        }
    }
}
