//! Live hub counts from `/api/health/detailed`.

use std::time::Duration;

use clap::Args;
use serde::{Deserialize, Serialize};
use tabled::Tabled;

use parley_core::error::{AppError, ErrorKind};

use crate::output::{self, OutputFormat};

/// Arguments for `status`
#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Base URL of the running hub
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct DetailedHealth {
    version: String,
    uptime_seconds: u64,
    backend: String,
    hub: serde_json::Value,
}

/// One metric per row.
#[derive(Debug, Serialize, Tabled)]
struct StatRow {
    /// Metric
    metric: String,
    /// Value
    value: String,
}

/// Fetch and print hub counts.
pub async fn execute(args: &StatusArgs, format: OutputFormat) -> Result<(), AppError> {
    let url = format!("{}/api/health/detailed", args.url.trim_end_matches('/'));
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .map_err(|e| AppError::with_source(ErrorKind::Internal, "HTTP client setup failed", e))?;

    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| AppError::with_source(ErrorKind::ExternalService, format!("GET {url} failed"), e))?;
    if !response.status().is_success() {
        return Err(AppError::external(format!(
            "GET {url} returned {}",
            response.status()
        )));
    }
    let health: DetailedHealth = response
        .json()
        .await
        .map_err(|e| AppError::with_source(ErrorKind::ExternalService, "Unreadable health body", e))?;

    output::print_list(&rows(&health), format);
    Ok(())
}

fn rows(health: &DetailedHealth) -> Vec<StatRow> {
    let mut rows = vec![
        StatRow {
            metric: "version".to_string(),
            value: health.version.clone(),
        },
        StatRow {
            metric: "uptime_seconds".to_string(),
            value: health.uptime_seconds.to_string(),
        },
        StatRow {
            metric: "backend".to_string(),
            value: health.backend.clone(),
        },
    ];
    flatten("", &health.hub, &mut rows);
    rows
}

fn flatten(prefix: &str, value: &serde_json::Value, rows: &mut Vec<StatRow>) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, inner) in map {
                let name = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten(&name, inner, rows);
            }
        }
        other => rows.push(StatRow {
            metric: prefix.to_string(),
            value: other.to_string(),
        }),
    }
}
