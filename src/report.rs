//! JSON report written at the end of a bulk migration.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::log::{FailedItem, LogSummary, MigrationLog, VaultStatsRecord};
use crate::migration::BulkOutcome;
use crate::{AppError, AppResult};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MigrationReport<'a> {
    generated_at: DateTime<Utc>,
    outcome: &'a BulkOutcome,
    summary: &'a LogSummary,
    failed_items: Vec<FailedItem>,
    vault_stats: Vec<VaultStatsRecord>,
}

/// Write `migration-YYYYMMDD-HHMMSS.json` into `dir` and return its path.
///
/// The report carries the outcome plus the failed items and per-vault stats
/// recorded in `log`.
pub fn write_migration_report(
    dir: impl AsRef<Path>,
    outcome: &BulkOutcome,
    log: &MigrationLog,
) -> AppResult<PathBuf> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir).map_err(|err| {
        AppError::from(err).with_context("path", dir.display().to_string())
    })?;

    let generated_at = Utc::now();
    let path = dir.join(format!(
        "migration-{}.json",
        generated_at.format("%Y%m%d-%H%M%S")
    ));
    let report = MigrationReport {
        generated_at,
        outcome,
        summary: &outcome.summary,
        failed_items: log.failed_items(),
        vault_stats: log.vault_stats(),
    };
    let json = serde_json::to_vec_pretty(&report)?;
    fs::write(&path, json).map_err(|err| {
        AppError::new("REPORT/WRITE", "Failed to write migration report")
            .with_context("path", path.display().to_string())
            .with_cause(err)
    })?;

    tracing::info!(
        target: "vaultferry",
        event = "report_written",
        path = %path.display()
    );
    Ok(path)
}
