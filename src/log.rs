//! In-memory migration log with global and per-vault views.
//!
//! Every entry is also emitted through `tracing` so the process log and the
//! downloadable reports stay in step.

use std::fmt::Write as _;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

const RULE: &str = "===============================================================================";
const THIN_RULE: &str = "-------------------------------------------------------------------------------";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vault_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedItem {
    pub vault_id: String,
    pub vault_name: String,
    pub item_id: String,
    pub item_title: String,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultStatsRecord {
    pub vault_id: String,
    pub vault_name: String,
    pub source_item_count: usize,
    pub dest_item_count: Option<usize>,
    pub success_count: usize,
    pub failure_count: usize,
    pub completed_at: DateTime<Utc>,
}

impl VaultStatsRecord {
    pub fn is_clean(&self) -> bool {
        self.failure_count == 0 && self.dest_item_count == Some(self.source_item_count)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogSummary {
    pub total_entries: usize,
    pub errors: usize,
    pub warnings: usize,
    pub vaults: usize,
    pub failed_items: usize,
}

#[derive(Debug, Default)]
struct LogState {
    entries: Vec<LogEntry>,
    failed: Vec<FailedItem>,
    stats: Vec<VaultStatsRecord>,
}

#[derive(Debug, Default)]
pub struct MigrationLog {
    state: Mutex<LogState>,
}

impl MigrationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&self, vault_id: Option<&str>, message: impl Into<String>) {
        self.record(LogLevel::Info, vault_id, None, message.into());
    }

    pub fn warning(&self, vault_id: Option<&str>, message: impl Into<String>) {
        self.record(LogLevel::Warning, vault_id, None, message.into());
    }

    pub fn error(&self, vault_id: Option<&str>, message: impl Into<String>) {
        self.record(LogLevel::Error, vault_id, None, message.into());
    }

    pub fn item_warning(&self, vault_id: &str, item_id: &str, message: impl Into<String>) {
        self.record(
            LogLevel::Warning,
            Some(vault_id),
            Some(item_id),
            message.into(),
        );
    }

    /// Record an item that did not make it to the destination.
    pub fn item_failed(
        &self,
        vault_id: &str,
        vault_name: &str,
        item_id: &str,
        item_title: &str,
        error: &str,
    ) {
        self.lock().failed.push(FailedItem {
            vault_id: vault_id.to_string(),
            vault_name: vault_name.to_string(),
            item_id: item_id.to_string(),
            item_title: item_title.to_string(),
            error: error.to_string(),
            timestamp: Utc::now(),
        });
        self.record(
            LogLevel::Error,
            Some(vault_id),
            Some(item_id),
            format!("Failed to migrate item \"{item_title}\": {error}"),
        );
    }

    /// Store the final counts of a vault; a second call for the same vault replaces the first.
    pub fn vault_completed(&self, record: VaultStatsRecord) {
        let mut state = self.lock();
        match state
            .stats
            .iter_mut()
            .find(|existing| existing.vault_id == record.vault_id)
        {
            Some(existing) => *existing = record,
            None => state.stats.push(record),
        }
    }

    fn record(
        &self,
        level: LogLevel,
        vault_id: Option<&str>,
        item_id: Option<&str>,
        message: String,
    ) {
        match level {
            LogLevel::Info => tracing::info!(
                target: "vaultferry",
                event = "migration_log",
                vault_id = vault_id.unwrap_or_default(),
                item_id = item_id.unwrap_or_default(),
                "{message}"
            ),
            LogLevel::Warning => tracing::warn!(
                target: "vaultferry",
                event = "migration_log",
                vault_id = vault_id.unwrap_or_default(),
                item_id = item_id.unwrap_or_default(),
                "{message}"
            ),
            LogLevel::Error => tracing::error!(
                target: "vaultferry",
                event = "migration_log",
                vault_id = vault_id.unwrap_or_default(),
                item_id = item_id.unwrap_or_default(),
                "{message}"
            ),
        }

        self.lock().entries.push(LogEntry {
            timestamp: Utc::now(),
            level,
            vault_id: vault_id.map(str::to_string),
            item_id: item_id.map(str::to_string),
            message,
        });
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.lock().entries.clone()
    }

    pub fn failed_items(&self) -> Vec<FailedItem> {
        self.lock().failed.clone()
    }

    pub fn vault_stats(&self) -> Vec<VaultStatsRecord> {
        self.lock().stats.clone()
    }

    /// Every entry as text, one per line.
    pub fn global_log(&self) -> String {
        let state = self.lock();
        let lines: Vec<String> = state
            .entries
            .iter()
            .map(|entry| {
                let mut line = format!(
                    "[{}] [{}]",
                    timestamp(&entry.timestamp),
                    entry.level.as_str()
                );
                if let Some(vault_id) = &entry.vault_id {
                    let _ = write!(line, " [Vault: {vault_id}]");
                }
                if let Some(item_id) = &entry.item_id {
                    let _ = write!(line, " [Item: {item_id}]");
                }
                let _ = write!(line, " {}", entry.message);
                line
            })
            .collect();
        lines.join("\n")
    }

    /// Entries for one vault, or `None` when nothing was logged for it.
    pub fn vault_log(&self, vault_id: &str) -> Option<String> {
        let state = self.lock();
        let lines: Vec<String> = state
            .entries
            .iter()
            .filter(|entry| entry.vault_id.as_deref() == Some(vault_id))
            .map(|entry| {
                let mut line = format!(
                    "[{}] [{}]",
                    timestamp(&entry.timestamp),
                    entry.level.as_str()
                );
                if let Some(item_id) = &entry.item_id {
                    let _ = write!(line, " [Item: {item_id}]");
                }
                let _ = write!(line, " {}", entry.message);
                line
            })
            .collect();
        (!lines.is_empty()).then(|| lines.join("\n"))
    }

    pub fn summary(&self) -> LogSummary {
        let state = self.lock();
        let mut vaults: Vec<&str> = Vec::new();
        for vault_id in state.entries.iter().filter_map(|e| e.vault_id.as_deref()) {
            if !vaults.contains(&vault_id) {
                vaults.push(vault_id);
            }
        }
        LogSummary {
            total_entries: state.entries.len(),
            errors: count_level(&state.entries, LogLevel::Error),
            warnings: count_level(&state.entries, LogLevel::Warning),
            vaults: vaults.len(),
            failed_items: state.failed.len(),
        }
    }

    /// Failed items grouped by vault, in the order vaults first failed.
    pub fn failure_summary(&self) -> String {
        let state = self.lock();
        let mut out = String::from("\n");
        out.push_str(RULE);
        out.push('\n');

        if state.failed.is_empty() {
            out.push_str("✓ NO FAILED ITEMS - All items migrated successfully!\n");
            out.push_str(RULE);
            out.push('\n');
            return out;
        }

        let _ = writeln!(out, "FAILED ITEMS SUMMARY ({} total failures)", state.failed.len());
        out.push_str(RULE);
        out.push_str("\n\n");

        let mut vault_order: Vec<&str> = Vec::new();
        for failed in &state.failed {
            if !vault_order.contains(&failed.vault_id.as_str()) {
                vault_order.push(&failed.vault_id);
            }
        }

        for vault_id in vault_order {
            let items: Vec<&FailedItem> = state
                .failed
                .iter()
                .filter(|failed| failed.vault_id == vault_id)
                .collect();
            let vault_name = items.first().map(|f| f.vault_name.as_str()).unwrap_or_default();
            let _ = writeln!(out, "VAULT: {vault_name}");
            let _ = writeln!(out, "UUID:  {vault_id}");
            let _ = writeln!(out, "Failed Items: {}", items.len());
            out.push_str(THIN_RULE);
            out.push_str("\n\n");
            for (index, item) in items.iter().enumerate() {
                let _ = writeln!(out, "  {}. Item: \"{}\"", index + 1, item.item_title);
                let _ = writeln!(out, "     UUID:  {}", item.item_id);
                let _ = writeln!(out, "     Error: {}", item.error);
                let _ = writeln!(out, "     Time:  {}\n", timestamp(&item.timestamp));
            }
            out.push('\n');
        }

        out.push_str(RULE);
        out.push('\n');
        out
    }

    /// Per-vault counts; clean vaults are marked `✓`, the rest `⚠`.
    pub fn vault_stats_summary(&self) -> String {
        let state = self.lock();
        if state.stats.is_empty() {
            return String::new();
        }

        let mut out = String::from("\n");
        out.push_str(RULE);
        out.push_str("\nVAULT MIGRATION STATISTICS\n");
        out.push_str(RULE);
        out.push_str("\n\n");

        for stats in &state.stats {
            let marker = if stats.is_clean() { "✓" } else { "⚠" };
            let destination = stats
                .dest_item_count
                .map(|count| count.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            let _ = writeln!(out, "{marker} VAULT: {}", stats.vault_name);
            let _ = writeln!(out, "  UUID:        {}", stats.vault_id);
            let _ = writeln!(out, "  Source:      {} items", stats.source_item_count);
            let _ = writeln!(out, "  Destination: {destination} items");
            let _ = writeln!(out, "  Success:     {} items", stats.success_count);
            let _ = writeln!(out, "  Failed:      {} items", stats.failure_count);
            let _ = writeln!(out, "  Completed:   {}\n", timestamp(&stats.completed_at));
        }

        out.push_str(RULE);
        out.push('\n');
        out
    }

    pub fn clear(&self) {
        *self.lock() = LogState::default();
    }

    fn lock(&self) -> MutexGuard<'_, LogState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn count_level(entries: &[LogEntry], level: LogLevel) -> usize {
    entries.iter().filter(|entry| entry.level == level).count()
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(
        vault_id: &str,
        source: usize,
        dest: Option<usize>,
        failed: usize,
    ) -> VaultStatsRecord {
        VaultStatsRecord {
            vault_id: vault_id.into(),
            vault_name: format!("{vault_id} name"),
            source_item_count: source,
            dest_item_count: dest,
            success_count: source - failed,
            failure_count: failed,
            completed_at: Utc::now(),
        }
    }

    #[test]
    fn summary_counts_levels_vaults_and_failures() {
        let log = MigrationLog::new();
        log.info(None, "starting");
        log.warning(Some("v1"), "slow");
        log.item_failed("v1", "Personal", "i1", "Bank", "rejected: bad field");
        log.info(Some("v2"), "done");

        assert_eq!(
            log.summary(),
            LogSummary {
                total_entries: 4,
                errors: 1,
                warnings: 1,
                vaults: 2,
                failed_items: 1,
            }
        );
    }

    #[test]
    fn vault_log_is_none_for_unknown_vault() {
        let log = MigrationLog::new();
        log.info(Some("v1"), "created");
        assert!(log.vault_log("v1").unwrap().contains("created"));
        assert!(log.vault_log("v9").is_none());
        assert!(log.global_log().contains("[Vault: v1]"));
    }

    #[test]
    fn failure_summary_groups_by_vault() {
        let log = MigrationLog::new();
        assert!(log.failure_summary().contains("NO FAILED ITEMS"));

        log.item_failed("v1", "Personal", "i1", "Bank", "boom");
        log.item_failed("v2", "Work", "i2", "VPN", "bang");
        log.item_failed("v1", "Personal", "i3", "Mail", "pow");
        let summary = log.failure_summary();

        assert!(summary.contains("FAILED ITEMS SUMMARY (3 total failures)"));
        let personal = summary.find("VAULT: Personal").unwrap();
        let work = summary.find("VAULT: Work").unwrap();
        assert!(personal < work);
        assert!(summary.contains("  2. Item: \"Mail\""));
    }

    #[test]
    fn stats_summary_marks_clean_vaults() {
        let log = MigrationLog::new();
        assert_eq!(log.vault_stats_summary(), "");
        log.vault_completed(stats("v1", 3, Some(3), 0));
        log.vault_completed(stats("v2", 3, Some(2), 1));
        log.vault_completed(stats("v3", 3, None, 0));
        let summary = log.vault_stats_summary();
        assert!(summary.contains("✓ VAULT: v1 name"));
        assert!(summary.contains("⚠ VAULT: v2 name"));
        assert!(summary.contains("⚠ VAULT: v3 name"));
        assert!(summary.contains("Destination: unknown items"));
    }

    #[test]
    fn clear_resets_everything() {
        let log = MigrationLog::new();
        log.item_failed("v1", "Personal", "i1", "Bank", "boom");
        log.vault_completed(stats("v1", 1, Some(0), 1));
        log.clear();
        assert_eq!(log.summary(), LogSummary::default());
        assert!(log.vault_stats().is_empty());
    }
}
