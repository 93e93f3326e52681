//! Vault migration: classify source items, create them in the destination in
//! batches or one by one, then re-point reference fields.

mod all;
mod create;
mod prepare;

use serde::{Deserialize, Serialize};

use crate::log::VaultStatsRecord;
use crate::references::{resolve_references, ResolutionReport};
use crate::retry::with_retry;
use crate::session::MigrationSession;
use crate::store::{DestinationStore, SourceStore};
use crate::{AppError, AppResult};

pub use all::{
    list_vaults_with_counts, migrate_vaults, BulkOutcome, VaultOutcome, VaultWithCount,
};
use create::{create_batched, create_individually, Tracker};
use prepare::prepare_items;

/// Outcome for a single source item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationResult {
    pub id: String,
    pub title: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Share of the vault processed when this result was recorded, 0 to 100.
    pub progress: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultMigrationStats {
    pub source_item_count: usize,
    /// `None` when the run was cancelled or the count could not be read.
    pub dest_item_count: Option<usize>,
    pub success_count: usize,
    pub failure_count: usize,
}

impl VaultMigrationStats {
    /// No failures and the destination holds exactly as many items as the source.
    pub fn is_clean(&self) -> bool {
        self.failure_count == 0 && self.dest_item_count == Some(self.source_item_count)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultMigration {
    pub vault_id: String,
    pub vault_name: String,
    pub dest_vault_id: String,
    #[serde(flatten)]
    pub stats: VaultMigrationStats,
    pub migration_results: Vec<MigrationResult>,
    pub references: ResolutionReport,
    pub cancelled: bool,
}

impl VaultMigration {
    pub fn is_clean(&self) -> bool {
        !self.cancelled && self.stats.is_clean()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VaultPhase {
    Preparing,
    Migrating,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ProgressEvent {
    #[serde(rename_all = "camelCase")]
    Items {
        vault_id: String,
        processed: usize,
        total: usize,
        success_count: usize,
        failure_count: usize,
    },
    #[serde(rename_all = "camelCase")]
    Phase {
        vault_id: String,
        vault_name: String,
        phase: VaultPhase,
        message: String,
    },
}

/// Receiver for progress updates; invoked inline, so keep it cheap.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: &ProgressEvent);
}

pub struct SilentProgress;

impl ProgressSink for SilentProgress {
    fn emit(&self, _event: &ProgressEvent) {}
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn emit(&self, event: &ProgressEvent) {
        self(event)
    }
}

/// Migrate one vault into a newly created destination vault named `vault_name`.
///
/// Per-item, per-chunk and per-reference problems are recorded in the result.
/// Only a failure to list the source items or to create the destination
/// vault is returned as an error. Cancellation yields the partial result with
/// `dest_item_count` unset.
pub async fn migrate_vault<S, D>(
    session: &MigrationSession,
    source: &S,
    dest: &D,
    vault_id: &str,
    vault_name: &str,
    progress: &dyn ProgressSink,
) -> AppResult<VaultMigration>
where
    S: SourceStore + ?Sized,
    D: DestinationStore + ?Sized,
{
    let log = session.log();
    let policy = session.retry_policy();
    log.info(
        Some(vault_id),
        format!("Starting migration for vault \"{vault_name}\""),
    );

    let summaries = with_retry(&policy, "list_items", || source.list_items(vault_id))
        .await
        .map_err(|error| {
            log.error(Some(vault_id), format!("Failed to list items: {error}"));
            AppError::new(
                "MIGRATION/ITEM_LISTING",
                format!("Item listing failed for vault \"{vault_name}\""),
            )
            .with_context("vault_id", vault_id)
            .with_cause(error)
        })?;
    let source_item_count = summaries.len();
    log.info(
        Some(vault_id),
        format!("Found {source_item_count} items to migrate"),
    );

    let dest_vault_id = with_retry(&policy, "create_vault", || dest.create_vault(vault_name))
        .await
        .map_err(|error| {
            log.error(
                Some(vault_id),
                format!("Failed to create destination vault: {error}"),
            );
            AppError::new(
                "MIGRATION/VAULT_CREATE",
                format!("Vault creation failed for \"{vault_name}\""),
            )
            .with_context("vault_id", vault_id)
            .with_cause(error)
        })?;
    log.info(
        Some(vault_id),
        format!("Created destination vault {dest_vault_id}"),
    );

    let mut tracker = Tracker::new(session, progress, vault_id, vault_name, source_item_count);

    let prepared = prepare_items(
        session,
        source,
        vault_id,
        &dest_vault_id,
        &summaries,
        &mut tracker,
    )
    .await;
    let finished = match prepared {
        Some(prepared) => {
            log.info(
                Some(vault_id),
                format!(
                    "Classified {} batchable and {} individual items",
                    prepared.batchable.len(),
                    prepared.individual.len()
                ),
            );
            create_batched(session, dest, &dest_vault_id, prepared.batchable, &mut tracker).await
                && create_individually(
                    session,
                    dest,
                    &dest_vault_id,
                    prepared.individual,
                    &mut tracker,
                )
                .await
        }
        None => false,
    };

    if !finished {
        log.warning(
            Some(vault_id),
            format!(
                "Migration cancelled after {} of {source_item_count} items",
                tracker.processed()
            ),
        );
        return Ok(tracker.finish(dest_vault_id, None, ResolutionReport::default(), true));
    }

    let (ids, pending) = tracker.reference_state();
    let references =
        resolve_references(session, dest, vault_id, &dest_vault_id, &pending, &ids).await;

    let counted = with_retry(&policy, "count_items", || dest.count_items(&dest_vault_id)).await;
    let dest_item_count = match counted {
        Ok(count) => {
            log.info(Some(vault_id), format!("Destination item count: {count}"));
            Some(count)
        }
        Err(error) => {
            log.error(
                Some(vault_id),
                format!("Could not count destination items: {error}"),
            );
            None
        }
    };

    let migration = tracker.finish(dest_vault_id, dest_item_count, references, false);
    let stats = migration.stats;
    if stats.is_clean() {
        log.info(
            Some(vault_id),
            format!("Vault \"{vault_name}\" migrated cleanly ({source_item_count} items)"),
        );
    } else {
        log.warning(
            Some(vault_id),
            format!(
                "Item count mismatch - Source: {}, Destination: {}, Failed: {}",
                stats.source_item_count,
                stats
                    .dest_item_count
                    .map(|count| count.to_string())
                    .unwrap_or_else(|| "unknown".to_string()),
                stats.failure_count
            ),
        );
    }
    Ok(migration)
}

fn stats_record(migration: &VaultMigration) -> VaultStatsRecord {
    VaultStatsRecord {
        vault_id: migration.vault_id.clone(),
        vault_name: migration.vault_name.clone(),
        source_item_count: migration.stats.source_item_count,
        dest_item_count: migration.stats.dest_item_count,
        success_count: migration.stats.success_count,
        failure_count: migration.stats.failure_count,
        completed_at: chrono::Utc::now(),
    }
}
