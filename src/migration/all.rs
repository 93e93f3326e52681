use futures::stream::{self, StreamExt};
use serde::Serialize;

use super::{migrate_vault, ProgressEvent, ProgressSink, VaultMigration, VaultPhase};
use crate::log::LogSummary;
use crate::model::VaultSummary;
use crate::retry::with_retry;
use crate::session::MigrationSession;
use crate::store::{DestinationStore, SourceStore};
use crate::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultWithCount {
    pub id: String,
    pub name: String,
    pub item_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultOutcome {
    pub vault_id: String,
    pub vault_name: String,
    pub success: bool,
    pub phase: VaultPhase,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migration: Option<VaultMigration>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkOutcome {
    pub success: bool,
    pub cancelled: bool,
    pub message: String,
    pub results: Vec<VaultOutcome>,
    pub summary: LogSummary,
}

impl BulkOutcome {
    pub fn failed_vaults(&self) -> usize {
        self.results.iter().filter(|outcome| !outcome.success).count()
    }
}

/// Every source vault with its current item count.
///
/// Only the vault listing itself is fatal; a vault whose items cannot be
/// counted is reported with zero and an error log entry.
pub async fn list_vaults_with_counts<S>(
    session: &MigrationSession,
    source: &S,
) -> AppResult<Vec<VaultWithCount>>
where
    S: SourceStore + ?Sized,
{
    let policy = session.retry_policy();
    let vaults = with_retry(&policy, "list_vaults", || source.list_vaults())
        .await
        .map_err(|error| {
            AppError::new("MIGRATION/VAULT_LISTING", "Failed to list source vaults")
                .with_cause(error)
        })?;

    let mut counted = Vec::with_capacity(vaults.len());
    for vault in vaults {
        let listed = with_retry(&policy, "list_items", || source.list_items(&vault.id)).await;
        let item_count = match listed {
            Ok(items) => items.len(),
            Err(error) => {
                session.log().error(
                    Some(vault.id.as_str()),
                    format!("Failed to count items in vault \"{}\": {error}", vault.name),
                );
                0
            }
        };
        counted.push(VaultWithCount {
            id: vault.id,
            name: vault.name,
            item_count,
        });
    }
    Ok(counted)
}

/// Migrate several vaults, at most `vault_concurrency` at a time.
///
/// An empty `selection` migrates every vault the source lists. Each vault is
/// created in the destination under its name plus the configured suffix.
/// A vault that fails fatally is reported as a failed outcome; the others
/// carry on. Cancellation stops vaults that have not started yet.
pub async fn migrate_vaults<S, D>(
    session: &MigrationSession,
    source: &S,
    dest: &D,
    selection: &[String],
    progress: &dyn ProgressSink,
) -> AppResult<BulkOutcome>
where
    S: SourceStore + ?Sized,
    D: DestinationStore + ?Sized,
{
    let policy = session.retry_policy();
    let listed = with_retry(&policy, "list_vaults", || source.list_vaults())
        .await
        .map_err(|error| {
            AppError::new("MIGRATION/VAULT_LISTING", "Failed to list source vaults")
                .with_cause(error)
        })?;

    let mut missing = Vec::new();
    let vaults: Vec<VaultSummary> = if selection.is_empty() {
        listed
    } else {
        for id in selection {
            if !listed.iter().any(|vault| &vault.id == id) {
                missing.push(id.clone());
            }
        }
        listed
            .into_iter()
            .filter(|vault| selection.contains(&vault.id))
            .collect()
    };
    let total = vaults.len() + missing.len();
    session
        .log()
        .info(None, format!("Starting migration of {total} vault(s)"));

    let mut results: Vec<VaultOutcome> = missing
        .into_iter()
        .map(|id| {
            session
                .log()
                .error(Some(id.as_str()), "Vault not found in source");
            VaultOutcome {
                vault_name: id.clone(),
                vault_id: id,
                success: false,
                phase: VaultPhase::Failed,
                message: "Vault not found in source".to_string(),
                error: Some("vault not found".to_string()),
                migration: None,
            }
        })
        .collect();

    let concurrency = session.config().vault_concurrency.max(1);
    let migrated: Vec<Option<VaultOutcome>> = stream::iter(vaults)
        .map(|vault| async move {
            if session.is_cancelled() {
                return None;
            }
            Some(migrate_one(session, source, dest, &vault, progress).await)
        })
        .buffered(concurrency)
        .collect()
        .await;
    results.extend(migrated.into_iter().flatten());

    let cancelled = session.is_cancelled();
    let failed = results.iter().filter(|outcome| !outcome.success).count();
    let message = if cancelled {
        "Migration cancelled by user".to_string()
    } else if failed > 0 {
        format!("Migration completed with {failed} vault failures out of {total} vaults")
    } else {
        format!("Successfully migrated all {total} vaults")
    };
    if cancelled || failed > 0 {
        session.log().warning(None, message.clone());
    } else {
        session.log().info(None, message.clone());
    }

    Ok(BulkOutcome {
        success: !cancelled && failed == 0,
        cancelled,
        message,
        results,
        summary: session.log().summary(),
    })
}

async fn migrate_one<S, D>(
    session: &MigrationSession,
    source: &S,
    dest: &D,
    vault: &VaultSummary,
    progress: &dyn ProgressSink,
) -> VaultOutcome
where
    S: SourceStore + ?Sized,
    D: DestinationStore + ?Sized,
{
    let phase = |phase: VaultPhase, message: String| {
        progress.emit(&ProgressEvent::Phase {
            vault_id: vault.id.clone(),
            vault_name: vault.name.clone(),
            phase,
            message,
        })
    };
    phase(VaultPhase::Preparing, "Preparing vault...".to_string());

    let forward = PhaseForwarder {
        inner: progress,
        vault,
    };
    let dest_name = session.config().destination_vault_name(&vault.name);

    match migrate_vault(session, source, dest, &vault.id, &dest_name, &forward).await {
        Ok(migration) => {
            let stats = migration.stats;
            let success = migration.is_clean();
            let message = if migration.cancelled {
                format!("Vault \"{}\" migration was cancelled", vault.name)
            } else if success {
                format!(
                    "Successfully migrated vault \"{}\" with {} items",
                    vault.name, stats.source_item_count
                )
            } else {
                format!(
                    "Vault \"{}\" completed with {} failures out of {} items",
                    vault.name, stats.failure_count, stats.source_item_count
                )
            };
            phase(VaultPhase::Completed, message.clone());
            VaultOutcome {
                vault_id: vault.id.clone(),
                vault_name: vault.name.clone(),
                success,
                phase: VaultPhase::Completed,
                message,
                error: None,
                migration: Some(migration),
            }
        }
        Err(error) => {
            session.log().error(
                Some(vault.id.as_str()),
                format!("Vault migration failed: {}", error.message()),
            );
            let message = format!(
                "Failed to migrate vault \"{}\": {}",
                vault.name,
                error.message()
            );
            phase(VaultPhase::Failed, message.clone());
            VaultOutcome {
                vault_id: vault.id.clone(),
                vault_name: vault.name.clone(),
                success: false,
                phase: VaultPhase::Failed,
                message,
                error: Some(error.to_string()),
                migration: None,
            }
        }
    }
}

/// Adds a `Migrating` phase event in front of every item progress update.
struct PhaseForwarder<'a> {
    inner: &'a dyn ProgressSink,
    vault: &'a VaultSummary,
}

impl ProgressSink for PhaseForwarder<'_> {
    fn emit(&self, event: &ProgressEvent) {
        if let ProgressEvent::Items {
            processed, total, ..
        } = event
        {
            self.inner.emit(&ProgressEvent::Phase {
                vault_id: self.vault.id.clone(),
                vault_name: self.vault.name.clone(),
                phase: VaultPhase::Migrating,
                message: format!("Migrating items ({processed}/{total})..."),
            });
        }
        self.inner.emit(event);
    }
}
