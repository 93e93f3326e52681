use std::mem;

use super::{
    stats_record, MigrationResult, ProgressEvent, ProgressSink, VaultMigration,
    VaultMigrationStats,
};
use crate::mapping::BuiltItem;
use crate::model::DestinationItemDraft;
use crate::references::{IdMap, PendingReference, ResolutionReport};
use crate::retry::with_retry;
use crate::session::MigrationSession;
use crate::store::DestinationStore;

/// A built item waiting to be created, still tied to its source identity.
pub(crate) struct PreparedItem {
    pub source_id: String,
    pub title: String,
    pub built: BuiltItem,
}

/// Running counts, per-item results and reference bookkeeping for one vault.
pub(crate) struct Tracker<'a> {
    session: &'a MigrationSession,
    progress: &'a dyn ProgressSink,
    vault_id: &'a str,
    vault_name: &'a str,
    total: usize,
    processed: usize,
    success: usize,
    failure: usize,
    results: Vec<MigrationResult>,
    ids: IdMap,
    pending: Vec<PendingReference>,
}

impl<'a> Tracker<'a> {
    pub fn new(
        session: &'a MigrationSession,
        progress: &'a dyn ProgressSink,
        vault_id: &'a str,
        vault_name: &'a str,
        total: usize,
    ) -> Self {
        Self {
            session,
            progress,
            vault_id,
            vault_name,
            total,
            processed: 0,
            success: 0,
            failure: 0,
            results: Vec::new(),
            ids: IdMap::new(),
            pending: Vec::new(),
        }
    }

    pub fn processed(&self) -> usize {
        self.processed
    }

    fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.processed as f64 / self.total as f64 * 100.0
        }
    }

    fn register(&mut self, item: &PreparedItem, dest_id: &str) {
        self.ids.insert(item.source_id.as_str(), dest_id);
        for reference in &item.built.references {
            self.pending
                .push(PendingReference::new(&item.source_id, dest_id, reference));
        }
    }

    pub fn created(&mut self, item: &PreparedItem, dest_id: &str) {
        self.register(item, dest_id);
        self.processed += 1;
        self.success += 1;
        self.results.push(MigrationResult {
            id: item.source_id.clone(),
            title: item.title.clone(),
            success: true,
            error: None,
            progress: self.percent(),
        });
    }

    /// The item exists in the destination but something after creation failed.
    pub fn created_with_error(&mut self, item: &PreparedItem, dest_id: &str, error: &str) {
        self.register(item, dest_id);
        self.failed(&item.source_id, &item.title, error);
    }

    pub fn failed(&mut self, source_id: &str, title: &str, error: &str) {
        self.processed += 1;
        self.failure += 1;
        self.session
            .log()
            .item_failed(self.vault_id, self.vault_name, source_id, title, error);
        self.results.push(MigrationResult {
            id: source_id.to_string(),
            title: title.to_string(),
            success: false,
            error: Some(error.to_string()),
            progress: self.percent(),
        });
    }

    pub fn emit_progress(&self) {
        self.progress.emit(&ProgressEvent::Items {
            vault_id: self.vault_id.to_string(),
            processed: self.processed,
            total: self.total,
            success_count: self.success,
            failure_count: self.failure,
        });
    }

    /// Hand over the id map and pending references for the resolution pass.
    pub fn reference_state(&mut self) -> (IdMap, Vec<PendingReference>) {
        (mem::take(&mut self.ids), mem::take(&mut self.pending))
    }

    pub fn finish(
        self,
        dest_vault_id: String,
        dest_item_count: Option<usize>,
        references: ResolutionReport,
        cancelled: bool,
    ) -> VaultMigration {
        let migration = VaultMigration {
            vault_id: self.vault_id.to_string(),
            vault_name: self.vault_name.to_string(),
            dest_vault_id,
            stats: VaultMigrationStats {
                source_item_count: self.total,
                dest_item_count,
                success_count: self.success,
                failure_count: self.failure,
            },
            migration_results: self.results,
            references,
            cancelled,
        };
        self.session.log().vault_completed(stats_record(&migration));
        migration
    }
}

/// Create batchable items in fixed-size chunks. Returns `false` if cancelled.
pub(super) async fn create_batched<D>(
    session: &MigrationSession,
    dest: &D,
    dest_vault_id: &str,
    items: Vec<PreparedItem>,
    tracker: &mut Tracker<'_>,
) -> bool
where
    D: DestinationStore + ?Sized,
{
    if items.is_empty() {
        return true;
    }
    let policy = session.retry_policy();
    let batch_size = session.config().batch_size.max(1);
    let chunk_count = items.len().div_ceil(batch_size);

    for (index, chunk) in items.chunks(batch_size).enumerate() {
        if session.is_cancelled() {
            return false;
        }
        let drafts: Vec<DestinationItemDraft> =
            chunk.iter().map(|item| item.built.draft.clone()).collect();

        match with_retry(&policy, "create_items_batch", || {
            dest.create_items_batch(dest_vault_id, &drafts)
        })
        .await
        {
            Ok(responses) => {
                let mut responses = responses.into_iter();
                for item in chunk {
                    match responses.next() {
                        Some(Ok(dest_id)) => tracker.created(item, &dest_id),
                        Some(Err(error)) => tracker.failed(
                            &item.source_id,
                            &item.title,
                            &format!("Batch item creation failed: {error}"),
                        ),
                        None => tracker.failed(
                            &item.source_id,
                            &item.title,
                            "Batch response did not include this item",
                        ),
                    }
                }
            }
            Err(error) => {
                session.log().error(
                    Some(tracker.vault_id),
                    format!("Batch {} of {chunk_count} failed: {error}", index + 1),
                );
                for item in chunk {
                    tracker.failed(
                        &item.source_id,
                        &item.title,
                        &format!("Batch creation failed: {error}"),
                    );
                }
            }
        }
        tracker.emit_progress();
    }
    true
}

/// Create items one at a time, then upload their files one by one.
/// Returns `false` if cancelled.
pub(super) async fn create_individually<D>(
    session: &MigrationSession,
    dest: &D,
    dest_vault_id: &str,
    items: Vec<PreparedItem>,
    tracker: &mut Tracker<'_>,
) -> bool
where
    D: DestinationStore + ?Sized,
{
    let policy = session.retry_policy();

    for item in items {
        if session.is_cancelled() {
            return false;
        }
        let mut draft = item.built.draft.clone();
        let files = mem::take(&mut draft.files);

        match with_retry(&policy, "create_item", || dest.create_item(&draft)).await {
            Ok(dest_id) => {
                let mut attach_errors = Vec::new();
                for file in &files {
                    let attached = with_retry(&policy, "attach_file", || {
                        dest.attach_file(dest_vault_id, &dest_id, file)
                    })
                    .await;
                    if let Err(error) = attached {
                        attach_errors.push(format!("file \"{}\": {error}", file.name));
                    }
                }
                if attach_errors.is_empty() {
                    tracker.created(&item, &dest_id);
                } else {
                    tracker.created_with_error(
                        &item,
                        &dest_id,
                        &format!("Failed to attach {}", attach_errors.join("; ")),
                    );
                }
            }
            Err(error) => tracker.failed(
                &item.source_id,
                &item.title,
                &format!("Item creation failed: {error}"),
            ),
        }
        tracker.emit_progress();
    }
    true
}
