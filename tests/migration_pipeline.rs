#![allow(clippy::unwrap_used)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use vaultferry_lib::migration::VaultPhase;
use vaultferry_lib::model::{
    DestinationItem, DestinationItemDraft, DraftField, DraftFile, FieldType, FileRef, ItemCategory,
    ItemSummary, Section, SourceField, SourceFile, SourceItem, VaultSummary,
};
use vaultferry_lib::store::StoreResult;
use vaultferry_lib::{
    list_vaults_with_counts, migrate_vault, migrate_vaults, DestinationStore, MemoryStore,
    MigrationConfig, MigrationSession, ProgressEvent, SilentProgress, SourceStore, StoreError,
};

fn session() -> MigrationSession {
    MigrationSession::new(MigrationConfig {
        retry_base_delay: Duration::ZERO,
        ..MigrationConfig::default()
    })
}

fn source_with(vault_id: &str, name: &str, items: Vec<SourceItem>) -> MemoryStore {
    let store = MemoryStore::new();
    store.add_vault(vault_id, name);
    for item in items {
        store.add_item(vault_id, item).unwrap();
    }
    store
}

fn plain_logins(count: usize) -> Vec<SourceItem> {
    (0..count)
        .map(|n| {
            let mut item =
                SourceItem::new(format!("src-{n}"), format!("Login {n}"), ItemCategory::Login);
            item.fields.push(SourceField::new(
                "username",
                "username",
                FieldType::Text,
                format!("user{n}"),
            ));
            item
        })
        .collect()
}

fn dest_items(dest: &MemoryStore, vault_id: &str) -> Vec<SourceItem> {
    dest.vault(vault_id).unwrap().items
}

fn field<'a>(item: &'a DestinationItem, id: &str) -> &'a DraftField {
    item.fields.iter().find(|f| f.id == id).unwrap()
}

/// Destination that delegates to a `MemoryStore` and fails on request.
#[derive(Default)]
struct ScriptedDest {
    inner: MemoryStore,
    batch_calls: AtomicUsize,
    fail_batch_call: Option<usize>,
    conflicts_left: AtomicUsize,
    fail_vault_named: Option<String>,
    fail_attach: bool,
}

#[async_trait]
impl DestinationStore for ScriptedDest {
    async fn create_vault(&self, name: &str) -> StoreResult<String> {
        if self.fail_vault_named.as_deref() == Some(name) {
            return Err(StoreError::Unavailable("vault create command exited 1".into()));
        }
        self.inner.create_vault(name).await
    }

    async fn create_item(&self, draft: &DestinationItemDraft) -> StoreResult<String> {
        self.inner.create_item(draft).await
    }

    async fn create_items_batch(
        &self,
        vault_id: &str,
        drafts: &[DestinationItemDraft],
    ) -> StoreResult<Vec<StoreResult<String>>> {
        let call = self.batch_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_batch_call == Some(call) {
            return Err(StoreError::Unavailable("gateway timeout".into()));
        }
        if self
            .conflicts_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(StoreError::Conflict("data conflict".into()));
        }
        self.inner.create_items_batch(vault_id, drafts).await
    }

    async fn get_item(&self, vault_id: &str, item_id: &str) -> StoreResult<DestinationItem> {
        DestinationStore::get_item(&self.inner, vault_id, item_id).await
    }

    async fn put_item(&self, item: &DestinationItem) -> StoreResult<()> {
        self.inner.put_item(item).await
    }

    async fn attach_file(
        &self,
        vault_id: &str,
        item_id: &str,
        file: &DraftFile,
    ) -> StoreResult<()> {
        if self.fail_attach {
            return Err(StoreError::Rejected("file too large".into()));
        }
        self.inner.attach_file(vault_id, item_id, file).await
    }

    async fn count_items(&self, vault_id: &str) -> StoreResult<usize> {
        self.inner.count_items(vault_id).await
    }
}

/// Source that delegates to a `MemoryStore`, with a canned expiry lookup and
/// vaults whose listing fails.
struct ScriptedSource {
    inner: MemoryStore,
    expiry: Option<String>,
    unlistable: Vec<String>,
}

#[async_trait]
impl SourceStore for ScriptedSource {
    async fn list_vaults(&self) -> StoreResult<Vec<VaultSummary>> {
        self.inner.list_vaults().await
    }

    async fn list_items(&self, vault_id: &str) -> StoreResult<Vec<ItemSummary>> {
        if self.unlistable.iter().any(|id| id == vault_id) {
            return Err(StoreError::Unavailable("listing timed out".into()));
        }
        self.inner.list_items(vault_id).await
    }

    async fn get_item(&self, vault_id: &str, item_id: &str) -> StoreResult<SourceItem> {
        SourceStore::get_item(&self.inner, vault_id, item_id).await
    }

    async fn read_file(
        &self,
        vault_id: &str,
        item_id: &str,
        file: &FileRef,
    ) -> StoreResult<Vec<u8>> {
        self.inner.read_file(vault_id, item_id, file).await
    }

    async fn field_fallback(
        &self,
        _vault_id: &str,
        _item_id: &str,
        field_id: &str,
    ) -> StoreResult<Option<String>> {
        Ok(self.expiry.clone().filter(|_| field_id == "expiry"))
    }
}

#[tokio::test]
async fn mixed_vault_migrates_and_references_point_at_new_ids() {
    let mut login = SourceItem::new("src-login", "Mail", ItemCategory::Login);
    login
        .fields
        .push(SourceField::new("username", "username", FieldType::Text, "ana"));
    login
        .fields
        .push(SourceField::new("password", "password", FieldType::Concealed, "hunter2"));

    let mut note = SourceItem::new("src-note", "Recovery", ItemCategory::SecureNote);
    note.sections.push(Section::new("links", "Links"));
    note.fields.push(
        SourceField::new("related", "Related login", FieldType::Reference, "src-login")
            .in_section("links"),
    );

    let mut custom = SourceItem::new("src-custom", "Build server", ItemCategory::Custom);
    custom
        .fields
        .push(SourceField::new("u1", "username", FieldType::Text, "ci"));
    custom
        .fields
        .push(SourceField::new("k1", "api key", FieldType::Concealed, "s3cret"));

    let source = source_with("v1", "Team", vec![login, note, custom]);
    let dest = MemoryStore::new();
    let session = session();

    let migration = migrate_vault(
        &session,
        &source,
        &dest,
        "v1",
        "Team (Migrated)",
        &SilentProgress,
    )
    .await
    .unwrap();

    assert!(migration.is_clean(), "{migration:?}");
    assert_eq!(migration.stats.source_item_count, 3);
    assert_eq!(migration.stats.dest_item_count, Some(3));
    assert_eq!(migration.references.resolved, 1);
    assert_eq!(migration.migration_results.len(), 3);
    assert_eq!(migration.migration_results.last().unwrap().progress, 100.0);

    let created = dest_items(&dest, &migration.dest_vault_id);
    let login_dest = created.iter().find(|i| i.title == "Mail").unwrap();
    let note_dest = created.iter().find(|i| i.title == "Recovery").unwrap();
    let custom_dest = created.iter().find(|i| i.title == "Build server").unwrap();

    let note_dest = DestinationStore::get_item(&dest, &migration.dest_vault_id, &note_dest.id)
        .await
        .unwrap();
    let reference = field(&note_dest, "related");
    assert_eq!(reference.field_type, FieldType::Reference);
    assert_eq!(reference.value, login_dest.id);
    assert_eq!(note_dest.notes.as_deref(), Some("Migrated Secure Note"));

    assert_eq!(custom_dest.category, ItemCategory::Login);
    let username = custom_dest.fields.iter().find(|f| f.id == "username").unwrap();
    assert_eq!(username.value, "ci");
    assert_eq!(username.section_id, None);
    let key = custom_dest.fields.iter().find(|f| f.id == "k1").unwrap();
    assert_eq!(key.field_type, FieldType::Concealed);
    assert_eq!(key.section_id.as_deref(), Some("additional"));
}

#[tokio::test]
async fn card_reference_to_a_batched_login_resolves_after_individual_creation() {
    let mut primary = SourceItem::new("src-a", "Primary", ItemCategory::Login);
    primary
        .fields
        .push(SourceField::new("username", "username", FieldType::Text, "ana"));
    primary
        .fields
        .push(SourceField::new("backup", "Backup login", FieldType::Reference, "src-b"));

    let mut backup = SourceItem::new("src-b", "Backup", ItemCategory::Login);
    backup
        .fields
        .push(SourceField::new("username", "username", FieldType::Text, "ana.b"));

    let mut card = SourceItem::new("src-c", "Visa", ItemCategory::CreditCard);
    card.fields
        .push(SourceField::new("ccnum", "number", FieldType::CreditCardNumber, "4111111111111111"));
    card.fields
        .push(SourceField::new("link", "Billing login", FieldType::Reference, "src-a"));

    let source = source_with("v1", "Personal", vec![primary, backup, card]);
    let dest = MemoryStore::new();
    let session = session();

    let migration = migrate_vault(
        &session,
        &source,
        &dest,
        "v1",
        "Personal (Migrated)",
        &SilentProgress,
    )
    .await
    .unwrap();

    assert!(migration.is_clean(), "{migration:?}");
    assert_eq!(migration.stats.dest_item_count, Some(3));
    assert_eq!(migration.stats.failure_count, 0);
    assert_eq!(migration.references.resolved, 2);
    assert_eq!(migration.references.unresolved, 0);

    let created = dest_items(&dest, &migration.dest_vault_id);
    let id_of = |title: &str| created.iter().find(|i| i.title == title).unwrap().id.clone();
    let (primary_id, backup_id, card_id) = (id_of("Primary"), id_of("Backup"), id_of("Visa"));

    let primary_dest = DestinationStore::get_item(&dest, &migration.dest_vault_id, &primary_id)
        .await
        .unwrap();
    let backup_link = field(&primary_dest, "backup");
    assert_eq!(backup_link.field_type, FieldType::Reference);
    assert_eq!(backup_link.value, backup_id);

    let card_dest = DestinationStore::get_item(&dest, &migration.dest_vault_id, &card_id)
        .await
        .unwrap();
    assert_eq!(card_dest.category, ItemCategory::CreditCard);
    let link = field(&card_dest, "link");
    assert_eq!(link.field_type, FieldType::Reference);
    assert_eq!(link.value, primary_id);
    assert_eq!(link.section_id.as_deref(), Some("add more"));
    assert!(card_dest.sections.iter().any(|s| s.id == "add more"));
}

#[tokio::test]
async fn failed_chunk_marks_only_its_items() {
    let source = source_with("v1", "Bulk", plain_logins(60));
    let dest = ScriptedDest {
        fail_batch_call: Some(2),
        ..ScriptedDest::default()
    };
    let session = session();

    let migration = migrate_vault(
        &session,
        &source,
        &dest,
        "v1",
        "Bulk (Migrated)",
        &SilentProgress,
    )
    .await
    .unwrap();

    assert_eq!(migration.stats.success_count, 50);
    assert_eq!(migration.stats.failure_count, 10);
    assert_eq!(migration.stats.dest_item_count, Some(50));
    assert!(!migration.is_clean());

    let failures: Vec<_> = migration
        .migration_results
        .iter()
        .filter(|r| !r.success)
        .collect();
    assert_eq!(failures.len(), 10);
    assert!(failures
        .iter()
        .all(|r| r.error.as_deref().unwrap().starts_with("Batch creation failed")));
    assert_eq!(session.log().failed_items().len(), 10);
    assert!(session.log().vault_stats_summary().contains('⚠'));
}

#[tokio::test]
async fn transient_conflicts_are_retried() {
    let source = source_with("v1", "Bulk", plain_logins(5));
    let dest = ScriptedDest {
        conflicts_left: AtomicUsize::new(2),
        ..ScriptedDest::default()
    };
    let session = session();

    let migration = migrate_vault(
        &session,
        &source,
        &dest,
        "v1",
        "Bulk (Migrated)",
        &SilentProgress,
    )
    .await
    .unwrap();

    assert!(migration.is_clean());
    assert_eq!(dest.batch_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn cancellation_stops_between_chunks() {
    let source = source_with("v1", "Bulk", plain_logins(120));
    let dest = MemoryStore::new();
    let session = session();
    let token = session.cancel_token();
    let progress = move |event: &ProgressEvent| {
        if let ProgressEvent::Items { processed, .. } = event {
            if *processed >= 50 {
                token.cancel();
            }
        }
    };

    let migration = migrate_vault(
        &session,
        &source,
        &dest,
        "v1",
        "Bulk (Migrated)",
        &progress,
    )
    .await
    .unwrap();

    assert!(migration.cancelled);
    assert_eq!(migration.stats.dest_item_count, None);
    assert_eq!(migration.stats.success_count, 50);
    assert_eq!(dest_items(&dest, &migration.dest_vault_id).len(), 50);
    assert!(!migration.is_clean());
}

#[tokio::test]
async fn vault_creation_failure_is_fatal() {
    let source = source_with("v1", "Team", plain_logins(2));
    let dest = ScriptedDest {
        fail_vault_named: Some("Team (Migrated)".into()),
        ..ScriptedDest::default()
    };
    let session = session();

    let error = migrate_vault(
        &session,
        &source,
        &dest,
        "v1",
        "Team (Migrated)",
        &SilentProgress,
    )
    .await
    .unwrap_err();

    assert_eq!(error.code(), "MIGRATION/VAULT_CREATE");
    assert!(error.message().contains("Team (Migrated)"));
    assert_eq!(error.cause().unwrap().code(), "STORE/UNAVAILABLE");
    assert_eq!(session.log().summary().errors, 1);
}

#[tokio::test]
async fn one_broken_vault_does_not_stop_the_others() {
    let source = MemoryStore::new();
    for (id, name) in [("a", "Alpha"), ("b", "Broken"), ("c", "Gamma")] {
        source.add_vault(id, name);
        for item in plain_logins(3) {
            source.add_item(id, item).unwrap();
        }
    }
    let dest = ScriptedDest {
        fail_vault_named: Some("Broken (Migrated)".into()),
        ..ScriptedDest::default()
    };
    let session = session();
    let phases = Mutex::new(Vec::new());
    let progress = |event: &ProgressEvent| {
        if let ProgressEvent::Phase { vault_id, phase, .. } = event {
            phases.lock().unwrap().push((vault_id.clone(), *phase));
        }
    };

    let outcome = migrate_vaults(&session, &source, &dest, &[], &progress)
        .await
        .unwrap();

    assert!(!outcome.success);
    assert_eq!(
        outcome.message,
        "Migration completed with 1 vault failures out of 3 vaults"
    );
    assert_eq!(outcome.failed_vaults(), 1);
    let broken = outcome.results.iter().find(|r| r.vault_id == "b").unwrap();
    assert_eq!(broken.phase, VaultPhase::Failed);
    assert!(broken.migration.is_none());

    let names: Vec<String> = dest.inner.vaults().into_iter().map(|v| v.name).collect();
    assert!(names.contains(&"Alpha (Migrated)".to_string()));
    assert!(names.contains(&"Gamma (Migrated)".to_string()));

    let phases = phases.lock().unwrap();
    assert!(phases.contains(&("b".to_string(), VaultPhase::Failed)));
    assert!(phases.contains(&("a".to_string(), VaultPhase::Migrating)));
    assert!(phases.contains(&("c".to_string(), VaultPhase::Completed)));
}

#[tokio::test]
async fn selected_vaults_only_and_unknown_ids_fail() {
    let source = MemoryStore::new();
    source.add_vault("a", "Alpha");
    source.add_vault("b", "Beta");
    source.add_item("a", plain_logins(1).remove(0)).unwrap();
    let dest = MemoryStore::new();
    let session = session();

    let outcome = migrate_vaults(
        &session,
        &source,
        &dest,
        &["a".to_string(), "zzz".to_string()],
        &SilentProgress,
    )
    .await
    .unwrap();

    assert_eq!(outcome.results.len(), 2);
    assert_eq!(dest.vaults().len(), 1);
    let missing = outcome.results.iter().find(|r| r.vault_id == "zzz").unwrap();
    assert!(!missing.success);

    let fresh = MemoryStore::new();
    let clean = migrate_vaults(&session, &source, &fresh, &["a".to_string()], &SilentProgress)
        .await
        .unwrap();
    assert!(clean.success);
    assert_eq!(clean.message, "Successfully migrated all 1 vaults");
}

#[tokio::test]
async fn card_expiry_is_recovered_from_fallback_lookup() {
    let mut card = SourceItem::new("src-card", "Visa", ItemCategory::CreditCard);
    card.fields
        .push(SourceField::new("ccnum", "number", FieldType::Text, "4111111111111111"));
    card.fields
        .push(SourceField::new("expiry", "expiry date", FieldType::Unsupported, ""));
    card.fields
        .push(SourceField::new("type", "type", FieldType::Text, "visa"));
    let source = ScriptedSource {
        inner: source_with("v1", "Cards", vec![card]),
        expiry: Some(" 0927 ".into()),
        unlistable: Vec::new(),
    };
    let dest = MemoryStore::new();
    let session = session();

    let migration = migrate_vault(
        &session,
        &source,
        &dest,
        "v1",
        "Cards (Migrated)",
        &SilentProgress,
    )
    .await
    .unwrap();
    assert!(migration.is_clean());

    let created = dest_items(&dest, &migration.dest_vault_id).remove(0);
    let expiry = created.fields.iter().find(|f| f.id == "expiry").unwrap();
    assert_eq!(expiry.field_type, FieldType::MonthYear);
    assert_eq!(expiry.value, "09/2027");
    assert_eq!(expiry.section_id.as_deref(), Some(""));
    let number = created.fields.iter().find(|f| f.id == "ccnum").unwrap();
    assert_eq!(number.field_type, FieldType::CreditCardNumber);
}

#[tokio::test]
async fn attachment_failure_keeps_the_item_but_reports_it() {
    let mut item = SourceItem::new("src-doc", "Keys", ItemCategory::SecureNote);
    item.notes = "see attached".into();
    item.files.push(SourceFile {
        attributes: FileRef {
            id: "f1".into(),
            name: "id_rsa.pub".into(),
            size: 4,
        },
        section_id: None,
        field_id: None,
    });
    let source = source_with("v1", "Files", vec![item]);
    source.add_blob("v1", "src-doc", "f1", b"ssh-".to_vec()).unwrap();

    let dest = ScriptedDest {
        fail_attach: true,
        ..ScriptedDest::default()
    };
    let session = session();

    let migration = migrate_vault(
        &session,
        &source,
        &dest,
        "v1",
        "Files (Migrated)",
        &SilentProgress,
    )
    .await
    .unwrap();

    assert_eq!(migration.stats.failure_count, 1);
    assert_eq!(migration.stats.dest_item_count, Some(1));
    let result = &migration.migration_results[0];
    assert!(!result.success);
    assert!(result.error.as_deref().unwrap().contains("id_rsa.pub"));
}

#[tokio::test]
async fn attachments_upload_after_item_creation() {
    let mut item = SourceItem::new("src-doc", "Keys", ItemCategory::SecureNote);
    item.files.push(SourceFile {
        attributes: FileRef {
            id: "f1".into(),
            name: "id_rsa.pub".into(),
            size: 4,
        },
        section_id: None,
        field_id: None,
    });
    let source = source_with("v1", "Files", vec![item]);
    source.add_blob("v1", "src-doc", "f1", b"ssh-".to_vec()).unwrap();
    let dest = MemoryStore::new();
    let session = session();

    let migration = migrate_vault(
        &session,
        &source,
        &dest,
        "v1",
        "Files (Migrated)",
        &SilentProgress,
    )
    .await
    .unwrap();
    assert!(migration.is_clean());

    let vault = dest.vault(&migration.dest_vault_id).unwrap();
    let created = &vault.items[0];
    assert_eq!(created.files.len(), 1);
    assert_eq!(created.files[0].attributes.name, "id_rsa.pub");
    assert_eq!(created.files[0].section_id.as_deref(), Some("add more"));
    assert!(created.sections.iter().any(|s| s.id == "add more"));
    assert_eq!(vault.blobs[0].content, b"ssh-".to_vec());
}

#[tokio::test]
async fn vault_counts_survive_a_failing_listing() {
    let inner = MemoryStore::new();
    inner.add_vault("ok", "Fine");
    inner.add_vault("bad", "Flaky");
    for item in plain_logins(2) {
        inner.add_item("ok", item).unwrap();
    }
    let source = ScriptedSource {
        inner,
        expiry: None,
        unlistable: vec!["bad".into()],
    };
    let session = session();

    let vaults = list_vaults_with_counts(&session, &source).await.unwrap();

    assert_eq!(vaults.len(), 2);
    assert_eq!(vaults[0].item_count, 2);
    assert_eq!(vaults[1].item_count, 0);
    assert_eq!(session.log().summary().errors, 1);
    assert!(session.log().vault_log("bad").is_some());
}
