use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{DestinationStore, SourceStore, StoreError, StoreResult};
use crate::model::{
    base64_bytes, Address, AddressParts, DestinationItem, DestinationItemDraft, DraftDetails,
    DraftField, DraftFile, FieldDetails, FieldType, FileRef, ItemSummary, SourceField, SourceFile,
    SourceItem, SourceWebsite, VaultSummary, Website,
};

/// One vault as held in memory and persisted in bundles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredVault {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub items: Vec<SourceItem>,
    #[serde(default)]
    pub blobs: Vec<StoredBlob>,
}

/// Bytes of a file or document, keyed by owning item and file id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredBlob {
    pub item_id: String,
    pub file_id: String,
    #[serde(with = "base64_bytes")]
    pub content: Vec<u8>,
}

impl StoredVault {
    fn item(&self, item_id: &str) -> StoreResult<&SourceItem> {
        self.items
            .iter()
            .find(|item| item.id == item_id)
            .ok_or_else(|| StoreError::NotFound(format!("item {item_id} in vault {}", self.id)))
    }

    fn item_mut(&mut self, item_id: &str) -> StoreResult<&mut SourceItem> {
        let vault_id = self.id.clone();
        self.items
            .iter_mut()
            .find(|item| item.id == item_id)
            .ok_or_else(|| StoreError::NotFound(format!("item {item_id} in vault {vault_id}")))
    }

    fn put_blob(&mut self, item_id: &str, file_id: &str, content: Vec<u8>) {
        self.blobs.push(StoredBlob {
            item_id: item_id.to_string(),
            file_id: file_id.to_string(),
            content,
        });
    }
}

/// In-process store usable as both migration source and destination.
///
/// Created items are validated the way a remote destination would: every
/// section a field or file points at must be declared, and reference fields
/// must name an item that exists in the same vault.
#[derive(Debug, Default)]
pub struct MemoryStore {
    vaults: Mutex<Vec<StoredVault>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_vaults(vaults: Vec<StoredVault>) -> Self {
        Self {
            vaults: Mutex::new(vaults),
        }
    }

    /// Snapshot of every vault.
    pub fn vaults(&self) -> Vec<StoredVault> {
        self.lock().clone()
    }

    pub fn vault(&self, vault_id: &str) -> Option<StoredVault> {
        self.lock().iter().find(|vault| vault.id == vault_id).cloned()
    }

    pub fn add_vault(&self, id: impl Into<String>, name: impl Into<String>) {
        self.lock().push(StoredVault {
            id: id.into(),
            name: name.into(),
            ..StoredVault::default()
        });
    }

    pub fn add_item(&self, vault_id: &str, mut item: SourceItem) -> StoreResult<()> {
        let mut vaults = self.lock();
        let vault = find_vault(&mut vaults, vault_id)?;
        item.vault_id = vault_id.to_string();
        vault.items.push(item);
        Ok(())
    }

    pub fn add_blob(
        &self,
        vault_id: &str,
        item_id: &str,
        file_id: &str,
        content: impl Into<Vec<u8>>,
    ) -> StoreResult<()> {
        let mut vaults = self.lock();
        find_vault(&mut vaults, vault_id)?.put_blob(item_id, file_id, content.into());
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<StoredVault>> {
        self.vaults
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn insert_draft(vault: &mut StoredVault, draft: &DestinationItemDraft) -> StoreResult<String> {
        validate_draft(vault, draft)?;

        let id = Uuid::now_v7().to_string();
        let mut item = SourceItem::new(&id, &draft.title, draft.category);
        item.vault_id = vault.id.clone();
        item.fields = draft.fields.iter().map(to_source_field).collect();
        item.sections = draft.sections.clone();
        item.tags = draft.tags.clone();
        item.websites = draft.websites.iter().map(to_source_website).collect();
        item.notes = draft.notes.clone().unwrap_or_default();

        for file in &draft.files {
            let file_ref = attach(vault, &id, file);
            item.files.push(file_ref);
        }
        if let Some(document) = &draft.document {
            let file_id = Uuid::now_v7().to_string();
            vault.put_blob(&id, &file_id, document.content.clone());
            item.document = Some(FileRef {
                id: file_id,
                name: document.name.clone(),
                size: document.content.len() as u64,
            });
        }

        vault.items.push(item);
        Ok(id)
    }
}

fn find_vault<'a>(
    vaults: &'a mut [StoredVault],
    vault_id: &str,
) -> StoreResult<&'a mut StoredVault> {
    vaults
        .iter_mut()
        .find(|vault| vault.id == vault_id)
        .ok_or_else(|| StoreError::NotFound(format!("vault {vault_id}")))
}

fn find_vault_ref<'a>(vaults: &'a [StoredVault], vault_id: &str) -> StoreResult<&'a StoredVault> {
    vaults
        .iter()
        .find(|vault| vault.id == vault_id)
        .ok_or_else(|| StoreError::NotFound(format!("vault {vault_id}")))
}

fn validate_draft(vault: &StoredVault, draft: &DestinationItemDraft) -> StoreResult<()> {
    if let Some(missing) = draft.missing_section_ids().first() {
        return Err(StoreError::Rejected(format!(
            "item '{}' references undeclared section '{missing}'",
            draft.title
        )));
    }
    validate_references(vault, &draft.fields)
}

fn validate_references(vault: &StoredVault, fields: &[DraftField]) -> StoreResult<()> {
    for field in fields.iter().filter(|f| f.field_type == FieldType::Reference) {
        if vault.item(&field.value).is_err() {
            return Err(StoreError::Rejected(format!(
                "reference field '{}' points at unknown item '{}'",
                field.id, field.value
            )));
        }
    }
    Ok(())
}

fn attach(vault: &mut StoredVault, item_id: &str, file: &DraftFile) -> SourceFile {
    let file_id = Uuid::now_v7().to_string();
    vault.put_blob(item_id, &file_id, file.content.clone());
    SourceFile {
        attributes: FileRef {
            id: file_id,
            name: file.name.clone(),
            size: file.content.len() as u64,
        },
        section_id: Some(file.section_id.clone()),
        field_id: Some(file.field_id.clone()),
    }
}

fn to_source_field(field: &DraftField) -> SourceField {
    let details = field.details.as_ref().map(|details| match details {
        DraftDetails::Address(address) => FieldDetails::Address(AddressParts {
            street: Some(address.street.clone()),
            city: Some(address.city.clone()),
            country: Some(address.country.clone()),
            zip: Some(address.zip.clone()),
            state: Some(address.state.clone()),
        }),
    });
    SourceField {
        id: field.id.clone(),
        title: field.title.clone(),
        field_type: field.field_type,
        value: field.value.clone(),
        section_id: field.section_id.clone(),
        details,
    }
}

fn to_draft_field(field: &SourceField) -> DraftField {
    let details = match &field.details {
        Some(FieldDetails::Address(parts)) => Some(DraftDetails::Address(Address {
            street: parts.street.clone().unwrap_or_default(),
            city: parts.city.clone().unwrap_or_default(),
            country: parts.country.clone().unwrap_or_default(),
            zip: parts.zip.clone().unwrap_or_default(),
            state: parts.state.clone().unwrap_or_default(),
        })),
        _ => None,
    };
    DraftField {
        id: field.id.clone(),
        title: field.title.clone(),
        field_type: field.field_type,
        value: field.value.clone(),
        section_id: field.section_id.clone(),
        details,
    }
}

fn to_source_website(website: &Website) -> SourceWebsite {
    SourceWebsite {
        url: Some(website.url.clone()),
        href: None,
        label: Some(website.label.clone()),
        autofill_behavior: Some(website.autofill_behavior),
    }
}

fn to_destination_item(item: &SourceItem) -> DestinationItem {
    DestinationItem {
        id: item.id.clone(),
        vault_id: item.vault_id.clone(),
        title: item.title.clone(),
        category: item.category,
        fields: item.fields.iter().map(to_draft_field).collect(),
        sections: item.sections.clone(),
        notes: (!item.notes.is_empty()).then(|| item.notes.clone()),
        tags: item.tags.clone(),
        websites: item
            .websites
            .iter()
            .map(|website| Website {
                url: website
                    .url
                    .clone()
                    .or_else(|| website.href.clone())
                    .unwrap_or_default(),
                label: website.label.clone().unwrap_or_default(),
                autofill_behavior: website.autofill_behavior.unwrap_or_default(),
            })
            .collect(),
    }
}

#[async_trait]
impl SourceStore for MemoryStore {
    async fn list_vaults(&self) -> StoreResult<Vec<VaultSummary>> {
        Ok(self
            .lock()
            .iter()
            .map(|vault| VaultSummary {
                id: vault.id.clone(),
                name: vault.name.clone(),
            })
            .collect())
    }

    async fn list_items(&self, vault_id: &str) -> StoreResult<Vec<ItemSummary>> {
        let vaults = self.lock();
        let vault = find_vault_ref(&vaults, vault_id)?;
        Ok(vault.items.iter().map(SourceItem::summary).collect())
    }

    async fn get_item(&self, vault_id: &str, item_id: &str) -> StoreResult<SourceItem> {
        let vaults = self.lock();
        find_vault_ref(&vaults, vault_id)?.item(item_id).cloned()
    }

    async fn read_file(
        &self,
        vault_id: &str,
        item_id: &str,
        file: &FileRef,
    ) -> StoreResult<Vec<u8>> {
        let vaults = self.lock();
        find_vault_ref(&vaults, vault_id)?
            .blobs
            .iter()
            .find(|blob| blob.item_id == item_id && blob.file_id == file.id)
            .map(|blob| blob.content.clone())
            .ok_or_else(|| StoreError::NotFound(format!("file {} of item {item_id}", file.id)))
    }
}

#[async_trait]
impl DestinationStore for MemoryStore {
    async fn create_vault(&self, name: &str) -> StoreResult<String> {
        let id = Uuid::now_v7().to_string();
        self.add_vault(id.clone(), name);
        Ok(id)
    }

    async fn create_item(&self, draft: &DestinationItemDraft) -> StoreResult<String> {
        let mut vaults = self.lock();
        let vault = find_vault(&mut vaults, &draft.vault_id)?;
        Self::insert_draft(vault, draft)
    }

    async fn create_items_batch(
        &self,
        vault_id: &str,
        drafts: &[DestinationItemDraft],
    ) -> StoreResult<Vec<StoreResult<String>>> {
        let mut vaults = self.lock();
        let vault = find_vault(&mut vaults, vault_id)?;
        Ok(drafts
            .iter()
            .map(|draft| {
                if draft.vault_id != vault_id {
                    return Err(StoreError::Rejected(format!(
                        "draft '{}' targets vault {} inside a batch for {vault_id}",
                        draft.title, draft.vault_id
                    )));
                }
                Self::insert_draft(vault, draft)
            })
            .collect())
    }

    async fn get_item(&self, vault_id: &str, item_id: &str) -> StoreResult<DestinationItem> {
        let vaults = self.lock();
        find_vault_ref(&vaults, vault_id)?
            .item(item_id)
            .map(to_destination_item)
    }

    async fn put_item(&self, item: &DestinationItem) -> StoreResult<()> {
        let mut vaults = self.lock();
        let vault = find_vault(&mut vaults, &item.vault_id)?;
        validate_references(vault, &item.fields)?;
        if let Some(field) = item.fields.iter().find(|field| {
            field
                .section_id
                .as_deref()
                .is_some_and(|id| !item.sections.iter().any(|s| s.id == id))
        }) {
            return Err(StoreError::Rejected(format!(
                "field '{}' references an undeclared section",
                field.id
            )));
        }

        let stored = vault.item_mut(&item.id)?;
        stored.title = item.title.clone();
        stored.category = item.category;
        stored.fields = item.fields.iter().map(to_source_field).collect();
        stored.sections = item.sections.clone();
        stored.notes = item.notes.clone().unwrap_or_default();
        stored.tags = item.tags.clone();
        stored.websites = item.websites.iter().map(to_source_website).collect();
        Ok(())
    }

    async fn attach_file(
        &self,
        vault_id: &str,
        item_id: &str,
        file: &DraftFile,
    ) -> StoreResult<()> {
        let mut vaults = self.lock();
        let vault = find_vault(&mut vaults, vault_id)?;
        vault.item(item_id)?;
        let file_ref = attach(vault, item_id, file);
        vault.item_mut(item_id)?.files.push(file_ref);
        Ok(())
    }

    async fn count_items(&self, vault_id: &str) -> StoreResult<usize> {
        let vaults = self.lock();
        Ok(find_vault_ref(&vaults, vault_id)?.items.len())
    }
}
