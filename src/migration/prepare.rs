use super::create::{PreparedItem, Tracker};
use crate::mapping::build_item;
use crate::model::{Attachments, FieldType, FileContent, ItemCategory, ItemSummary, SourceItem};
use crate::retry::with_retry;
use crate::session::MigrationSession;
use crate::store::SourceStore;

const EXPIRY_FIELD_ID: &str = "expiry";

pub(super) struct Prepared {
    pub batchable: Vec<PreparedItem>,
    pub individual: Vec<PreparedItem>,
}

/// Fetch, enrich and build every listed item, routing each into the batch
/// or individual bucket. Returns `None` when cancelled part way.
pub(super) async fn prepare_items<S>(
    session: &MigrationSession,
    source: &S,
    vault_id: &str,
    dest_vault_id: &str,
    summaries: &[ItemSummary],
    tracker: &mut Tracker<'_>,
) -> Option<Prepared>
where
    S: SourceStore + ?Sized,
{
    let policy = session.retry_policy();
    let mut prepared = Prepared {
        batchable: Vec::new(),
        individual: Vec::new(),
    };

    for summary in summaries {
        if session.is_cancelled() {
            return None;
        }

        let item = match with_retry(&policy, "get_item", || source.get_item(vault_id, &summary.id))
            .await
        {
            Ok(item) => item,
            Err(error) => {
                tracker.failed(
                    &summary.id,
                    &summary.title,
                    &format!("Failed to fetch item: {error}"),
                );
                continue;
            }
        };

        let item = apply_expiry_fallback(session, source, vault_id, item).await;
        let attachments = load_attachments(session, source, vault_id, &item).await;
        let built = build_item(&item, &attachments, dest_vault_id);
        let entry = PreparedItem {
            source_id: item.id.clone(),
            title: item.title.clone(),
            built,
        };
        if entry.built.requires_individual_create() {
            prepared.individual.push(entry);
        } else {
            prepared.batchable.push(entry);
        }
    }

    Some(prepared)
}

/// Card expiry values sometimes come back empty or untyped from the primary
/// read; ask the source's secondary lookup for them.
async fn apply_expiry_fallback<S>(
    session: &MigrationSession,
    source: &S,
    vault_id: &str,
    mut item: SourceItem,
) -> SourceItem
where
    S: SourceStore + ?Sized,
{
    if item.category != ItemCategory::CreditCard {
        return item;
    }
    let item_id = item.id.clone();
    let Some(field) = item
        .fields
        .iter_mut()
        .find(|field| field.id == EXPIRY_FIELD_ID)
    else {
        return item;
    };
    if !field.value.trim().is_empty() && field.field_type != FieldType::Unsupported {
        return item;
    }

    let policy = session.retry_policy();
    match with_retry(&policy, "field_fallback", || {
        source.field_fallback(vault_id, &item_id, EXPIRY_FIELD_ID)
    })
    .await
    {
        Ok(Some(value)) if !value.trim().is_empty() => {
            field.value = value.trim().to_string();
            field.field_type = FieldType::MonthYear;
            session.log().info(
                Some(vault_id),
                format!("Recovered expiry for item {item_id} from fallback lookup"),
            );
        }
        Ok(_) => {}
        Err(error) => session.log().item_warning(
            vault_id,
            &item_id,
            format!("Expiry fallback lookup failed: {error}"),
        ),
    }
    item
}

/// Read file and document bytes. Unreadable attachments are skipped with a
/// warning so the rest of the item still migrates.
async fn load_attachments<S>(
    session: &MigrationSession,
    source: &S,
    vault_id: &str,
    item: &SourceItem,
) -> Attachments
where
    S: SourceStore + ?Sized,
{
    let mut attachments = Attachments::default();
    if !item.has_binary() {
        return attachments;
    }
    let policy = session.retry_policy();

    for file in &item.files {
        let read = with_retry(&policy, "read_file", || {
            source.read_file(vault_id, &item.id, &file.attributes)
        })
        .await;
        match read {
            Ok(content) => attachments.files.push(FileContent {
                name: file.attributes.name.clone(),
                content,
                section_id: file.section_id.clone(),
                field_id: file.field_id.clone(),
            }),
            Err(error) => session.log().item_warning(
                vault_id,
                &item.id,
                format!("Skipping file \"{}\": {error}", file.attributes.name),
            ),
        }
    }

    if let Some(document) = &item.document {
        let read = with_retry(&policy, "read_file", || {
            source.read_file(vault_id, &item.id, document)
        })
        .await;
        match read {
            Ok(content) => {
                attachments.document = Some(FileContent {
                    name: document.name.clone(),
                    content,
                    section_id: None,
                    field_id: None,
                })
            }
            Err(error) => session.log().item_warning(
                vault_id,
                &item.id,
                format!("Document \"{}\" could not be read: {error}", document.name),
            ),
        }
    }

    attachments
}
