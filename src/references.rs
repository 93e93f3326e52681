//! Post-creation pass that re-points reference fields at destination ids.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::mapping::item::reference_field;
use crate::mapping::DeferredReference;
use crate::model::Section;
use crate::retry::with_retry;
use crate::session::MigrationSession;
use crate::store::{DestinationStore, StoreResult};

/// Source item id to destination item id, scoped to one vault migration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdMap {
    ids: HashMap<String, String>,
}

impl IdMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source_id: impl Into<String>, dest_id: impl Into<String>) {
        self.ids.insert(source_id.into(), dest_id.into());
    }

    pub fn get(&self, source_id: &str) -> Option<&str> {
        self.ids.get(source_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// A reference field waiting for its target's destination id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingReference {
    pub source_item_id: String,
    pub dest_item_id: String,
    pub field_id: String,
    pub title: String,
    pub section_id: Option<String>,
    pub source_ref_id: String,
}

impl PendingReference {
    pub fn new(source_item_id: &str, dest_item_id: &str, reference: &DeferredReference) -> Self {
        Self {
            source_item_id: source_item_id.to_string(),
            dest_item_id: dest_item_id.to_string(),
            field_id: reference.field_id.clone(),
            title: reference.title.clone(),
            section_id: reference.section_id.clone(),
            source_ref_id: reference.source_ref_id.clone(),
        }
    }

    fn deferred(&self) -> DeferredReference {
        DeferredReference {
            field_id: self.field_id.clone(),
            title: self.title.clone(),
            section_id: self.section_id.clone(),
            source_ref_id: self.source_ref_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionReport {
    pub resolved: usize,
    pub unresolved: usize,
    pub failed: usize,
}

/// Attach every pending reference whose target made it to `dest_vault_id`.
///
/// Never fails: unknown targets and store errors become warnings, logged
/// under the source `vault_id`, and the owning item stays migrated.
pub async fn resolve_references<D>(
    session: &MigrationSession,
    dest: &D,
    vault_id: &str,
    dest_vault_id: &str,
    pending: &[PendingReference],
    ids: &IdMap,
) -> ResolutionReport
where
    D: DestinationStore + ?Sized,
{
    let mut report = ResolutionReport::default();
    if pending.is_empty() {
        return report;
    }
    session.log().info(
        Some(vault_id),
        format!("Resolving {} reference field(s)", pending.len()),
    );

    for reference in pending {
        let Some(target) = ids.get(&reference.source_ref_id) else {
            report.unresolved += 1;
            session.log().item_warning(
                vault_id,
                &reference.source_item_id,
                format!(
                    "Reference field '{}' points at item {} which was not migrated; left unset",
                    reference.field_id, reference.source_ref_id
                ),
            );
            continue;
        };

        match apply_reference(session, dest, dest_vault_id, reference, target).await {
            Ok(()) => report.resolved += 1,
            Err(error) => {
                report.failed += 1;
                session.log().item_warning(
                    vault_id,
                    &reference.source_item_id,
                    format!(
                        "Could not update reference field '{}': {error}",
                        reference.field_id
                    ),
                );
            }
        }
    }

    tracing::info!(
        target: "vaultferry",
        event = "references_resolved",
        vault_id,
        resolved = report.resolved,
        unresolved = report.unresolved,
        failed = report.failed
    );
    report
}

async fn apply_reference<D>(
    session: &MigrationSession,
    dest: &D,
    dest_vault_id: &str,
    reference: &PendingReference,
    target: &str,
) -> StoreResult<()>
where
    D: DestinationStore + ?Sized,
{
    let policy = session.retry_policy();
    let mut item = with_retry(&policy, "get_item", || {
        dest.get_item(dest_vault_id, &reference.dest_item_id)
    })
    .await?;

    if let Some(section_id) = reference.section_id.as_deref() {
        if !item.sections.iter().any(|section| section.id == section_id) {
            item.sections.push(Section::synthesized(section_id));
        }
    }
    item.fields.push(reference_field(&reference.deferred(), target));

    with_retry(&policy, "put_item", || dest.put_item(&item)).await
}
