use uuid::Uuid;

use super::credit_card::map_card_fields;
use super::field::{map_field, DeferredReference, MappedField};
use super::login::convert_to_login;
use crate::model::{
    Attachments, AutofillBehavior, DestinationItemDraft, DraftDocument, DraftField, DraftFile,
    FieldType, ItemCategory, Section, SourceItem, SourceWebsite, Website, ADD_MORE_SECTION_ID,
    ROOT_SECTION_ID,
};

pub const SECURE_NOTE_PLACEHOLDER: &str = "Migrated Secure Note";
const DEFAULT_WEBSITE_LABEL: &str = "website";

/// A draft ready for creation plus the reference fields held back from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltItem {
    pub draft: DestinationItemDraft,
    pub references: Vec<DeferredReference>,
}

impl BuiltItem {
    /// Items carrying files, a document, or card data are created one at a time.
    pub fn requires_individual_create(&self) -> bool {
        self.draft.has_binary() || self.draft.category == ItemCategory::CreditCard
    }
}

/// Assemble the destination draft for `item`.
///
/// Attachment bytes must already be loaded into `attachments`. Every section
/// id used by a field or file in the returned draft has a `sections` entry.
pub fn build_item(item: &SourceItem, attachments: &Attachments, dest_vault_id: &str) -> BuiltItem {
    let (category, mapped, sections) = match item.category {
        category if category.converts_to_login() => {
            let converted = convert_to_login(item);
            (ItemCategory::Login, converted.fields, converted.sections)
        }
        ItemCategory::CreditCard => (
            ItemCategory::CreditCard,
            map_card_fields(&item.fields),
            card_sections(&item.sections),
        ),
        category => (
            category,
            item.fields
                .iter()
                .map(|field| map_field(field, category))
                .collect(),
            item.sections.clone(),
        ),
    };

    let mut draft = DestinationItemDraft::new(dest_vault_id, &item.title, category);
    draft.sections = sections;
    draft.tags = item.tags.clone();
    draft.websites = item.websites.iter().map(map_website).collect();
    draft.notes = notes_for(item, category);

    let mut references = Vec::new();
    for field in mapped {
        match field {
            MappedField::Ready(field) => draft.fields.push(field),
            MappedField::Deferred(reference) => references.push(reference),
        }
    }

    draft.files = attachments
        .files
        .iter()
        .filter(|file| !file.name.is_empty())
        .map(|file| DraftFile {
            name: file.name.clone(),
            content: file.content.clone(),
            section_id: file
                .section_id
                .clone()
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| ADD_MORE_SECTION_ID.to_string()),
            field_id: file
                .field_id
                .clone()
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| generated_field_id(&file.name)),
        })
        .collect();
    draft.document = attachments.document.as_ref().map(|document| DraftDocument {
        name: document.name.clone(),
        content: document.content.clone(),
    });

    ensure_sections(&mut draft);
    BuiltItem { draft, references }
}

/// Append a section for every id a field or file uses without declaring it.
pub fn ensure_sections(draft: &mut DestinationItemDraft) {
    for id in draft.missing_section_ids() {
        draft.sections.push(Section::synthesized(&id));
    }
}

fn card_sections(source: &[Section]) -> Vec<Section> {
    let mut sections = vec![Section::new(ROOT_SECTION_ID, "")];
    for section in source {
        if section.id.is_empty() || sections.iter().any(|s| s.id == section.id) {
            continue;
        }
        sections.push(section.clone());
    }
    sections
}

fn notes_for(item: &SourceItem, category: ItemCategory) -> Option<String> {
    if !item.notes.trim().is_empty() {
        return Some(item.notes.clone());
    }
    (category == ItemCategory::SecureNote).then(|| SECURE_NOTE_PLACEHOLDER.to_string())
}

fn map_website(website: &SourceWebsite) -> Website {
    Website {
        url: website
            .url
            .clone()
            .or_else(|| website.href.clone())
            .unwrap_or_default(),
        label: website
            .label
            .clone()
            .filter(|label| !label.is_empty())
            .unwrap_or_else(|| DEFAULT_WEBSITE_LABEL.to_string()),
        autofill_behavior: website
            .autofill_behavior
            .unwrap_or(AutofillBehavior::AnywhereOnWebsite),
    }
}

fn generated_field_id(name: &str) -> String {
    format!("{name}-{}", Uuid::now_v7().simple())
}

/// Field carrying a resolved destination reference.
pub(crate) fn reference_field(reference: &DeferredReference, dest_item_id: &str) -> DraftField {
    DraftField {
        id: reference.field_id.clone(),
        title: reference.title.clone(),
        field_type: FieldType::Reference,
        value: dest_item_id.to_string(),
        section_id: reference.section_id.clone(),
        details: None,
    }
}
