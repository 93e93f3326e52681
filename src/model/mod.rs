//! Source records as read from the origin tenant, and the destination drafts
//! the item builder produces from them.

mod kinds;

use serde::{Deserialize, Serialize};

pub use kinds::{AutofillBehavior, FieldType, ItemCategory};

/// Section id of the root/built-in area of an item.
pub const ROOT_SECTION_ID: &str = "";
/// Fallback bucket for fields and files without a section.
pub const ADD_MORE_SECTION_ID: &str = "add more";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultSummary {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSummary {
    pub id: String,
    pub title: String,
    pub category: ItemCategory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    #[serde(default, alias = "label")]
    pub title: String,
}

impl Section {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
        }
    }

    /// Section synthesised for an id that a field or file references but the
    /// source never declared.
    pub fn synthesized(id: &str) -> Self {
        let title = if id == ADD_MORE_SECTION_ID { "" } else { id };
        Self::new(id, title)
    }
}

/// Address components as the source reports them; any part may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressParts {
    pub street: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub zip: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SshKeyParts {
    pub private_key: Option<String>,
    pub public_key: Option<String>,
    pub fingerprint: Option<String>,
    pub key_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpParts {
    pub totp: Option<String>,
    pub code: Option<String>,
    pub error_message: Option<String>,
}

/// Type-specific structured payload attached to a source field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content")]
pub enum FieldDetails {
    Address(AddressParts),
    SshKey(SshKeyParts),
    Otp(OtpParts),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceField {
    #[serde(default)]
    pub id: String,
    #[serde(default, alias = "label")]
    pub title: String,
    #[serde(default)]
    pub field_type: FieldType,
    #[serde(default)]
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<FieldDetails>,
}

impl SourceField {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        field_type: FieldType,
        value: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            field_type,
            value: value.into(),
            section_id: None,
            details: None,
        }
    }

    pub fn in_section(mut self, section_id: impl Into<String>) -> Self {
        self.section_id = Some(section_id.into());
        self
    }

    pub fn with_details(mut self, details: FieldDetails) -> Self {
        self.details = Some(details);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceWebsite {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub href: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub autofill_behavior: Option<AutofillBehavior>,
}

/// Handle to a binary blob stored alongside an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceFile {
    pub attributes: FileRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_id: Option<String>,
}

/// A fully fetched source item. Treated as immutable once fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceItem {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub category: ItemCategory,
    #[serde(default)]
    pub vault_id: String,
    #[serde(default)]
    pub fields: Vec<SourceField>,
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, alias = "urls")]
    pub websites: Vec<SourceWebsite>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub files: Vec<SourceFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<FileRef>,
}

impl SourceItem {
    pub fn new(id: impl Into<String>, title: impl Into<String>, category: ItemCategory) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            category,
            vault_id: String::new(),
            fields: Vec::new(),
            sections: Vec::new(),
            tags: Vec::new(),
            websites: Vec::new(),
            notes: String::new(),
            files: Vec::new(),
            document: None,
        }
    }

    pub fn summary(&self) -> ItemSummary {
        ItemSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            category: self.category,
        }
    }

    pub fn has_binary(&self) -> bool {
        self.document.is_some() || !self.files.is_empty()
    }
}

/// Bytes read for one attachment, carried next to the item they belong to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContent {
    pub name: String,
    pub content: Vec<u8>,
    pub section_id: Option<String>,
    pub field_id: Option<String>,
}

/// Binary payloads loaded for a source item before it is built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attachments {
    pub files: Vec<FileContent>,
    pub document: Option<FileContent>,
}

impl Attachments {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.document.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub street: String,
    pub city: String,
    pub country: String,
    pub zip: String,
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content")]
pub enum DraftDetails {
    Address(Address),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftField {
    pub id: String,
    pub title: String,
    pub field_type: FieldType,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<DraftDetails>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Website {
    pub url: String,
    pub label: String,
    pub autofill_behavior: AutofillBehavior,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftFile {
    pub name: String,
    #[serde(with = "base64_bytes")]
    pub content: Vec<u8>,
    pub section_id: String,
    pub field_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftDocument {
    pub name: String,
    #[serde(with = "base64_bytes")]
    pub content: Vec<u8>,
}

/// Item under construction for the destination store.
///
/// Every `section_id` carried by a field or file has a matching entry in
/// `sections` once the item builder returns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationItemDraft {
    pub vault_id: String,
    pub title: String,
    pub category: ItemCategory,
    pub fields: Vec<DraftField>,
    pub sections: Vec<Section>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub websites: Vec<Website>,
    #[serde(default)]
    pub files: Vec<DraftFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<DraftDocument>,
}

impl DestinationItemDraft {
    pub fn new(
        vault_id: impl Into<String>,
        title: impl Into<String>,
        category: ItemCategory,
    ) -> Self {
        Self {
            vault_id: vault_id.into(),
            title: title.into(),
            category,
            fields: Vec::new(),
            sections: Vec::new(),
            notes: None,
            tags: Vec::new(),
            websites: Vec::new(),
            files: Vec::new(),
            document: None,
        }
    }

    pub fn has_section(&self, id: &str) -> bool {
        self.sections.iter().any(|section| section.id == id)
    }

    pub fn has_binary(&self) -> bool {
        self.document.is_some() || !self.files.is_empty()
    }

    /// Section ids referenced by fields or files that have no `sections` entry.
    pub fn missing_section_ids(&self) -> Vec<String> {
        let referenced = self
            .fields
            .iter()
            .filter_map(|field| field.section_id.as_deref())
            .chain(self.files.iter().map(|file| file.section_id.as_str()));
        let mut missing: Vec<String> = Vec::new();
        for id in referenced {
            if !self.has_section(id) && !missing.iter().any(|seen| seen == id) {
                missing.push(id.to_string());
            }
        }
        missing
    }
}

/// An item as stored in the destination after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationItem {
    pub id: String,
    pub vault_id: String,
    pub title: String,
    pub category: ItemCategory,
    pub fields: Vec<DraftField>,
    pub sections: Vec<Section>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub websites: Vec<Website>,
}

pub(crate) mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
