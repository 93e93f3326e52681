use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::credit_card;
use crate::model::{
    Address, DraftDetails, DraftField, FieldDetails, FieldType, ItemCategory, SourceField,
};

const UNNAMED: &str = "unnamed";
const TOTP_URI_PREFIX: &str = "otpauth://totp/";

static TOTP_SEED_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[A-Z2-7]{16,32}$").expect("totp seed pattern to compile")
});

/// A reference field held back from the initial create call. Its value is the
/// source-side id of the item it points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeferredReference {
    pub field_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_id: Option<String>,
    pub source_ref_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappedField {
    Ready(DraftField),
    Deferred(DeferredReference),
}

impl MappedField {
    pub fn section_id(&self) -> Option<&str> {
        match self {
            MappedField::Ready(field) => field.section_id.as_deref(),
            MappedField::Deferred(reference) => reference.section_id.as_deref(),
        }
    }

    pub(crate) fn set_section_id(&mut self, section_id: Option<String>) {
        match self {
            MappedField::Ready(field) => field.section_id = section_id,
            MappedField::Deferred(reference) => reference.section_id = section_id,
        }
    }
}

/// Convert one source field into its destination shape.
///
/// Pure: the same input always yields the same output. Credit card items
/// go through the stricter card mapper.
pub fn map_field(field: &SourceField, category: ItemCategory) -> MappedField {
    if category == ItemCategory::CreditCard {
        return credit_card::map_card_field(field);
    }

    let id = non_empty_or(&field.id, UNNAMED);
    let title = non_empty_or(&field.title, UNNAMED);
    // Empty section id is the root area; root fields carry no section outside cards.
    let section_id = field.section_id.clone().filter(|id| !id.is_empty());

    let mut mapped = DraftField {
        id,
        title,
        field_type: destination_type(field.field_type),
        value: field.value.clone(),
        section_id,
        details: None,
    };

    match (field.field_type, &field.details) {
        (FieldType::Address, Some(FieldDetails::Address(parts))) => {
            mapped.details = Some(DraftDetails::Address(Address {
                street: parts.street.clone().unwrap_or_default(),
                city: parts.city.clone().unwrap_or_default(),
                country: parts.country.clone().unwrap_or_default(),
                zip: parts.zip.clone().unwrap_or_default(),
                state: parts.state.clone().unwrap_or_default(),
            }));
            mapped.value = String::new();
        }
        (FieldType::SshKey, Some(FieldDetails::SshKey(parts))) => {
            mapped.value = parts
                .private_key
                .clone()
                .filter(|key| !key.is_empty())
                .unwrap_or_else(|| field.value.clone());
        }
        (FieldType::Totp, details) => {
            let value = totp_source_value(&field.value, details.as_ref());
            if !is_valid_totp(&value) {
                mapped.field_type = FieldType::Text;
            }
            mapped.value = value;
        }
        (FieldType::Reference, _) => {
            if field.value.is_empty() {
                // Nothing to point at; keep the label as plain text.
                mapped.field_type = FieldType::Text;
            } else {
                return MappedField::Deferred(DeferredReference {
                    field_id: mapped.id,
                    title: mapped.title,
                    section_id: mapped.section_id,
                    source_ref_id: field.value.clone(),
                });
            }
        }
        _ => {}
    }

    MappedField::Ready(mapped)
}

/// Destination field type for a source field type; `Unsupported` degrades to `Text`.
pub fn destination_type(kind: FieldType) -> FieldType {
    match kind {
        FieldType::Text => FieldType::Text,
        FieldType::Concealed => FieldType::Concealed,
        FieldType::Totp => FieldType::Totp,
        FieldType::Address => FieldType::Address,
        FieldType::SshKey => FieldType::SshKey,
        FieldType::Date => FieldType::Date,
        FieldType::MonthYear => FieldType::MonthYear,
        FieldType::Email => FieldType::Email,
        FieldType::Phone => FieldType::Phone,
        FieldType::Url => FieldType::Url,
        FieldType::Menu => FieldType::Menu,
        FieldType::CreditCardType => FieldType::CreditCardType,
        FieldType::CreditCardNumber => FieldType::CreditCardNumber,
        FieldType::Reference => FieldType::Reference,
        FieldType::Unsupported => FieldType::Text,
    }
}

/// True for an `otpauth://totp/` URI or a plausible base32 seed.
pub fn is_valid_totp(value: &str) -> bool {
    value.starts_with(TOTP_URI_PREFIX) || TOTP_SEED_PATTERN.is_match(value)
}

pub(crate) fn totp_source_value(value: &str, details: Option<&FieldDetails>) -> String {
    if !value.is_empty() {
        return value.to_string();
    }
    match details {
        Some(FieldDetails::Otp(parts)) => parts.totp.clone().unwrap_or_default(),
        _ => String::new(),
    }
}

pub(crate) fn non_empty_or(value: &str, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}
