//! Credit card layout rules.
//!
//! The destination renders a card from a root section (id `""`) holding a
//! fixed set of built-in fields, so card fields are placed and typed more
//! strictly than fields of other categories.

use once_cell::sync::Lazy;
use regex::Regex;

use super::field::{non_empty_or, DeferredReference, MappedField};
use crate::model::{DraftField, FieldType, SourceField, ADD_MORE_SECTION_ID, ROOT_SECTION_ID};

/// Field ids the destination expects in the root section of a card.
pub const BUILT_IN_FIELD_IDS: &[&str] = &[
    "cardholder",
    "type",
    "number",
    "ccnum",
    "cvv",
    "expiry",
    "validFrom",
];

/// Card field ids that also belong in the root section when the source gives
/// them no section of their own.
const KNOWN_FIELD_IDS: &[&str] = &[
    "bank",
    "phoneLocal",
    "phoneTollFree",
    "phoneIntl",
    "website",
    "pin",
    "creditLimit",
    "cashLimit",
    "interest",
    "issuenumber",
];

static MONTH_FULL_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{2})[/-](\d{4})$").expect("month/year pattern to compile"));
static MONTH_SHORT_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{2})/?(\d{2})$").expect("short month/year pattern to compile"));
static YEAR_MONTH_DIGITS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})(\d{2})$").expect("year/month pattern to compile"));

pub fn is_built_in(field_id: &str) -> bool {
    BUILT_IN_FIELD_IDS.contains(&field_id)
}

fn is_known(field_id: &str) -> bool {
    is_built_in(field_id) || KNOWN_FIELD_IDS.contains(&field_id)
}

/// Map one field of a credit card item.
pub fn map_card_field(field: &SourceField) -> MappedField {
    let id = non_empty_or(&field.id, "unnamed");
    let title = non_empty_or(&field.title, "unnamed");
    let title_lower = title.to_lowercase();
    let section_id = Some(card_section_for(&id, field.section_id.as_deref()));

    if field.field_type == FieldType::Reference && !field.value.is_empty() {
        return MappedField::Deferred(DeferredReference {
            field_id: id,
            title,
            section_id,
            source_ref_id: field.value.clone(),
        });
    }

    let is_expiry_like = id == "expiry"
        || id == "validFrom"
        || title_lower.contains("expiry")
        || title_lower.contains("expiration");

    let mut field_type = match field.field_type {
        FieldType::Unsupported if id == "expiry" || id == "validFrom" => FieldType::MonthYear,
        FieldType::Unsupported | FieldType::Reference => FieldType::Text,
        other => other,
    };
    let mut value = field.value.clone();

    if id == "type" || title_lower == "type" {
        field_type = FieldType::CreditCardType;
        value = normalize_card_type(&value);
    } else if is_expiry_like {
        field_type = FieldType::MonthYear;
        value = normalize_month_year(&value);
    } else if id == "number" || id == "ccnum" {
        field_type = FieldType::CreditCardNumber;
    } else if is_secret_code(&id, &title_lower) {
        field_type = FieldType::Concealed;
    }

    MappedField::Ready(DraftField {
        id,
        title,
        field_type,
        value,
        section_id,
        details: None,
    })
}

fn is_secret_code(id: &str, title_lower: &str) -> bool {
    id == "cvv"
        || id == "pin"
        || title_lower == "pin"
        || title_lower.contains("cvv")
        || title_lower.contains("verification")
}

fn card_section_for(field_id: &str, source_section: Option<&str>) -> String {
    if is_built_in(field_id) {
        return ROOT_SECTION_ID.to_string();
    }
    match source_section {
        Some(section) if !section.is_empty() => section.to_string(),
        _ if is_known(field_id) => ROOT_SECTION_ID.to_string(),
        _ => ADD_MORE_SECTION_ID.to_string(),
    }
}

/// Map every field of a card, built-in fields first in source order.
pub fn map_card_fields(fields: &[SourceField]) -> Vec<MappedField> {
    let (built_in, rest): (Vec<&SourceField>, Vec<&SourceField>) =
        fields.iter().partition(|field| is_built_in(&field.id));
    built_in
        .into_iter()
        .chain(rest)
        .map(map_card_field)
        .collect()
}

/// Canonical display name for a card brand; unknown brands pass through.
pub fn normalize_card_type(value: &str) -> String {
    let canonical = match value.trim().to_lowercase().as_str() {
        "mc" | "mastercard" => "Mastercard",
        "visa" => "Visa",
        "amex" | "american express" => "American Express",
        "discover" => "Discover",
        "diners club" | "dinersclub" => "Diners Club",
        "jcb" => "JCB",
        "unionpay" => "UnionPay",
        _ => return value.to_string(),
    };
    canonical.to_string()
}

/// Normalise an expiry-style value to `MM/YYYY`.
///
/// Accepts `MM/YYYY`, `MM-YYYY`, `MMYY`, `MM/YY` and `YYYYMM`. Anything else is
/// returned untouched.
pub fn normalize_month_year(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    if let Some(caps) = MONTH_FULL_YEAR.captures(trimmed) {
        return format!("{}/{}", &caps[1], &caps[2]);
    }
    if let Some(caps) = MONTH_SHORT_YEAR.captures(trimmed) {
        return format!("{}/20{}", &caps[1], &caps[2]);
    }
    if let Some(caps) = YEAR_MONTH_DIGITS.captures(trimmed) {
        return format!("{}/{}", &caps[2], &caps[1]);
    }
    value.to_string()
}
