#![allow(clippy::unwrap_used)]

use proptest::prelude::*;

use vaultferry_lib::mapping::credit_card::BUILT_IN_FIELD_IDS;
use vaultferry_lib::mapping::{build_item, map_field, MappedField};
use vaultferry_lib::model::{
    Attachments, DraftField, FieldType, ItemCategory, Section, SourceField, SourceItem,
};

const PLAIN_TYPES: &[FieldType] = &[
    FieldType::Text,
    FieldType::Concealed,
    FieldType::Totp,
    FieldType::Address,
    FieldType::SshKey,
    FieldType::Date,
    FieldType::MonthYear,
    FieldType::Email,
    FieldType::Phone,
    FieldType::Url,
    FieldType::Menu,
    FieldType::CreditCardType,
    FieldType::CreditCardNumber,
    FieldType::Unsupported,
];

const CARD_IDS: &[&str] = &[
    "cardholder",
    "type",
    "number",
    "ccnum",
    "cvv",
    "expiry",
    "validFrom",
    "bank",
    "pin",
    "creditLimit",
    "notes_extra",
    "loyalty",
];

fn field_type() -> impl Strategy<Value = FieldType> {
    prop::sample::select(PLAIN_TYPES)
}

fn section() -> impl Strategy<Value = Option<String>> {
    prop::option::of(prop::sample::select(vec!["", "extra", "billing"]).prop_map(String::from))
}

fn source_field(ids: impl Strategy<Value = String>) -> impl Strategy<Value = SourceField> {
    (ids, "[a-zA-Z ]{0,12}", field_type(), "[ -~]{0,20}", section()).prop_map(
        |(id, title, field_type, value, section_id)| SourceField {
            id,
            title,
            field_type,
            value,
            section_id,
            details: None,
        },
    )
}

fn declared_sections() -> Vec<Section> {
    vec![Section::new("extra", "Extra"), Section::new("billing", "Billing")]
}

fn ready(mapped: MappedField) -> DraftField {
    match mapped {
        MappedField::Ready(field) => field,
        MappedField::Deferred(reference) => panic!("unexpected deferral: {reference:?}"),
    }
}

fn back_to_source(field: &DraftField) -> SourceField {
    SourceField {
        id: field.id.clone(),
        title: field.title.clone(),
        field_type: field.field_type,
        value: field.value.clone(),
        section_id: field.section_id.clone(),
        details: None,
    }
}

proptest! {
    #[test]
    fn mapping_a_mapped_field_changes_nothing(
        field in source_field("[a-z]{0,8}".prop_map(String::from)),
        category in prop::sample::select(vec![
            ItemCategory::Login,
            ItemCategory::SecureNote,
            ItemCategory::Server,
            ItemCategory::CreditCard,
        ]),
    ) {
        let once = ready(map_field(&field, category));
        let twice = ready(map_field(&back_to_source(&once), category));
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn custom_items_become_logins_with_root_credentials(
        extra in prop::collection::vec(source_field("[a-z]{1,8}".prop_map(String::from)), 0..8),
        username in "[a-z]{1,10}",
        password in "[ -~]{1,16}",
    ) {
        let mut item = SourceItem::new("src", "Custom", ItemCategory::Custom);
        item.sections = declared_sections();
        item.fields
            .push(SourceField::new("f-user", "username", FieldType::Text, username.clone()));
        item.fields
            .push(SourceField::new("f-pass", "password", FieldType::Concealed, password.clone()));
        item.fields.extend(extra);

        let built = build_item(&item, &Attachments::default(), "dest");
        let draft = built.draft;

        prop_assert_eq!(draft.category, ItemCategory::Login);
        let user = draft.fields.iter().find(|f| f.id == "username").unwrap();
        prop_assert_eq!(&user.value, &username);
        prop_assert_eq!(user.section_id.as_deref(), None);
        let pass = draft.fields.iter().find(|f| f.id == "password").unwrap();
        prop_assert_eq!(&pass.value, &password);
        prop_assert_eq!(pass.field_type, FieldType::Concealed);
        prop_assert_eq!(pass.section_id.as_deref(), None);
        prop_assert!(draft.missing_section_ids().is_empty());
    }

    #[test]
    fn card_fields_land_in_declared_sections(
        fields in prop::collection::vec(
            source_field(prop::sample::select(CARD_IDS).prop_map(String::from)),
            0..12,
        ),
    ) {
        let mut item = SourceItem::new("src", "Card", ItemCategory::CreditCard);
        item.sections = declared_sections();
        item.fields = fields;

        let draft = build_item(&item, &Attachments::default(), "dest").draft;

        prop_assert_eq!(draft.sections[0].id.as_str(), "");
        prop_assert!(draft.missing_section_ids().is_empty());
        for field in &draft.fields {
            prop_assert!(field.section_id.is_some());
            if BUILT_IN_FIELD_IDS.contains(&field.id.as_str()) {
                prop_assert_eq!(field.section_id.as_deref(), Some(""));
            }
        }
        let first_custom = draft
            .fields
            .iter()
            .position(|f| !BUILT_IN_FIELD_IDS.contains(&f.id.as_str()))
            .unwrap_or(draft.fields.len());
        prop_assert!(draft.fields[first_custom..]
            .iter()
            .all(|f| !BUILT_IN_FIELD_IDS.contains(&f.id.as_str())));
    }
}
