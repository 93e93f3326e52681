//! Conversion of Custom and Unsupported items into Login items.

use super::field::{is_valid_totp, map_field, non_empty_or, totp_source_value, MappedField};
use crate::model::{DraftField, FieldType, ItemCategory, Section, SourceField, SourceItem};

pub const ADDITIONAL_SECTION_ID: &str = "additional";
const ADDITIONAL_SECTION_TITLE: &str = "Additional Details";

const USERNAME_LABELS: &[&str] = &["username", "user", "email address", "login"];
const PASSWORD_LABELS: &[&str] = &["password", "pass"];
const OTP_LABELS: &[&str] = &["otp", "one-time password", "totp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginRole {
    Username,
    Password,
    OneTimePassword,
}

impl LoginRole {
    fn field_id(self) -> &'static str {
        match self {
            LoginRole::Username => "username",
            LoginRole::Password => "password",
            LoginRole::OneTimePassword => "onetimepassword",
        }
    }
}

/// Classify a field by the login role its id, label or type suggests.
/// Reference fields never take a role; they are resolved after creation.
pub fn detect_role(field: &SourceField) -> Option<LoginRole> {
    if field.field_type == FieldType::Reference {
        return None;
    }
    let id = field.id.to_lowercase();
    let label = field.title.trim().to_lowercase();

    if id == "username" || USERNAME_LABELS.contains(&label.as_str()) {
        return Some(LoginRole::Username);
    }
    if id == "password"
        || PASSWORD_LABELS.contains(&label.as_str())
        || (field.field_type == FieldType::Concealed && label.contains("password"))
    {
        return Some(LoginRole::Password);
    }
    if field.field_type == FieldType::Totp
        || OTP_LABELS.contains(&label.as_str())
        || id == "totp"
        || id == "otp"
    {
        return Some(LoginRole::OneTimePassword);
    }
    None
}

/// Fields and sections of a converted login, in render order.
pub(crate) struct ConvertedLogin {
    pub fields: Vec<MappedField>,
    pub sections: Vec<Section>,
}

pub(crate) fn convert_to_login(item: &SourceItem) -> ConvertedLogin {
    let mut root: Vec<MappedField> = Vec::new();
    let mut others: Vec<MappedField> = Vec::new();
    let mut promoted: Vec<LoginRole> = Vec::new();

    for field in &item.fields {
        // Only the first field per role is promoted; later ones stay regular fields.
        match detect_role(field).filter(|role| !promoted.contains(role)) {
            Some(role) => {
                promoted.push(role);
                root.push(MappedField::Ready(promote(field, role)));
            }
            None => {
                let mut mapped = map_field(field, ItemCategory::Login);
                if let MappedField::Ready(draft) = &mut mapped {
                    if field.field_type == FieldType::Concealed {
                        draft.field_type = FieldType::Concealed;
                    }
                }
                if mapped.section_id().is_none() {
                    mapped.set_section_id(Some(ADDITIONAL_SECTION_ID.to_string()));
                }
                others.push(mapped);
            }
        }
    }

    let mut sections = item.sections.clone();
    let uses_additional = others
        .iter()
        .any(|field| field.section_id() == Some(ADDITIONAL_SECTION_ID));
    if uses_additional && !sections.iter().any(|s| s.id == ADDITIONAL_SECTION_ID) {
        sections.push(Section::new(ADDITIONAL_SECTION_ID, ADDITIONAL_SECTION_TITLE));
    }

    root.extend(others);
    ConvertedLogin {
        fields: root,
        sections,
    }
}

fn promote(field: &SourceField, role: LoginRole) -> DraftField {
    let (field_type, value) = match role {
        LoginRole::Username => (FieldType::Text, field.value.clone()),
        LoginRole::Password => (FieldType::Concealed, field.value.clone()),
        LoginRole::OneTimePassword => {
            let value = totp_source_value(&field.value, field.details.as_ref());
            let field_type = if is_valid_totp(&value) {
                FieldType::Totp
            } else {
                FieldType::Text
            };
            (field_type, value)
        }
    };
    let field_type = if field.field_type == FieldType::Concealed {
        FieldType::Concealed
    } else {
        field_type
    };

    DraftField {
        id: role.field_id().to_string(),
        title: non_empty_or(&field.title, role.field_id()),
        field_type,
        value,
        section_id: None,
        details: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn custom_item(fields: Vec<SourceField>) -> SourceItem {
        let mut item = SourceItem::new("c1", "Legacy", ItemCategory::Custom);
        item.fields = fields;
        item
    }

    #[test]
    fn detects_roles_from_ids_labels_and_types() {
        let by_label = SourceField::new("f1", "Email Address", FieldType::Text, "a@b.c");
        assert_eq!(detect_role(&by_label), Some(LoginRole::Username));

        let concealed = SourceField::new("f2", "Admin password", FieldType::Concealed, "pw");
        assert_eq!(detect_role(&concealed), Some(LoginRole::Password));

        let plain_password_label = SourceField::new("f3", "Admin password", FieldType::Text, "pw");
        assert_eq!(detect_role(&plain_password_label), None);

        let otp = SourceField::new("f4", "Code", FieldType::Totp, "JBSWY3DPEHPK3PXP");
        assert_eq!(detect_role(&otp), Some(LoginRole::OneTimePassword));
    }

    #[test]
    fn reference_fields_are_never_promoted() {
        let link = SourceField::new("f1", "login", FieldType::Reference, "src-other");
        assert_eq!(detect_role(&link), None);

        let item = custom_item(vec![
            link,
            SourceField::new("f2", "username", FieldType::Text, "ada"),
        ]);
        let converted = convert_to_login(&item);

        match &converted.fields[0] {
            MappedField::Ready(draft) => {
                assert_eq!(draft.id, "username");
                assert_eq!(draft.value, "ada");
            }
            other => panic!("unexpected {other:?}"),
        }
        match &converted.fields[1] {
            MappedField::Deferred(reference) => {
                assert_eq!(reference.source_ref_id, "src-other");
                assert_eq!(reference.section_id.as_deref(), Some(ADDITIONAL_SECTION_ID));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn promoted_roles_are_root_fields_with_canonical_ids() {
        let item = custom_item(vec![
            SourceField::new("note", "Note", FieldType::Text, "x"),
            SourceField::new("f1", "user", FieldType::Text, "ada").in_section("s1"),
            SourceField::new("f2", "pass", FieldType::Text, "pw"),
            SourceField::new("otp", "otp", FieldType::Text, "bogus"),
        ]);
        let converted = convert_to_login(&item);

        let root: Vec<_> = converted
            .fields
            .iter()
            .filter_map(|field| match field {
                MappedField::Ready(draft) if draft.section_id.is_none() => Some(draft),
                _ => None,
            })
            .collect();
        assert_eq!(root.len(), 3);
        assert_eq!(root[0].id, "username");
        assert_eq!(root[1].id, "password");
        assert_eq!(root[1].field_type, FieldType::Concealed);
        assert_eq!(root[2].id, "onetimepassword");
        assert_eq!(root[2].field_type, FieldType::Text);
    }

    #[test]
    fn unsectioned_extras_move_to_additional_details() {
        let item = custom_item(vec![
            SourceField::new("pin", "PIN", FieldType::Concealed, "1234"),
            SourceField::new("host", "Host", FieldType::Url, "h").in_section("net"),
        ]);
        let converted = convert_to_login(&item);

        assert_eq!(converted.fields[0].section_id(), Some(ADDITIONAL_SECTION_ID));
        assert_eq!(converted.fields[1].section_id(), Some("net"));
        assert!(converted
            .sections
            .iter()
            .any(|s| s.id == ADDITIONAL_SECTION_ID && s.title == ADDITIONAL_SECTION_TITLE));
        match &converted.fields[0] {
            MappedField::Ready(draft) => assert_eq!(draft.field_type, FieldType::Concealed),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn concealed_username_stays_concealed() {
        let item = custom_item(vec![SourceField::new(
            "username",
            "Login",
            FieldType::Concealed,
            "ada",
        )]);
        let converted = convert_to_login(&item);
        match &converted.fields[0] {
            MappedField::Ready(draft) => {
                assert_eq!(draft.id, "username");
                assert_eq!(draft.field_type, FieldType::Concealed);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
