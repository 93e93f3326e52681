use serde::{Deserialize, Serialize};
use std::fmt;

/// Lower-cased key with separators stripped, so `SSH_KEY`, `SshKey` and
/// `ssh key` all compare equal.
fn wire_key(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Item category as reported by the secrets manager.
///
/// Unknown wire values parse to [`ItemCategory::Unsupported`], which the item
/// builder converts to a login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum ItemCategory {
    Login,
    SecureNote,
    CreditCard,
    CryptoWallet,
    Identity,
    Password,
    Document,
    ApiCredentials,
    BankAccount,
    Database,
    DriverLicense,
    Email,
    MedicalRecord,
    Membership,
    OutdoorLicense,
    Passport,
    Rewards,
    Router,
    Server,
    SshKey,
    SocialSecurityNumber,
    SoftwareLicense,
    Person,
    Custom,
    Unsupported,
}

impl ItemCategory {
    pub const ALL: [ItemCategory; 25] = [
        ItemCategory::Login,
        ItemCategory::SecureNote,
        ItemCategory::CreditCard,
        ItemCategory::CryptoWallet,
        ItemCategory::Identity,
        ItemCategory::Password,
        ItemCategory::Document,
        ItemCategory::ApiCredentials,
        ItemCategory::BankAccount,
        ItemCategory::Database,
        ItemCategory::DriverLicense,
        ItemCategory::Email,
        ItemCategory::MedicalRecord,
        ItemCategory::Membership,
        ItemCategory::OutdoorLicense,
        ItemCategory::Passport,
        ItemCategory::Rewards,
        ItemCategory::Router,
        ItemCategory::Server,
        ItemCategory::SshKey,
        ItemCategory::SocialSecurityNumber,
        ItemCategory::SoftwareLicense,
        ItemCategory::Person,
        ItemCategory::Custom,
        ItemCategory::Unsupported,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            ItemCategory::Login => "Login",
            ItemCategory::SecureNote => "SecureNote",
            ItemCategory::CreditCard => "CreditCard",
            ItemCategory::CryptoWallet => "CryptoWallet",
            ItemCategory::Identity => "Identity",
            ItemCategory::Password => "Password",
            ItemCategory::Document => "Document",
            ItemCategory::ApiCredentials => "ApiCredentials",
            ItemCategory::BankAccount => "BankAccount",
            ItemCategory::Database => "Database",
            ItemCategory::DriverLicense => "DriverLicense",
            ItemCategory::Email => "Email",
            ItemCategory::MedicalRecord => "MedicalRecord",
            ItemCategory::Membership => "Membership",
            ItemCategory::OutdoorLicense => "OutdoorLicense",
            ItemCategory::Passport => "Passport",
            ItemCategory::Rewards => "Rewards",
            ItemCategory::Router => "Router",
            ItemCategory::Server => "Server",
            ItemCategory::SshKey => "SshKey",
            ItemCategory::SocialSecurityNumber => "SocialSecurityNumber",
            ItemCategory::SoftwareLicense => "SoftwareLicense",
            ItemCategory::Person => "Person",
            ItemCategory::Custom => "Custom",
            ItemCategory::Unsupported => "Unsupported",
        }
    }

    pub fn iter() -> impl Iterator<Item = ItemCategory> {
        Self::ALL.into_iter()
    }

    /// Lenient parse used for every wire value.
    pub fn parse(raw: &str) -> Self {
        let key = wire_key(raw);
        Self::iter()
            .find(|category| wire_key(category.as_str()) == key)
            .unwrap_or(ItemCategory::Unsupported)
    }

    /// Categories the destination cannot represent natively; they migrate as logins.
    pub const fn converts_to_login(self) -> bool {
        matches!(self, ItemCategory::Custom | ItemCategory::Unsupported)
    }
}

impl Default for ItemCategory {
    fn default() -> Self {
        ItemCategory::Login
    }
}

impl From<String> for ItemCategory {
    fn from(value: String) -> Self {
        ItemCategory::parse(&value)
    }
}

impl From<ItemCategory> for &'static str {
    fn from(value: ItemCategory) -> Self {
        value.as_str()
    }
}

impl fmt::Display for ItemCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field kind. Unknown wire values parse to [`FieldType::Unsupported`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum FieldType {
    Text,
    Concealed,
    Totp,
    Address,
    SshKey,
    Date,
    MonthYear,
    Email,
    Phone,
    Url,
    Menu,
    CreditCardType,
    CreditCardNumber,
    Reference,
    Unsupported,
}

impl FieldType {
    pub const ALL: [FieldType; 15] = [
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
        FieldType::Reference,
        FieldType::Unsupported,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            FieldType::Text => "Text",
            FieldType::Concealed => "Concealed",
            FieldType::Totp => "Totp",
            FieldType::Address => "Address",
            FieldType::SshKey => "SshKey",
            FieldType::Date => "Date",
            FieldType::MonthYear => "MonthYear",
            FieldType::Email => "Email",
            FieldType::Phone => "Phone",
            FieldType::Url => "Url",
            FieldType::Menu => "Menu",
            FieldType::CreditCardType => "CreditCardType",
            FieldType::CreditCardNumber => "CreditCardNumber",
            FieldType::Reference => "Reference",
            FieldType::Unsupported => "Unsupported",
        }
    }

    pub fn iter() -> impl Iterator<Item = FieldType> {
        Self::ALL.into_iter()
    }

    pub fn parse(raw: &str) -> Self {
        let key = wire_key(raw);
        Self::iter()
            .find(|kind| wire_key(kind.as_str()) == key)
            .unwrap_or(FieldType::Unsupported)
    }
}

impl Default for FieldType {
    fn default() -> Self {
        FieldType::Text
    }
}

impl From<String> for FieldType {
    fn from(value: String) -> Self {
        FieldType::parse(&value)
    }
}

impl From<FieldType> for &'static str {
    fn from(value: FieldType) -> Self {
        value.as_str()
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AutofillBehavior {
    AnywhereOnWebsite,
    ExactDomain,
    Never,
}

impl Default for AutofillBehavior {
    fn default() -> Self {
        AutofillBehavior::AnywhereOnWebsite
    }
}
