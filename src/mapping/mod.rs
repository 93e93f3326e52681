//! Source-to-destination item shaping. Everything in here is pure.

pub mod credit_card;
pub mod field;
pub mod item;
pub mod login;

pub use field::{destination_type, is_valid_totp, map_field, DeferredReference, MappedField};
pub use item::{build_item, ensure_sections, BuiltItem};
