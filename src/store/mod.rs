//! Collaborator boundary: what the pipeline needs from the source and
//! destination stores, and the typed error they report.

pub mod bundle;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{
    DestinationItem, DestinationItemDraft, DraftFile, FileRef, ItemSummary, SourceItem,
    VaultSummary,
};

pub use memory::MemoryStore;

/// Whether retrying the failed call can succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    Permanent,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Transient => "transient",
            ErrorKind::Permanent => "permanent",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("data conflict: {0}")]
    Conflict(String),
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("rejected: {0}")]
    Rejected(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Conflict(_) | StoreError::RateLimited(_) => ErrorKind::Transient,
            StoreError::NotFound(_) | StoreError::Rejected(_) | StoreError::Unavailable(_) => {
                ErrorKind::Permanent
            }
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    pub fn code(&self) -> &'static str {
        match self {
            StoreError::Conflict(_) => "STORE/CONFLICT",
            StoreError::RateLimited(_) => "STORE/RATE_LIMITED",
            StoreError::NotFound(_) => "STORE/NOT_FOUND",
            StoreError::Rejected(_) => "STORE/REJECTED",
            StoreError::Unavailable(_) => "STORE/UNAVAILABLE",
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Read side of a migration.
#[async_trait]
pub trait SourceStore: Send + Sync {
    async fn list_vaults(&self) -> StoreResult<Vec<VaultSummary>>;

    async fn list_items(&self, vault_id: &str) -> StoreResult<Vec<ItemSummary>>;

    async fn get_item(&self, vault_id: &str, item_id: &str) -> StoreResult<SourceItem>;

    async fn read_file(&self, vault_id: &str, item_id: &str, file: &FileRef)
        -> StoreResult<Vec<u8>>;

    /// Secondary lookup for a single field value when the primary item read
    /// returns it empty or in an unusable shape.
    async fn field_fallback(
        &self,
        _vault_id: &str,
        _item_id: &str,
        _field_id: &str,
    ) -> StoreResult<Option<String>> {
        Ok(None)
    }
}

/// Write side of a migration.
#[async_trait]
pub trait DestinationStore: Send + Sync {
    async fn create_vault(&self, name: &str) -> StoreResult<String>;

    async fn create_item(&self, draft: &DestinationItemDraft) -> StoreResult<String>;

    /// Bulk create. The outer error fails the whole call; inner results are
    /// per draft, in input order.
    async fn create_items_batch(
        &self,
        vault_id: &str,
        drafts: &[DestinationItemDraft],
    ) -> StoreResult<Vec<StoreResult<String>>>;

    async fn get_item(&self, vault_id: &str, item_id: &str) -> StoreResult<DestinationItem>;

    async fn put_item(&self, item: &DestinationItem) -> StoreResult<()>;

    async fn attach_file(&self, vault_id: &str, item_id: &str, file: &DraftFile)
        -> StoreResult<()>;

    async fn count_items(&self, vault_id: &str) -> StoreResult<usize>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_conflicts_and_rate_limits_are_transient() {
        assert!(StoreError::Conflict("x".into()).is_transient());
        assert!(StoreError::RateLimited("x".into()).is_transient());
        assert!(!StoreError::NotFound("x".into()).is_transient());
        assert!(!StoreError::Rejected("x".into()).is_transient());
        assert!(!StoreError::Unavailable("x".into()).is_transient());
    }

    #[test]
    fn display_includes_detail() {
        let error = StoreError::Rejected("field too long".into());
        assert_eq!(error.to_string(), "rejected: field too long");
        assert_eq!(error.code(), "STORE/REJECTED");
    }
}
