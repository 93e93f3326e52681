//! Versioned JSON backups of whole vaults, attachments included.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::memory::{MemoryStore, StoredVault};
use crate::AppError;

pub const BUNDLE_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum BundleError {
    #[error("bundle file not found: {0}")]
    Missing(String),
    #[error("failed to read bundle: {0}")]
    Read(String),
    #[error("failed to parse bundle: {0}")]
    Parse(String),
    #[error("unsupported bundle version {found} (expected {})", BUNDLE_VERSION)]
    Version { found: u32 },
    #[error("failed to write bundle: {0}")]
    Write(String),
}

impl BundleError {
    pub fn code(&self) -> &'static str {
        match self {
            BundleError::Missing(_) => "BUNDLE/MISSING",
            BundleError::Read(_) => "BUNDLE/READ",
            BundleError::Parse(_) => "BUNDLE/PARSE",
            BundleError::Version { .. } => "BUNDLE/VERSION",
            BundleError::Write(_) => "BUNDLE/WRITE",
        }
    }
}

impl From<BundleError> for AppError {
    fn from(error: BundleError) -> Self {
        AppError::new(error.code(), error.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    pub version: u32,
    pub exported_at: DateTime<Utc>,
    #[serde(default)]
    pub vaults: Vec<StoredVault>,
}

impl Bundle {
    pub fn new(vaults: Vec<StoredVault>) -> Self {
        Self {
            version: BUNDLE_VERSION,
            exported_at: Utc::now(),
            vaults,
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, BundleError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(BundleError::Missing(path.display().to_string()));
        }
        let text = fs::read_to_string(path)
            .map_err(|err| BundleError::Read(format!("{}: {err}", path.display())))?;
        let bundle: Bundle =
            serde_json::from_str(&text).map_err(|err| BundleError::Parse(err.to_string()))?;
        if bundle.version != BUNDLE_VERSION {
            return Err(BundleError::Version {
                found: bundle.version,
            });
        }
        Ok(bundle)
    }

    /// Write through a sibling temp file so a crash never leaves half a bundle.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), BundleError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| BundleError::Write(err.to_string()))?;
        }
        let json =
            serde_json::to_vec_pretty(self).map_err(|err| BundleError::Write(err.to_string()))?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|err| BundleError::Write(err.to_string()))?;
        fs::rename(&tmp, path).map_err(|err| BundleError::Write(err.to_string()))?;
        Ok(())
    }

    pub fn item_count(&self) -> usize {
        self.vaults.iter().map(|vault| vault.items.len()).sum()
    }
}

impl MemoryStore {
    pub fn from_bundle(bundle: Bundle) -> Self {
        MemoryStore::from_vaults(bundle.vaults)
    }

    pub fn to_bundle(&self) -> Bundle {
        Bundle::new(self.vaults())
    }

    /// Load a store from `path`, or start empty when the file does not exist yet.
    pub fn open_or_empty(path: impl AsRef<Path>) -> Result<Self, BundleError> {
        match Bundle::load(path) {
            Ok(bundle) => Ok(MemoryStore::from_bundle(bundle)),
            Err(BundleError::Missing(_)) => Ok(MemoryStore::new()),
            Err(err) => Err(err),
        }
    }
}
