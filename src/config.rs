use std::env;
use std::time::Duration;

use serde::Serialize;

use crate::retry::{RetryPolicy, DEFAULT_MAX_ATTEMPTS};

pub const DEFAULT_BATCH_SIZE: usize = 50;
const HARD_MAX_BATCH_SIZE: usize = 100;
const HARD_MAX_RETRY_ATTEMPTS: u32 = 10;
const DEFAULT_RETRY_BASE_MS: u64 = 1000;
const HARD_MAX_RETRY_BASE_MS: u64 = 60_000;
pub const DEFAULT_VAULT_CONCURRENCY: usize = 2;
const HARD_MAX_VAULT_CONCURRENCY: usize = 8;
pub const DEFAULT_VAULT_SUFFIX: &str = " (Migrated)";

/// Tunables for one migration session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationConfig {
    pub batch_size: usize,
    pub retry_attempts: u32,
    pub retry_base_delay: Duration,
    pub vault_concurrency: usize,
    pub vault_name_suffix: String,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            retry_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_base_delay: Duration::from_millis(DEFAULT_RETRY_BASE_MS),
            vault_concurrency: DEFAULT_VAULT_CONCURRENCY,
            vault_name_suffix: DEFAULT_VAULT_SUFFIX.to_string(),
        }
    }
}

impl MigrationConfig {
    /// Defaults overridden by `VAULTFERRY_*` environment variables.
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let batch_size = lookup("VAULTFERRY_BATCH_SIZE")
            .and_then(|value| value.trim().parse::<usize>().ok())
            .filter(|value| *value > 0)
            .map(|value| value.min(HARD_MAX_BATCH_SIZE))
            .unwrap_or(DEFAULT_BATCH_SIZE);

        let retry_attempts = lookup("VAULTFERRY_RETRY_ATTEMPTS")
            .and_then(|value| value.trim().parse::<u32>().ok())
            .filter(|value| *value > 0)
            .map(|value| value.min(HARD_MAX_RETRY_ATTEMPTS))
            .unwrap_or(DEFAULT_MAX_ATTEMPTS);

        // Zero is a legitimate base delay here; it disables backoff sleeps.
        let retry_base_ms = lookup("VAULTFERRY_RETRY_BASE_MS")
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(|value| value.min(HARD_MAX_RETRY_BASE_MS))
            .unwrap_or(DEFAULT_RETRY_BASE_MS);

        let vault_concurrency = lookup("VAULTFERRY_VAULT_CONCURRENCY")
            .and_then(|value| value.trim().parse::<usize>().ok())
            .filter(|value| *value > 0)
            .map(|value| value.min(HARD_MAX_VAULT_CONCURRENCY))
            .unwrap_or(DEFAULT_VAULT_CONCURRENCY);

        let vault_name_suffix =
            lookup("VAULTFERRY_VAULT_SUFFIX").unwrap_or_else(|| DEFAULT_VAULT_SUFFIX.to_string());

        Self {
            batch_size,
            retry_attempts,
            retry_base_delay: Duration::from_millis(retry_base_ms),
            vault_concurrency,
            vault_name_suffix,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_attempts, self.retry_base_delay)
    }

    pub fn destination_vault_name(&self, source_name: &str) -> String {
        format!("{source_name}{}", self.vault_name_suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_without_overrides() {
        let config = MigrationConfig::from_lookup(|_| None);
        assert_eq!(config, MigrationConfig::default());
        assert_eq!(config.destination_vault_name("Team"), "Team (Migrated)");
    }

    #[test]
    fn overrides_are_clamped() {
        let config = MigrationConfig::from_lookup(lookup_from(&[
            ("VAULTFERRY_BATCH_SIZE", "500"),
            ("VAULTFERRY_RETRY_ATTEMPTS", "99"),
            ("VAULTFERRY_RETRY_BASE_MS", "0"),
            ("VAULTFERRY_VAULT_CONCURRENCY", "3"),
            ("VAULTFERRY_VAULT_SUFFIX", " [copy]"),
        ]));
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.retry_attempts, 10);
        assert_eq!(config.retry_base_delay, Duration::ZERO);
        assert_eq!(config.vault_concurrency, 3);
        assert_eq!(config.destination_vault_name("Ops"), "Ops [copy]");
    }

    #[test]
    fn invalid_or_zero_values_fall_back() {
        let config = MigrationConfig::from_lookup(lookup_from(&[
            ("VAULTFERRY_BATCH_SIZE", "0"),
            ("VAULTFERRY_RETRY_ATTEMPTS", "many"),
            ("VAULTFERRY_VAULT_CONCURRENCY", "-1"),
        ]));
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.retry_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(config.vault_concurrency, DEFAULT_VAULT_CONCURRENCY);
    }
}
