use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::MigrationConfig;
use crate::log::MigrationLog;
use crate::retry::RetryPolicy;

/// Cooperative cancellation flag shared by every task of a session.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Clear a previous request so the token can drive a new run.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Everything one migration run shares: settings, the log sink and the
/// cancellation token. Cloning is cheap and clones observe the same state.
#[derive(Debug, Clone)]
pub struct MigrationSession {
    config: Arc<MigrationConfig>,
    log: Arc<MigrationLog>,
    cancel: CancelToken,
}

impl Default for MigrationSession {
    fn default() -> Self {
        Self::new(MigrationConfig::default())
    }
}

impl MigrationSession {
    pub fn new(config: MigrationConfig) -> Self {
        Self {
            config: Arc::new(config),
            log: Arc::new(MigrationLog::new()),
            cancel: CancelToken::new(),
        }
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    pub fn log(&self) -> &MigrationLog {
        &self.log
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.config.retry_policy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_cancellation_and_log() {
        let session = MigrationSession::default();
        let clone = session.clone();
        let token = session.cancel_token();

        clone.log().info(None, "hello");
        assert_eq!(session.log().entries().len(), 1);

        assert!(!session.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
        token.reset();
        assert!(!session.is_cancelled());
    }

    #[test]
    fn separate_sessions_do_not_leak_state() {
        let first = MigrationSession::default();
        let second = MigrationSession::default();
        first.cancel();
        first.log().error(None, "boom");
        assert!(!second.is_cancelled());
        assert!(second.log().entries().is_empty());
    }
}
