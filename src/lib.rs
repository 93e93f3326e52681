//! Copy credential vaults item by item from one store into another.
//!
//! [`migration::migrate_vaults`] drives a run: every source item is read,
//! reshaped into a destination draft by [`mapping`], created in batches or
//! one at a time, and reference fields are re-pointed once their targets
//! exist. Progress, per-item failures and counts land in the session's
//! [`log::MigrationLog`].

use std::path::Path;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

pub mod config;
pub mod error;
pub mod log;
pub mod mapping;
pub mod migration;
pub mod model;
pub mod references;
pub mod report;
pub mod retry;
pub mod session;
pub mod store;

pub use config::MigrationConfig;
pub use error::{AppError, AppResult};
pub use log::MigrationLog;
pub use migration::{
    list_vaults_with_counts, migrate_vault, migrate_vaults, BulkOutcome, ProgressEvent,
    ProgressSink, SilentProgress, VaultMigration,
};
pub use report::write_migration_report;
pub use session::{CancelToken, MigrationSession};
pub use store::{DestinationStore, MemoryStore, SourceStore, StoreError};

/// Environment variable holding the tracing filter directive.
pub const LOG_ENV: &str = "VAULTFERRY_LOG";
const DEFAULT_LOG_FILTER: &str = "vaultferry=info";

/// Install the global subscriber: JSON lines on stderr, plus a daily rolling
/// file under `log_dir` when given. Keep the returned guard alive until exit
/// so buffered file lines get flushed.
pub fn init_logging(log_dir: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let _ = tracing_log::LogTracer::init();

    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let stderr_layer = fmt::layer()
        .json()
        .with_target(true)
        .with_timer(UtcTime::rfc_3339())
        .with_writer(std::io::stderr);

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create log directory {}", dir.display()))?;
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("vaultferry")
                .filename_suffix("log")
                .build(dir)
                .with_context(|| format!("open log file in {}", dir.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .json()
                .with_ansi(false)
                .with_target(true)
                .with_timer(UtcTime::rfc_3339())
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init();
    Ok(guard)
}
