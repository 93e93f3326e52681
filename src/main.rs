use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use vaultferry_lib::migration::{ProgressEvent, VaultPhase};
use vaultferry_lib::store::bundle::Bundle;
use vaultferry_lib::{
    init_logging, list_vaults_with_counts, migrate_vaults, write_migration_report, MemoryStore,
    MigrationConfig, MigrationSession,
};

#[derive(Parser)]
#[command(name = "vaultferry", about = "Migrate credential vaults between stores")]
struct Cli {
    /// Directory for a daily-rolling JSON log file
    #[arg(long, value_name = "DIR", global = true)]
    log_dir: Option<PathBuf>,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// List the vaults in a bundle with their item counts
    #[command(about, long_about = None)]
    Vaults {
        #[arg(long, value_name = "FILE")]
        bundle: PathBuf,
    },
    /// Copy vaults from a source bundle into a destination bundle
    #[command(about, long_about = None)]
    Migrate(MigrateArgs),
}

#[derive(Args)]
struct MigrateArgs {
    /// Source bundle
    #[arg(long, value_name = "FILE")]
    source: PathBuf,
    /// Destination bundle; created when missing
    #[arg(long, value_name = "FILE")]
    dest: PathBuf,
    /// Vault id to migrate (repeatable); all vaults when omitted
    #[arg(long = "vault", value_name = "ID")]
    vaults: Vec<String>,
    /// Write a JSON report into this directory
    #[arg(long, value_name = "DIR")]
    report_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = match init_logging(cli.log_dir.as_deref()) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("error: {err:#}");
            return ExitCode::from(1);
        }
    };

    let result = match cli.cmd {
        Cmd::Vaults { bundle } => vaults(&bundle, cli.json).await,
        Cmd::Migrate(args) => migrate(args, cli.json).await,
    };
    match result {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(
                target: "vaultferry",
                event = "cli_failed",
                error = %format!("{err:#}")
            );
            eprintln!("error: {err:#}");
            ExitCode::from(1)
        }
    }
}

fn load_source(path: &Path) -> Result<MemoryStore> {
    let bundle =
        Bundle::load(path).with_context(|| format!("load source bundle {}", path.display()))?;
    Ok(MemoryStore::from_bundle(bundle))
}

async fn vaults(bundle: &Path, json: bool) -> Result<ExitCode> {
    let source = load_source(bundle)?;
    let session = MigrationSession::new(MigrationConfig::load());
    let listed = list_vaults_with_counts(&session, &source)
        .await
        .context("list vaults")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&listed)?);
    } else {
        for vault in &listed {
            println!("{}\t{}\t{} items", vault.id, vault.name, vault.item_count);
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn migrate(args: MigrateArgs, json: bool) -> Result<ExitCode> {
    let source = load_source(&args.source)?;
    let dest = MemoryStore::open_or_empty(&args.dest)
        .with_context(|| format!("open destination bundle {}", args.dest.display()))?;

    let session = MigrationSession::new(MigrationConfig::load());
    let token = session.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!(
                target: "vaultferry",
                event = "cancel_requested",
                "interrupt received, stopping after the current step"
            );
            token.cancel();
        }
    });

    let progress = move |event: &ProgressEvent| {
        if json {
            return;
        }
        if let ProgressEvent::Phase {
            vault_name,
            phase,
            message,
            ..
        } = event
        {
            if *phase != VaultPhase::Migrating {
                eprintln!("[{vault_name}] {message}");
            }
        }
    };

    let outcome = migrate_vaults(&session, &source, &dest, &args.vaults, &progress)
        .await
        .context("migrate vaults")?;

    dest.to_bundle()
        .save(&args.dest)
        .with_context(|| format!("save destination bundle {}", args.dest.display()))?;

    let report = match &args.report_dir {
        Some(dir) => Some(
            write_migration_report(dir, &outcome, session.log())
                .with_context(|| format!("write report into {}", dir.display()))?,
        ),
        None => None,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!("{}", outcome.message);
        println!();
        println!("{}", session.log().vault_stats_summary());
        if outcome.summary.failed_items > 0 {
            println!();
            println!("{}", session.log().failure_summary());
        }
        if let Some(path) = report {
            println!();
            println!("Report written to {}", path.display());
        }
    }

    Ok(if outcome.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}
