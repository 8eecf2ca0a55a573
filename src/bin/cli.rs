//! weekplan CLI
//!
//! Runs imports against captured snapshots or live pages, plans the week and
//! serves the request bridge over stdio.

use std::path::PathBuf;
use std::sync::Arc;
#[cfg(feature = "http")]
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use weekplan::{
    error::{AppError, Result},
    models::{Config, SourceKind},
    page::{PageHost, SnapshotHost},
    pipeline,
    services::{BridgeMessage, ImportHandler, serve},
    storage::{LocalStorage, PlanStorage},
    utils::log::format_minutes,
};

/// weekplan - weekly workload planner
#[derive(Parser, Debug)]
#[command(name = "weekplan", version, about = "Import assignments and plan the working week")]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = "weekplan.toml")]
    config: PathBuf,

    /// Directory for saved reports and plans
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Read pages from a snapshot directory (pages.toml + HTML) instead of
    /// fetching them
    #[arg(long, global = true)]
    snapshots: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import sources and save the per-source results
    Import {
        /// Sources to import (default: all)
        #[arg(long, value_delimiter = ',')]
        sources: Vec<SourceKind>,
    },

    /// Import, normalize and merge into a weekly plan
    Plan,

    /// Merge the last saved import report into a weekly plan
    Merge,

    /// Validate the configuration file
    Validate,

    /// Answer bridge requests as JSON lines on stdin/stdout
    Serve,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Page host for this run.
fn open_host(snapshots: Option<&PathBuf>) -> Result<Arc<dyn PageHost>> {
    if let Some(dir) = snapshots {
        log::info!("Reading pages from snapshots in {}", dir.display());
        return Ok(Arc::new(SnapshotHost::from_dir(dir)?));
    }

    #[cfg(feature = "http")]
    {
        let host = weekplan::page::HttpHost::new(Duration::from_secs(30))?;
        Ok(Arc::new(host))
    }

    #[cfg(not(feature = "http"))]
    {
        Err(AppError::config(
            "built without the http feature; pass --snapshots <dir>",
        ))
    }
}

/// Pump JSON lines between stdio and the bridge until stdin closes.
async fn serve_stdio(handler: ImportHandler) -> Result<()> {
    let (request_tx, request_rx) = mpsc::channel::<BridgeMessage>(16);
    let (reply_tx, mut reply_rx) = mpsc::channel::<BridgeMessage>(16);

    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(message) = reply_rx.recv().await {
            let mut line = serde_json::to_vec(&message)?;
            line.push(b'\n');
            stdout.write_all(&line).await?;
            stdout.flush().await?;
        }
        Ok::<(), AppError>(())
    });

    let reader = tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<BridgeMessage>(&line) {
                Ok(message) => {
                    if request_tx.send(message).await.is_err() {
                        break;
                    }
                }
                Err(e) => log::warn!("Ignoring malformed bridge message: {}", e),
            }
        }
        Ok::<(), AppError>(())
    });

    log::info!("Bridge ready on stdio");
    serve(&handler, request_rx, reply_tx).await?;

    reader
        .await
        .map_err(|e| AppError::bridge(format!("reader task failed: {}", e)))??;
    writer
        .await
        .map_err(|e| AppError::bridge(format!("writer task failed: {}", e)))??;
    Ok(())
}

/// Load the configuration file, or defaults when it does not exist.
fn load_config(path: &PathBuf) -> Result<Config> {
    if !path.exists() {
        log::info!("{} not found, using defaults", path.display());
        return Ok(Config::default());
    }
    let config = Config::load(path)?;
    config.validate()?;
    log::info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let storage = LocalStorage::new(&cli.storage_dir);

    match cli.command {
        Command::Import { sources } => {
            let config = load_config(&cli.config)?;
            let sources = if sources.is_empty() {
                SourceKind::ALL.to_vec()
            } else {
                sources
            };
            let host = open_host(cli.snapshots.as_ref())?;
            let report = pipeline::run_import(host.as_ref(), &config, &sources).await;

            for result in report.results.values() {
                log::info!("{}", result.describe());
            }
            let meta = storage.write_report(&report).await?;
            log::info!("Saved to {}", cli.storage_dir.join(&meta.locations[0]).display());
        }

        Command::Plan => {
            let config = load_config(&cli.config)?;
            let host = open_host(cli.snapshots.as_ref())?;
            let (report, plan) = pipeline::run_plan(host.as_ref(), &config).await;
            storage.write_report(&report).await?;
            storage.write_plan(&plan).await?;
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }

        Command::Merge => {
            let config = load_config(&cli.config)?;
            let stored = storage.load_report().await?.ok_or_else(|| {
                AppError::config("No saved import report. Run 'import' first.")
            })?;
            log::info!("Merging import report saved at {}", stored.saved_at);

            let plan = pipeline::plan_from_report(&config, &stored.content);
            log::info!(
                "{} items, {} scheduled, {} remaining ({:?})",
                plan.items.len(),
                format_minutes(i64::from(plan.capacity.total_scheduled_minutes)),
                format_minutes(plan.capacity.remaining_minutes),
                plan.capacity.status
            );
            for conflict in &plan.conflicts {
                log::warn!(
                    "{}: '{}' overlaps '{}'",
                    conflict.day.label(),
                    conflict.first,
                    conflict.second
                );
            }
            storage.write_plan(&plan).await?;
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }

        Command::Validate => {
            pipeline::run_validate(&cli.config)?;
            log::info!("All validations passed!");
        }

        Command::Serve => {
            let config = load_config(&cli.config)?;
            let host = open_host(cli.snapshots.as_ref())?;
            serve_stdio(ImportHandler::new(host, config)).await?;
        }
    }

    Ok(())
}
