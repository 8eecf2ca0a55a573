// src/pipeline/import.rs

//! Scatter/gather import across sources.

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::time::{Instant, timeout_at};

use crate::models::{
    Config, ImportErrorKind, ImportReport, SourceKind, SourceOutcome, SourceResult,
};
use crate::page::PageHost;
use crate::services::{ImportOrchestrator, SourcePlan};

/// Import every requested source concurrently.
///
/// The report always holds one entry per distinct requested source. Sources
/// still running when the outer deadline passes are abandoned and reported
/// as `import-timeout`; their tabs are left as they are.
pub async fn run_import<H>(host: &H, config: &Config, sources: &[SourceKind]) -> ImportReport
where
    H: PageHost + ?Sized,
{
    let deadline = Instant::now() + config.import.outer_timeout();
    let orchestrator = ImportOrchestrator::new(config);

    let mut requested: Vec<SourceKind> = sources.to_vec();
    requested.sort();
    requested.dedup();

    let mut report = ImportReport::default();
    let mut plans = Vec::new();
    for kind in &requested {
        match config.source(*kind) {
            Some(source) => plans.push(SourcePlan::for_source(source.clone())),
            None => {
                log::warn!("No configuration for source {}", kind);
                report.insert(SourceResult::new(
                    *kind,
                    SourceOutcome::error(
                        ImportErrorKind::HostUnavailable,
                        format!("No source configured for {}", kind),
                    ),
                ));
            }
        }
    }

    log::info!("Importing {} source(s)", plans.len());
    let mut running: FuturesUnordered<_> = plans
        .iter()
        .map(|plan| orchestrator.run(host, plan))
        .collect();

    loop {
        match timeout_at(deadline, running.next()).await {
            Ok(Some(result)) => {
                log::info!("{}", result.describe());
                report.insert(result);
            }
            Ok(None) => break,
            Err(_) => {
                log::warn!(
                    "Import timed out after {}s with {} source(s) unfinished",
                    config.import.outer_timeout_secs,
                    running.len()
                );
                break;
            }
        }
    }
    drop(running);

    for plan in &plans {
        if report.get(plan.kind()).is_none() {
            report.insert(SourceResult::new(
                plan.kind(),
                SourceOutcome::error(
                    ImportErrorKind::ImportTimeout,
                    format!(
                        "{} import did not finish within {}s",
                        plan.kind(),
                        config.import.outer_timeout_secs
                    ),
                ),
            ));
        }
    }
    report
}
