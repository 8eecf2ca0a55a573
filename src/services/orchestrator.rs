// src/services/orchestrator.rs

//! Per-source import state machine.
//!
//! `idle → tab-opened → (navigating)* → (readiness-poll) → extracting →
//! {success | needs-login | error}`. Every step runs in order; every delay
//! is a `tokio::time::sleep`, so a paused test clock drives it instantly.

use std::fmt;

use serde_json::json;
use tokio::time::{Instant, sleep};

use crate::extract::{
    click_lists_tab, click_tickets_sidebar, extract_calendar, extract_report_grid,
    extract_tickets, report_ready, tickets_table_ready,
};
use crate::models::{
    Config, ExtractionResult, ImportConfig, ImportErrorKind, SourceConfig, SourceKind,
    SourceOutcome, SourceResult, StepResult,
};
use crate::page::{PageFn, PageHost, TabHandle, execute};
use crate::services::aggregator::{Aggregated, FrameAggregator};

/// Page functions and settings for one source.
#[derive(Debug, Clone)]
pub struct SourcePlan {
    pub config: SourceConfig,
    pub extractor: PageFn<ExtractionResult>,
    pub navigation: Vec<PageFn<StepResult>>,
    pub readiness: Option<PageFn<bool>>,
}

impl SourcePlan {
    /// The page functions that belong to `config.kind`.
    pub fn for_source(config: SourceConfig) -> Self {
        let (extractor, navigation, readiness): (PageFn<ExtractionResult>, Vec<PageFn<StepResult>>, Option<PageFn<bool>>) =
            match config.kind {
                SourceKind::ReportGrid => (extract_report_grid, Vec::new(), Some(report_ready)),
                SourceKind::Tickets => (
                    extract_tickets,
                    vec![click_lists_tab, click_tickets_sidebar],
                    Some(tickets_table_ready),
                ),
                SourceKind::Calendar => (extract_calendar, Vec::new(), None),
            };
        Self {
            config,
            extractor,
            navigation,
            readiness,
        }
    }

    pub fn kind(&self) -> SourceKind {
        self.config.kind
    }
}

/// Where a source's import currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportState {
    Idle,
    TabOpened,
    Navigating { step: usize },
    ReadinessPoll,
    Extracting { attempt: u32 },
    Done,
}

impl fmt::Display for ImportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportState::Idle => f.write_str("idle"),
            ImportState::TabOpened => f.write_str("tab-opened"),
            ImportState::Navigating { step } => write!(f, "navigating(step {})", step + 1),
            ImportState::ReadinessPoll => f.write_str("readiness-poll"),
            ImportState::Extracting { attempt } => write!(f, "extracting(attempt {})", attempt),
            ImportState::Done => f.write_str("done"),
        }
    }
}

/// Tracks and logs state transitions for one source.
struct Tracker {
    source: SourceKind,
    state: ImportState,
}

impl Tracker {
    fn new(source: SourceKind) -> Self {
        Self {
            source,
            state: ImportState::Idle,
        }
    }

    fn enter(&mut self, next: ImportState) {
        log::debug!("[{}] {} -> {}", self.source, self.state, next);
        self.state = next;
    }

    fn finish(mut self, outcome: SourceOutcome) -> SourceResult {
        self.enter(ImportState::Done);
        log::debug!("[{}] finished with status {}", self.source, outcome.status());
        SourceResult::new(self.source, outcome)
    }
}

/// A navigation step that never clicked.
#[derive(Debug, Clone, PartialEq)]
struct NavigationFailure {
    step: usize,
    error: String,
}

/// Runs sources against a page host.
#[derive(Debug, Clone)]
pub struct ImportOrchestrator {
    import: ImportConfig,
    aggregator: FrameAggregator,
}

impl ImportOrchestrator {
    pub fn new(config: &Config) -> Self {
        Self {
            import: config.import.clone(),
            aggregator: FrameAggregator::new(&config.aggregator),
        }
    }

    /// Import one source to a terminal outcome. Never fails: problems become
    /// an error outcome.
    pub async fn run<H>(&self, host: &H, plan: &SourcePlan) -> SourceResult
    where
        H: PageHost + ?Sized,
    {
        let source = plan.kind();
        let mut tracker = Tracker::new(source);

        let tab = match host.ensure_tab(&plan.config.url_prefix, &plan.config.url).await {
            Ok(tab) => tab,
            Err(e) => {
                log::warn!("[{}] could not open tab: {}", source, e);
                return tracker.finish(SourceOutcome::error(
                    ImportErrorKind::HostUnavailable,
                    format!("Could not open tab: {}", e),
                ));
            }
        };
        tracker.enter(ImportState::TabOpened);
        sleep(plan.config.settle_delay()).await;

        let nav_failure = self.navigate(host, &tab, plan, &mut tracker).await;

        if let Some(readiness) = plan.readiness {
            tracker.enter(ImportState::ReadinessPoll);
            if !self.poll_ready(host, &tab, readiness, plan.config.all_frames).await {
                log::warn!(
                    "[{}] not ready after {}s",
                    source,
                    self.import.readiness_timeout().as_secs()
                );
                let diag = json!({ "readinessTimeout": true, "source": source.as_str() });
                if let Some(failure) = nav_failure {
                    return tracker.finish(
                        SourceOutcome::error(
                            ImportErrorKind::NavigationFailed,
                            format!(
                                "Navigation step {} failed ({}) and the page did not load within timeout",
                                failure.step + 1,
                                failure.error
                            ),
                        )
                        .with_diag(diag),
                    );
                }
                if plan.config.fail_on_readiness_timeout {
                    return tracker.finish(
                        SourceOutcome::error(
                            ImportErrorKind::NotReadyTimeout,
                            format!(
                                "{} data did not load within timeout (navigation steps may have failed)",
                                source
                            ),
                        )
                        .with_diag(diag),
                    );
                }
            }
        }

        let outcome = self.extract(host, &tab, plan, &mut tracker).await;
        tracker.finish(outcome)
    }

    /// Run each navigation step with retries. Stops at the first step that
    /// never clicks.
    async fn navigate<H>(
        &self,
        host: &H,
        tab: &TabHandle,
        plan: &SourcePlan,
        tracker: &mut Tracker,
    ) -> Option<NavigationFailure>
    where
        H: PageHost + ?Sized,
    {
        let source = plan.kind();
        for (index, step) in plan.navigation.iter().enumerate() {
            tracker.enter(ImportState::Navigating { step: index });

            let mut last_error = String::from("step never ran");
            let mut clicked = false;
            for attempt in 1..=self.import.nav_attempts {
                match self.try_step(host, tab, *step).await {
                    Ok(method) => {
                        log::debug!("[{}] step {} clicked via {}", source, index + 1, method);
                        clicked = true;
                        break;
                    }
                    Err(error) => {
                        log::warn!(
                            "[{}] step {} attempt {}/{} failed: {}",
                            source,
                            index + 1,
                            attempt,
                            self.import.nav_attempts,
                            error
                        );
                        last_error = error;
                    }
                }
                if attempt < self.import.nav_attempts {
                    sleep(self.import.nav_backoff(attempt)).await;
                }
            }

            if !clicked {
                log::warn!("[{}] navigation step {} failed", source, index + 1);
                return Some(NavigationFailure {
                    step: index,
                    error: last_error,
                });
            }
            sleep(plan.config.step_delay(index)).await;
        }
        None
    }

    /// One attempt at a step: the first frame that resolved a target wins
    /// and the host dispatches its click.
    async fn try_step<H>(
        &self,
        host: &H,
        tab: &TabHandle,
        step: PageFn<StepResult>,
    ) -> std::result::Result<String, String>
    where
        H: PageHost + ?Sized,
    {
        let results = execute(host, tab, step, true)
            .await
            .map_err(|e| e.to_string())?;

        let mut errors = Vec::new();
        for result in results {
            let StepResult {
                clicked,
                method,
                target,
                error,
                ..
            } = result.value;
            match (clicked, target) {
                (true, Some(target)) => {
                    host.click(tab, &result.frame_url, &target)
                        .await
                        .map_err(|e| e.to_string())?;
                    return Ok(method);
                }
                _ => errors.extend(error),
            }
        }
        errors.dedup();
        Err(if errors.is_empty() {
            "no frame found a target".to_string()
        } else {
            errors.join(" | ")
        })
    }

    /// Poll `readiness` until some frame answers true or the timeout passes.
    async fn poll_ready<H>(
        &self,
        host: &H,
        tab: &TabHandle,
        readiness: PageFn<bool>,
        all_frames: bool,
    ) -> bool
    where
        H: PageHost + ?Sized,
    {
        let deadline = Instant::now() + self.import.readiness_timeout();
        loop {
            match execute(host, tab, readiness, all_frames).await {
                Ok(results) if results.iter().any(|r| r.value) => return true,
                Ok(_) => {}
                Err(e) => log::debug!("readiness check failed: {}", e),
            }
            if Instant::now() >= deadline {
                return false;
            }
            sleep(self.import.poll_interval()).await;
        }
    }

    /// The extraction retry loop.
    async fn extract<H>(
        &self,
        host: &H,
        tab: &TabHandle,
        plan: &SourcePlan,
        tracker: &mut Tracker,
    ) -> SourceOutcome
    where
        H: PageHost + ?Sized,
    {
        let source = plan.kind();
        let max = self.import.max_attempts.max(1);
        let mut outcome = SourceOutcome::error(ImportErrorKind::NoDataFound, "Timed out waiting for data");

        for attempt in 1..=max {
            tracker.enter(ImportState::Extracting { attempt });

            outcome = match execute(host, tab, plan.extractor, plan.config.all_frames).await {
                Err(e) => {
                    log::warn!("[{}] attempt {}/{}: {}", source, attempt, max, e);
                    SourceOutcome::error(ImportErrorKind::HostUnavailable, e.to_string())
                }
                Ok(results) => match self.aggregator.select(results) {
                    Aggregated::Data { frame_url, records } => {
                        log::info!("[{}] {} records from {}", source, records.len(), frame_url);
                        return SourceOutcome::Success { data: records };
                    }
                    Aggregated::NeedsLogin { frame_url } => {
                        log::warn!("[{}] login required at {}", source, frame_url);
                        if let Err(e) = host.focus_tab(tab).await {
                            log::warn!("[{}] could not focus tab: {}", source, e);
                        }
                        SourceOutcome::NeedsLogin
                    }
                    Aggregated::Empty {
                        frames,
                        errors,
                        diag,
                    } => {
                        let message = Aggregated::empty_message(frames, &errors);
                        log::debug!("[{}] attempt {}/{}: {}", source, attempt, max, message);
                        let kind = if errors.is_empty() {
                            ImportErrorKind::NoDataFound
                        } else {
                            ImportErrorKind::ExtractionException
                        };
                        SourceOutcome::error(kind, message).with_diag(diag)
                    }
                },
            };

            if attempt < max {
                sleep(self.import.retry_delay()).await;
            }
        }

        if let SourceOutcome::Error { error, .. } = &outcome {
            log::warn!("[{}] giving up after {} attempts: {}", source, max, error);
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ClickTarget;
    use crate::page::{SnapshotFrame, SnapshotHost, SnapshotPage};

    const GAMEPLAN: &str = "https://acme.lightning.force.com/lightning/n/project_cloud__Gameplan";
    const VF: &str = "https://acme--project-cloud.vf.force.com/apex/Gameplan";
    const REPORT: &str = "https://acme.lightning.force.com/lightning/r/Report/00O1/view";
    const CALENDAR: &str = "https://outlook.office.com/calendar/view/week";

    const TICKET_TABLE: &str = r#"<cc-sobject-table><table><tbody><tr>
        <td></td><td></td><td><span title="2/11/2026">x</span></td>
        <td><div title="Design Revisions 1">Design Revisions 1</div></td>
        <td><a href="/p">Acme | Redesign</a></td><td>1 hour</td>
        </tr></tbody></table></cc-sobject-table>"#;

    fn config() -> Config {
        let mut config = Config::default();
        config.import.max_attempts = 3;
        config
    }

    fn plan(config: &Config, kind: SourceKind) -> SourcePlan {
        SourcePlan::for_source(config.source(kind).cloned().unwrap())
    }

    fn status(result: &SourceResult) -> Option<ImportErrorKind> {
        match &result.outcome {
            SourceOutcome::Error { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn two_step_navigation_reaches_tickets() {
        let lists_html = r#"<ul><li class="slds-nav-vertical__item"><a href="/t">Tickets</a></li></ul>"#;
        let page = SnapshotPage::new(GAMEPLAN)
            .frame(SnapshotFrame::new(GAMEPLAN, "<div>shell</div>"))
            .frame(SnapshotFrame::new(
                VF,
                r#"<a class="slds-tabs_default__link" href="/lists">Lists</a>"#,
            ))
            .on_click(
                VF,
                ClickTarget::new(r#"a.slds-tabs_default__link[href*="lists"]"#, 0),
                VF,
                lists_html,
            )
            .on_click(VF, ClickTarget::new(r#"a, button, [role="button"]"#, 0), VF, TICKET_TABLE);
        let host = SnapshotHost::new(vec![page]);
        let config = config();

        let result = ImportOrchestrator::new(&config)
            .run(&host, &plan(&config, SourceKind::Tickets))
            .await;

        assert!(result.is_success(), "{:?}", result);
        assert_eq!(result.data().len(), 1);
        assert_eq!(host.clicks().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_navigation_and_readiness_timeout_is_error() {
        let page = SnapshotPage::new(GAMEPLAN)
            .frame(SnapshotFrame::new(GAMEPLAN, "<div>Loading app</div>"));
        let host = SnapshotHost::new(vec![page]);
        let config = config();

        let started = Instant::now();
        let result = ImportOrchestrator::new(&config)
            .run(&host, &plan(&config, SourceKind::Tickets))
            .await;

        assert_eq!(status(&result), Some(ImportErrorKind::NavigationFailed));
        assert!(host.clicks().is_empty());
        // settle + two backoffs + readiness window, all on the paused clock
        assert!(started.elapsed() >= config.import.readiness_timeout());
    }

    #[tokio::test(start_paused = true)]
    async fn readiness_timeout_is_advisory_for_report() {
        let table = r#"<table>
            <tr><th>Project Name</th><th>End Date</th><th>Task Name</th></tr>
            <tr><td>Acme | Redesign</td><td>2/10</td><td>Design Setup</td></tr>
            <tr><td>Bolt | Redesign</td><td>2/11</td><td>Website Launch</td></tr></table>"#;
        let page = SnapshotPage::new(REPORT).frame(SnapshotFrame::new(REPORT, table));
        let host = SnapshotHost::new(vec![page]);
        let config = config();

        let result = ImportOrchestrator::new(&config)
            .run(&host, &plan(&config, SourceKind::ReportGrid))
            .await;
        assert!(result.is_success(), "{:?}", result);
    }

    #[tokio::test(start_paused = true)]
    async fn login_wall_focuses_tab_each_attempt() {
        let page = SnapshotPage::new(CALENDAR)
            .frame(SnapshotFrame::new(CALENDAR, r#"<input name="email">"#));
        let host = SnapshotHost::new(vec![page]);
        let config = config();

        let result = ImportOrchestrator::new(&config)
            .run(&host, &plan(&config, SourceKind::Calendar))
            .await;

        assert_eq!(result.outcome, SourceOutcome::NeedsLogin);
        let tab = host.ensure_tab(CALENDAR, CALENDAR).await.unwrap();
        assert_eq!(host.focus_count(&tab), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_page_succeeds_on_later_attempt() {
        let event = r#"<div data-calitemid="1" aria-label="Weekly Sync, February 10, 2026, 10:00 AM, 10:30 AM, Jane Doe"></div>"#;
        let frame = SnapshotFrame::sequence(
            CALENDAR,
            vec!["<div>spinner</div>".to_string(), event.to_string()],
        );
        let host = SnapshotHost::new(vec![SnapshotPage::new(CALENDAR).frame(frame)]);
        let config = config();

        let result = ImportOrchestrator::new(&config)
            .run(&host, &plan(&config, SourceKind::Calendar))
            .await;
        assert_eq!(result.data().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_page_is_host_unavailable() {
        let host = SnapshotHost::new(Vec::new());
        let config = config();
        let result = ImportOrchestrator::new(&config)
            .run(&host, &plan(&config, SourceKind::Calendar))
            .await;
        assert_eq!(status(&result), Some(ImportErrorKind::HostUnavailable));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_page_reports_no_data() {
        let page = SnapshotPage::new(CALENDAR).frame(SnapshotFrame::new(CALENDAR, "<p>No events</p>"));
        let host = SnapshotHost::new(vec![page]);
        let config = config();
        let result = ImportOrchestrator::new(&config)
            .run(&host, &plan(&config, SourceKind::Calendar))
            .await;
        assert_eq!(status(&result), Some(ImportErrorKind::NoDataFound));
        assert!(result.describe().contains("checked 1 frames"));
    }
}
