//! Application configuration structures.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::SourceKind;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Retry, polling and timeout policy
    #[serde(default)]
    pub import: ImportConfig,

    /// Page locations and per-source timing
    #[serde(default = "defaults::sources")]
    pub sources: Vec<SourceConfig>,

    /// Cross-frame result selection
    #[serde(default)]
    pub aggregator: AggregatorConfig,

    /// Working window and default blocks
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Source settings for a kind, if configured.
    pub fn source(&self, kind: SourceKind) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.kind == kind)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.import.max_attempts == 0 {
            return Err(AppError::validation("import.max_attempts must be > 0"));
        }
        if self.import.nav_attempts == 0 {
            return Err(AppError::validation("import.nav_attempts must be > 0"));
        }
        if self.import.poll_interval_ms == 0 {
            return Err(AppError::validation("import.poll_interval_ms must be > 0"));
        }
        if self.import.readiness_timeout_ms < self.import.poll_interval_ms {
            return Err(AppError::validation(
                "import.readiness_timeout_ms must be >= import.poll_interval_ms",
            ));
        }
        if self.import.outer_timeout_secs == 0 {
            return Err(AppError::validation("import.outer_timeout_secs must be > 0"));
        }
        if self.sources.is_empty() {
            return Err(AppError::validation("No sources defined"));
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            if !seen.insert(source.kind) {
                return Err(AppError::validation(format!(
                    "source '{}' is defined more than once",
                    source.kind
                )));
            }
            if !source.url.starts_with(&source.url_prefix) {
                return Err(AppError::validation(format!(
                    "sources.{}: url must start with url_prefix",
                    source.kind
                )));
            }
        }

        self.schedule.validate()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            import: ImportConfig::default(),
            sources: defaults::sources(),
            aggregator: AggregatorConfig::default(),
            schedule: ScheduleConfig::default(),
        }
    }
}

/// Retry and polling behavior shared by every source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Extraction attempts per source
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Delay between extraction attempts in milliseconds
    #[serde(default = "defaults::retry_delay")]
    pub retry_delay_ms: u64,

    /// Readiness poll interval in milliseconds
    #[serde(default = "defaults::poll_interval")]
    pub poll_interval_ms: u64,

    /// Maximum readiness wait in milliseconds
    #[serde(default = "defaults::readiness_timeout")]
    pub readiness_timeout_ms: u64,

    /// Attempts per navigation step
    #[serde(default = "defaults::nav_attempts")]
    pub nav_attempts: u32,

    /// Base delay between navigation attempts in milliseconds
    #[serde(default = "defaults::nav_retry_delay")]
    pub nav_retry_delay_ms: u64,

    /// Deadline for the whole import in seconds
    #[serde(default = "defaults::outer_timeout")]
    pub outer_timeout_secs: u64,
}

impl ImportConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn readiness_timeout(&self) -> Duration {
        Duration::from_millis(self.readiness_timeout_ms)
    }

    /// Backoff before navigation retry number `attempt` (1-based).
    pub fn nav_backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.nav_retry_delay_ms * u64::from(attempt))
    }

    pub fn outer_timeout(&self) -> Duration {
        Duration::from_secs(self.outer_timeout_secs)
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::max_attempts(),
            retry_delay_ms: defaults::retry_delay(),
            poll_interval_ms: defaults::poll_interval(),
            readiness_timeout_ms: defaults::readiness_timeout(),
            nav_attempts: defaults::nav_attempts(),
            nav_retry_delay_ms: defaults::nav_retry_delay(),
            outer_timeout_secs: defaults::outer_timeout(),
        }
    }
}

/// Where a source lives and how patient to be with it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub kind: SourceKind,

    /// An open tab whose URL starts with this prefix is reused
    pub url_prefix: String,

    /// URL opened when no tab matches
    pub url: String,

    /// Run page functions in every frame, not just the top document
    #[serde(default = "defaults::all_frames")]
    pub all_frames: bool,

    /// Wait after opening the tab in milliseconds
    #[serde(default = "defaults::settle_delay")]
    pub settle_delay_ms: u64,

    /// Wait after the first navigation click in milliseconds
    #[serde(default = "defaults::first_step_delay")]
    pub first_step_delay_ms: u64,

    /// Wait after later navigation clicks in milliseconds
    #[serde(default = "defaults::step_delay")]
    pub step_delay_ms: u64,

    /// Treat a readiness timeout as fatal
    #[serde(default)]
    pub fail_on_readiness_timeout: bool,
}

impl SourceConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Delay after a successful click on navigation step `index`.
    pub fn step_delay(&self, index: usize) -> Duration {
        if index == 0 {
            Duration::from_millis(self.first_step_delay_ms)
        } else {
            Duration::from_millis(self.step_delay_ms)
        }
    }
}

/// Frame ranking and garbage screening.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Frame URL substrings identifying the applications' own frames
    #[serde(default = "defaults::preferred_frame_patterns")]
    pub preferred_frame_patterns: Vec<String>,

    /// Navigation chrome phrases; all must appear for a record to be dropped
    #[serde(default = "defaults::garbage_phrases")]
    pub garbage_phrases: Vec<String>,

    /// Records at least this long are never treated as garbage
    #[serde(default = "defaults::garbage_max_len")]
    pub garbage_max_len: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            preferred_frame_patterns: defaults::preferred_frame_patterns(),
            garbage_phrases: defaults::garbage_phrases(),
            garbage_max_len: defaults::garbage_max_len(),
        }
    }
}

/// Working window, granularity and default blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "defaults::work_start_hour")]
    pub work_start_hour: f64,

    #[serde(default = "defaults::work_end_hour")]
    pub work_end_hour: f64,

    #[serde(default = "defaults::weekly_capacity")]
    pub weekly_capacity_minutes: u32,

    #[serde(default = "defaults::granularity")]
    pub granularity_minutes: u32,

    #[serde(default = "defaults::lunch_hour")]
    pub lunch_hour: f64,

    #[serde(default = "defaults::admin_hour")]
    pub admin_hour: f64,

    /// Monday of the planned week; defaults to the current week
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub week_start: Option<NaiveDate>,
}

impl ScheduleConfig {
    fn validate(&self) -> Result<()> {
        if self.work_start_hour >= self.work_end_hour {
            return Err(AppError::validation(
                "schedule.work_start_hour must be before schedule.work_end_hour",
            ));
        }
        if self.granularity_minutes == 0 {
            return Err(AppError::validation("schedule.granularity_minutes must be > 0"));
        }
        if self.weekly_capacity_minutes == 0 {
            return Err(AppError::validation(
                "schedule.weekly_capacity_minutes must be > 0",
            ));
        }
        for (name, hour) in [("lunch_hour", self.lunch_hour), ("admin_hour", self.admin_hour)] {
            if hour < self.work_start_hour || hour >= self.work_end_hour {
                return Err(AppError::validation(format!(
                    "schedule.{name} must fall inside the working window"
                )));
            }
        }
        if let Some(start) = self.week_start {
            if start.weekday() != chrono::Weekday::Mon {
                return Err(AppError::validation("schedule.week_start must be a Monday"));
            }
        }
        Ok(())
    }

    /// Monday of the planned week.
    pub fn week_monday(&self) -> NaiveDate {
        self.week_start.unwrap_or_else(|| {
            let today = Local::now().date_naive();
            today - chrono::Days::new(u64::from(today.weekday().num_days_from_monday()))
        })
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            work_start_hour: defaults::work_start_hour(),
            work_end_hour: defaults::work_end_hour(),
            weekly_capacity_minutes: defaults::weekly_capacity(),
            granularity_minutes: defaults::granularity(),
            lunch_hour: defaults::lunch_hour(),
            admin_hour: defaults::admin_hour(),
            week_start: None,
        }
    }
}

mod defaults {
    use super::SourceConfig;
    use crate::models::SourceKind;

    // Import defaults
    pub fn max_attempts() -> u32 {
        12
    }
    pub fn retry_delay() -> u64 {
        5_000
    }
    pub fn poll_interval() -> u64 {
        1_000
    }
    pub fn readiness_timeout() -> u64 {
        30_000
    }
    pub fn nav_attempts() -> u32 {
        3
    }
    pub fn nav_retry_delay() -> u64 {
        3_000
    }
    pub fn outer_timeout() -> u64 {
        300
    }

    // Source defaults
    pub fn all_frames() -> bool {
        true
    }
    pub fn settle_delay() -> u64 {
        8_000
    }
    pub fn first_step_delay() -> u64 {
        4_000
    }
    pub fn step_delay() -> u64 {
        2_000
    }

    pub fn sources() -> Vec<SourceConfig> {
        vec![
            SourceConfig {
                kind: SourceKind::ReportGrid,
                url_prefix: "https://acme.lightning.force.com/lightning/r/Report/".to_string(),
                url: "https://acme.lightning.force.com/lightning/r/Report/00O000000000001/view"
                    .to_string(),
                all_frames: true,
                settle_delay_ms: 8_000,
                first_step_delay_ms: first_step_delay(),
                step_delay_ms: step_delay(),
                fail_on_readiness_timeout: false,
            },
            SourceConfig {
                kind: SourceKind::Tickets,
                url_prefix: "https://acme.lightning.force.com/lightning/n/project_cloud"
                    .to_string(),
                url: "https://acme.lightning.force.com/lightning/n/project_cloud__Gameplan"
                    .to_string(),
                all_frames: true,
                settle_delay_ms: 8_000,
                first_step_delay_ms: first_step_delay(),
                step_delay_ms: step_delay(),
                fail_on_readiness_timeout: true,
            },
            SourceConfig {
                kind: SourceKind::Calendar,
                url_prefix: "https://outlook.office".to_string(),
                url: "https://outlook.office.com/calendar/view/week".to_string(),
                all_frames: false,
                settle_delay_ms: 3_000,
                first_step_delay_ms: first_step_delay(),
                step_delay_ms: step_delay(),
                fail_on_readiness_timeout: false,
            },
        ]
    }

    // Aggregator defaults
    pub fn preferred_frame_patterns() -> Vec<String> {
        vec!["vf.force.com".into(), "project_cloud".into()]
    }
    pub fn garbage_phrases() -> Vec<String> {
        vec!["dashboards".into(), "list".into()]
    }
    pub fn garbage_max_len() -> usize {
        50
    }

    // Schedule defaults
    pub fn work_start_hour() -> f64 {
        8.0
    }
    pub fn work_end_hour() -> f64 {
        17.0
    }
    pub fn weekly_capacity() -> u32 {
        2_400
    }
    pub fn granularity() -> u32 {
        30
    }
    pub fn lunch_hour() -> f64 {
        12.0
    }
    pub fn admin_hour() -> f64 {
        16.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_attempts() {
        let mut config = Config::default();
        config.import.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_duplicate_sources() {
        let mut config = Config::default();
        let first = config.sources[0].clone();
        config.sources.push(first);
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_url_outside_prefix() {
        let mut config = Config::default();
        config.sources[0].url = "https://elsewhere.example.com/report".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_week_start_not_monday() {
        let mut config = Config::default();
        config.schedule.week_start = NaiveDate::from_ymd_opt(2026, 2, 11);
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [import]
            max_attempts = 3

            [schedule]
            week_start = "2026-02-09"
            "#,
        )
        .unwrap();
        assert_eq!(config.import.max_attempts, 3);
        assert_eq!(config.import.retry_delay_ms, 5_000);
        assert_eq!(config.sources.len(), 3);
        assert_eq!(
            config.schedule.week_monday(),
            NaiveDate::from_ymd_opt(2026, 2, 9).unwrap()
        );
    }

    #[test]
    fn first_navigation_step_waits_longer() {
        let source = Config::default().source(SourceKind::Tickets).cloned().unwrap();
        assert!(source.step_delay(0) > source.step_delay(1));
        assert!(source.fail_on_readiness_timeout);
    }
}
