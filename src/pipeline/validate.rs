// src/pipeline/validate.rs

use std::path::Path;

use crate::error::Result;
use crate::models::Config;
use crate::utils::log;

/// Load and sanity-check a configuration file.
pub fn run_validate(path: &Path) -> Result<Config> {
    log::header("Validating configuration");

    let config = Config::load(path).and_then(|config| {
        config.validate()?;
        Ok(config)
    });

    match config {
        Ok(config) => {
            ::log::info!("Configuration OK: {}", path.display());
            log::sub_item(&format!(
                "Attempts: {} every {}ms, readiness window {}ms",
                config.import.max_attempts,
                config.import.retry_delay_ms,
                config.import.readiness_timeout_ms
            ));
            log::sub_item(&format!("Outer timeout: {}s", config.import.outer_timeout_secs));
            for source in &config.sources {
                log::sub_item(&format!("{}: {}", source.kind, source.url));
            }
            log::sub_item(&format!(
                "Working window: {}–{}, capacity {}",
                config.schedule.work_start_hour,
                config.schedule.work_end_hour,
                log::format_minutes(i64::from(config.schedule.weekly_capacity_minutes))
            ));
            Ok(config)
        }
        Err(e) => {
            ::log::error!("Configuration invalid: {}", e);
            Err(e)
        }
    }
}
