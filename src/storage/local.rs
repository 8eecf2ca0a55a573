//! Local filesystem storage implementation.
//!
//! Every write goes to a temporary file first and is renamed into place, so
//! a reader never sees a half-written document.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{ImportReport, WeeklyPlan};
use crate::storage::{PlanStorage, Stored, WriteMetadata};

const REPORT_KEY: &str = "import.json";
const PLAN_KEY: &str = "plan.json";

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Write JSON data.
    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read JSON data.
    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Key for one week's plan.
    fn week_key(week_start: NaiveDate) -> String {
        format!("weeks/{}.json", week_start.format("%Y-%m-%d"))
    }
}

#[async_trait]
impl PlanStorage for LocalStorage {
    async fn write_report(&self, report: &ImportReport) -> Result<WriteMetadata> {
        let stored = Stored::new(report);
        self.write_json(REPORT_KEY, &stored).await?;
        log::info!("Import report with {} source(s) written to {}", report.len(), REPORT_KEY);
        Ok(WriteMetadata {
            locations: vec![REPORT_KEY.to_string()],
            timestamp: stored.saved_at,
        })
    }

    async fn load_report(&self) -> Result<Option<Stored<ImportReport>>> {
        let stored = self.read_json(REPORT_KEY).await?;
        if stored.is_none() {
            log::warn!("No {} found", REPORT_KEY);
        }
        Ok(stored)
    }

    async fn write_plan(&self, plan: &WeeklyPlan) -> Result<WriteMetadata> {
        let stored = Stored {
            saved_at: Utc::now(),
            content: plan,
        };
        let week_key = Self::week_key(plan.week_start);
        self.write_json(&week_key, &stored).await?;
        self.write_json(PLAN_KEY, &stored).await?;
        log::info!("Plan with {} items written to {}", plan.items.len(), week_key);
        Ok(WriteMetadata {
            locations: vec![week_key, PLAN_KEY.to_string()],
            timestamp: stored.saved_at,
        })
    }

    async fn load_plan(&self, week_start: Option<NaiveDate>) -> Result<Option<Stored<WeeklyPlan>>> {
        let key = match week_start {
            Some(date) => Self::week_key(date),
            None => PLAN_KEY.to_string(),
        };
        let stored = self.read_json(&key).await?;
        if stored.is_none() {
            log::warn!("No plan found at {}", key);
        }
        Ok(stored)
    }
}
