// src/page/host.rs

//! Tab lifecycle and frame access.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::ClickTarget;

/// Opaque reference to an open page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TabHandle {
    pub id: u64,
    pub url: String,
}

/// The serialized state of one frame at the moment it was read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSnapshot {
    pub url: String,
    pub html: String,
}

impl FrameSnapshot {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
        }
    }
}

/// Something that can open pages, expose their frames and act on them.
///
/// Implementations never run page functions themselves: they hand back
/// frame snapshots and [`crate::page::execute`] evaluates the function
/// against each one.
#[async_trait]
pub trait PageHost: Send + Sync {
    /// Reuse a tab whose URL starts with `url_prefix`, or open `fallback_url`.
    async fn ensure_tab(&self, url_prefix: &str, fallback_url: &str) -> Result<TabHandle>;

    /// Bring a tab to the foreground so a human can interact with it.
    async fn focus_tab(&self, tab: &TabHandle) -> Result<()>;

    /// Current state of the top document, plus nested frames when `all_frames`.
    async fn snapshot(&self, tab: &TabHandle, all_frames: bool) -> Result<Vec<FrameSnapshot>>;

    /// Activate an element inside one of the tab's frames.
    async fn click(&self, tab: &TabHandle, frame_url: &str, target: &ClickTarget) -> Result<()>;
}
