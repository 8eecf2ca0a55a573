// src/page/http.rs

//! Live page host over plain HTTP.
//!
//! A tab is the document at its current URL. Frames are that document plus
//! the documents behind its `iframe[src]` elements, one level deep. Clicks
//! can only follow links: the tab navigates to the anchor's `href`.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{AppError, Result};
use crate::models::ClickTarget;
use crate::page::{Frame, FrameSnapshot, PageHost, TabHandle};
use crate::utils::{resolve, url_matches_prefix};

const DEFAULT_USER_AGENT: &str = concat!("weekplan/", env!("CARGO_PKG_VERSION"));

/// A [`PageHost`] that fetches pages with `reqwest`.
pub struct HttpHost {
    client: Client,
    tabs: Mutex<HashMap<u64, String>>,
    next_tab: AtomicU64,
}

impl HttpHost {
    /// Create a host with the given request timeout.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(DEFAULT_USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            tabs: Mutex::new(HashMap::new()),
            next_tab: AtomicU64::new(1),
        }
    }

    fn tabs(&self) -> Result<std::sync::MutexGuard<'_, HashMap<u64, String>>> {
        self.tabs
            .lock()
            .map_err(|_| AppError::host("http host", "tab table lock poisoned"))
    }

    fn current_url(&self, tab: &TabHandle) -> Result<String> {
        self.tabs()?
            .get(&tab.id)
            .cloned()
            .ok_or_else(|| AppError::host(&tab.url, "tab is not open"))
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }
}

/// Absolute URLs of the iframes embedded in a document.
fn iframe_sources(url: &str, html: &str) -> Vec<String> {
    let frame = Frame::parse(url, html);
    frame
        .select("iframe[src]")
        .unwrap_or_default()
        .into_iter()
        .filter_map(|el| el.value().attr("src"))
        .filter(|src| !src.trim().is_empty() && !src.starts_with("about:"))
        .filter_map(|src| resolve(url, src))
        .collect()
}

/// Absolute destination of a link click target.
fn link_destination(url: &str, html: &str, target: &ClickTarget) -> Result<String> {
    let frame = Frame::parse(url, html);
    let element = frame.resolve(target).ok_or_else(|| {
        AppError::host(url, format!("nothing matches {} #{}", target.selector, target.index))
    })?;
    let href = element
        .value()
        .attr("href")
        .or_else(|| {
            crate::page::closest(element, &crate::page::parse_selector("a[href]").ok()?)
                .and_then(|a| a.value().attr("href"))
        })
        .ok_or_else(|| AppError::host(url, "only links can be followed over HTTP"))?;
    resolve(url, href).ok_or_else(|| AppError::host(url, format!("bad link '{href}'")))
}

#[async_trait]
impl PageHost for HttpHost {
    async fn ensure_tab(&self, url_prefix: &str, fallback_url: &str) -> Result<TabHandle> {
        let mut tabs = self.tabs()?;
        if let Some((id, url)) = tabs
            .iter()
            .find(|(_, url)| url_matches_prefix(url, url_prefix))
        {
            return Ok(TabHandle {
                id: *id,
                url: url.clone(),
            });
        }

        let id = self.next_tab.fetch_add(1, Ordering::Relaxed);
        tabs.insert(id, fallback_url.to_string());
        log::debug!("Opened tab {} at {}", id, fallback_url);
        Ok(TabHandle {
            id,
            url: fallback_url.to_string(),
        })
    }

    async fn focus_tab(&self, tab: &TabHandle) -> Result<()> {
        let url = self.current_url(tab)?;
        log::info!("Sign in at {} then wait for the next attempt", url);
        Ok(())
    }

    async fn snapshot(&self, tab: &TabHandle, all_frames: bool) -> Result<Vec<FrameSnapshot>> {
        let url = self.current_url(tab)?;
        let html = self.fetch(&url).await?;

        let children = if all_frames {
            iframe_sources(&url, &html)
        } else {
            Vec::new()
        };

        let mut frames = vec![FrameSnapshot::new(&url, html)];
        for child in children {
            match self.fetch(&child).await {
                Ok(html) => frames.push(FrameSnapshot::new(child, html)),
                Err(e) => log::debug!("Skipping unreadable frame {}: {}", child, e),
            }
        }
        Ok(frames)
    }

    async fn click(&self, tab: &TabHandle, frame_url: &str, target: &ClickTarget) -> Result<()> {
        let html = self.fetch(frame_url).await?;
        let destination = link_destination(frame_url, &html, target)?;
        log::debug!("Tab {} following link to {}", tab.id, destination);
        self.tabs()?.insert(tab.id, destination);
        Ok(())
    }
}
