// src/page/snapshot.rs

//! In-memory page host backed by captured HTML.
//!
//! Each frame plays back a sequence of HTML states, one per snapshot call,
//! holding on the last. Click rules swap a frame's content, which is enough
//! to replay multi-step navigation and slow-rendering pages offline.
//!
//! ## Manifest Layout
//!
//! ```text
//! {dir}/
//! ├── pages.toml
//! └── *.html
//! ```
//!
//! ```toml
//! [[pages]]
//! url = "https://acme.lightning.force.com/lightning/n/project_cloud__Gameplan"
//!
//! [[pages.frames]]
//! url = "https://acme--project-cloud.vf.force.com/apex/Gameplan"
//! files = ["gameplan.html"]
//!
//! [[pages.clicks]]
//! frame = "https://acme--project-cloud.vf.force.com/apex/Gameplan"
//! selector = "a.slds-tabs_default__link[href*=\"lists\"]"
//! file = "lists.html"
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::models::ClickTarget;
use crate::page::{Frame, FrameSnapshot, PageHost, TabHandle};
use crate::utils::url_matches_prefix;

/// One frame and the HTML it shows on successive snapshots.
#[derive(Debug, Clone)]
pub struct SnapshotFrame {
    url: String,
    states: Vec<String>,
    served: usize,
}

impl SnapshotFrame {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self::sequence(url, vec![html.into()])
    }

    /// A frame whose content changes on every snapshot until the last state.
    pub fn sequence(url: impl Into<String>, states: Vec<String>) -> Self {
        Self {
            url: url.into(),
            states,
            served: 0,
        }
    }

    fn next_html(&mut self) -> String {
        let index = self.served.min(self.states.len().saturating_sub(1));
        self.served += 1;
        self.states.get(index).cloned().unwrap_or_default()
    }

    /// The state most recently handed out.
    fn shown_html(&self) -> &str {
        let index = self
            .served
            .saturating_sub(1)
            .min(self.states.len().saturating_sub(1));
        self.states.get(index).map(String::as_str).unwrap_or_default()
    }

    fn replace(&mut self, html: String) {
        self.states = vec![html];
        self.served = 0;
    }
}

#[derive(Debug, Clone)]
struct ClickRule {
    frame_url: String,
    target: ClickTarget,
    changes_frame: String,
    html: String,
}

/// A page reachable by URL, top frame first.
#[derive(Debug, Clone)]
pub struct SnapshotPage {
    url: String,
    frames: Vec<SnapshotFrame>,
    rules: Vec<ClickRule>,
}

impl SnapshotPage {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            frames: Vec::new(),
            rules: Vec::new(),
        }
    }

    pub fn frame(mut self, frame: SnapshotFrame) -> Self {
        self.frames.push(frame);
        self
    }

    /// After `target` is clicked in `frame_url`, `changes_frame` shows `html`.
    pub fn on_click(
        mut self,
        frame_url: impl Into<String>,
        target: ClickTarget,
        changes_frame: impl Into<String>,
        html: impl Into<String>,
    ) -> Self {
        self.rules.push(ClickRule {
            frame_url: frame_url.into(),
            target,
            changes_frame: changes_frame.into(),
            html: html.into(),
        });
        self
    }
}

#[derive(Debug, Default)]
struct HostState {
    pages: Vec<SnapshotPage>,
    tabs: HashMap<u64, usize>,
    next_tab: u64,
    focused: Vec<u64>,
    clicks: Vec<(u64, String, ClickTarget)>,
}

/// A [`PageHost`] over captured pages.
#[derive(Debug, Default)]
pub struct SnapshotHost {
    state: Mutex<HostState>,
}

impl SnapshotHost {
    pub fn new(pages: Vec<SnapshotPage>) -> Self {
        Self {
            state: Mutex::new(HostState {
                pages,
                next_tab: 1,
                ..HostState::default()
            }),
        }
    }

    /// Load pages from a directory holding `pages.toml` and HTML files.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let manifest: Manifest = toml::from_str(&fs::read_to_string(dir.join("pages.toml"))?)?;
        let read = |file: &str| -> Result<String> { Ok(fs::read_to_string(dir.join(file))?) };

        let mut pages = Vec::with_capacity(manifest.pages.len());
        for entry in manifest.pages {
            let mut page = SnapshotPage::new(&entry.url);
            for frame in entry.frames {
                if frame.files.is_empty() {
                    return Err(AppError::config(format!(
                        "frame {} in {} lists no files",
                        frame.url, entry.url
                    )));
                }
                let states = frame
                    .files
                    .iter()
                    .map(|file| read(file))
                    .collect::<Result<Vec<_>>>()?;
                page = page.frame(SnapshotFrame::sequence(frame.url, states));
            }
            for click in entry.clicks {
                let changes = click.target_frame.unwrap_or_else(|| click.frame.clone());
                let html = read(&click.file)?;
                page = page.on_click(
                    click.frame,
                    ClickTarget::new(click.selector, click.index),
                    changes,
                    html,
                );
            }
            pages.push(page);
        }

        log::debug!("Loaded {} snapshot pages from {:?}", pages.len(), dir);
        Ok(Self::new(pages))
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HostState>> {
        self.state
            .lock()
            .map_err(|_| AppError::host("snapshot host", "state lock poisoned"))
    }

    /// Number of times a tab was brought to the foreground.
    pub fn focus_count(&self, tab: &TabHandle) -> usize {
        self.lock()
            .map(|state| state.focused.iter().filter(|id| **id == tab.id).count())
            .unwrap_or(0)
    }

    /// Every click dispatched so far, in order.
    pub fn clicks(&self) -> Vec<ClickTarget> {
        self.lock()
            .map(|state| state.clicks.iter().map(|(_, _, t)| t.clone()).collect())
            .unwrap_or_default()
    }

    /// Number of tabs opened so far.
    pub fn open_tabs(&self) -> usize {
        self.lock().map(|state| state.tabs.len()).unwrap_or(0)
    }
}

impl HostState {
    fn page_mut(&mut self, tab: &TabHandle) -> Result<&mut SnapshotPage> {
        let index = *self
            .tabs
            .get(&tab.id)
            .ok_or_else(|| AppError::host(&tab.url, "tab is not open"))?;
        self.pages
            .get_mut(index)
            .ok_or_else(|| AppError::host(&tab.url, "tab page vanished"))
    }
}

#[async_trait]
impl PageHost for SnapshotHost {
    async fn ensure_tab(&self, url_prefix: &str, fallback_url: &str) -> Result<TabHandle> {
        let mut state = self.lock()?;

        let open = state.tabs.iter().find_map(|(id, index)| {
            let url = &state.pages[*index].url;
            url_matches_prefix(url, url_prefix).then(|| TabHandle {
                id: *id,
                url: url.clone(),
            })
        });
        if let Some(tab) = open {
            return Ok(tab);
        }

        let index = state
            .pages
            .iter()
            .position(|page| page.url == fallback_url)
            .or_else(|| {
                state
                    .pages
                    .iter()
                    .position(|page| url_matches_prefix(&page.url, url_prefix))
            })
            .ok_or_else(|| AppError::host(fallback_url, "no captured page for this URL"))?;

        let id = state.next_tab.max(1);
        state.next_tab = id + 1;
        state.tabs.insert(id, index);
        Ok(TabHandle {
            id,
            url: state.pages[index].url.clone(),
        })
    }

    async fn focus_tab(&self, tab: &TabHandle) -> Result<()> {
        let mut state = self.lock()?;
        state.page_mut(tab)?;
        state.focused.push(tab.id);
        Ok(())
    }

    async fn snapshot(&self, tab: &TabHandle, all_frames: bool) -> Result<Vec<FrameSnapshot>> {
        let mut state = self.lock()?;
        let page = state.page_mut(tab)?;
        let count = if all_frames { page.frames.len() } else { 1 };
        Ok(page
            .frames
            .iter_mut()
            .take(count)
            .map(|frame| FrameSnapshot::new(frame.url.clone(), frame.next_html()))
            .collect())
    }

    async fn click(&self, tab: &TabHandle, frame_url: &str, target: &ClickTarget) -> Result<()> {
        let mut state = self.lock()?;
        let page = state.page_mut(tab)?;

        let frame = page
            .frames
            .iter()
            .find(|frame| frame.url == frame_url)
            .ok_or_else(|| AppError::host(frame_url, "no such frame"))?;
        if Frame::parse(frame_url, frame.shown_html())
            .resolve(target)
            .is_none()
        {
            return Err(AppError::host(
                frame_url,
                format!("nothing matches {} #{}", target.selector, target.index),
            ));
        }

        let changes: Vec<(String, String)> = page
            .rules
            .iter()
            .filter(|rule| rule.frame_url == frame_url && rule.target == *target)
            .map(|rule| (rule.changes_frame.clone(), rule.html.clone()))
            .collect();
        for (changed_url, html) in changes {
            if let Some(frame) = page.frames.iter_mut().find(|f| f.url == changed_url) {
                frame.replace(html);
            }
        }

        state.clicks.push((tab.id, frame_url.to_string(), target.clone()));
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default)]
    pages: Vec<PageEntry>,
}

#[derive(Debug, Deserialize)]
struct PageEntry {
    url: String,
    #[serde(default)]
    frames: Vec<FrameEntry>,
    #[serde(default)]
    clicks: Vec<ClickEntry>,
}

#[derive(Debug, Deserialize)]
struct FrameEntry {
    url: String,
    files: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ClickEntry {
    frame: String,
    selector: String,
    #[serde(default)]
    index: usize,
    target_frame: Option<String>,
    file: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOP: &str = "https://app.example.com/home";

    fn host() -> SnapshotHost {
        SnapshotHost::new(vec![
            SnapshotPage::new(TOP)
                .frame(SnapshotFrame::sequence(
                    TOP,
                    vec![
                        "<p>loading</p>".to_string(),
                        r#"<a class="go" href="/next">Go</a>"#.to_string(),
                    ],
                ))
                .frame(SnapshotFrame::new("https://inner.example.com", "<p>inner</p>"))
                .on_click(
                    TOP,
                    ClickTarget::new("a.go", 0),
                    "https://inner.example.com",
                    "<p>after</p>",
                ),
        ])
    }

    #[tokio::test]
    async fn test_reuses_open_tab() {
        let host = host();
        let first = host.ensure_tab("https://app.example.com", TOP).await.unwrap();
        let second = host.ensure_tab("https://app.example.com", TOP).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(host.open_tabs(), 1);
        assert!(host.ensure_tab("https://other.example.com", "https://other.example.com/x").await.is_err());
    }

    #[tokio::test]
    async fn test_states_advance_and_clicks_swap_frames() {
        let host = host();
        let tab = host.ensure_tab("https://app.example.com", TOP).await.unwrap();

        let top_only = host.snapshot(&tab, false).await.unwrap();
        assert_eq!(top_only.len(), 1);
        assert!(top_only[0].html.contains("loading"));

        // the link is not rendered in the state shown so far
        assert!(host.click(&tab, TOP, &ClickTarget::new("a.go", 0)).await.is_err());

        let frames = host.snapshot(&tab, true).await.unwrap();
        assert_eq!(frames.len(), 2);
        assert!(frames[0].html.contains("Go"));

        host.click(&tab, TOP, &ClickTarget::new("a.go", 0)).await.unwrap();
        let frames = host.snapshot(&tab, true).await.unwrap();
        assert!(frames[1].html.contains("after"));
        assert_eq!(host.clicks().len(), 1);
    }

    #[test]
    fn test_from_dir_reads_manifest() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("pages.toml"),
            format!(
                "[[pages]]\nurl = \"{TOP}\"\n\n[[pages.frames]]\nurl = \"{TOP}\"\nfiles = [\"a.html\"]\n\n\
                 [[pages.clicks]]\nframe = \"{TOP}\"\nselector = \"a\"\nfile = \"b.html\"\n"
            ),
        )
        .unwrap();
        fs::write(dir.path().join("a.html"), "<a>x</a>").unwrap();
        fs::write(dir.path().join("b.html"), "<p>b</p>").unwrap();

        let host = SnapshotHost::from_dir(dir.path()).unwrap();
        let state = host.lock().unwrap();
        assert_eq!(state.pages.len(), 1);
        assert_eq!(state.pages[0].rules.len(), 1);
        assert_eq!(state.pages[0].rules[0].changes_frame, TOP);
    }
}
