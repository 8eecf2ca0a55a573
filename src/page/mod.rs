// src/page/mod.rs

//! The page-execution primitive.
//!
//! A page function is a plain `fn(&Frame) -> T`. Function pointers cannot
//! capture anything, so every extractor, readiness check and navigation step
//! is self-contained by construction. Each frame snapshot is parsed and the
//! function evaluated synchronously; parsed documents never cross an await.

pub mod host;
#[cfg(feature = "http")]
pub mod http;
pub mod snapshot;

use scraper::{ElementRef, Html, Selector};

use crate::error::{AppError, Result};
use crate::models::ClickTarget;

pub use host::{FrameSnapshot, PageHost, TabHandle};
#[cfg(feature = "http")]
pub use http::HttpHost;
pub use snapshot::{SnapshotFrame, SnapshotHost, SnapshotPage};

/// A stateless function evaluated inside one frame.
pub type PageFn<T> = fn(&Frame) -> T;

/// Parse a CSS selector string.
pub fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| AppError::selector(selector, format!("{:?}", e)))
}

/// A parsed frame document.
pub struct Frame {
    url: String,
    document: Html,
}

impl Frame {
    pub fn parse(url: impl Into<String>, html: &str) -> Self {
        Self {
            url: url.into(),
            document: Html::parse_document(html),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Document title, empty when missing.
    pub fn title(&self) -> String {
        self.first("title").map(text_content).unwrap_or_default()
    }

    /// All elements matching `selector`, in document order.
    pub fn select(&self, selector: &str) -> Result<Vec<ElementRef<'_>>> {
        let sel = parse_selector(selector)?;
        Ok(self.document.select(&sel).collect())
    }

    /// First element matching `selector`. Invalid selectors match nothing.
    pub fn first(&self, selector: &str) -> Option<ElementRef<'_>> {
        let sel = parse_selector(selector).ok()?;
        self.document.select(&sel).next()
    }

    pub fn exists(&self, selector: &str) -> bool {
        self.first(selector).is_some()
    }

    /// Address `element` as the n-th match of `selector`, so a host can find
    /// it again in its own copy of the document.
    pub fn click_target(&self, element: ElementRef<'_>, selector: &str) -> Option<ClickTarget> {
        let sel = parse_selector(selector).ok()?;
        let wanted = element.id();
        self.document
            .select(&sel)
            .position(|candidate| candidate.id() == wanted)
            .map(|index| ClickTarget::new(selector, index))
    }

    /// Resolve a click target back to an element in this frame.
    pub fn resolve(&self, target: &ClickTarget) -> Option<ElementRef<'_>> {
        let sel = parse_selector(&target.selector).ok()?;
        self.document.select(&sel).nth(target.index)
    }
}

/// Trimmed concatenation of all descendant text.
pub fn text_content(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Nearest inclusive ancestor matching `selector`.
pub fn closest<'a>(element: ElementRef<'a>, selector: &Selector) -> Option<ElementRef<'a>> {
    std::iter::once(element)
        .chain(element.ancestors().filter_map(ElementRef::wrap))
        .find(|candidate| selector.matches(candidate))
}

/// What a page function returned in one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameResult<T> {
    pub frame_url: String,
    pub value: T,
}

/// Evaluate `func` against one snapshot.
pub fn run_in_frame<T>(snapshot: &FrameSnapshot, func: PageFn<T>) -> FrameResult<T> {
    let frame = Frame::parse(&snapshot.url, &snapshot.html);
    FrameResult {
        frame_url: snapshot.url.clone(),
        value: func(&frame),
    }
}

/// Run a page function in the tab's top frame, or in every frame.
///
/// Results come back in frame order and are complete before this returns.
pub async fn execute<H, T>(
    host: &H,
    tab: &TabHandle,
    func: PageFn<T>,
    all_frames: bool,
) -> Result<Vec<FrameResult<T>>>
where
    H: PageHost + ?Sized,
{
    let snapshots = host.snapshot(tab, all_frames).await?;
    Ok(snapshots
        .iter()
        .map(|snapshot| run_in_frame(snapshot, func))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HTML: &str = r#"
        <html><head><title> Tickets | App </title></head>
        <body>
          <ul class="nav">
            <li class="item"><a href="/a">Projects</a></li>
            <li class="item"><a href="/b">Tickets <span class="badge">12</span></a></li>
          </ul>
        </body></html>
    "#;

    #[test]
    fn test_title_and_text() {
        let frame = Frame::parse("https://app.example.com", HTML);
        assert_eq!(frame.title(), "Tickets | App");
        let links = frame.select("li.item a").unwrap();
        assert_eq!(text_content(links[1]), "Tickets 12");
    }

    #[test]
    fn test_click_target_round_trip() {
        let frame = Frame::parse("https://app.example.com", HTML);
        let links = frame.select("a").unwrap();
        let target = frame.click_target(links[1], "li.item a").unwrap();
        assert_eq!(target, ClickTarget::new("li.item a", 1));
        let resolved = frame.resolve(&target).unwrap();
        assert_eq!(resolved.value().attr("href"), Some("/b"));
    }

    #[test]
    fn test_closest_includes_self() {
        let frame = Frame::parse("https://app.example.com", HTML);
        let badge = frame.first("span.badge").unwrap();
        let li = parse_selector("li").unwrap();
        let span = parse_selector("span").unwrap();
        assert_eq!(closest(badge, &span).map(|e| e.id()), Some(badge.id()));
        assert!(text_content(closest(badge, &li).unwrap()).starts_with("Tickets"));
    }

    #[test]
    fn test_invalid_selector_is_error() {
        let frame = Frame::parse("https://app.example.com", HTML);
        assert!(frame.select("a[").is_err());
        assert!(frame.first("a[").is_none());
    }
}
