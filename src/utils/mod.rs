//! Utility functions and helpers.

pub mod log;

use unicode_segmentation::UnicodeSegmentation;
use url::Url;

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Resolve a URL string against a base URL string.
pub fn resolve(base_url: &str, href: &str) -> Option<String> {
    Url::parse(base_url)
        .ok()
        .map(|base| resolve_url(&base, href))
}

/// Whether an open tab's URL belongs to a source's URL prefix.
///
/// Query strings and fragments on the tab URL are ignored.
pub fn url_matches_prefix(url: &str, prefix: &str) -> bool {
    let bare = url.split(['?', '#']).next().unwrap_or(url);
    bare.starts_with(prefix) || url.starts_with(prefix)
}

/// Length in user-perceived characters.
pub fn char_len(text: &str) -> usize {
    text.graphemes(true).count()
}

/// Keep at most `max` user-perceived characters.
pub fn truncate(text: &str, max: usize) -> String {
    text.graphemes(true).take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_url() {
        let base = Url::parse("https://example.com/path/").unwrap();
        assert_eq!(
            resolve_url(&base, "page.html"),
            "https://example.com/path/page.html"
        );
        assert_eq!(
            resolve_url(&base, "/root.html"),
            "https://example.com/root.html"
        );
    }

    #[test]
    fn test_url_matches_prefix() {
        let prefix = "https://outlook.office.com/calendar";
        assert!(url_matches_prefix(
            "https://outlook.office.com/calendar/view/week?x=1",
            prefix
        ));
        assert!(!url_matches_prefix("https://outlook.live.com/calendar", prefix));
    }

    #[test]
    fn test_truncate_counts_graphemes() {
        assert_eq!(truncate("Acme – County", 6), "Acme –");
        assert_eq!(char_len("Acme – County"), 13);
    }
}
