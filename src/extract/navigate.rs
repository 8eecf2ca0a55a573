// src/extract/navigate.rs

//! Navigation steps that reach the ticket list: the "Lists" tab first,
//! then the "Tickets" sidebar entry.
//!
//! A step only decides what to click. It hands back a [`ClickTarget`] and
//! the host dispatches the click.

use scraper::ElementRef;

use crate::error::Result;
use crate::models::{ClickTarget, Diag, StepResult};
use crate::page::{Frame, closest, parse_selector, text_content};
use crate::utils::truncate;

type Decision = Option<(&'static str, ClickTarget)>;

fn run_step(frame: &Frame, strategies: fn(&Frame) -> Result<Decision>, missing: &str) -> StepResult {
    let mut diag = Diag::new();
    diag.set("url", truncate(frame.url(), 120));
    match strategies(frame) {
        Ok(Some((method, target))) => StepResult::clicked(method, target, diag),
        Ok(None) => StepResult::missed(missing, diag),
        Err(e) => {
            diag.set("exception", true);
            StepResult::missed(e.to_string(), diag)
        }
    }
}

/// First element of `selector` whose trimmed text passes `accept`.
fn first_with_text<'a>(
    frame: &'a Frame,
    selector: &str,
    accept: impl Fn(&str) -> bool,
) -> Result<Option<ElementRef<'a>>> {
    Ok(frame
        .select(selector)?
        .into_iter()
        .find(|el| accept(&text_content(*el))))
}

fn target(frame: &Frame, element: ElementRef<'_>, selector: &str) -> Option<ClickTarget> {
    frame.click_target(element, selector)
}

/// Step one: open the "Lists" tab.
pub fn click_lists_tab(frame: &Frame) -> StepResult {
    run_step(frame, lists_strategies, "Could not find Lists tab")
}

fn lists_strategies(frame: &Frame) -> Result<Decision> {
    const BY_HREF: &str = r#"a.slds-tabs_default__link[href*="lists"]"#;
    if let Some(tab) = frame.first(BY_HREF) {
        return Ok(target(frame, tab, BY_HREF).map(|t| ("slds-tab-link-lists", t)));
    }

    const TABS: &str = r#"[role="tab"], a.slds-tabs_default__link, button[class*="tab"]"#;
    if let Some(tab) = first_with_text(frame, TABS, |text| text.eq_ignore_ascii_case("lists"))? {
        return Ok(target(frame, tab, TABS).map(|t| ("text-match-lists", t)));
    }

    const CLICKABLE: &str = r#"a, button, [role="button"]"#;
    if let Some(el) = first_with_text(frame, CLICKABLE, |text| text.eq_ignore_ascii_case("lists"))? {
        return Ok(target(frame, el, CLICKABLE).map(|t| ("generic-lists-link", t)));
    }
    Ok(None)
}

/// Step two: pick "Tickets" in the Lists sidebar.
pub fn click_tickets_sidebar(frame: &Frame) -> StepResult {
    run_step(frame, tickets_strategies, "Could not find Tickets sidebar item")
}

/// Whether a badge's text looks like a ticket count.
fn is_count_badge(text: &str) -> bool {
    text == "12" || (text.chars().count() < 5 && text.parse::<u32>().is_ok_and(|n| n > 0))
}

fn tickets_strategies(frame: &Frame) -> Result<Decision> {
    const NAV_ITEMS: &str = r#".slds-nav-vertical__item, [class*="nav"][class*="item"], li[role="menuitem"]"#;
    const ITEM_LINK: &str = r#"a, button, [role="button"]"#;
    if let Some(item) = first_with_text(frame, NAV_ITEMS, |text| {
        text.to_lowercase().contains("tickets")
    })? {
        let link_sel = parse_selector(ITEM_LINK)?;
        if let Some(link) = item.select(&link_sel).next() {
            return Ok(target(frame, link, ITEM_LINK).map(|t| ("slds-nav-tickets-link", t)));
        }
        return Ok(target(frame, item, NAV_ITEMS).map(|t| ("slds-nav-tickets-item", t)));
    }

    const CLICKABLE: &str = r#"a, button, [role="button"], [class*="nav"]"#;
    if let Some(el) = first_with_text(frame, CLICKABLE, |text| {
        text == "Tickets" || (text.contains("Tickets") && text.chars().count() < 50)
    })? {
        return Ok(target(frame, el, CLICKABLE).map(|t| ("text-match-tickets", t)));
    }

    const BADGES: &str = r#"[class*="badge"], [class*="count"], span[class*="pill"]"#;
    const BADGE_PARENT: &str = r#"a, li, [class*="item"], [class*="nav"]"#;
    let parent_sel = parse_selector(BADGE_PARENT)?;
    for badge in frame.select(BADGES)? {
        if !is_count_badge(&text_content(badge)) {
            continue;
        }
        // The badge itself may carry an item class; look from its parent up.
        let parent = badge
            .parent()
            .and_then(ElementRef::wrap)
            .and_then(|up| closest(up, &parent_sel));
        if let Some(parent) = parent.filter(|p| text_content(*p).contains("Tickets")) {
            return Ok(target(frame, parent, BADGE_PARENT).map(|t| ("badge-tickets", t)));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://acme.lightning.force.com/lightning/n/project_cloud__Gameplan";

    #[test]
    fn lists_by_href_first() {
        let html = r##"
            <button role="tab">Lists</button>
            <a class="slds-tabs_default__link" href="#/lists">Lists</a>"##;
        let step = click_lists_tab(&Frame::parse(URL, html));
        assert!(step.clicked);
        assert_eq!(step.method, "slds-tab-link-lists");
        assert_eq!(step.target.unwrap().selector, r#"a.slds-tabs_default__link[href*="lists"]"#);
    }

    #[test]
    fn lists_by_tab_text() {
        let html = r#"<div role="tab">Board</div><div role="tab"> lists </div>"#;
        let step = click_lists_tab(&Frame::parse(URL, html));
        assert_eq!(step.method, "text-match-lists");
        assert_eq!(step.target.unwrap().index, 1);
    }

    #[test]
    fn missing_lists_tab() {
        let step = click_lists_tab(&Frame::parse(URL, "<a>Boards</a>"));
        assert!(!step.clicked);
        assert_eq!(step.error.as_deref(), Some("Could not find Lists tab"));
        assert!(step.diag.contains("url"));
    }

    #[test]
    fn tickets_nav_item_prefers_inner_link() {
        let html = r#"<ul>
            <li class="slds-nav-vertical__item"><a href="/tasks">Project Tasks</a></li>
            <li class="slds-nav-vertical__item"><a href="/tickets">Tickets</a></li>
        </ul>"#;
        let step = click_tickets_sidebar(&Frame::parse(URL, html));
        assert_eq!(step.method, "slds-nav-tickets-link");
        let frame = Frame::parse(URL, html);
        let link = frame.resolve(&step.target.unwrap()).unwrap();
        assert_eq!(link.value().attr("href"), Some("/tickets"));
    }

    #[test]
    fn tickets_by_badge() {
        let html = r#"<ul><li><span>Tickets</span></li></ul>
            <div><span class="slds-badge">12</span></div>
            <ul><li><span>Tickets</span><span class="slds-badge">3</span></li></ul>"#;
        let step = click_tickets_sidebar(&Frame::parse(URL, html));
        assert_eq!(step.method, "badge-tickets");
        assert_eq!(step.target.unwrap(), ClickTarget::new(r#"a, li, [class*="item"], [class*="nav"]"#, 1));
    }

    #[test]
    fn count_badges() {
        assert!(is_count_badge("12"));
        assert!(is_count_badge("7"));
        assert!(!is_count_badge("0"));
        assert!(!is_count_badge("12345"));
        assert!(!is_count_badge("new"));
    }
}
