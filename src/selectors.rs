//! Site-specific CSS selector strategies, isolated as pure functions over
//! HTML snapshots so the fragile matching stays independently testable.
//!
//! Each strategy list is tried in order; the first strategy that yields any
//! result wins. These selectors track Instagram's current markup and will
//! degrade to empty results when the markup changes.

use scraper::{Html, Selector};

use crate::parse::username_from_href;

/// Selector for the followers link on a profile page.
pub const FOLLOWERS_LINK: &str = r#"a[href*="/followers/"]"#;

/// Selector for the link-preview meta description.
pub const META_DESCRIPTION: &str = r#"meta[property="og:description"]"#;

/// Anchor-bearing surfaces inside the followers modal, most specific last.
const MODAL_STRATEGIES: &[&str] = &[
    r#"[role="dialog"] a[href]"#,
    r#"div[style*="transform"] a[href]"#,
    r#"._aano a[href]"#,
];

/// Bio text candidates on a profile page.
const BIO_STRATEGIES: &[&str] = &["header section h1", "div._aa_c h1"];

/// External-link candidates on a profile page.
const EXTERNAL_LINK_STRATEGIES: &[&str] = &[
    r#"header section a[target="_blank"]"#,
    r#"div._aa_c a[target="_blank"]"#,
];

/// Login form field selectors, in priority order.
pub const LOGIN_USERNAME_FIELDS: &[&str] = &[
    r#"input[name="username"]"#,
    r#"input[aria-label="Phone number, username, or email"]"#,
];
pub const LOGIN_PASSWORD_FIELDS: &[&str] = &[
    r#"input[name="password"]"#,
    r#"input[aria-label="Password"]"#,
];
pub const LOGIN_SUBMIT_BUTTONS: &[&str] = &[r#"button[type="submit"]"#, r#"form button"#];

/// Harvests unique candidate handles from a followers-modal snapshot.
///
/// Tries each modal strategy in order and stops at the first one that
/// produces any handle; within a strategy, stops early once `max` unique
/// handles are collected.
pub fn followers_from_modal(html: &str, max: Option<usize>) -> Vec<String> {
    let document = Html::parse_document(html);
    for strategy in MODAL_STRATEGIES {
        let Ok(selector) = Selector::parse(strategy) else {
            continue;
        };
        let mut handles = Vec::new();
        for anchor in document.select(&selector) {
            if max.is_some_and(|m| handles.len() >= m) {
                break;
            }
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            if let Some(username) = username_from_href(href) {
                if !handles.contains(&username) {
                    handles.push(username);
                }
            }
        }
        if !handles.is_empty() {
            return handles;
        }
    }
    Vec::new()
}

/// Returns the `content` of the link-preview meta description, if present.
pub fn meta_description(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(META_DESCRIPTION).ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|meta| meta.value().attr("content"))
        .map(str::to_string)
}

/// True when the profile page exposes a followers link.
pub fn has_followers_link(html: &str) -> bool {
    let document = Html::parse_document(html);
    match Selector::parse(FOLLOWERS_LINK) {
        Ok(selector) => document.select(&selector).next().is_some(),
        Err(_) => false,
    }
}

fn first_text(html: &str, strategies: &[&str]) -> Option<String> {
    let document = Html::parse_document(html);
    for strategy in strategies {
        let Ok(selector) = Selector::parse(strategy) else {
            continue;
        };
        if let Some(element) = document.select(&selector).next() {
            let text = element.text().collect::<Vec<_>>().join(" ");
            let text = text.trim();
            if !text.is_empty() {
                return Some(text.to_string());
            }
        }
    }
    None
}

/// Best-effort bio text from a profile page snapshot.
pub fn profile_bio(html: &str) -> Option<String> {
    first_text(html, BIO_STRATEGIES)
}

/// Best-effort external URL from a profile page snapshot.
pub fn profile_external_url(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    for strategy in EXTERNAL_LINK_STRATEGIES {
        let Ok(selector) = Selector::parse(strategy) else {
            continue;
        };
        if let Some(anchor) = document.select(&selector).next() {
            if let Some(href) = anchor.value().attr("href") {
                return Some(href.to_string());
            }
        }
    }
    None
}
