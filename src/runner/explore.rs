//! Link crawling and interactive-element exploration
//!
//! Both explorers record findings on the `TestResult` they are given.
//! Losing the page context (a click that tears the document down, a crashed
//! tab) triggers one reload; if that reload fails the exploration stops.

use anyhow::Result;
use std::collections::{HashSet, VecDeque};

use super::context::ArtifactStore;
use crate::driver::traits::{PageDriver, PageError};
use crate::report::types::TestResult;

/// Visible matches of these mark a page as broken
pub const ERROR_MARKERS: &[&str] = &[
    ".error",
    ".alert-danger",
    "text=404",
    "text=500",
    "text=Page not found",
];

/// Everything the element explorer is willing to click
pub const INTERACTIVE_SELECTOR: &str = concat!(
    "button:not([disabled]), ",
    r#"input[type="submit"]:not([disabled]), "#,
    r#"input[type="button"]:not([disabled]), "#,
    r#"a[role="button"]:not([disabled]), "#,
    "a.btn:not([disabled]), ",
    ".btn:not([disabled]), ",
    "[onclick]:not([disabled]), ",
    r#"input[type="checkbox"]:not([disabled]), "#,
    ".dropdown-toggle:not([disabled]), ",
    ".nav-link:not([disabled]), ",
    ".accordion-button:not([disabled])"
);

const MODAL_SELECTOR: &str = r#".modal, .popup, .dialog, [role="dialog"]"#;

const MODAL_CLOSE_SELECTORS: &[&str] = &[
    ".modal .close",
    ".modal .btn-close",
    ".popup .close",
    r#"[data-dismiss="modal"]"#,
    r#"[data-bs-dismiss="modal"]"#,
];

const ALERT_SELECTOR: &str = ".alert, .alert-danger, .alert-warning";

/// Turn an `href` into a same-origin path, or `None` for anything external
pub fn same_origin_path(base_url: &str, href: &str) -> Option<String> {
    let base = base_url.trim_end_matches('/');
    let href = href.trim();
    let path = if let Some(rest) = href.strip_prefix(base) {
        if rest.is_empty() {
            "/"
        } else {
            rest
        }
    } else {
        href
    };

    if !path.starts_with('/') || path.starts_with("//") {
        return None;
    }
    let path = path.split('#').next().unwrap_or(path);
    if path.is_empty() {
        return None;
    }
    Some(path.to_string())
}

/// Reload after a lost context. Returns false (and records an error) when
/// the page could not be recovered.
async fn recover(page: &dyn PageDriver, result: &mut TestResult, what: &str) -> bool {
    result.warn(format!(
        "Page context destroyed {}, attempting recovery",
        what
    ));
    match page.reload().await {
        Ok(()) => {
            log::info!("Page recovered after context loss {}", what);
            true
        }
        Err(e) => {
            result.error(format!("Page recovery failed: {:#}", e));
            false
        }
    }
}

async fn record_error_markers(page: &dyn PageDriver, path: &str, result: &mut TestResult) -> Result<()> {
    for marker in ERROR_MARKERS {
        if let Some(index) = page.first_visible(marker).await? {
            let text = page
                .text_nth(marker, index)
                .await?
                .map(|t| t.trim().to_string())
                .unwrap_or_default();
            result.warn(format!("Error found on {}: {}", path, text));
        }
    }
    Ok(())
}

/// Breadth-first crawl of same-origin links starting at `/`.
///
/// Visits at most `limit` pages and returns them in visit order.
pub async fn crawl_links(
    page: &dyn PageDriver,
    artifacts: &ArtifactStore,
    base_url: &str,
    limit: usize,
    result: &mut TestResult,
) -> Vec<String> {
    let mut queue: VecDeque<String> = VecDeque::from(["/".to_string()]);
    let mut seen: HashSet<String> = HashSet::new();
    let mut visited: Vec<String> = Vec::new();

    while let Some(path) = queue.pop_front() {
        if seen.contains(&path) {
            continue;
        }
        if visited.len() >= limit {
            result.warn(format!(
                "Exploration limited to {} URLs to prevent infinite loops",
                limit
            ));
            break;
        }
        seen.insert(path.clone());
        visited.push(path.clone());
        log::info!("Exploring: {}", path);

        let step: Result<Vec<String>> = async {
            page.goto(&path).await?;
            artifacts
                .screenshot(page, &format!("explore_{}", path), result)
                .await;
            let hrefs = page.attribute_all("a[href]", "href").await?;
            record_error_markers(page, &path, result).await?;
            Ok::<_, anyhow::Error>(hrefs)
        }
        .await;

        match step {
            Ok(hrefs) => {
                for href in hrefs {
                    if let Some(next) = same_origin_path(base_url, &href) {
                        if !seen.contains(&next) {
                            queue.push_back(next);
                        }
                    }
                }
            }
            Err(e) if PageError::is_context_lost(&e) => {
                if !recover(page, result, &format!("while exploring {}", path)).await {
                    break;
                }
            }
            Err(e) => result.warn(format!("Error exploring {}: {:#}", path, e)),
        }
    }

    log::info!("Explored {} URLs", visited.len());
    visited
}

/// Counters from one element exploration pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ElementStats {
    pub found: usize,
    pub clicked: usize,
}

async fn click_and_observe(
    page: &dyn PageDriver,
    artifacts: &ArtifactStore,
    page_name: &str,
    index: usize,
    result: &mut TestResult,
) -> Result<bool> {
    if !page.is_visible_nth(INTERACTIVE_SELECTOR, index).await? {
        return Ok(false);
    }
    let label = page
        .text_nth(INTERACTIVE_SELECTOR, index)
        .await?
        .map(|t| t.trim().chars().take(50).collect::<String>())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| format!("element {}", index + 1));

    let before = page.current_url().await?;
    page.click_nth(INTERACTIVE_SELECTOR, index).await?;
    page.pause(1000).await;

    if let Some(alert) = page.first_visible(ALERT_SELECTOR).await? {
        let text = page.text_nth(ALERT_SELECTOR, alert).await?.unwrap_or_default();
        result.warn(format!("Alert after clicking '{}': {}", label, text.trim()));
    }

    if page.first_visible(MODAL_SELECTOR).await?.is_some() {
        result.warn(format!("Modal appeared after clicking '{}'", label));
        page.click_first_visible(MODAL_CLOSE_SELECTORS).await?;
        page.pause(500).await;
    }

    let after = page.current_url().await?;
    if after != before {
        result.warn(format!("Page navigation after clicking '{}': {}", label, after));
        artifacts
            .screenshot(page, &format!("{}_after_click_{}", page_name, index + 1), result)
            .await;
        if let Err(e) = page.go_back().await {
            result.warn(format!("Could not navigate back after clicking '{}': {:#}", label, e));
        }
    }

    Ok(true)
}

/// Click every visible interactive element on the current page
pub async fn explore_elements(
    page: &dyn PageDriver,
    artifacts: &ArtifactStore,
    page_name: &str,
    result: &mut TestResult,
) -> ElementStats {
    let mut stats = ElementStats::default();

    artifacts
        .screenshot(page, &format!("{}_initial", page_name), result)
        .await;

    stats.found = match page.count(INTERACTIVE_SELECTOR).await {
        Ok(n) => n,
        Err(e) => {
            result.error(format!("Could not list elements on {}: {:#}", page_name, e));
            return stats;
        }
    };
    log::info!("Found {} interactive elements on {}", stats.found, page_name);

    for index in 0..stats.found {
        match click_and_observe(page, artifacts, page_name, index, result).await {
            Ok(true) => stats.clicked += 1,
            Ok(false) => {
                log::debug!("Element {} on {} not visible, skipping", index + 1, page_name);
            }
            Err(e) if PageError::is_context_lost(&e) => {
                let what = format!("after clicking element {} on {}", index + 1, page_name);
                if !recover(page, result, &what).await {
                    break;
                }
            }
            Err(e) => result.warn(format!(
                "Failed to click element {} on {}: {:#}",
                index + 1,
                page_name,
                e
            )),
        }
    }

    artifacts
        .capture(page, &format!("{}_final", page_name), result)
        .await;
    stats
}
