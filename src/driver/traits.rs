use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

/// Browser messages that mean the page we were driving is gone
const CONTEXT_LOST_MARKERS: [&str; 2] = [
    "Execution context was destroyed",
    "Target page, context or browser has been closed",
];

/// Page-level failures the runner reacts to
#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error("Element not found: {selector}")]
    ElementNotFound { selector: String },

    #[error("Page context lost: {0}")]
    ContextLost(String),

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },
}

impl PageError {
    /// Check whether an error chain was caused by the page context going away
    pub fn is_context_lost(err: &anyhow::Error) -> bool {
        if matches!(err.downcast_ref::<PageError>(), Some(PageError::ContextLost(_))) {
            return true;
        }
        err.chain().any(|cause| {
            let text = cause.to_string();
            CONTEXT_LOST_MARKERS.iter().any(|m| text.contains(m))
        })
    }

    /// Map a raw driver error onto the page error taxonomy where possible
    pub fn classify(err: anyhow::Error) -> anyhow::Error {
        if Self::is_context_lost(&err) && err.downcast_ref::<PageError>().is_none() {
            return PageError::ContextLost(format!("{:#}", err)).into();
        }
        err
    }
}

/// A single browser tab driven by the test runner
///
/// Selectors use the Playwright selector syntax (CSS, `text=`, `:has-text()`).
/// Relative URLs passed to `goto` are resolved against the base URL of the
/// system under test.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Browser engine name ("chromium", "firefox", "webkit", ...)
    fn browser_name(&self) -> &str;

    /// Navigate and wait until the network is idle
    async fn goto(&self, url: &str) -> Result<()>;

    /// URL of the current document
    async fn current_url(&self) -> Result<String>;

    /// Reload the current document
    async fn reload(&self) -> Result<()>;

    /// Go back one entry in history
    async fn go_back(&self) -> Result<()>;

    /// Fill an input field
    async fn fill(&self, selector: &str, value: &str) -> Result<()>;

    /// Select an `<option>` by value
    async fn select_option(&self, selector: &str, value: &str) -> Result<()>;

    /// Click the first element matching the selector
    async fn click(&self, selector: &str) -> Result<()>;

    /// Number of elements matching the selector
    async fn count(&self, selector: &str) -> Result<usize>;

    /// Whether the nth match exists and is visible
    async fn is_visible_nth(&self, selector: &str, index: usize) -> Result<bool>;

    /// Click the nth match
    async fn click_nth(&self, selector: &str, index: usize) -> Result<()>;

    /// Text content of the nth match
    async fn text_nth(&self, selector: &str, index: usize) -> Result<Option<String>>;

    /// Attribute value of every match that carries the attribute
    async fn attribute_all(&self, selector: &str, name: &str) -> Result<Vec<String>>;

    /// Wait until the selector resolves to a visible element
    async fn wait_for_visible(&self, selector: &str, timeout_ms: u64) -> Result<bool>;

    /// Save a full-page PNG screenshot
    async fn screenshot(&self, path: &Path) -> Result<()>;

    /// Serialized HTML of the current document
    async fn content(&self) -> Result<String>;

    /// Sleep without touching the page
    async fn pause(&self, ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    async fn is_visible(&self, selector: &str) -> Result<bool> {
        self.is_visible_nth(selector, 0).await
    }

    /// Index of the first visible match, if any
    async fn first_visible(&self, selector: &str) -> Result<Option<usize>> {
        let total = self.count(selector).await?;
        for index in 0..total {
            if self.is_visible_nth(selector, index).await? {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    /// Click the first visible element among candidate selectors, in order.
    ///
    /// Returns the selector that was clicked, or `None` when no candidate
    /// resolved to a visible element.
    async fn click_first_visible(&self, candidates: &[&str]) -> Result<Option<String>> {
        for selector in candidates {
            if let Some(index) = self.first_visible(selector).await? {
                self.click_nth(selector, index).await?;
                return Ok(Some(selector.to_string()));
            }
        }
        Ok(None)
    }
}
