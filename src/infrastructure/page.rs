//! Page automation interface
//!
//! The extraction engine never talks to a browser directly. It consumes the
//! [`Page`] and [`Browser`] traits defined here; concrete backends live in
//! `html_page` (static HTTP snapshots) and `chromium` (full DOM automation,
//! behind the `chromium` feature).
//!
//! Element handles are lightweight `(locator, index)` pairs that backends
//! re-resolve on every call, so a handle that outlives a DOM update simply
//! fails with [`PageError::Detached`] instead of pointing at stale memory.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::{Instant, sleep};
use tracing::debug;

pub const SCROLL_TO_BOTTOM: &str = "window.scrollTo(0, document.body.scrollHeight)";
pub const SCROLL_TO_TOP: &str = "window.scrollTo(0, 0)";

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Structural (CSS) or path (XPath) query
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locator {
    Css(String),
    #[serde(rename = "xpath")]
    XPath(String),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    pub fn xpath(path: impl Into<String>) -> Self {
        Self::XPath(path.into())
    }

    #[must_use]
    pub fn expression(&self) -> &str {
        match self {
            Self::Css(selector) => selector,
            Self::XPath(path) => path,
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(selector) => write!(f, "css={selector}"),
            Self::XPath(path) => write!(f, "xpath={path}"),
        }
    }
}

/// The `index`-th match of `locator` at the time of the query
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle {
    locator: Locator,
    index: usize,
}

impl ElementHandle {
    #[must_use]
    pub const fn new(locator: Locator, index: usize) -> Self {
        Self { locator, index }
    }

    #[must_use]
    pub const fn locator(&self) -> &Locator {
        &self.locator
    }

    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PageError {
    #[error("navigation to {url} timed out after {timeout_ms} ms")]
    NavigationTimeout { url: String, timeout_ms: u64 },

    #[error("navigation to {url} failed: {reason}")]
    NavigationFailed { url: String, reason: String },

    #[error("element {locator} #{index} is not attached to the page")]
    Detached { locator: String, index: usize },

    #[error("invalid locator {locator}: {reason}")]
    InvalidLocator { locator: String, reason: String },

    #[error("{operation} is not supported by this page backend")]
    Unsupported { operation: &'static str },

    #[error("script evaluation failed: {0}")]
    Script(String),

    #[error("page is closed")]
    Closed,

    #[error("browser error: {0}")]
    Backend(String),
}

impl PageError {
    pub fn detached(element: &ElementHandle) -> Self {
        Self::Detached {
            locator: element.locator().to_string(),
            index: element.index(),
        }
    }

    /// Navigation-class failures make a product page unreachable.
    #[must_use]
    pub const fn is_navigation(&self) -> bool {
        matches!(
            self,
            Self::NavigationTimeout { .. } | Self::NavigationFailed { .. } | Self::Closed
        )
    }
}

/// One isolated page context
#[async_trait]
pub trait Page: Send + Sync {
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), PageError>;

    async fn current_url(&self) -> Result<String, PageError>;

    async fn title(&self) -> Result<String, PageError>;

    async fn query_all(&self, locator: &Locator) -> Result<Vec<ElementHandle>, PageError>;

    async fn query(&self, locator: &Locator) -> Result<Option<ElementHandle>, PageError> {
        Ok(self.query_all(locator).await?.into_iter().next())
    }

    /// Rendered text of the element, as the page reports it
    async fn inner_text(&self, element: &ElementHandle) -> Result<String, PageError>;

    async fn attribute(&self, element: &ElementHandle, name: &str) -> Result<Option<String>, PageError>;

    /// Lower-case tag name
    async fn tag_name(&self, element: &ElementHandle) -> Result<String, PageError>;

    async fn evaluate(&self, expression: &str) -> Result<serde_json::Value, PageError>;

    /// Poll until `locator` matches or `timeout` elapses.
    async fn wait_for(&self, locator: &Locator, timeout: Duration) -> Result<bool, PageError> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.query(locator).await?.is_some() {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            sleep(WAIT_POLL_INTERVAL).await;
        }
    }

    async fn click(&self, element: &ElementHandle) -> Result<(), PageError>;

    /// Set the value of a `<select>`, firing `input` and `change`.
    ///
    /// `element` may also be one of its `<option>`s; the owning select is
    /// the one updated.
    async fn select_option(&self, element: &ElementHandle, value: &str) -> Result<(), PageError>;

    async fn close(&self) -> Result<(), PageError>;
}

/// Factory for isolated page contexts sharing one browser instance
#[async_trait]
pub trait Browser: Send + Sync {
    async fn new_page(&self) -> Result<Arc<dyn Page>, PageError>;
}

/// Settle, then scroll to the bottom and back so lazy content loads.
///
/// Scroll failures are ignored; a backend without script support still
/// gets the settle delay.
pub async fn warm_up(page: &dyn Page, settle: Duration, scroll_settle: Duration) {
    sleep(settle).await;
    if let Err(e) = page.evaluate(SCROLL_TO_BOTTOM).await {
        debug!(error = %e, "Warm-up scroll skipped");
        return;
    }
    sleep(scroll_settle).await;
    if let Err(e) = page.evaluate(SCROLL_TO_TOP).await {
        debug!(error = %e, "Scroll back to top failed");
    }
    sleep(scroll_settle).await;
}

/// Collapse runs of whitespace into single spaces and trim.
#[must_use]
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  Widget \n\t Pro  "), "Widget Pro");
        assert_eq!(normalize_whitespace("\n \t"), "");
    }

    #[test]
    fn test_locator_display() {
        assert_eq!(Locator::css("h1").to_string(), "css=h1");
        assert_eq!(Locator::xpath("//h1").to_string(), "xpath=//h1");
        assert_eq!(Locator::xpath("//h1").expression(), "//h1");
    }

    #[test]
    fn test_navigation_classification() {
        let timeout = PageError::NavigationTimeout {
            url: "https://shop.example".into(),
            timeout_ms: 60_000,
        };
        assert!(timeout.is_navigation());
        assert!(!PageError::Unsupported { operation: "evaluate" }.is_navigation());
    }
}
