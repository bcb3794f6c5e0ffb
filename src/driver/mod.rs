//! Page driver abstraction
//!
//! The collection engine never touches a browser directly. It talks to a
//! [`PageDriver`], which knows how to scroll, activate the reveal trigger,
//! query nodes and read them. Two drivers ship with the crate:
//!
//! - `ChromiumDriver` (feature `browser`): a live Chrome session over CDP
//! - [`HtmlSnapshotDriver`]: replays saved HTML snapshots, one per reveal

#[cfg(feature = "browser")]
mod chromium;
mod replay;

#[cfg(feature = "browser")]
pub use chromium::ChromiumDriver;
pub use replay::{HtmlSnapshotDriver, SnapshotNode};

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Interval between polls while waiting for an element
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Errors raised by a page driver
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("node is no longer attached to the page: {0}")]
    StaleNode(String),

    #[error("invalid selector '{0}'")]
    InvalidSelector(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("timed out waiting for {0}")]
    Timeout(String),

    #[error("browser session closed: {0}")]
    SessionClosed(String),

    #[error("browser error: {0}")]
    Browser(String),
}

impl DriverError {
    /// Returns true for failures confined to a single node
    ///
    /// The live DOM mutates between a query and a read, so these are
    /// expected and only cost the affected candidate.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::StaleNode(_))
    }
}

pub type DriverResult<T> = Result<T, DriverError>;

/// How the reveal trigger is activated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriggerAction {
    /// Scroll the first matching sentinel into view (infinite scroll)
    #[default]
    ScrollIntoView,

    /// Click the last matching button unless it is disabled (pagination)
    Click,
}

/// Selectors that locate the reveal affordances on a page
#[derive(Debug, Clone)]
pub struct RevealSelectors {
    /// Scrollable element reset to its top on every iteration; the window when unset
    pub scroll_container: Option<String>,

    pub trigger: String,

    pub action: TriggerAction,
}

impl RevealSelectors {
    pub fn infinite_scroll(scroll_container: impl Into<String>, trigger: impl Into<String>) -> Self {
        Self {
            scroll_container: Some(scroll_container.into()),
            trigger: trigger.into(),
            action: TriggerAction::ScrollIntoView,
        }
    }

    pub fn pagination(next_button: impl Into<String>) -> Self {
        Self {
            scroll_container: None,
            trigger: next_button.into(),
            action: TriggerAction::Click,
        }
    }
}

/// Low-level page interaction used by the collection engine and login flow
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Handle to an element on the page
    type Node: Send + Sync;

    /// Navigates to a URL
    async fn open(&self, url: &str) -> DriverResult<()>;

    /// Resets scroll position to the boundary where undiscovered content appears
    async fn scroll_to_top(&self) -> DriverResult<()>;

    /// Activates the reveal trigger
    ///
    /// Returns `Ok(false)` when no usable trigger exists, which is a signal
    /// rather than an error.
    async fn trigger_more(&self) -> DriverResult<bool>;

    /// Returns every element matching the selector, in document order
    async fn query_nodes(&self, selector: &str) -> DriverResult<Vec<Self::Node>>;

    /// Returns descendants of `node` matching the selector
    async fn query_within(&self, node: &Self::Node, selector: &str) -> DriverResult<Vec<Self::Node>>;

    async fn read_text(&self, node: &Self::Node) -> DriverResult<String>;

    async fn read_attribute(&self, node: &Self::Node, name: &str) -> DriverResult<Option<String>>;

    async fn click(&self, node: &Self::Node) -> DriverResult<()>;

    /// Focuses the node and types into it
    async fn type_text(&self, node: &Self::Node, text: &str) -> DriverResult<()>;

    /// Distinguishes a stalled render from a dead session
    async fn is_session_alive(&self) -> bool;

    /// Releases the browser session
    async fn release(&mut self) -> DriverResult<()>;

    /// Polls until an element matching the selector exists
    async fn wait_for(&self, selector: &str, timeout: Duration) -> DriverResult<Self::Node> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(node) = self.query_nodes(selector).await?.into_iter().next() {
                return Ok(node);
            }
            if Instant::now() >= deadline {
                return Err(DriverError::Timeout(selector.to_string()));
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }
}

/// Finds the first element matching `selector` whose trimmed text equals `text`
///
/// Stale candidates are skipped.
pub async fn find_with_text<D: PageDriver + ?Sized>(
    driver: &D,
    selector: &str,
    text: &str,
) -> DriverResult<Option<D::Node>> {
    for node in driver.query_nodes(selector).await? {
        match driver.read_text(&node).await {
            Ok(found) if found.trim() == text => return Ok(Some(node)),
            Ok(_) => {}
            Err(e) if e.is_transient() => {}
            Err(e) => return Err(e),
        }
    }
    Ok(None)
}

/// Polls [`find_with_text`] until it succeeds or the timeout elapses
pub async fn wait_for_text<D: PageDriver + ?Sized>(
    driver: &D,
    selector: &str,
    text: &str,
    timeout: Duration,
) -> DriverResult<D::Node> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(node) = find_with_text(driver, selector, text).await? {
            return Ok(node);
        }
        if Instant::now() >= deadline {
            return Err(DriverError::Timeout(format!("{} \"{}\"", selector, text)));
        }
        tokio::time::sleep(WAIT_POLL_INTERVAL).await;
    }
}
