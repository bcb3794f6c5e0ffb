//! Offline driver over saved HTML snapshots
//!
//! Each snapshot is the page as rendered after one more reveal. Activating
//! the trigger advances to the next snapshot; the last one repeats forever,
//! which is what a fully loaded page looks like to the reveal loop.

use crate::driver::{DriverError, DriverResult, PageDriver, RevealSelectors, TriggerAction};
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

/// An element captured from a snapshot
///
/// Nodes are only valid while their snapshot is the current one, mirroring
/// how a live element goes stale once the page re-renders.
#[derive(Debug, Clone)]
pub struct SnapshotNode {
    snapshot: usize,
    ordinal: usize,
    text: String,
    attributes: Vec<(String, String)>,
}

impl SnapshotNode {
    fn capture(snapshot: usize, ordinal: usize, element: ElementRef<'_>) -> Self {
        Self {
            snapshot,
            ordinal,
            text: element.text().collect::<String>(),
            attributes: element
                .value()
                .attrs()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Page driver that replays a fixed sequence of HTML snapshots
pub struct HtmlSnapshotDriver {
    snapshots: Vec<String>,
    selectors: RevealSelectors,
    cursor: AtomicUsize,
    triggers: AtomicUsize,
    scrolls: AtomicUsize,
    clicks: AtomicUsize,
    alive: AtomicBool,
    released: AtomicBool,
    navigate_on_click: bool,
    opened: Mutex<Vec<String>>,
    typed: Mutex<Vec<String>>,
}

impl HtmlSnapshotDriver {
    /// Starts on the first snapshot; each reveal moves to the next one
    pub fn new(snapshots: Vec<String>, selectors: RevealSelectors) -> Self {
        Self {
            snapshots,
            selectors,
            cursor: AtomicUsize::new(0),
            triggers: AtomicUsize::new(0),
            scrolls: AtomicUsize::new(0),
            clicks: AtomicUsize::new(0),
            alive: AtomicBool::new(true),
            released: AtomicBool::new(false),
            navigate_on_click: false,
            opened: Mutex::new(Vec::new()),
            typed: Mutex::new(Vec::new()),
        }
    }

    /// Loads snapshots from saved HTML files, in the given order
    pub fn from_files<P: AsRef<Path>>(
        paths: &[P],
        selectors: RevealSelectors,
    ) -> std::io::Result<Self> {
        let snapshots = paths
            .iter()
            .map(std::fs::read_to_string)
            .collect::<std::io::Result<Vec<_>>>()?;
        Ok(Self::new(snapshots, selectors))
    }

    /// Makes every click load the next snapshot, like a form submission
    pub fn navigate_on_click(mut self) -> Self {
        self.navigate_on_click = true;
        self
    }

    fn advance(&self, index: usize) {
        if index + 1 < self.snapshots.len() {
            self.cursor.store(index + 1, Ordering::SeqCst);
        }
    }

    /// Index of the snapshot currently shown
    pub fn current_snapshot(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }

    /// Number of successful trigger activations
    pub fn trigger_count(&self) -> usize {
        self.triggers.load(Ordering::SeqCst)
    }

    pub fn scroll_count(&self) -> usize {
        self.scrolls.load(Ordering::SeqCst)
    }

    pub fn click_count(&self) -> usize {
        self.clicks.load(Ordering::SeqCst)
    }

    /// Simulates the browser going away
    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::SeqCst);
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    pub fn opened_urls(&self) -> Vec<String> {
        self.opened
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn typed_text(&self) -> Vec<String> {
        self.typed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn current_html(&self) -> (usize, &str) {
        let index = self.current_snapshot();
        let html = self.snapshots.get(index).map(String::as_str).unwrap_or("");
        (index, html)
    }

    fn ensure_alive(&self) -> DriverResult<()> {
        if self.alive.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DriverError::SessionClosed("replay session stopped".to_string()))
        }
    }

    fn ensure_current(&self, node: &SnapshotNode) -> DriverResult<()> {
        self.ensure_alive()?;
        if node.snapshot == self.current_snapshot() {
            Ok(())
        } else {
            Err(DriverError::StaleNode(format!(
                "element {} belongs to snapshot {}",
                node.ordinal, node.snapshot
            )))
        }
    }
}

fn parse_selector(selector: &str) -> DriverResult<Selector> {
    Selector::parse(selector).map_err(|_| DriverError::InvalidSelector(selector.to_string()))
}

/// Selects matching elements of a document, numbering every element in preorder
fn select_in_document(html: &str, snapshot: usize, selector: &Selector) -> Vec<SnapshotNode> {
    let document = Html::parse_document(html);
    document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .enumerate()
        .filter(|(_, element)| selector.matches(element))
        .map(|(ordinal, element)| SnapshotNode::capture(snapshot, ordinal, element))
        .collect()
}

/// Selects matching descendants of the element with the given preorder number
fn select_within(
    html: &str,
    snapshot: usize,
    scope: usize,
    selector: &Selector,
) -> Vec<SnapshotNode> {
    let document = Html::parse_document(html);
    let Some(scope_element) = document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .nth(scope)
    else {
        return Vec::new();
    };

    // Descendants follow their ancestor contiguously in preorder
    scope_element
        .descendants()
        .filter_map(ElementRef::wrap)
        .enumerate()
        .skip(1)
        .filter(|(_, element)| selector.matches(element))
        .map(|(offset, element)| SnapshotNode::capture(snapshot, scope + offset, element))
        .collect()
}

#[async_trait]
impl PageDriver for HtmlSnapshotDriver {
    type Node = SnapshotNode;

    async fn open(&self, url: &str) -> DriverResult<()> {
        self.ensure_alive()?;
        self.opened
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.to_string());
        Ok(())
    }

    async fn scroll_to_top(&self) -> DriverResult<()> {
        self.ensure_alive()?;
        self.scrolls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn trigger_more(&self) -> DriverResult<bool> {
        self.ensure_alive()?;
        let selector = parse_selector(&self.selectors.trigger)?;
        let (index, html) = self.current_html();
        let triggers = select_in_document(html, index, &selector);

        let target = match self.selectors.action {
            TriggerAction::ScrollIntoView => triggers.first(),
            TriggerAction::Click => triggers.last(),
        };
        let Some(target) = target else {
            return Ok(false);
        };
        if self.selectors.action == TriggerAction::Click && target.attribute("disabled").is_some()
        {
            return Ok(false);
        }

        self.triggers.fetch_add(1, Ordering::SeqCst);
        self.advance(index);
        Ok(true)
    }

    async fn query_nodes(&self, selector: &str) -> DriverResult<Vec<SnapshotNode>> {
        self.ensure_alive()?;
        let selector = parse_selector(selector)?;
        let (index, html) = self.current_html();
        Ok(select_in_document(html, index, &selector))
    }

    async fn query_within(
        &self,
        node: &SnapshotNode,
        selector: &str,
    ) -> DriverResult<Vec<SnapshotNode>> {
        self.ensure_current(node)?;
        let selector = parse_selector(selector)?;
        let (index, html) = self.current_html();
        Ok(select_within(html, index, node.ordinal, &selector))
    }

    async fn read_text(&self, node: &SnapshotNode) -> DriverResult<String> {
        self.ensure_current(node)?;
        Ok(node.text.clone())
    }

    async fn read_attribute(&self, node: &SnapshotNode, name: &str) -> DriverResult<Option<String>> {
        self.ensure_current(node)?;
        Ok(node.attribute(name).map(str::to_string))
    }

    async fn click(&self, node: &SnapshotNode) -> DriverResult<()> {
        self.ensure_current(node)?;
        self.clicks.fetch_add(1, Ordering::SeqCst);
        if self.navigate_on_click {
            self.advance(node.snapshot);
        }
        Ok(())
    }

    async fn type_text(&self, node: &SnapshotNode, text: &str) -> DriverResult<()> {
        self.ensure_current(node)?;
        self.typed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(text.to_string());
        Ok(())
    }

    async fn is_session_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn release(&mut self) -> DriverResult<()> {
        self.released.store(true, Ordering::SeqCst);
        Ok(())
    }
}
