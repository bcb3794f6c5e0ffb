//! Shared fixtures: page builders and a scriptable driver

use async_trait::async_trait;
use backscroll::collector::{RevealLoop, RevealSettings};
use backscroll::config::{Config, TranscriptConfig};
use backscroll::driver::{
    DriverError, DriverResult, HtmlSnapshotDriver, PageDriver, RevealSelectors, SnapshotNode,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub fn fast_reveal(no_new_content_limit: u32) -> RevealLoop {
    RevealLoop::new(RevealSettings {
        max_duration: Duration::from_secs(30),
        pause_per_step: Duration::from_millis(1),
        no_new_content_limit,
    })
}

pub fn transcript_config() -> TranscriptConfig {
    TranscriptConfig {
        scroll_container: "div.scroll".to_string(),
        trigger: "div.trigger".to_string(),
        message_pair: "div.pair".to_string(),
        human_bubble: "div.human".to_string(),
        bot_bubble: "div.bot".to_string(),
        bot_name: "div.header p".to_string(),
        ..Config::default().transcript
    }
}

pub fn chat_selectors() -> RevealSelectors {
    RevealSelectors::infinite_scroll("div.scroll", "div.trigger")
}

/// Renders a chat page with a bot header, a paging sentinel and the given pairs
pub fn chat_page(pairs: &[(&str, &str)]) -> String {
    let mut html = String::from(
        r#"<html><body><div class="header"><p>Assistant</p></div><div class="scroll"><div class="trigger"></div>"#,
    );
    for (human, bot) in pairs {
        html.push_str(&format!(
            r#"<div class="pair"><div class="human">{}</div><div class="bot">{}</div></div>"#,
            human, bot
        ));
    }
    html.push_str("</div></body></html>");
    html
}

pub fn chat_driver(pages: &[&[(&str, &str)]]) -> HtmlSnapshotDriver {
    HtmlSnapshotDriver::new(
        pages.iter().map(|pairs| chat_page(pairs)).collect(),
        chat_selectors(),
    )
}

/// Wraps a replay driver and injects interrupts, session loss and stale reads
pub struct ScriptedDriver {
    pub inner: HtmlSnapshotDriver,
    cancel_after_triggers: Option<(usize, CancellationToken)>,
    die_after_triggers: Option<usize>,
    stale_reads: Vec<usize>,
    reads: AtomicUsize,
}

impl ScriptedDriver {
    pub fn new(inner: HtmlSnapshotDriver) -> Self {
        Self {
            inner,
            cancel_after_triggers: None,
            die_after_triggers: None,
            stale_reads: Vec::new(),
            reads: AtomicUsize::new(0),
        }
    }

    /// Cancels `token` once the trigger has fired `count` times
    pub fn cancel_after(mut self, count: usize, token: CancellationToken) -> Self {
        self.cancel_after_triggers = Some((count, token));
        self
    }

    /// Kills the session once the trigger has fired `count` times
    pub fn die_after(mut self, count: usize) -> Self {
        self.die_after_triggers = Some(count);
        self
    }

    /// Makes the given text reads (1-based, in call order) fail as stale
    pub fn stale_reads(mut self, calls: &[usize]) -> Self {
        self.stale_reads = calls.to_vec();
        self
    }
}

#[async_trait]
impl PageDriver for ScriptedDriver {
    type Node = SnapshotNode;

    async fn open(&self, url: &str) -> DriverResult<()> {
        self.inner.open(url).await
    }

    async fn scroll_to_top(&self) -> DriverResult<()> {
        self.inner.scroll_to_top().await
    }

    async fn trigger_more(&self) -> DriverResult<bool> {
        let fired = self.inner.trigger_more().await?;
        let count = self.inner.trigger_count();
        if let Some((after, token)) = &self.cancel_after_triggers {
            if count >= *after {
                token.cancel();
            }
        }
        if let Some(after) = self.die_after_triggers {
            if count >= after {
                self.inner.set_alive(false);
            }
        }
        Ok(fired)
    }

    async fn query_nodes(&self, selector: &str) -> DriverResult<Vec<SnapshotNode>> {
        self.inner.query_nodes(selector).await
    }

    async fn query_within(
        &self,
        node: &SnapshotNode,
        selector: &str,
    ) -> DriverResult<Vec<SnapshotNode>> {
        self.inner.query_within(node, selector).await
    }

    async fn read_text(&self, node: &SnapshotNode) -> DriverResult<String> {
        let call = self.reads.fetch_add(1, Ordering::SeqCst) + 1;
        if self.stale_reads.contains(&call) {
            return Err(DriverError::StaleNode(format!("read {}", call)));
        }
        self.inner.read_text(node).await
    }

    async fn read_attribute(
        &self,
        node: &SnapshotNode,
        name: &str,
    ) -> DriverResult<Option<String>> {
        self.inner.read_attribute(node, name).await
    }

    async fn click(&self, node: &SnapshotNode) -> DriverResult<()> {
        self.inner.click(node).await
    }

    async fn type_text(&self, node: &SnapshotNode, text: &str) -> DriverResult<()> {
        self.inner.type_text(node, text).await
    }

    async fn is_session_alive(&self) -> bool {
        self.inner.is_session_alive().await
    }

    async fn release(&mut self) -> DriverResult<()> {
        self.inner.release().await
    }
}
