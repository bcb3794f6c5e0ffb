//! Live browser session over the Chrome DevTools Protocol

use crate::config::BrowserOptions;
use crate::driver::{DriverError, DriverResult, PageDriver, RevealSelectors, TriggerAction};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;

/// Page driver backed by a Chrome instance
pub struct ChromiumDriver {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    selectors: RevealSelectors,
    /// False when attached to a browser someone else started
    owns_browser: bool,
}

fn browser_error(e: CdpError) -> DriverError {
    DriverError::Browser(e.to_string())
}

fn element_error(e: CdpError) -> DriverError {
    DriverError::StaleNode(e.to_string())
}

/// CDP reports an empty query as an error
fn is_not_found(e: &CdpError) -> bool {
    matches!(e, CdpError::NotFound) || e.to_string().contains("not find node")
}

impl ChromiumDriver {
    /// Launches Chrome, or attaches to `remote_url` when configured
    ///
    /// # Arguments
    ///
    /// * `options` - Headless mode, sandboxing and optional remote endpoint
    /// * `selectors` - Scroll container and trigger used by the reveal operations
    ///
    /// # Returns
    ///
    /// * `Ok(ChromiumDriver)` - A driver on a blank page
    /// * `Err(DriverError::Browser)` - Chrome could not be started or reached
    pub async fn launch(options: &BrowserOptions, selectors: RevealSelectors) -> DriverResult<Self> {
        // Step 1: own a browser process, or borrow a running one
        let (browser, mut handler, owns_browser) = match &options.remote_url {
            Some(remote) => {
                tracing::info!("Attaching to browser at {}", remote);
                let (browser, handler) = Browser::connect(remote.as_str())
                    .await
                    .map_err(browser_error)?;
                (browser, handler, false)
            }
            None => {
                let mut builder = BrowserConfig::builder();
                if !options.headless {
                    builder = builder.with_head();
                }
                if options.no_sandbox {
                    builder = builder.no_sandbox();
                }
                let config = builder.build().map_err(DriverError::Browser)?;

                let (browser, handler) = Browser::launch(config).await.map_err(browser_error)?;
                (browser, handler, true)
            }
        };

        // Step 2: CDP events must be drained for any command to complete
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("Browser handler event error: {}", e);
                }
            }
        });

        // Step 3: a page to drive
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(browser_error)?;

        Ok(Self {
            browser,
            page,
            handler,
            selectors,
            owns_browser,
        })
    }

    async fn run_script(&self, script: String) -> DriverResult<()> {
        self.page
            .evaluate(script)
            .await
            .map(|_| ())
            .map_err(browser_error)
    }
}

#[async_trait]
impl PageDriver for ChromiumDriver {
    type Node = Element;

    async fn open(&self, url: &str) -> DriverResult<()> {
        self.page
            .goto(url)
            .await
            .map(|_| ())
            .map_err(|e| DriverError::Navigation(format!("{}: {}", url, e)))
    }

    async fn scroll_to_top(&self) -> DriverResult<()> {
        let script = match &self.selectors.scroll_container {
            Some(container) => {
                let quoted = serde_json::to_string(container)
                    .map_err(|e| DriverError::InvalidSelector(e.to_string()))?;
                format!(
                    "(() => {{ const el = document.querySelector({}); if (el) {{ el.scrollTop = 0; }} }})()",
                    quoted
                )
            }
            None => "window.scrollTo(0, 0)".to_string(),
        };
        self.run_script(script).await
    }

    async fn trigger_more(&self) -> DriverResult<bool> {
        let mut triggers = self.query_nodes(&self.selectors.trigger).await?;

        match self.selectors.action {
            TriggerAction::ScrollIntoView => {
                if triggers.is_empty() {
                    return Ok(false);
                }
                let sentinel = triggers.swap_remove(0);
                sentinel.scroll_into_view().await.map_err(browser_error)?;
                Ok(true)
            }
            TriggerAction::Click => {
                let Some(next) = triggers.pop() else {
                    return Ok(false);
                };
                if next
                    .attribute("disabled")
                    .await
                    .map_err(element_error)?
                    .is_some()
                {
                    return Ok(false);
                }
                next.click().await.map_err(browser_error)?;
                Ok(true)
            }
        }
    }

    async fn query_nodes(&self, selector: &str) -> DriverResult<Vec<Element>> {
        match self.page.find_elements(selector).await {
            Ok(nodes) => Ok(nodes),
            Err(e) if is_not_found(&e) => Ok(Vec::new()),
            Err(e) => Err(browser_error(e)),
        }
    }

    async fn query_within(&self, node: &Element, selector: &str) -> DriverResult<Vec<Element>> {
        match node.find_elements(selector).await {
            Ok(nodes) => Ok(nodes),
            Err(e) if is_not_found(&e) => Ok(Vec::new()),
            Err(e) => Err(element_error(e)),
        }
    }

    async fn read_text(&self, node: &Element) -> DriverResult<String> {
        node.inner_text()
            .await
            .map(Option::unwrap_or_default)
            .map_err(element_error)
    }

    async fn read_attribute(&self, node: &Element, name: &str) -> DriverResult<Option<String>> {
        node.attribute(name).await.map_err(element_error)
    }

    async fn click(&self, node: &Element) -> DriverResult<()> {
        node.click().await.map(|_| ()).map_err(element_error)
    }

    async fn type_text(&self, node: &Element, text: &str) -> DriverResult<()> {
        node.click().await.map_err(element_error)?;
        node.type_str(text).await.map(|_| ()).map_err(element_error)
    }

    async fn is_session_alive(&self) -> bool {
        self.page.evaluate("document.readyState").await.is_ok()
    }

    async fn release(&mut self) -> DriverResult<()> {
        let result = if self.owns_browser {
            self.browser.close().await.map(|_| ())
        } else {
            self.page.clone().close().await
        };
        self.handler.abort();
        result.map_err(browser_error)
    }
}
