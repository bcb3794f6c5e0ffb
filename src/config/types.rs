use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Backscroll
///
/// Every section is optional. Missing keys fall back to the selectors and
/// limits of the Poe web client.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub collection: CollectionConfig,
    pub fetch: FetchConfig,
    pub browser: BrowserOptions,
    pub session: SessionConfig,
    pub transcript: TranscriptConfig,
    pub images: ImagesConfig,
    pub metrics: MetricsConfig,
}

/// Reveal loop limits
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CollectionConfig {
    /// Overall wall-clock budget for one reveal loop (seconds)
    pub max_duration_secs: u64,

    /// Pause after each scroll or trigger so the page can render (milliseconds)
    pub pause_per_step_ms: u64,

    /// Consecutive iterations without new records before giving up
    pub no_new_content_limit: u32,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            max_duration_secs: 600,
            pause_per_step_ms: 2000,
            no_new_content_limit: 5,
        }
    }
}

impl CollectionConfig {
    pub fn max_duration(&self) -> Duration {
        Duration::from_secs(self.max_duration_secs)
    }

    pub fn pause_per_step(&self) -> Duration {
        Duration::from_millis(self.pause_per_step_ms)
    }
}

/// Asset download settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FetchConfig {
    /// Maximum number of concurrent asset downloads
    pub concurrency_limit: usize,

    /// Per-asset timeout (seconds)
    pub timeout_secs: u64,

    /// User agent sent with asset requests
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: 20,
            timeout_secs: 10,
            user_agent: format!("backscroll/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Browser launch settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BrowserOptions {
    /// Run without a visible window
    pub headless: bool,

    /// Connect to an existing DevTools endpoint instead of launching Chrome
    pub remote_url: Option<String>,

    /// Pass --no-sandbox to Chrome (containers)
    pub no_sandbox: bool,

    /// How long to wait for the first content after opening the target (seconds)
    pub ready_timeout_secs: u64,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            headless: false,
            remote_url: None,
            no_sandbox: false,
            ready_timeout_secs: 20,
        }
    }
}

impl BrowserOptions {
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }
}

/// Email + verification code login flow
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SessionConfig {
    pub login_url: String,
    pub email_input: String,

    /// Selector for buttons; the submit button is the one whose text matches `submit-text`
    pub submit_button: String,
    pub submit_text: String,

    pub code_input: String,
    pub login_button: String,
    pub login_text: String,

    /// Element shown by the login page when the email is rejected
    pub error_message: Option<String>,

    /// Timeout for each login form element (seconds)
    pub wait_timeout_secs: u64,

    /// Time allowed for the login redirect to settle (milliseconds)
    pub settle_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            login_url: "https://poe.com/login".to_string(),
            email_input: "input[type='email']".to_string(),
            submit_button: "button".to_string(),
            submit_text: "Go".to_string(),
            code_input: "input[class*='VerificationCodeInput']".to_string(),
            login_button: "button".to_string(),
            login_text: "Log In".to_string(),
            error_message: None,
            wait_timeout_secs: 30,
            settle_ms: 5000,
        }
    }
}

impl SessionConfig {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

/// Selectors for chat transcript collection
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TranscriptConfig {
    pub scroll_container: String,
    pub trigger: String,
    pub message_pair: String,
    pub human_bubble: String,
    pub bot_bubble: String,
    pub bot_name: String,

    /// Directory transcripts are written to when no output is given
    pub output_dir: String,
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            scroll_container: "div[class*='ChatMessagesScrollWrapper']".to_string(),
            trigger: "div[class*='InfiniteScroll_pagingTrigger']".to_string(),
            message_pair: "div[class*='ChatMessagesView_messagePair']".to_string(),
            human_bubble: "div[class*='Message_humanMessageBubble']".to_string(),
            bot_bubble: "div[class*='Message_botMessageBubble']".to_string(),
            bot_name: "div[class*='BotHeader_textContainer'] p".to_string(),
            output_dir: "PoeChatTranscripts".to_string(),
        }
    }
}

/// Selectors for image collection
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ImagesConfig {
    pub scroll_container: String,
    pub trigger: String,

    /// Element whose presence means the conversation has rendered
    pub ready: String,

    pub image: String,

    /// Message containers scanned for image links in plain text
    pub text_container: String,

    pub output_dir: String,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            scroll_container: "div[class*='ChatMessagesScrollWrapper']".to_string(),
            trigger: "div[class*='InfiniteScroll_pagingTrigger']".to_string(),
            ready: "div[class*='ChatMessagesView_messagePair']".to_string(),
            image: "img[src^='http']".to_string(),
            text_container: "div[class*='Markdown_markdownContainer']".to_string(),
            output_dir: "PoeChatImages".to_string(),
        }
    }
}

/// Selectors for the paginated metrics table
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct MetricsConfig {
    pub page_url: String,
    pub table: String,
    pub header_cell: String,
    pub row: String,
    pub cell: String,

    /// Element inside a cell holding its main value; the whole cell text is used when unset
    pub cell_value: Option<String>,

    /// Number of cells a complete row has; shorter rows are padded
    pub expected_cells: usize,

    /// Pagination buttons; the last match is "next page"
    pub next_button: String,

    pub output_file: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            page_url: "https://poe.com/creators".to_string(),
            table: "table[class*='CreatorHubBotMetricsTable_table']".to_string(),
            header_cell: "th".to_string(),
            row: "tr".to_string(),
            cell: "td".to_string(),
            cell_value: Some(
                "[class*='CreatorHubBotMetricsTable_botName'], \
                 [class*='CreatorHubBotMetricsTable_mainEarnings']"
                    .to_string(),
            ),
            expected_cells: 6,
            next_button: "div[class*='CreatorHubBotMetricsTable_pagingSection'] button"
                .to_string(),
            output_file: "poe_creator_earnings.csv".to_string(),
        }
    }
}
