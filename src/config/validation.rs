use crate::config::types::{
    BrowserOptions, CollectionConfig, Config, FetchConfig, ImagesConfig, MetricsConfig,
    SessionConfig, TranscriptConfig,
};
use crate::ConfigError;
use scraper::Selector;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_collection_config(&config.collection)?;
    validate_fetch_config(&config.fetch)?;
    validate_browser_options(&config.browser)?;
    validate_session_config(&config.session)?;
    validate_transcript_config(&config.transcript)?;
    validate_images_config(&config.images)?;
    validate_metrics_config(&config.metrics)?;
    Ok(())
}

/// Validates reveal loop limits
fn validate_collection_config(config: &CollectionConfig) -> Result<(), ConfigError> {
    if config.max_duration_secs < 1 {
        return Err(ConfigError::Validation(
            "max-duration-secs must be >= 1".to_string(),
        ));
    }

    if config.pause_per_step_ms > 60_000 {
        return Err(ConfigError::Validation(format!(
            "pause-per-step-ms must be <= 60000, got {}",
            config.pause_per_step_ms
        )));
    }

    if config.no_new_content_limit < 1 {
        return Err(ConfigError::Validation(
            "no-new-content-limit must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates asset download settings
fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.concurrency_limit < 1 || config.concurrency_limit > 100 {
        return Err(ConfigError::Validation(format!(
            "concurrency-limit must be between 1 and 100, got {}",
            config.concurrency_limit
        )));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_browser_options(config: &BrowserOptions) -> Result<(), ConfigError> {
    if let Some(remote) = &config.remote_url {
        let url = Url::parse(remote)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid remote-url '{}': {}", remote, e)))?;
        if !matches!(url.scheme(), "ws" | "wss" | "http" | "https") {
            return Err(ConfigError::Validation(format!(
                "remote-url '{}' must use ws, wss, http or https",
                remote
            )));
        }
    }

    Ok(())
}

fn validate_session_config(config: &SessionConfig) -> Result<(), ConfigError> {
    validate_page_url("login-url", &config.login_url)?;
    validate_selector("session.email-input", &config.email_input)?;
    validate_selector("session.submit-button", &config.submit_button)?;
    validate_selector("session.code-input", &config.code_input)?;
    validate_selector("session.login-button", &config.login_button)?;
    if let Some(error_message) = &config.error_message {
        validate_selector("session.error-message", error_message)?;
    }

    if config.submit_text.trim().is_empty() || config.login_text.trim().is_empty() {
        return Err(ConfigError::Validation(
            "submit-text and login-text cannot be empty".to_string(),
        ));
    }

    if config.wait_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "wait-timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_transcript_config(config: &TranscriptConfig) -> Result<(), ConfigError> {
    validate_selector("transcript.scroll-container", &config.scroll_container)?;
    validate_selector("transcript.trigger", &config.trigger)?;
    validate_selector("transcript.message-pair", &config.message_pair)?;
    validate_selector("transcript.human-bubble", &config.human_bubble)?;
    validate_selector("transcript.bot-bubble", &config.bot_bubble)?;
    validate_selector("transcript.bot-name", &config.bot_name)?;
    validate_output_path("transcript.output-dir", &config.output_dir)
}

fn validate_images_config(config: &ImagesConfig) -> Result<(), ConfigError> {
    validate_selector("images.scroll-container", &config.scroll_container)?;
    validate_selector("images.trigger", &config.trigger)?;
    validate_selector("images.ready", &config.ready)?;
    validate_selector("images.image", &config.image)?;
    validate_selector("images.text-container", &config.text_container)?;
    validate_output_path("images.output-dir", &config.output_dir)
}

fn validate_metrics_config(config: &MetricsConfig) -> Result<(), ConfigError> {
    validate_page_url("metrics.page-url", &config.page_url)?;
    validate_selector("metrics.table", &config.table)?;
    validate_selector("metrics.header-cell", &config.header_cell)?;
    validate_selector("metrics.row", &config.row)?;
    validate_selector("metrics.cell", &config.cell)?;
    validate_selector("metrics.next-button", &config.next_button)?;
    if let Some(cell_value) = &config.cell_value {
        validate_selector("metrics.cell-value", cell_value)?;
    }

    if config.expected_cells > 64 {
        return Err(ConfigError::Validation(format!(
            "metrics.expected-cells must be <= 64, got {}",
            config.expected_cells
        )));
    }

    validate_output_path("metrics.output-file", &config.output_file)
}

/// Validates that a CSS selector is non-empty and parses
fn validate_selector(name: &str, selector: &str) -> Result<(), ConfigError> {
    if selector.trim().is_empty() {
        return Err(ConfigError::InvalidSelector(format!(
            "{} cannot be empty",
            name
        )));
    }

    Selector::parse(selector)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidSelector(format!("{} '{}': {:?}", name, selector, e)))
}

fn validate_page_url(name: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", name, value, e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Validation(format!(
            "{} '{}' must use http or https",
            name, value
        )));
    }

    Ok(())
}

fn validate_output_path(name: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
    }
    Ok(())
}
