//! Email and one-time-code login

use crate::config::SessionConfig;
use crate::driver::{wait_for_text, DriverError, PageDriver};
use crate::session::{Credentials, Session, VerificationPrompt};
use crate::AuthError;
use async_trait::async_trait;

/// Logs in by email, then by a code the operator reads from their inbox
pub struct EmailCodeSession<P> {
    config: SessionConfig,
    credentials: Credentials,
    prompt: P,
}

impl<P: VerificationPrompt> EmailCodeSession<P> {
    pub fn new(config: SessionConfig, credentials: Credentials, prompt: P) -> Self {
        Self {
            config,
            credentials,
            prompt,
        }
    }

    /// Decides why the code input never showed up
    async fn rejected_or_timed_out<D: PageDriver>(&self, driver: &D, err: DriverError) -> AuthError {
        if let Some(selector) = &self.config.error_message {
            if let Ok(nodes) = driver.query_nodes(selector).await {
                if let Some(node) = nodes.first() {
                    let message = driver.read_text(node).await.unwrap_or_default();
                    return AuthError::InvalidCredentials(message.trim().to_string());
                }
            }
        }
        wait_error(err)
    }
}

fn wait_error(err: DriverError) -> AuthError {
    match err {
        DriverError::Timeout(what) => AuthError::Timeout(what),
        other => AuthError::Unavailable(other.to_string()),
    }
}

fn unavailable(err: DriverError) -> AuthError {
    AuthError::Unavailable(err.to_string())
}

#[async_trait]
impl<D: PageDriver, P: VerificationPrompt> Session<D> for EmailCodeSession<P> {
    async fn establish(&self, driver: &D) -> Result<(), AuthError> {
        let wait = self.config.wait_timeout();

        // Step 1: email form
        tracing::info!("Navigating to login page...");
        driver
            .open(&self.config.login_url)
            .await
            .map_err(unavailable)?;

        tracing::info!("Entering email...");
        let email_input = driver
            .wait_for(&self.config.email_input, wait)
            .await
            .map_err(wait_error)?;
        driver
            .type_text(&email_input, &self.credentials.email)
            .await
            .map_err(unavailable)?;

        let submit = wait_for_text(
            driver,
            &self.config.submit_button,
            &self.config.submit_text,
            wait,
        )
        .await
        .map_err(wait_error)?;
        driver.click(&submit).await.map_err(unavailable)?;

        // Step 2: one-time code from the operator
        tracing::info!("Waiting for verification code input...");
        let code_input = match driver.wait_for(&self.config.code_input, wait).await {
            Ok(node) => node,
            Err(e) => return Err(self.rejected_or_timed_out(driver, e).await),
        };

        let code = self
            .prompt
            .request_code(&self.credentials.email)
            .await
            .map(|code| code.trim().to_string())
            .filter(|code| !code.is_empty())
            .ok_or(AuthError::ChallengeRequired)?;
        driver
            .type_text(&code_input, &code)
            .await
            .map_err(unavailable)?;

        let login = wait_for_text(
            driver,
            &self.config.login_button,
            &self.config.login_text,
            wait,
        )
        .await
        .map_err(wait_error)?;
        driver.click(&login).await.map_err(unavailable)?;

        // Step 3: the code form should be gone once the code is accepted
        tracing::info!("Waiting for login to complete...");
        tokio::time::sleep(self.config.settle()).await;

        if !self.is_ready(driver).await {
            return Err(AuthError::InvalidCredentials(
                "verification code was not accepted".to_string(),
            ));
        }

        tracing::info!("Login process completed");
        Ok(())
    }

    /// Ready once the code form is gone and the browser still answers
    async fn is_ready(&self, driver: &D) -> bool {
        if !driver.is_session_alive().await {
            return false;
        }
        matches!(driver.query_nodes(&self.config.code_input).await, Ok(nodes) if nodes.is_empty())
    }
}
