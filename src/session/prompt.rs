//! Asking the operator for a verification code

use async_trait::async_trait;
use std::io::{self, BufRead, Write};

/// Source of the one-time code sent to the account's email
#[async_trait]
pub trait VerificationPrompt: Send + Sync {
    /// Returns the code, or `None` if the operator gave none
    async fn request_code(&self, email: &str) -> Option<String>;
}

/// Reads the code from the terminal
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinPrompt;

#[async_trait]
impl VerificationPrompt for StdinPrompt {
    async fn request_code(&self, email: &str) -> Option<String> {
        let message = format!("Enter the verification code sent to {}: ", email);
        let line = tokio::task::spawn_blocking(move || -> io::Result<String> {
            let mut stdout = io::stdout();
            stdout.write_all(message.as_bytes())?;
            stdout.flush()?;

            let mut line = String::new();
            io::stdin().lock().read_line(&mut line)?;
            Ok(line)
        })
        .await;

        match line {
            Ok(Ok(line)) => Some(line.trim().to_string()).filter(|code| !code.is_empty()),
            Ok(Err(e)) => {
                tracing::warn!("Failed to read verification code: {}", e);
                None
            }
            Err(e) => {
                tracing::warn!("Verification prompt aborted: {}", e);
                None
            }
        }
    }
}

/// Answers with a code known in advance
#[derive(Debug, Clone, Default)]
pub struct FixedPrompt {
    code: Option<String>,
}

impl FixedPrompt {
    pub fn new(code: Option<&str>) -> Self {
        Self {
            code: code.map(str::to_string),
        }
    }
}

#[async_trait]
impl VerificationPrompt for FixedPrompt {
    async fn request_code(&self, _email: &str) -> Option<String> {
        self.code.clone()
    }
}
