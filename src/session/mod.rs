//! Session establishment
//!
//! A [`Session`] puts the browser in a state where the target pages can be
//! read. Failures are fatal: collection never starts without a ready session.

mod login;
mod prompt;

pub use login::EmailCodeSession;
pub use prompt::{FixedPrompt, StdinPrompt, VerificationPrompt};

use crate::driver::PageDriver;
use crate::AuthError;
use async_trait::async_trait;
use std::fmt;

/// Account identity used to log in
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Keep the address out of debug logs
        let domain = self.email.split('@').nth(1).unwrap_or("?");
        f.debug_struct("Credentials")
            .field("email", &format_args!("***@{}", domain))
            .finish()
    }
}

/// Establishes and checks an authenticated session on a driver
#[async_trait]
pub trait Session<D: PageDriver>: Send + Sync {
    async fn establish(&self, driver: &D) -> Result<(), AuthError>;

    /// Returns true once the session can read protected pages
    async fn is_ready(&self, driver: &D) -> bool;
}

/// Session for pages that need no login, such as saved snapshots
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSession;

#[async_trait]
impl<D: PageDriver> Session<D> for NoSession {
    async fn establish(&self, _driver: &D) -> Result<(), AuthError> {
        Ok(())
    }

    async fn is_ready(&self, driver: &D) -> bool {
        driver.is_session_alive().await
    }
}
