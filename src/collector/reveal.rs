//! The reveal loop
//!
//! Each iteration scrolls back to the content boundary, waits for the page to
//! render, activates the reveal trigger, extracts what is visible, and folds
//! the unseen candidates into the [`CollectionState`]. A [`TerminationDecision`]
//! is taken at the end of every iteration.

use crate::collector::extract::ContentExtractor;
use crate::collector::state::{CollectionState, TerminationDecision};
use crate::config::CollectionConfig;
use crate::driver::{DriverError, PageDriver};
use crate::record::Record;
use crate::HarvestError;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Limits that bound one reveal loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevealSettings {
    pub max_duration: Duration,
    pub pause_per_step: Duration,
    pub no_new_content_limit: u32,
}

impl Default for RevealSettings {
    fn default() -> Self {
        Self::from(&CollectionConfig::default())
    }
}

impl From<&CollectionConfig> for RevealSettings {
    fn from(config: &CollectionConfig) -> Self {
        Self {
            max_duration: config.max_duration(),
            pause_per_step: config.pause_per_step(),
            no_new_content_limit: config.no_new_content_limit,
        }
    }
}

/// What happened when the trigger was activated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    Fired,
    Absent,
    Failed,
}

/// Pure termination check run after each iteration
///
/// `iteration` is 1-based. A missing trigger on the first iteration is
/// tolerated because the page may not have rendered it yet.
pub fn decide(
    settings: &RevealSettings,
    elapsed: Duration,
    streak: u32,
    iteration: u32,
    trigger: TriggerOutcome,
) -> TerminationDecision {
    if elapsed >= settings.max_duration {
        return TerminationDecision::StopTimeExceeded;
    }
    if streak >= settings.no_new_content_limit {
        return TerminationDecision::StopNoNewContent;
    }
    match trigger {
        TriggerOutcome::Failed => TerminationDecision::StopNoMoreTrigger,
        TriggerOutcome::Absent if iteration > 1 => TerminationDecision::StopNoMoreTrigger,
        _ => TerminationDecision::Continue,
    }
}

/// Drives a page until no more content can be revealed
#[derive(Debug, Clone, Default)]
pub struct RevealLoop {
    settings: RevealSettings,
}

impl RevealLoop {
    pub fn new(settings: RevealSettings) -> Self {
        Self { settings }
    }

    /// Runs a fresh, uncancellable collection and returns its records
    pub async fn collect<D, E>(&self, driver: &D, extractor: &mut E) -> crate::Result<Vec<Record>>
    where
        D: PageDriver,
        E: ContentExtractor<D>,
    {
        let mut state = CollectionState::new(extractor.kind());
        self.run(driver, extractor, &mut state, &CancellationToken::new())
            .await?;
        Ok(state.into_records())
    }

    /// Runs the loop, accumulating into `state`
    ///
    /// The state is borrowed so that whatever was collected survives an
    /// error or a cancellation and can still be persisted by the caller.
    ///
    /// # Arguments
    ///
    /// * `driver` - Page to reveal content on, already opened
    /// * `extractor` - Reads candidate records from the visible page
    /// * `state` - Collected records, fingerprints and counters
    /// * `cancel` - Checked between iterations and during every pause
    ///
    /// # Returns
    ///
    /// * `Ok(TerminationDecision)` - Why the loop stopped; never `Continue`
    /// * `Err(HarvestError::SessionLost)` - The browser session went away
    pub async fn run<D, E>(
        &self,
        driver: &D,
        extractor: &mut E,
        state: &mut CollectionState,
        cancel: &CancellationToken,
    ) -> crate::Result<TerminationDecision>
    where
        D: PageDriver,
        E: ContentExtractor<D>,
    {
        // Harvest what is already rendered; a page-replacing trigger would lose it
        let primed = self.harvest(driver, extractor, state).await?;
        tracing::info!("Found {} {} records on the initial page", primed, state.kind());

        let mut iteration: u32 = 0;
        loop {
            if cancel.is_cancelled() {
                tracing::info!("Collection interrupted after {} iterations", iteration);
                return Ok(TerminationDecision::StopInterrupted);
            }
            iteration += 1;

            // Step 1: return to the content boundary
            if let Err(e) = driver.scroll_to_top().await {
                check_session(driver, &e).await?;
                tracing::warn!("Failed to reset scroll position: {}", e);
            }

            // Step 2: let the page settle, then ask for more
            if !self.pause(cancel).await {
                return Ok(TerminationDecision::StopInterrupted);
            }

            let trigger = match driver.trigger_more().await {
                Ok(true) => TriggerOutcome::Fired,
                Ok(false) => TriggerOutcome::Absent,
                Err(e) => {
                    tracing::warn!("Reveal trigger failed: {}", e);
                    TriggerOutcome::Failed
                }
            };

            if trigger == TriggerOutcome::Fired && !self.pause(cancel).await {
                return Ok(TerminationDecision::StopInterrupted);
            }

            // Step 3: fold whatever is now visible into the state
            let new_found = self.harvest(driver, extractor, state).await?;
            state.record_iteration(new_found);

            tracing::info!(
                "Iteration {}: {} new, {} total, streak {}",
                iteration,
                new_found,
                state.len(),
                state.streak()
            );

            // Step 4: time budget, streak, trigger
            let decision = decide(
                &self.settings,
                state.elapsed(),
                state.streak(),
                iteration,
                trigger,
            );
            if decision.is_stop() {
                tracing::info!(
                    "Stopping after {} iterations: {} ({} records)",
                    iteration,
                    decision,
                    state.len()
                );
                return Ok(decision);
            }
        }
    }

    /// Sleeps for one step; returns false if cancelled while waiting
    async fn pause(&self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(self.settings.pause_per_step) => true,
        }
    }

    /// Extracts the visible candidates and folds them into the state
    async fn harvest<D, E>(
        &self,
        driver: &D,
        extractor: &mut E,
        state: &mut CollectionState,
    ) -> crate::Result<usize>
    where
        D: PageDriver,
        E: ContentExtractor<D>,
    {
        let extraction = match extractor.extract_visible(driver).await {
            Ok(extraction) => extraction,
            Err(e) => {
                check_session(driver, &e).await?;
                tracing::warn!("Extraction failed, treating as empty: {}", e);
                Default::default()
            }
        };

        if extraction.stale > 0 {
            tracing::debug!("Skipped {} stale candidates", extraction.stale);
        }
        state.note_stale(extraction.stale);
        if let Some(name) = extractor.counterpart() {
            state.note_counterpart(name);
        }
        if state.column_headers().is_empty() && !extractor.column_headers().is_empty() {
            state.set_column_headers(extractor.column_headers().to_vec());
        }

        let new_found = state.absorb(extraction.records);
        if new_found == 0 && !driver.is_session_alive().await {
            return Err(HarvestError::SessionLost(
                "browser stopped responding".to_string(),
            ));
        }
        Ok(new_found)
    }
}

/// Turns a driver failure into `SessionLost` when the session is gone
async fn check_session<D: PageDriver>(driver: &D, err: &DriverError) -> crate::Result<()> {
    if driver.is_session_alive().await {
        Ok(())
    } else {
        Err(HarvestError::SessionLost(err.to_string()))
    }
}
