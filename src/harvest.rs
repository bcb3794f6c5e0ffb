//! Run orchestration and crash-safe persistence
//!
//! A [`Harvest`] establishes the session, opens the target, runs the reveal
//! loop and hands the result to a [`CrashSafePersister`]. Whatever the exit
//! path (completion, interrupt, error or panic inside the loop) the records
//! collected so far are persisted at most once and the driver is released.

use crate::collector::{CollectionState, ContentExtractor, RevealLoop, TerminationDecision};
use crate::driver::PageDriver;
use crate::output::{HarvestReport, PersistOutcome, Writer};
use crate::record::DedupStore;
use crate::session::Session;
use crate::HarvestError;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Persists a run's records exactly once, whatever way the run ended
pub struct CrashSafePersister {
    writer: Box<dyn Writer>,
    destination: PathBuf,
}

impl CrashSafePersister {
    pub fn new(writer: Box<dyn Writer>, destination: impl Into<PathBuf>) -> Self {
        Self {
            writer,
            destination: destination.into(),
        }
    }

    /// Flushes `state` according to how the loop ended
    ///
    /// - Completed: always persisted
    /// - Interrupted: persisted if anything was collected
    /// - Failed: persisted if anything was collected, then the failure is
    ///   returned wrapped in [`HarvestError::Partial`]
    ///
    /// # Arguments
    ///
    /// * `state` - Records collected by the reveal loop
    /// * `source_url` - Page the records came from
    /// * `outcome` - How the reveal loop ended
    ///
    /// # Returns
    ///
    /// * `Ok(Some(PersistOutcome))` - Records were written
    /// * `Ok(None)` - Interrupted before anything was collected, nothing written
    /// * `Err(HarvestError)` - The loop failed; `Partial` when records were saved first
    pub async fn finish(
        &self,
        state: &CollectionState,
        source_url: &str,
        outcome: crate::Result<TerminationDecision>,
    ) -> crate::Result<Option<PersistOutcome>> {
        match outcome {
            // Normal stop: write even an empty batch so the run leaves a trace
            Ok(decision) if decision.is_complete() => {
                let saved = self.persist(state, source_url).await?;
                Ok(Some(saved))
            }
            Ok(_) => {
                if state.is_empty() {
                    tracing::info!("Interrupted before anything was collected, nothing to save");
                    return Ok(None);
                }
                tracing::info!("Interrupted, saving {} records collected so far", state.len());
                let saved = self.persist(state, source_url).await?;
                Ok(Some(saved))
            }
            Err(e) => {
                // Nothing to salvage, surface the failure as is
                if state.is_empty() {
                    return Err(e);
                }
                tracing::error!("Collection failed: {}", e);
                tracing::info!("Saving {} records collected before the failure", state.len());
                match self.persist(state, source_url).await {
                    Ok(saved) => Err(HarvestError::Partial {
                        saved: saved.saved,
                        destination: saved.destination,
                        source: Box::new(e),
                    }),
                    Err(persist_err) => {
                        tracing::error!("Failed to save partial results: {}", persist_err);
                        Err(e)
                    }
                }
            }
        }
    }

    async fn persist(&self, state: &CollectionState, source_url: &str) -> crate::Result<PersistOutcome> {
        let batch = state.to_batch(source_url);
        Ok(self.writer.persist(&batch, &self.destination).await?)
    }
}

/// Extracts a readable message from a caught panic
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// One collection run against one target page
pub struct Harvest {
    target_url: String,
    reveal: RevealLoop,
    ready: Option<(String, Duration)>,
    dedup: Option<Arc<DedupStore>>,
}

impl Harvest {
    pub fn new(target_url: impl Into<String>, reveal: RevealLoop) -> Self {
        Self {
            target_url: target_url.into(),
            reveal,
            ready: None,
            dedup: None,
        }
    }

    /// Waits for `selector` after opening the target; proceeds anyway on timeout
    pub fn wait_for_ready(mut self, selector: impl Into<String>, timeout: Duration) -> Self {
        self.ready = Some((selector.into(), timeout));
        self
    }

    /// Records fingerprints into a store shared with other components
    ///
    /// Without one, every run starts from an empty store of its own.
    pub fn with_dedup(mut self, dedup: Arc<DedupStore>) -> Self {
        self.dedup = Some(dedup);
        self
    }

    /// Runs the whole pipeline and releases the driver afterwards
    ///
    /// Cancelling `cancel` before the reveal loop starts (during login,
    /// navigation or the ready wait) ends the run with nothing persisted.
    ///
    /// # Arguments
    ///
    /// * `driver` - Page driver; released before returning, whatever happened
    /// * `session` - Puts the driver in a state where the target can be read
    /// * `extractor` - Turns visible nodes into records
    /// * `persister` - Writes the records once the loop ends
    /// * `cancel` - Operator interrupt
    ///
    /// # Returns
    ///
    /// * `Ok(HarvestReport)` - The run completed or was interrupted
    /// * `Err(HarvestError)` - Login failed, or the loop failed (see [`CrashSafePersister::finish`])
    pub async fn run<D, S, E>(
        &self,
        driver: &mut D,
        session: &S,
        extractor: &mut E,
        persister: &CrashSafePersister,
        cancel: &CancellationToken,
    ) -> crate::Result<HarvestReport>
    where
        D: PageDriver,
        S: Session<D> + ?Sized,
        E: ContentExtractor<D>,
    {
        let result = self
            .collect_and_persist(&*driver, session, extractor, persister, cancel)
            .await;

        if let Err(e) = driver.release().await {
            tracing::warn!("Failed to release browser session: {}", e);
        }
        result
    }

    async fn collect_and_persist<D, S, E>(
        &self,
        driver: &D,
        session: &S,
        extractor: &mut E,
        persister: &CrashSafePersister,
        cancel: &CancellationToken,
    ) -> crate::Result<HarvestReport>
    where
        D: PageDriver,
        S: Session<D> + ?Sized,
        E: ContentExtractor<D>,
    {
        let started = Instant::now();
        let mut state = CollectionState::with_store(
            extractor.kind(),
            self.dedup
                .clone()
                .unwrap_or_else(|| Arc::new(DedupStore::new())),
        );

        // Login and navigation can take a while; an interrupt abandons them
        match until_cancelled(cancel, session.establish(driver)).await {
            Some(result) => result?,
            None => return Ok(self.abandoned(&state, started)),
        }

        tracing::info!("Opening {}", self.target_url);
        match until_cancelled(cancel, driver.open(&self.target_url)).await {
            Some(result) => result?,
            None => return Ok(self.abandoned(&state, started)),
        }

        if let Some((selector, timeout)) = &self.ready {
            match until_cancelled(cancel, driver.wait_for(selector, *timeout)).await {
                Some(Ok(_)) => {}
                Some(Err(e)) => tracing::warn!("Content did not appear ({}), proceeding anyway", e),
                None => return Ok(self.abandoned(&state, started)),
            }
        }

        // Panics inside the loop surface as `Panicked` and still reach the persister
        let outcome = AssertUnwindSafe(self.reveal.run(driver, extractor, &mut state, cancel))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(HarvestError::Panicked(panic_message(payload.as_ref()))));

        let reason = outcome
            .as_ref()
            .map(|decision| *decision)
            .unwrap_or(TerminationDecision::StopInterrupted);
        let persisted = persister.finish(&state, &self.target_url, outcome).await?;

        let report = build_report(&state, reason, persisted, started);
        tracing::info!("{}", report.summary_line());
        Ok(report)
    }

    /// Report for a run interrupted before the reveal loop started
    fn abandoned(&self, state: &CollectionState, started: Instant) -> HarvestReport {
        tracing::info!("Interrupted before collection started, nothing to save");
        build_report(state, TerminationDecision::StopInterrupted, None, started)
    }
}

/// Awaits `future` unless `cancel` fires first
///
/// Returns `None` when cancelled. Cancellation wins when both are ready.
async fn until_cancelled<F: Future>(cancel: &CancellationToken, future: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        output = future => Some(output),
    }
}

fn build_report(
    state: &CollectionState,
    reason: TerminationDecision,
    persisted: Option<PersistOutcome>,
    started: Instant,
) -> HarvestReport {
    HarvestReport {
        kind: state.kind(),
        reason,
        collected: state.len(),
        saved: persisted.as_ref().map(|p| p.saved).unwrap_or(0),
        destination: persisted.map(|p| p.destination),
        stats: state.stats(),
        elapsed: started.elapsed(),
    }
}
