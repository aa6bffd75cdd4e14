// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Follower poll task.
//!
//! Runs a poll tick on a fixed delay until shutdown is signaled or the
//! registry is dropped.
//!
//! # Algorithm
//!
//! 1. Read the store generation
//! 2. Equal to the observed one → nothing to do
//! 3. Newer → enumerate everything, compile (reusing unchanged rewriters),
//!    publish the full new snapshot, notify
//! 4. Failure → log, keep the previous snapshot, try again next tick

use super::{PollOutcome, RegistryInner};
use crate::error::RegistryError;
use crate::store::DefinitionStore;
use std::sync::Weak;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn, Instrument};

/// Run the poll loop.
///
/// Holds only a weak reference so a dropped registry ends the task.
pub(super) async fn run_poller<S: DefinitionStore>(
    inner: Weak<RegistryInner<S>>,
    tenant: String,
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let span = tracing::info_span!("rewriter_poll", tenant = %tenant);

    async move {
        // Mark initial shutdown value as seen so changed() only fires on actual changes
        if *shutdown_rx.borrow_and_update() {
            debug!("Shutdown already signaled, poll task not started");
            return;
        }

        info!(interval_ms = period.as_millis() as u64, "Starting rewriter poll task");

        // First tick one period after start; bootstrap just loaded everything.
        let mut timer = interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                result = shutdown_rx.changed() => {
                    if result.is_err() || *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping poll task");
                        break;
                    }
                    continue;
                }

                _ = timer.tick() => {}
            }

            let Some(registry) = inner.upgrade() else {
                debug!("Registry dropped, stopping poll task");
                break;
            };

            match registry.poll_tick().await {
                Ok(PollOutcome::Unchanged) => {
                    debug!("Store generation unchanged");
                }
                Ok(PollOutcome::Reloaded(stats)) => {
                    info!(
                        generation = stats.generation,
                        added = stats.added,
                        updated = stats.updated,
                        removed = stats.removed,
                        unchanged = stats.unchanged,
                        "Reloaded rewriters"
                    );
                }
                Ok(PollOutcome::GenerationRegressed { .. }) => {}
                Err(RegistryError::Shutdown) => {
                    debug!("Registry torn down, stopping poll task");
                    break;
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        retryable = e.is_retryable(),
                        "Poll tick failed, keeping previous snapshot"
                    );
                }
            }
        }

        info!("Rewriter poll task stopped");
    }
    .instrument(span)
    .await
}
