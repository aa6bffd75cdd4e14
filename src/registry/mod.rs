// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Rewriter registry and replication manager.
//!
//! Owns the authoritative in-memory mapping of rewriter id to compiled
//! rewriter for one tenant, and keeps it in step with the persisted store.
//!
//! # Architecture
//!
//! ```text
//!            save()/delete()                      lookup()
//!  leader ─────────────────┐              ┌─────────────────── query threads
//!                          ▼              │
//!                 ┌─────────────────┐     │    ┌──────────────────────────┐
//!                 │  writer Mutex   │────────► │ ArcSwap<RegistrySnapshot>│
//!                 │ (generation,    │ publish  └──────────────────────────┘
//!                 │  listener)      │
//!                 └─────────────────┘
//!                   ▲          │ write/delete/enumerate
//!      poll_tick()  │          ▼
//!  follower timer ──┘   ┌──────────────┐
//!                       │DefinitionStore│
//!                       └──────────────┘
//! ```
//!
//! - Bootstrap, Save, Delete and poll ticks are serialized by one writer
//!   mutex and each hold it for their whole duration.
//! - Every change builds a complete new [`RegistrySnapshot`] and publishes it
//!   with one pointer swap. Lookups never take a lock.
//! - Followers run a fixed-delay poll task that compares the store
//!   generation with the last one observed and reloads the full set when it
//!   moved forward.
//!
//! # Failure Policy
//!
//! Bootstrap is fail-fast: a store that stays unreachable past the retry
//! budget, or any stored definition that does not compile, aborts it and
//! leaves the registry `Failed`. A poll tick that fails the same way is
//! logged, keeps the previous snapshot and observed generation, and is
//! retried on the next tick.

mod poll;
mod types;

pub use types::{PollOutcome, RegistryState, ReloadStats};

use crate::compile::{compile_definition, compile_document, CompiledRewriter};
use crate::config::RegistryConfig;
use crate::definition::{content_hash, RewriterDefinition};
use crate::error::{RegistryError, Result};
use crate::metrics;
use crate::resilience::retry_with_backoff;
use crate::rewrite::FactoryRegistry;
use crate::sink::SinkRegistry;
use crate::snapshot::RegistrySnapshot;
use crate::store::{enumerate_all, DefinitionStore, Document, MemoryDefinitionStore};
use crate::topology::{Role, TopologyProvider};
use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// How long teardown waits for an in-flight poll tick.
const TEARDOWN_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Receives every published non-empty snapshot.
///
/// Called synchronously while the writer lock is held: implementations may
/// call [`RewriterRegistry::lookup`] but must not call mutating operations.
pub trait RewritersChangeListener: Send + Sync {
    fn rewriters_changed(&self, snapshot: &Arc<RegistrySnapshot>);
}

impl<F> RewritersChangeListener for F
where
    F: Fn(&Arc<RegistrySnapshot>) + Send + Sync,
{
    fn rewriters_changed(&self, snapshot: &Arc<RegistrySnapshot>) {
        self(snapshot)
    }
}

/// State guarded by the writer mutex.
#[derive(Default)]
struct WriterState {
    observed_generation: u64,
    listener: Option<Arc<dyn RewritersChangeListener>>,
    bootstrapped: bool,
    /// Set by the first teardown call before it stops the poll task.
    tearing_down: bool,
    torn_down: bool,
}

/// Shared core, also reachable (weakly) from the poll task.
struct RegistryInner<S: DefinitionStore> {
    config: RegistryConfig,
    role: Role,
    store: Arc<S>,
    sinks: Arc<dyn SinkRegistry>,
    factories: FactoryRegistry,
    snapshot: ArcSwap<RegistrySnapshot>,
    writer: Mutex<WriterState>,
    state_tx: watch::Sender<RegistryState>,
    state_rx: watch::Receiver<RegistryState>,
}

/// The rewriter registry for one tenant.
///
/// Created in `Created` state with an empty snapshot. Call
/// [`bootstrap()`](Self::bootstrap) before serving and
/// [`teardown()`](Self::teardown) before releasing the store or sinks.
pub struct RewriterRegistry<S: DefinitionStore = MemoryDefinitionStore> {
    inner: Arc<RegistryInner<S>>,

    /// Shutdown signal sender (poll task)
    shutdown_tx: watch::Sender<bool>,

    /// Poll task handle (followers only)
    poll_handle: Mutex<Option<JoinHandle<()>>>,
}

impl<S: DefinitionStore> RewriterRegistry<S> {
    /// Create a registry.
    ///
    /// The topology provider is asked once; the role never changes afterwards.
    pub fn new(
        config: RegistryConfig,
        topology: &dyn TopologyProvider,
        store: Arc<S>,
        sinks: Arc<dyn SinkRegistry>,
        factories: FactoryRegistry,
    ) -> Result<Self> {
        config.validate()?;

        let role = if topology.is_follower() {
            Role::Follower
        } else {
            Role::Leader
        };
        info!(tenant = %config.tenant, role = %role, "Creating rewriter registry");

        let (state_tx, state_rx) = watch::channel(RegistryState::Created);
        let (shutdown_tx, _) = watch::channel(false);
        metrics::set_registry_state(&config.tenant, "Created");

        Ok(Self {
            inner: Arc::new(RegistryInner {
                config,
                role,
                store,
                sinks,
                factories,
                snapshot: ArcSwap::from_pointee(RegistrySnapshot::empty()),
                writer: Mutex::new(WriterState::default()),
                state_tx,
                state_rx,
            }),
            shutdown_tx,
            poll_handle: Mutex::new(None),
        })
    }

    pub fn tenant(&self) -> &str {
        &self.inner.config.tenant
    }

    pub fn role(&self) -> Role {
        self.inner.role
    }

    /// Get the persisted store.
    pub fn store(&self) -> &Arc<S> {
        &self.inner.store
    }

    /// Get current registry state.
    pub fn state(&self) -> RegistryState {
        self.inner.state()
    }

    /// Get a receiver to watch state changes.
    pub fn state_receiver(&self) -> watch::Receiver<RegistryState> {
        self.inner.state_rx.clone()
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state(), RegistryState::Running)
    }

    /// Store generation reflected by the current snapshot.
    pub fn generation(&self) -> u64 {
        self.inner.snapshot.load().generation()
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.inner.snapshot.load_full()
    }

    /// Look up a compiled rewriter. Never blocks.
    pub fn lookup(&self, rewriter_id: &str) -> Option<Arc<CompiledRewriter>> {
        self.inner.snapshot.load().get(rewriter_id).cloned()
    }

    /// Load every stored definition and install the first snapshot.
    ///
    /// Store reads are retried per the bootstrap config; a definition that
    /// does not compile fails immediately. On failure the registry is
    /// `Failed` and must not serve. Followers start polling on success.
    pub async fn bootstrap(&self) -> Result<()> {
        let inner = &self.inner;
        let mut writer = inner.writer.lock().await;

        if writer.torn_down || writer.tearing_down {
            return Err(RegistryError::Shutdown);
        }
        if writer.bootstrapped || inner.state() != RegistryState::Created {
            return Err(RegistryError::InvalidState {
                expected: "Created".to_string(),
                actual: inner.state().to_string(),
            });
        }

        info!(tenant = %inner.config.tenant, role = %inner.role, "Bootstrapping rewriter registry");
        inner.set_state(RegistryState::Bootstrapping);
        let started = Instant::now();

        let loaded = async {
            let retry = inner.config.bootstrap.retry_config();
            let (generation, documents) = retry_with_backoff(
                &retry,
                "bootstrap_read",
                RegistryError::is_retryable,
                || inner.read_all(),
            )
            .await?;
            let (rewriters, _) = inner.compile_all(&documents, &RegistrySnapshot::empty())?;
            Ok::<_, RegistryError>(RegistrySnapshot::new(generation, rewriters))
        }
        .await;

        let snapshot = match loaded {
            Ok(snapshot) => Arc::new(snapshot),
            Err(e) => {
                error!(tenant = %inner.config.tenant, error = %e, "Bootstrap failed");
                metrics::record_bootstrap(&inner.config.tenant, false, 0, started.elapsed());
                inner.set_state(RegistryState::Failed);
                return Err(e);
            }
        };

        let count = snapshot.len();
        let generation = snapshot.generation();
        inner.publish(&mut writer, snapshot);
        writer.bootstrapped = true;
        inner.set_state(RegistryState::Running);

        // Spawned under the writer lock so a concurrent teardown finds the handle.
        if inner.role.is_follower() {
            self.spawn_poll_task().await;
        }
        drop(writer);

        metrics::record_bootstrap(&inner.config.tenant, true, count, started.elapsed());
        info!(
            tenant = %inner.config.tenant,
            rewriters = count,
            generation,
            "Rewriter registry running"
        );
        Ok(())
    }

    /// Spawn the follower poll task.
    async fn spawn_poll_task(&self) {
        let inner = Arc::downgrade(&self.inner);
        let interval = self.inner.config.polling.interval_duration();
        let tenant = self.inner.config.tenant.clone();
        let shutdown_rx = self.shutdown_tx.subscribe();

        let handle = tokio::spawn(async move {
            poll::run_poller(inner, tenant, interval, shutdown_rx).await;
        });

        info!(interval_ms = interval.as_millis() as u64, "Spawned rewriter poll task");
        *self.poll_handle.lock().await = Some(handle);
    }

    /// Validate, persist and install a definition (leader only).
    ///
    /// Validation compiles the definition and resolves its sinks; on
    /// failure every reason is returned and nothing is persisted.
    pub async fn save(
        &self,
        rewriter_id: &str,
        definition: RewriterDefinition,
    ) -> Result<Arc<CompiledRewriter>> {
        let inner = &self.inner;
        let tenant = inner.config.tenant.as_str();

        if inner.role.is_follower() {
            warn!(tenant, rewriter_id, "Rejected save on follower");
            metrics::record_mutation(tenant, "save", "rejected_role");
            return Err(RegistryError::Role { operation: "save" });
        }

        let mut writer = inner.writer.lock().await;
        inner.ensure_serving(&writer)?;

        if rewriter_id.trim().is_empty() {
            metrics::record_mutation(tenant, "save", "invalid");
            return Err(RegistryError::ConfigValidation {
                rewriter_id: rewriter_id.to_string(),
                reasons: vec!["rewriter id must not be empty".to_string()],
            });
        }

        let document = definition.to_document(tenant, rewriter_id)?;
        let compiled = compile_definition(
            rewriter_id,
            &definition,
            content_hash(&document),
            &inner.factories,
            inner.sinks.as_ref(),
        )
        .map_err(|reasons| {
            debug!(tenant, rewriter_id, reasons = ?reasons, "Rewriter definition rejected");
            metrics::record_validation_failure(tenant, reasons.len());
            metrics::record_mutation(tenant, "save", "invalid");
            RegistryError::ConfigValidation {
                rewriter_id: rewriter_id.to_string(),
                reasons,
            }
        })?;

        let write_start = Instant::now();
        let generation = inner.store.write_document(document).await.map_err(|e| {
            metrics::record_mutation(tenant, "save", "store_error");
            RegistryError::store("write_document", e)
        })?;
        metrics::record_store_latency("write_document", write_start.elapsed());

        let compiled = Arc::new(compiled);
        let generation = generation.max(writer.observed_generation);
        let next = inner
            .snapshot
            .load_full()
            .with_rewriter(generation, Arc::clone(&compiled));
        inner.publish(&mut writer, Arc::new(next));

        metrics::record_mutation(tenant, "save", "ok");
        info!(tenant, rewriter_id, generation, kind = %compiled.kind(), "Saved rewriter");
        Ok(compiled)
    }

    /// Delete a definition (leader only).
    ///
    /// The deletion is persisted first; an id the registry does not know
    /// then fails with [`RegistryError::NotFound`] and leaves the snapshot alone.
    pub async fn delete(&self, rewriter_id: &str) -> Result<()> {
        let inner = &self.inner;
        let tenant = inner.config.tenant.as_str();

        if inner.role.is_follower() {
            warn!(tenant, rewriter_id, "Rejected delete on follower");
            metrics::record_mutation(tenant, "delete", "rejected_role");
            return Err(RegistryError::Role { operation: "delete" });
        }

        let mut writer = inner.writer.lock().await;
        inner.ensure_serving(&writer)?;

        let generation = inner
            .store
            .delete_document(tenant, rewriter_id)
            .await
            .map_err(|e| {
                metrics::record_mutation(tenant, "delete", "store_error");
                RegistryError::store("delete_document", e)
            })?;
        let generation = generation.max(writer.observed_generation);

        let current = inner.snapshot.load_full();
        if !current.contains(rewriter_id) {
            writer.observed_generation = generation;
            metrics::record_mutation(tenant, "delete", "not_found");
            return Err(RegistryError::NotFound {
                rewriter_id: rewriter_id.to_string(),
            });
        }

        let next = current.without_rewriter(generation, rewriter_id);
        inner.publish(&mut writer, Arc::new(next));

        metrics::record_mutation(tenant, "delete", "ok");
        info!(tenant, rewriter_id, generation, "Deleted rewriter");
        Ok(())
    }

    /// Read a stored definition from the store (any role).
    pub async fn read_definition(&self, rewriter_id: &str) -> Result<RewriterDefinition> {
        let inner = &self.inner;
        if matches!(
            inner.state(),
            RegistryState::ShuttingDown | RegistryState::Stopped
        ) {
            return Err(RegistryError::Shutdown);
        }

        let document = inner
            .store
            .read_document(&inner.config.tenant, rewriter_id)
            .await
            .map_err(|e| RegistryError::store("read_document", e))?
            .ok_or_else(|| RegistryError::NotFound {
                rewriter_id: rewriter_id.to_string(),
            })?;
        RewriterDefinition::from_document(&document)
    }

    /// Register the change listener, replacing any previous one.
    ///
    /// Returns the current snapshot so the caller can start from it.
    pub async fn register_change_listener(
        &self,
        listener: Arc<dyn RewritersChangeListener>,
    ) -> Result<Arc<RegistrySnapshot>> {
        let mut writer = self.inner.writer.lock().await;
        if writer.torn_down || writer.tearing_down {
            return Err(RegistryError::Shutdown);
        }
        if writer.listener.replace(listener).is_some() {
            debug!(tenant = %self.tenant(), "Replaced rewriter change listener");
        }
        Ok(self.inner.snapshot.load_full())
    }

    /// Run one follower poll tick.
    ///
    /// Normally driven by the internal timer. Fails with
    /// [`RegistryError::InvalidState`] on the leader.
    pub async fn poll_tick(&self) -> Result<PollOutcome> {
        self.inner.poll_tick().await
    }

    /// Stop polling and release the snapshot and listener.
    ///
    /// Idempotent. The poll task is stopped (waiting up to a drain timeout
    /// for an in-flight tick) before any state is released. Concurrent
    /// callers wait for the first one to finish.
    pub async fn teardown(&self) {
        let inner = &self.inner;
        let already_started = {
            let mut writer = inner.writer.lock().await;
            let started = writer.torn_down || writer.tearing_down;
            writer.tearing_down = true;
            started
        };
        if already_started {
            debug!(tenant = %inner.config.tenant, "Registry already torn down");
            let mut state_rx = inner.state_rx.clone();
            let _ = state_rx
                .wait_for(|state| *state == RegistryState::Stopped)
                .await;
            return;
        }

        info!(tenant = %inner.config.tenant, "Tearing down rewriter registry");
        inner.set_state(RegistryState::ShuttingDown);
        let _ = self.shutdown_tx.send(true);

        let handle = self.poll_handle.lock().await.take();
        if let Some(mut handle) = handle {
            match tokio::time::timeout(TEARDOWN_DRAIN_TIMEOUT, &mut handle).await {
                Ok(Ok(())) => debug!("Poll task completed gracefully"),
                Ok(Err(e)) => warn!(error = %e, "Poll task panicked during teardown"),
                Err(_) => {
                    warn!("Poll task timed out during teardown, aborting");
                    handle.abort();
                }
            }
        }

        let mut writer = inner.writer.lock().await;
        writer.torn_down = true;
        writer.listener = None;
        inner.snapshot.store(Arc::new(RegistrySnapshot::empty()));
        drop(writer);

        metrics::set_snapshot(&inner.config.tenant, 0, 0);
        inner.set_state(RegistryState::Stopped);
        info!(tenant = %inner.config.tenant, "Rewriter registry stopped");
    }
}

impl<S: DefinitionStore> RegistryInner<S> {
    fn state(&self) -> RegistryState {
        *self.state_rx.borrow()
    }

    fn set_state(&self, state: RegistryState) {
        let _ = self.state_tx.send(state);
        metrics::set_registry_state(&self.config.tenant, &state.to_string());
    }

    fn ensure_serving(&self, writer: &WriterState) -> Result<()> {
        if writer.torn_down || writer.tearing_down {
            return Err(RegistryError::Shutdown);
        }
        if !writer.bootstrapped {
            return Err(RegistryError::InvalidState {
                expected: RegistryState::Running.to_string(),
                actual: self.state().to_string(),
            });
        }
        Ok(())
    }

    /// Read the generation, then the full document set.
    ///
    /// Reading the generation first means a concurrent write can only make
    /// the recorded generation stale, which the next tick corrects.
    async fn read_all(&self) -> Result<(u64, Vec<Document>)> {
        let tenant = self.config.tenant.as_str();
        let generation = self
            .store
            .current_generation(tenant)
            .await
            .map_err(|e| RegistryError::store("current_generation", e))?;

        let started = Instant::now();
        let documents = enumerate_all(self.store.as_ref(), tenant)
            .await
            .map_err(|e| RegistryError::store("enumerate_documents", e))?;
        metrics::record_store_latency("enumerate_documents", started.elapsed());

        Ok((generation, documents))
    }

    /// Compile a full document set against `previous`.
    ///
    /// Rewriters whose content hash is unchanged are reused. Fails on the
    /// first document that does not compile.
    fn compile_all(
        &self,
        documents: &[Document],
        previous: &RegistrySnapshot,
    ) -> Result<(HashMap<String, Arc<CompiledRewriter>>, ReloadStats)> {
        let mut stats = ReloadStats::default();
        let mut rewriters = HashMap::with_capacity(documents.len());

        for document in documents {
            let hash = content_hash(document);
            let compiled = match previous.get(&document.rewriter_id) {
                Some(existing) if existing.content_hash() == hash => {
                    stats.unchanged += 1;
                    Arc::clone(existing)
                }
                existing => {
                    let compiled = compile_document(document, &self.factories, self.sinks.as_ref())?;
                    if existing.is_some() {
                        stats.updated += 1;
                    } else {
                        stats.added += 1;
                    }
                    Arc::new(compiled)
                }
            };
            rewriters.insert(document.rewriter_id.clone(), compiled);
        }

        stats.removed = previous
            .iter()
            .filter(|(id, _)| !rewriters.contains_key(*id))
            .count();
        Ok((rewriters, stats))
    }

    /// Publish `snapshot` and notify the listener if it is not empty.
    fn publish(&self, writer: &mut WriterState, snapshot: Arc<RegistrySnapshot>) {
        writer.observed_generation = snapshot.generation();
        self.snapshot.store(Arc::clone(&snapshot));
        metrics::set_snapshot(&self.config.tenant, snapshot.len(), snapshot.generation());

        let Some(listener) = writer.listener.as_ref() else {
            return;
        };
        if snapshot.is_empty() {
            debug!(tenant = %self.config.tenant, "Snapshot empty, listener not notified");
            return;
        }
        listener.rewriters_changed(&snapshot);
        metrics::record_listener_notified(&self.config.tenant);
    }

    async fn poll_tick(&self) -> Result<PollOutcome> {
        if !self.role.is_follower() {
            return Err(RegistryError::InvalidState {
                expected: Role::Follower.to_string(),
                actual: self.role.to_string(),
            });
        }

        let mut writer = self.writer.lock().await;
        self.ensure_serving(&writer)?;

        let result = self.poll_locked(&mut writer).await;
        let tenant = self.config.tenant.as_str();
        match &result {
            Ok(outcome) => metrics::record_poll_tick(tenant, outcome.label()),
            Err(e) if e.is_retryable() => metrics::record_poll_tick(tenant, "store_error"),
            Err(_) => metrics::record_poll_tick(tenant, "compile_drift"),
        }
        result
    }

    async fn poll_locked(&self, writer: &mut WriterState) -> Result<PollOutcome> {
        let tenant = self.config.tenant.as_str();
        let observed = writer.observed_generation;
        let current = self
            .store
            .current_generation(tenant)
            .await
            .map_err(|e| RegistryError::store("current_generation", e))?;

        if current == observed {
            return Ok(PollOutcome::Unchanged);
        }
        if current < observed {
            warn!(tenant, observed, current, "Store generation went backwards, not reloading");
            return Ok(PollOutcome::GenerationRegressed { observed, current });
        }

        debug!(tenant, observed, current, "Store generation changed, reloading");
        let started = Instant::now();
        let (generation, documents) = self.read_all().await?;
        let previous = self.snapshot.load_full();
        let (rewriters, mut stats) = self.compile_all(&documents, &previous)?;

        // A write between the two generation reads only makes us reload again.
        let generation = generation.max(current);
        stats.generation = generation;
        self.publish(writer, Arc::new(RegistrySnapshot::new(generation, rewriters)));

        metrics::record_reload(
            tenant,
            stats.added,
            stats.updated,
            stats.removed,
            stats.unchanged,
            started.elapsed(),
        );
        Ok(PollOutcome::Reloaded(stats))
    }
}
