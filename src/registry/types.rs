// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Registry state types.
//!
//! Defines the lifecycle state machine and the outcome of a poll tick.
//!
//! # State Transitions
//!
//! ```text
//!                 bootstrap()
//! Created ───────────────────→ Bootstrapping
//!    │                              │
//!    │ (teardown before start)      │ (snapshot installed)     (store down /
//!    │                              ↓                           compile error)
//!    │                           Running ────────────────────→ Failed
//!    │                              │
//!    │                   teardown() │
//!    │                              ↓
//!    └──────────────────────→ ShuttingDown
//!                                   │
//!                                   ↓
//!                                Stopped
//! ```
//!
//! # State Descriptions
//!
//! - **Created**: After `RewriterRegistry::new()`. Snapshot empty.
//! - **Bootstrapping**: Enumerating and compiling the stored definitions.
//! - **Running**: Serving lookups; the leader accepts writes, followers poll.
//! - **ShuttingDown**: `teardown()` called; poll task being stopped.
//! - **Stopped**: Torn down. Snapshot empty, listener released.
//! - **Failed**: Bootstrap failed. The host must not serve queries.

use std::fmt;

/// State of the rewriter registry.
///
/// See module docs for the state transition diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryState {
    /// Created but not bootstrapped.
    Created,

    /// Loading the stored definitions.
    Bootstrapping,

    /// Serving.
    Running,

    /// Teardown in progress.
    ShuttingDown,

    /// Torn down.
    Stopped,

    /// Bootstrap failed; check logs for the cause.
    Failed,
}

impl fmt::Display for RegistryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryState::Created => write!(f, "Created"),
            RegistryState::Bootstrapping => write!(f, "Bootstrapping"),
            RegistryState::Running => write!(f, "Running"),
            RegistryState::ShuttingDown => write!(f, "ShuttingDown"),
            RegistryState::Stopped => write!(f, "Stopped"),
            RegistryState::Failed => write!(f, "Failed"),
        }
    }
}

/// Diff of one follower reload against the previous snapshot.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReloadStats {
    /// Generation the new snapshot reflects
    pub generation: u64,
    /// Ids not present before
    pub added: usize,
    /// Ids whose stored content changed (recompiled)
    pub updated: usize,
    /// Ids no longer stored
    pub removed: usize,
    /// Ids whose compiled rewriter was reused
    pub unchanged: usize,
}

impl ReloadStats {
    /// Size of the resulting snapshot.
    pub fn total(&self) -> usize {
        self.added + self.updated + self.unchanged
    }
}

/// Result of one follower poll tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Store generation equals the observed one; nothing touched.
    Unchanged,

    /// The full set was reloaded and a new snapshot published.
    Reloaded(ReloadStats),

    /// The store reported an older generation than already observed.
    ///
    /// Nothing is reloaded; the follower never moves backwards.
    GenerationRegressed { observed: u64, current: u64 },
}

impl PollOutcome {
    /// Metric label for this outcome.
    pub fn label(&self) -> &'static str {
        match self {
            PollOutcome::Unchanged => "unchanged",
            PollOutcome::Reloaded(_) => "reloaded",
            PollOutcome::GenerationRegressed { .. } => "regressed",
        }
    }
}
