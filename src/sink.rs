// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Match-log sinks.
//!
//! A compiled rewriter reports which tokens it matched to the sinks named in
//! its definition. Sinks are resolved by name through a [`SinkRegistry`] when
//! the rewriter is compiled, so a rewriter never runs with a dangling name.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// How a removed token was matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchType {
    /// Whole-term match.
    Exact,
    /// Wildcard-adjacent match (prefix or suffix).
    Affix,
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchType::Exact => f.write_str("exact"),
            MatchType::Affix => f.write_str("affix"),
        }
    }
}

/// One matched token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchLog {
    pub term: String,
    pub match_type: MatchType,
}

impl MatchLog {
    pub fn exact(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            match_type: MatchType::Exact,
        }
    }

    pub fn affix(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            match_type: MatchType::Affix,
        }
    }
}

/// Everything one rewriter matched in one application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteLog {
    pub rewriter_id: String,
    pub matches: Vec<MatchLog>,
}

/// Destination for structured match logging.
pub trait Sink: Send + Sync {
    fn log(&self, entry: &RewriteLog);
}

/// Resolves sink names to live sinks.
pub trait SinkRegistry: Send + Sync {
    fn resolve(&self, name: &str) -> Option<Arc<dyn Sink>>;
}

/// Sink registry backed by a name map.
#[derive(Clone, Default)]
pub struct SinkMap {
    sinks: HashMap<String, Arc<dyn Sink>>,
}

impl SinkMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `sink` under `name`, replacing any previous entry.
    pub fn with_sink(mut self, name: impl Into<String>, sink: Arc<dyn Sink>) -> Self {
        self.sinks.insert(name.into(), sink);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, sink: Arc<dyn Sink>) {
        self.sinks.insert(name.into(), sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl fmt::Debug for SinkMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.sinks.keys().collect();
        names.sort();
        f.debug_struct("SinkMap").field("sinks", &names).finish()
    }
}

impl SinkRegistry for SinkMap {
    fn resolve(&self, name: &str) -> Option<Arc<dyn Sink>> {
        self.sinks.get(name).cloned()
    }
}

/// Writes match logs as `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl Sink for TracingSink {
    fn log(&self, entry: &RewriteLog) {
        let terms: Vec<String> = entry
            .matches
            .iter()
            .map(|m| format!("{}:{}", m.term, m.match_type))
            .collect();
        info!(
            target: "rewriter_registry::matches",
            rewriter_id = %entry.rewriter_id,
            match_count = entry.matches.len(),
            matches = %terms.join(","),
            "Rewriter matched"
        );
    }
}
