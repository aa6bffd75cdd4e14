// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Immutable registry snapshots.
//!
//! Writers never touch a published snapshot: every change builds a new one
//! (`with_rewriter` / `without_rewriter` copy the map) and publishes it with
//! a single reference swap. Compiled rewriters are shared between
//! snapshots through `Arc`.

use crate::compile::CompiledRewriter;
use std::collections::HashMap;
use std::sync::Arc;

/// Fully formed mapping of rewriter id to compiled rewriter.
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    generation: u64,
    rewriters: HashMap<String, Arc<CompiledRewriter>>,
}

impl RegistrySnapshot {
    /// The snapshot before bootstrap and after teardown.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(generation: u64, rewriters: HashMap<String, Arc<CompiledRewriter>>) -> Self {
        Self {
            generation,
            rewriters,
        }
    }

    /// Store generation this snapshot reflects.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn get(&self, rewriter_id: &str) -> Option<&Arc<CompiledRewriter>> {
        self.rewriters.get(rewriter_id)
    }

    pub fn contains(&self, rewriter_id: &str) -> bool {
        self.rewriters.contains_key(rewriter_id)
    }

    pub fn len(&self) -> usize {
        self.rewriters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rewriters.is_empty()
    }

    /// Rewriter ids, sorted.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.rewriters.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<CompiledRewriter>)> {
        self.rewriters.iter().map(|(id, r)| (id.as_str(), r))
    }

    /// Copy with `rewriter` added or replaced.
    pub fn with_rewriter(&self, generation: u64, rewriter: Arc<CompiledRewriter>) -> Self {
        let mut rewriters = self.rewriters.clone();
        rewriters.insert(rewriter.id().to_string(), rewriter);
        Self {
            generation,
            rewriters,
        }
    }

    /// Copy with `rewriter_id` removed.
    pub fn without_rewriter(&self, generation: u64, rewriter_id: &str) -> Self {
        let mut rewriters = self.rewriters.clone();
        rewriters.remove(rewriter_id);
        Self {
            generation,
            rewriters,
        }
    }
}
