// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Recording match-log sink.

use rewriter_registry::{RewriteLog, Sink};
use std::sync::Mutex;

/// Sink that keeps every entry it receives.
#[derive(Default)]
pub struct RecordingSink {
    entries: Mutex<Vec<RewriteLog>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<RewriteLog> {
        self.entries.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

impl Sink for RecordingSink {
    fn log(&self, entry: &RewriteLog) {
        self.entries.lock().unwrap().push(entry.clone());
    }
}
