// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Recording DefinitionStore for testing.
//!
//! Wraps a [`MemoryDefinitionStore`], counts every call, and can be told to
//! fail reads or writes to simulate an unreachable store.

use rewriter_registry::store::{
    BoxFuture, DefinitionStore, Document, DocumentPage, EnumerationCursor, MemoryDefinitionStore,
    StoreError,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Counters {
    generation_reads: AtomicUsize,
    document_reads: AtomicUsize,
    page_reads: AtomicUsize,
    writes: AtomicUsize,
    deletes: AtomicUsize,
}

#[derive(Default)]
struct Faults {
    /// Fail every read while set
    reads_down: AtomicBool,
    /// Fail this many upcoming reads, then recover
    failing_reads: AtomicUsize,
    /// Fail every write/delete while set
    writes_down: AtomicBool,
    /// Report this generation instead of the real one
    generation_override: Mutex<Option<u64>>,
}

/// Mock store that records calls and injects failures.
///
/// Clones share the backing data, counters and faults.
///
/// # Example
/// ```rust,ignore
/// let store = RecordingStore::new();
/// store.set_reads_down(true);
/// assert!(follower.poll_tick().await.is_err());
/// ```
#[derive(Clone, Default)]
pub struct RecordingStore {
    inner: MemoryDefinitionStore,
    counters: Arc<Counters>,
    faults: Arc<Faults>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backing store, for out-of-band edits.
    pub fn backing(&self) -> &MemoryDefinitionStore {
        &self.inner
    }

    pub fn writes(&self) -> usize {
        self.counters.writes.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.counters.deletes.load(Ordering::SeqCst)
    }

    pub fn generation_reads(&self) -> usize {
        self.counters.generation_reads.load(Ordering::SeqCst)
    }

    pub fn page_reads(&self) -> usize {
        self.counters.page_reads.load(Ordering::SeqCst)
    }

    /// Total calls of any kind.
    pub fn total_calls(&self) -> usize {
        self.writes()
            + self.deletes()
            + self.generation_reads()
            + self.page_reads()
            + self.counters.document_reads.load(Ordering::SeqCst)
    }

    pub fn set_reads_down(&self, down: bool) {
        self.faults.reads_down.store(down, Ordering::SeqCst);
    }

    pub fn fail_next_reads(&self, count: usize) {
        self.faults.failing_reads.store(count, Ordering::SeqCst);
    }

    pub fn set_writes_down(&self, down: bool) {
        self.faults.writes_down.store(down, Ordering::SeqCst);
    }

    pub fn override_generation(&self, generation: Option<u64>) {
        *self.faults.generation_override.lock().unwrap() = generation;
    }

    /// Write a document directly, bypassing any registry.
    pub async fn put(&self, document: Document) -> u64 {
        self.inner.write_document(document).await.unwrap()
    }

    /// Delete a document directly, bypassing any registry.
    pub async fn remove(&self, tenant: &str, rewriter_id: &str) -> u64 {
        self.inner.delete_document(tenant, rewriter_id).await.unwrap()
    }

    fn check_read(&self) -> Result<(), StoreError> {
        if self.faults.reads_down.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected read outage".to_string()));
        }
        let pending = self.faults.failing_reads.load(Ordering::SeqCst);
        if pending > 0 {
            self.faults.failing_reads.store(pending - 1, Ordering::SeqCst);
            return Err(StoreError::Unavailable("injected transient read failure".to_string()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<(), StoreError> {
        if self.faults.writes_down.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected write outage".to_string()));
        }
        Ok(())
    }
}

impl DefinitionStore for RecordingStore {
    fn current_generation(&self, tenant: &str) -> BoxFuture<'_, u64> {
        self.counters.generation_reads.fetch_add(1, Ordering::SeqCst);
        let tenant = tenant.to_string();
        Box::pin(async move {
            self.check_read()?;
            let overridden = *self.faults.generation_override.lock().unwrap();
            if let Some(generation) = overridden {
                return Ok(generation);
            }
            self.inner.current_generation(&tenant).await
        })
    }

    fn read_document(&self, tenant: &str, rewriter_id: &str) -> BoxFuture<'_, Option<Document>> {
        self.counters.document_reads.fetch_add(1, Ordering::SeqCst);
        let tenant = tenant.to_string();
        let rewriter_id = rewriter_id.to_string();
        Box::pin(async move {
            self.check_read()?;
            self.inner.read_document(&tenant, &rewriter_id).await
        })
    }

    fn enumerate_page(
        &self,
        tenant: &str,
        cursor: &EnumerationCursor,
    ) -> BoxFuture<'_, DocumentPage> {
        self.counters.page_reads.fetch_add(1, Ordering::SeqCst);
        let tenant = tenant.to_string();
        let cursor = cursor.clone();
        Box::pin(async move {
            self.check_read()?;
            self.inner.enumerate_page(&tenant, &cursor).await
        })
    }

    fn write_document(&self, document: Document) -> BoxFuture<'_, u64> {
        self.counters.writes.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            self.check_write()?;
            self.inner.write_document(document).await
        })
    }

    fn delete_document(&self, tenant: &str, rewriter_id: &str) -> BoxFuture<'_, u64> {
        self.counters.deletes.fetch_add(1, Ordering::SeqCst);
        let tenant = tenant.to_string();
        let rewriter_id = rewriter_id.to_string();
        Box::pin(async move {
            self.check_write()?;
            self.inner.delete_document(&tenant, &rewriter_id).await
        })
    }
}
