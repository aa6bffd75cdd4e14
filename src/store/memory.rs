// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! In-process definition store.

use super::{BoxFuture, DefinitionStore, Document, DocumentPage, EnumerationCursor};
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;
use tokio::sync::RwLock;

const DEFAULT_PAGE_SIZE: usize = 100;

#[derive(Debug, Default)]
struct MemoryState {
    generation: u64,
    /// Keyed by (tenant, rewriter id), so each tenant is one contiguous
    /// range in enumeration order.
    documents: BTreeMap<(String, String), Document>,
}

/// Definition store kept in memory.
///
/// Every committed write or effective delete bumps the generation by one.
/// Clones share the same state, so a leader and a follower registry in one
/// process can be pointed at "the same" store.
#[derive(Debug, Clone)]
pub struct MemoryDefinitionStore {
    state: Arc<RwLock<MemoryState>>,
    page_size: usize,
}

impl Default for MemoryDefinitionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDefinitionStore {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Create a store that pages enumeration in chunks of `page_size`.
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            state: Arc::new(RwLock::new(MemoryState::default())),
            page_size: page_size.max(1),
        }
    }

    /// Number of stored documents across all tenants.
    pub async fn len(&self) -> usize {
        self.state.read().await.documents.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Replace a document's payload without going through the registry.
    ///
    /// Simulates an out-of-band edit; bumps the generation like any write.
    pub async fn overwrite_payload(&self, tenant: &str, rewriter_id: &str, payload: Vec<u8>) -> bool {
        let mut state = self.state.write().await;
        match state.documents.get_mut(&key(tenant, rewriter_id)) {
            Some(doc) => {
                doc.payload = payload;
                state.generation += 1;
                true
            }
            None => false,
        }
    }
}

fn key(tenant: &str, rewriter_id: &str) -> (String, String) {
    (tenant.to_string(), rewriter_id.to_string())
}

impl DefinitionStore for MemoryDefinitionStore {
    fn current_generation(&self, _tenant: &str) -> BoxFuture<'_, u64> {
        Box::pin(async move { Ok(self.state.read().await.generation) })
    }

    fn read_document(&self, tenant: &str, rewriter_id: &str) -> BoxFuture<'_, Option<Document>> {
        let key = key(tenant, rewriter_id);
        Box::pin(async move { Ok(self.state.read().await.documents.get(&key).cloned()) })
    }

    fn enumerate_page(
        &self,
        tenant: &str,
        cursor: &EnumerationCursor,
    ) -> BoxFuture<'_, DocumentPage> {
        let tenant = tenant.to_string();
        let cursor = cursor.clone();
        Box::pin(async move {
            let state = self.state.read().await;
            let from = key(&tenant, cursor.as_str());
            let documents: Vec<Document> = state
                .documents
                .range((Bound::Excluded(from), Bound::Unbounded))
                .take_while(|((doc_tenant, _), _)| *doc_tenant == tenant)
                .take(self.page_size)
                .map(|(_, doc)| doc.clone())
                .collect();

            let next_cursor = documents
                .last()
                .map(|doc| EnumerationCursor::new(doc.rewriter_id.as_str()))
                .unwrap_or(cursor);

            Ok(DocumentPage {
                documents,
                next_cursor,
            })
        })
    }

    fn write_document(&self, document: Document) -> BoxFuture<'_, u64> {
        Box::pin(async move {
            let mut state = self.state.write().await;
            let key = key(&document.tenant, &document.rewriter_id);
            state.documents.insert(key, document);
            state.generation += 1;
            Ok(state.generation)
        })
    }

    fn delete_document(&self, tenant: &str, rewriter_id: &str) -> BoxFuture<'_, u64> {
        let key = key(tenant, rewriter_id);
        Box::pin(async move {
            let mut state = self.state.write().await;
            if state.documents.remove(&key).is_some() {
                state.generation += 1;
            }
            Ok(state.generation)
        })
    }
}
