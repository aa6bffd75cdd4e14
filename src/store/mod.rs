// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Persisted definition store integration.
//!
//! Defines what the registry needs from the durable, versioned document
//! store holding rewriter definitions. The host provides an implementation;
//! two are bundled:
//!
//! - [`MemoryDefinitionStore`]: in-process, for standalone hosts and tests
//! - [`SqliteDefinitionStore`]: SQLite (WAL) file shared by leader and followers
//!
//! # Contract
//!
//! - `current_generation` is a store-wide watermark that advances on every
//!   committed change.
//! - `write_document` / `delete_document` are durable before they return and
//!   report the generation they committed at.
//! - `enumerate_page` is resumable through an opaque cursor. A returned cursor
//!   equal to the one passed in means there are no more results.

mod memory;
mod sqlite;

pub use memory::MemoryDefinitionStore;
pub use sqlite::SqliteDefinitionStore;

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Type alias for boxed async futures (reduces trait signature complexity).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = StoreResult<T>> + Send + 'a>>;

/// Errors raised by a definition store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite failure.
    #[error("sqlite: {0}")]
    Sqlite(#[from] sqlx::Error),

    /// Store cannot be reached right now.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Stored data violates the store's own invariants.
    #[error("store corrupt: {0}")]
    Corrupt(String),
}

/// One persisted rewriter definition.
///
/// Stores key documents on the pair `(tenant, rewriter_id)`. The payload is
/// opaque to the store; see [`crate::definition`] for its encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub rewriter_id: String,
    pub tenant: String,
    pub schema_version: u32,
    pub payload: Vec<u8>,
}

impl Document {
    /// Store key of this document.
    pub fn key(&self) -> (&str, &str) {
        (&self.tenant, &self.rewriter_id)
    }
}

/// Opaque enumeration position within one tenant.
///
/// Holds the last rewriter id returned; rewriter ids are never empty, so the
/// empty start cursor sorts before all of them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct EnumerationCursor(String);

impl EnumerationCursor {
    /// Position before the first document.
    pub fn start() -> Self {
        Self::default()
    }

    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One page of an enumeration.
#[derive(Debug, Clone)]
pub struct DocumentPage {
    pub documents: Vec<Document>,
    /// Cursor to pass for the next page. Equal to the request cursor at the end.
    pub next_cursor: EnumerationCursor,
}

/// What the registry needs from the persisted store.
///
/// Implementations must be safe to call from the writer path and the
/// follower poll task concurrently with other processes writing.
pub trait DefinitionStore: Send + Sync + 'static {
    /// Current store-wide generation for the tenant.
    fn current_generation(&self, tenant: &str) -> BoxFuture<'_, u64>;

    /// Read one document, `None` if absent.
    fn read_document(&self, tenant: &str, rewriter_id: &str) -> BoxFuture<'_, Option<Document>>;

    /// Read the page of documents after `cursor`, ordered by rewriter id.
    fn enumerate_page(&self, tenant: &str, cursor: &EnumerationCursor)
        -> BoxFuture<'_, DocumentPage>;

    /// Insert or replace a document. Returns the committed generation.
    fn write_document(&self, document: Document) -> BoxFuture<'_, u64>;

    /// Delete a document. Returns the generation after the call; deleting an
    /// absent document commits nothing.
    fn delete_document(&self, tenant: &str, rewriter_id: &str) -> BoxFuture<'_, u64>;
}

/// Read every document of a tenant, following cursors until they stop advancing.
///
/// A failing page fails the whole enumeration; callers retry from scratch.
pub async fn enumerate_all<S: DefinitionStore + ?Sized>(
    store: &S,
    tenant: &str,
) -> StoreResult<Vec<Document>> {
    let mut documents = Vec::new();
    let mut cursor = EnumerationCursor::start();

    loop {
        let page = store.enumerate_page(tenant, &cursor).await?;
        documents.extend(page.documents);

        if page.next_cursor == cursor {
            break;
        }
        cursor = page.next_cursor;
    }

    tracing::debug!(tenant, count = documents.len(), "Enumerated rewriter definition documents");
    Ok(documents)
}
