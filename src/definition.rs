// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Rewriter definitions and their persisted form.
//!
//! A [`RewriterDefinition`] is what callers save: the factory `type`, an
//! opaque JSON `config`, and the ordered sink names. It is stored as the
//! JSON payload of a [`Document`] tagged with [`CURRENT_SCHEMA_VERSION`].
//!
//! ```json
//! {
//!   "type": "replace",
//!   "config": { "rules": [{ "input": "laptop", "output": ["notebook"] }] },
//!   "sinks": ["query_log"]
//! }
//! ```

use crate::error::{RegistryError, Result};
use crate::store::Document;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Schema version written by this build. Older versions are still readable.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Persisted description of one rewriter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewriterDefinition {
    /// Factory kind, e.g. `"replace"`.
    #[serde(rename = "type")]
    pub kind: String,

    /// Factory-specific configuration.
    #[serde(default)]
    pub config: serde_json::Value,

    /// Match-log sinks, in order.
    #[serde(default)]
    pub sinks: Vec<String>,
}

impl RewriterDefinition {
    pub fn new(kind: impl Into<String>, config: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            config,
            sinks: Vec::new(),
        }
    }

    /// Add a logging sink by name.
    pub fn with_sink(mut self, name: impl Into<String>) -> Self {
        self.sinks.push(name.into());
        self
    }

    /// Encode as a document for `tenant`.
    pub fn to_document(&self, tenant: &str, rewriter_id: &str) -> Result<Document> {
        let payload = serde_json::to_vec(self).map_err(|e| RegistryError::Codec {
            rewriter_id: rewriter_id.to_string(),
            message: e.to_string(),
        })?;
        Ok(Document {
            rewriter_id: rewriter_id.to_string(),
            tenant: tenant.to_string(),
            schema_version: CURRENT_SCHEMA_VERSION,
            payload,
        })
    }

    /// Decode a stored document.
    pub fn from_document(document: &Document) -> Result<Self> {
        if document.schema_version > CURRENT_SCHEMA_VERSION {
            return Err(RegistryError::UnsupportedSchema {
                rewriter_id: document.rewriter_id.clone(),
                found: document.schema_version,
                supported: CURRENT_SCHEMA_VERSION,
            });
        }
        serde_json::from_slice(&document.payload).map_err(|e| RegistryError::Codec {
            rewriter_id: document.rewriter_id.clone(),
            message: e.to_string(),
        })
    }
}

/// SHA-256 (hex) over a document's schema version and payload.
///
/// Equal hashes mean the stored definition did not change.
pub fn content_hash(document: &Document) -> String {
    let mut hasher = Sha256::new();
    hasher.update(document.schema_version.to_be_bytes());
    hasher.update(&document.payload);
    hex::encode(hasher.finalize())
}
