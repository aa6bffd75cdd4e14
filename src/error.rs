// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error types for the rewriter registry.
//!
//! Errors are categorized by where the failure originates (caller, stored
//! data, persisted store) and carry enough context to fix the request.
//!
//! # Error Categories
//!
//! | Error Type | Retryable | Description |
//! |------------|-----------|-------------|
//! | `Role` | No | Write attempted on a follower |
//! | `NotFound` | No | Unknown rewriter id |
//! | `ConfigValidation` | No | Definition does not compile (all reasons listed) |
//! | `Store` | Yes | Persisted store unreachable or failing |
//! | `CompileDrift` | No | Stored definition no longer compiles |
//! | `Codec` | No | Stored payload cannot be encoded/decoded |
//! | `UnsupportedSchema` | No | Stored payload written by a newer schema |
//! | `Config` | No | Registry configuration invalid |
//! | `InvalidState` | No | Lifecycle violation |
//! | `Shutdown` | No | Registry has been torn down |
//!
//! # Retry Behavior
//!
//! Use [`RegistryError::is_retryable()`] to decide whether an operation can
//! succeed when repeated. Only store failures are transient; everything else
//! needs the request, the stored data, or the configuration to change.

use crate::store::StoreError;
use thiserror::Error;

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Errors that can occur while managing rewriters.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Create/update/delete attempted on a follower.
    ///
    /// Rejected before the store is contacted.
    #[error("Rewriter config must be updated via the leader ({operation} rejected on follower)")]
    Role { operation: &'static str },

    /// No rewriter with this id exists for the tenant.
    #[error("No such rewriter: {rewriter_id}")]
    NotFound { rewriter_id: String },

    /// The definition failed compilation or sink resolution.
    ///
    /// Nothing was persisted.
    #[error("Invalid configuration for rewriter {rewriter_id}: {}", .reasons.join("; "))]
    ConfigValidation {
        rewriter_id: String,
        reasons: Vec<String>,
    },

    /// The persisted store failed.
    ///
    /// Fatal during bootstrap; logged and retried on the next tick while polling.
    #[error("Store error ({operation}): {source}")]
    Store {
        operation: &'static str,
        #[source]
        source: StoreError,
    },

    /// A stored definition does not compile any more.
    ///
    /// It passed validation when saved, so the store and the validator have
    /// drifted apart (edited out of band, sink removed, factory changed).
    #[error("Stored rewriter {rewriter_id} no longer compiles: {}", .reasons.join("; "))]
    CompileDrift {
        rewriter_id: String,
        reasons: Vec<String>,
    },

    /// Definition payload could not be encoded or decoded.
    #[error("Codec error for rewriter {rewriter_id}: {message}")]
    Codec {
        rewriter_id: String,
        message: String,
    },

    /// Stored document uses a schema version this build cannot read.
    #[error("Rewriter {rewriter_id} uses schema version {found}, newest supported is {supported}")]
    UnsupportedSchema {
        rewriter_id: String,
        found: u32,
        supported: u32,
    },

    /// Invalid registry configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operation attempted in the wrong lifecycle state or role.
    #[error("Invalid state: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },

    /// The registry has been torn down.
    #[error("Registry has been torn down")]
    Shutdown,
}

impl RegistryError {
    /// Wrap a store failure with the operation that hit it.
    pub fn store(operation: &'static str, source: StoreError) -> Self {
        Self::Store { operation, source }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store { .. } => true,
            Self::Role { .. } => false,
            Self::NotFound { .. } => false,
            Self::ConfigValidation { .. } => false,
            Self::CompileDrift { .. } => false,
            Self::Codec { .. } => false,
            Self::UnsupportedSchema { .. } => false,
            Self::Config(_) => false,
            Self::InvalidState { .. } => false,
            Self::Shutdown => false,
        }
    }
}
