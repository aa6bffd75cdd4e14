// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! # Rewriter Registry
//!
//! A replicated registry of query rewriters for search services.
//!
//! ## Architecture
//!
//! Rewriter definitions live in a persisted, versioned document store. Every
//! process keeps an in-memory registry of compiled rewriters in step with it:
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────────────┐
//! │                            rewriter-registry                              │
//! │                                                                           │
//! │  ┌──────────────┐   save/delete   ┌──────────────────┐   lookup()         │
//! │  │ Leader       │───────────────► │ RewriterRegistry │◄──────── queries   │
//! │  │ (one writer) │                 │ (ArcSwap snapshot)│                   │
//! │  └──────────────┘                 └──────────────────┘                    │
//! │         │                                  ▲                              │
//! │         ▼                                  │ poll_tick (fixed delay)      │
//! │  ┌──────────────────┐              ┌──────────────┐                       │
//! │  │ DefinitionStore  │◄─────────────│ Followers    │                       │
//! │  │ (SQLite / memory)│  generation  │ (read-only)  │                       │
//! │  └──────────────────┘              └──────────────┘                       │
//! └───────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Two Roles
//!
//! 1. **Leader**: validates, persists and installs definitions.
//! 2. **Follower**: rejects writes and reloads the full set whenever the
//!    store generation moves forward.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rewriter_registry::{
//!     FactoryRegistry, MemoryDefinitionStore, RegistryConfig, RewriterDefinition,
//!     RewriterRegistry, SinkMap, StaticTopology,
//! };
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> rewriter_registry::Result<()> {
//!     let registry = RewriterRegistry::new(
//!         RegistryConfig::default(),
//!         &StaticTopology::leader(),
//!         Arc::new(MemoryDefinitionStore::new()),
//!         Arc::new(SinkMap::new()),
//!         FactoryRegistry::with_builtins(),
//!     )?;
//!     registry.bootstrap().await?;
//!
//!     let definition = RewriterDefinition::new(
//!         "replace",
//!         json!({ "rules": [{ "input": "laptop", "output": ["notebook"] }] }),
//!     );
//!     registry.save("common", definition).await?;
//!
//!     if let Some(rewriter) = registry.lookup("common") {
//!         let mut tokens = vec!["cheap".to_string(), "laptop".to_string()];
//!         rewriter.apply(&mut tokens);
//!     }
//!
//!     registry.teardown().await;
//!     Ok(())
//! }
//! ```

pub mod compile;
pub mod config;
pub mod definition;
pub mod error;
pub mod metrics;
pub mod registry;
pub mod resilience;
pub mod rewrite;
pub mod sink;
pub mod snapshot;
pub mod store;
pub mod topology;

// Re-exports for convenience
pub use compile::CompiledRewriter;
pub use config::{BootstrapConfig, PollingConfig, RegistryConfig, StoreConfig};
pub use definition::{RewriterDefinition, CURRENT_SCHEMA_VERSION};
pub use error::{RegistryError, Result};
pub use registry::{PollOutcome, RegistryState, ReloadStats, RewriterRegistry, RewritersChangeListener};
pub use rewrite::{FactoryRegistry, Rewriter, RewriterFactory};
pub use sink::{MatchLog, MatchType, RewriteLog, Sink, SinkMap, SinkRegistry, TracingSink};
pub use snapshot::RegistrySnapshot;
pub use store::{DefinitionStore, Document, MemoryDefinitionStore, SqliteDefinitionStore, StoreError};
pub use topology::{Role, StaticTopology, TopologyProvider};
