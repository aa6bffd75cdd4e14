// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Shared test utilities for integration, property and chaos tests.
//!
//! This module provides:
//! - A recording, failure-injecting DefinitionStore wrapper
//! - A recording match-log sink
//! - Registry and definition helpers

#![allow(dead_code)]

pub mod mock_store;
pub mod sinks;

pub use mock_store::*;
pub use sinks::*;

use rewriter_registry::{
    FactoryRegistry, RegistryConfig, RewriterDefinition, RewriterRegistry, SinkMap, SinkRegistry,
    StaticTopology,
};
use serde_json::json;
use std::sync::Arc;

pub const TENANT: &str = "products";

/// A `replace` definition with one exact rule.
pub fn replace_def(input: &str, output: &[&str]) -> RewriterDefinition {
    RewriterDefinition::new(
        "replace",
        json!({ "rules": [{ "input": input, "output": output }] }),
    )
}

/// Sink registry with a single recording sink named `name`.
pub fn sinks_with(name: &str, sink: Arc<RecordingSink>) -> Arc<dyn SinkRegistry> {
    Arc::new(SinkMap::new().with_sink(name, sink))
}

/// Build a registry over a recording store.
pub fn registry_on(
    topology: StaticTopology,
    store: &RecordingStore,
    sinks: Arc<dyn SinkRegistry>,
) -> RewriterRegistry<RecordingStore> {
    RewriterRegistry::new(
        RegistryConfig::for_testing(TENANT),
        &topology,
        Arc::new(store.clone()),
        sinks,
        FactoryRegistry::with_builtins(),
    )
    .expect("valid test config")
}

/// Leader and follower sharing one backing store, both bootstrapped.
pub async fn leader_and_follower(
    store: &RecordingStore,
) -> (RewriterRegistry<RecordingStore>, RewriterRegistry<RecordingStore>) {
    let leader = registry_on(StaticTopology::leader(), store, Arc::new(SinkMap::new()));
    let follower = registry_on(StaticTopology::follower(), store, Arc::new(SinkMap::new()));
    leader.bootstrap().await.expect("leader bootstrap");
    follower.bootstrap().await.expect("follower bootstrap");
    (leader, follower)
}
