// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Chaos tests: simulate failures and verify graceful degradation.
//!
//! These tests verify the registry handles store outages and drifted
//! definitions without panics, deadlocks, or losing the serving snapshot.
//!
//! Run with: cargo test --test chaos_tests -- --nocapture

mod common;

use common::*;
use rewriter_registry::{
    BootstrapConfig, FactoryRegistry, PollOutcome, RegistryConfig, RegistryError, RegistryState,
    RewriterDefinition, RewriterRegistry, SinkMap, StaticTopology,
};
use serde_json::json;
use std::sync::Arc;

fn registry_with_retries(
    topology: StaticTopology,
    store: &RecordingStore,
    max_attempts: usize,
) -> RewriterRegistry<RecordingStore> {
    let mut config = RegistryConfig::for_testing(TENANT);
    config.bootstrap = BootstrapConfig {
        max_attempts,
        initial_delay_ms: 1,
        max_delay_ms: 5,
    };
    RewriterRegistry::new(
        config,
        &topology,
        Arc::new(store.clone()),
        Arc::new(SinkMap::new()),
        FactoryRegistry::with_builtins(),
    )
    .expect("valid config")
}

// =============================================================================
// Store Outages
// =============================================================================

/// Test: Transient read failures during bootstrap are retried
#[tokio::test]
async fn bootstrap_survives_transient_read_failures() {
    let store = RecordingStore::new();
    let registry = registry_with_retries(StaticTopology::leader(), &store, 4);

    store.fail_next_reads(2);
    registry.bootstrap().await.expect("bootstrap should retry past two failures");

    assert_eq!(registry.state(), RegistryState::Running);
    registry.teardown().await;
}

/// Test: An unreachable store fails bootstrap once the retry budget is spent
#[tokio::test]
async fn bootstrap_fails_when_store_stays_down() {
    let store = RecordingStore::new();
    let registry = registry_with_retries(StaticTopology::follower(), &store, 3);

    store.set_reads_down(true);
    let err = registry.bootstrap().await.expect_err("store is down");

    assert!(matches!(err, RegistryError::Store { .. }), "got {:?}", err);
    assert!(err.is_retryable());
    assert_eq!(registry.state(), RegistryState::Failed);
    assert_eq!(store.generation_reads(), 3);

    // A failed registry does not accept work
    let err = registry
        .poll_tick()
        .await
        .expect_err("failed registry must not poll");
    assert!(matches!(err, RegistryError::InvalidState { .. }));

    registry.teardown().await;
    assert_eq!(registry.state(), RegistryState::Stopped);
}

/// Test: A read outage during a poll tick keeps the previous snapshot
#[tokio::test]
async fn poll_outage_keeps_snapshot_and_recovers() {
    let store = RecordingStore::new();
    let (leader, follower) = leader_and_follower(&store).await;

    leader.save("first", replace_def("a", &["b"])).await.unwrap();
    assert!(matches!(
        follower.poll_tick().await.unwrap(),
        PollOutcome::Reloaded(_)
    ));
    let before = follower.generation();

    leader.save("second", replace_def("c", &["d"])).await.unwrap();
    store.set_reads_down(true);

    for _ in 0..3 {
        let err = follower.poll_tick().await.expect_err("reads are down");
        assert!(err.is_retryable());
        assert!(follower.lookup("first").is_some());
        assert!(follower.lookup("second").is_none());
        assert_eq!(follower.generation(), before);
    }
    assert!(follower.is_running());

    store.set_reads_down(false);
    match follower.poll_tick().await.unwrap() {
        PollOutcome::Reloaded(stats) => {
            assert_eq!(stats.added, 1);
            assert_eq!(stats.unchanged, 1);
        }
        other => panic!("expected reload, got {:?}", other),
    }
    assert!(follower.lookup("second").is_some());

    leader.teardown().await;
    follower.teardown().await;
}

/// Test: Leader write outage leaves the snapshot untouched
#[tokio::test]
async fn write_outage_does_not_install() {
    let store = RecordingStore::new();
    let (leader, follower) = leader_and_follower(&store).await;

    store.set_writes_down(true);
    let err = leader
        .save("id", replace_def("a", &["b"]))
        .await
        .expect_err("writes are down");
    assert!(err.is_retryable());
    assert!(leader.lookup("id").is_none());

    store.set_writes_down(false);
    leader.save("id", replace_def("a", &["b"])).await.unwrap();
    assert!(leader.lookup("id").is_some());

    leader.teardown().await;
    follower.teardown().await;
}

/// Test: Teardown completes while the store is unreachable
#[tokio::test]
async fn teardown_with_store_down() {
    let store = RecordingStore::new();
    let (leader, follower) = leader_and_follower(&store).await;

    store.set_reads_down(true);
    store.set_writes_down(true);

    tokio::time::timeout(std::time::Duration::from_secs(5), async {
        follower.teardown().await;
        leader.teardown().await;
    })
    .await
    .expect("teardown must not hang");

    assert_eq!(follower.state(), RegistryState::Stopped);
    assert_eq!(leader.state(), RegistryState::Stopped);
}

// =============================================================================
// Drifted Definitions
// =============================================================================

/// Test: A stored definition that no longer compiles does not replace the
/// serving snapshot
#[tokio::test]
async fn poll_with_drifted_definition_keeps_snapshot() {
    let store = RecordingStore::new();
    let (leader, follower) = leader_and_follower(&store).await;

    leader.save("common", replace_def("a", &["b"])).await.unwrap();
    follower.poll_tick().await.unwrap();
    let generation = follower.generation();

    let drifted = json!({ "type": "retired", "config": {} });
    assert!(
        store
            .backing()
            .overwrite_payload(TENANT, "common", serde_json::to_vec(&drifted).unwrap())
            .await
    );

    let err = follower.poll_tick().await.expect_err("drifted definition");
    assert!(matches!(err, RegistryError::CompileDrift { .. }), "got {:?}", err);
    assert!(!err.is_retryable());

    let kept = follower.lookup("common").expect("previous rewriter kept");
    assert_eq!(kept.kind(), "replace");
    assert_eq!(follower.generation(), generation);

    // The leader repairs the definition; the next tick picks it up
    leader.save("common", replace_def("a", &["c"])).await.unwrap();
    assert!(matches!(
        follower.poll_tick().await.unwrap(),
        PollOutcome::Reloaded(_)
    ));

    let mut tokens = vec!["a".to_string()];
    follower.lookup("common").unwrap().apply(&mut tokens);
    assert_eq!(tokens, vec!["c"]);

    leader.teardown().await;
    follower.teardown().await;
}

/// Test: Undecodable payloads fail the tick without panicking
#[tokio::test]
async fn garbage_payload_fails_tick() {
    let store = RecordingStore::new();
    let (leader, follower) = leader_and_follower(&store).await;

    leader.save("common", replace_def("a", &["b"])).await.unwrap();
    follower.poll_tick().await.unwrap();

    let payloads: &[&[u8]] = &[b"", b"{", b"\xff\xfe\x00", b"[]", b"{\"type\": 7}"];
    for payload in payloads {
        store
            .backing()
            .overwrite_payload(TENANT, "common", payload.to_vec())
            .await;
        let result = follower.poll_tick().await;
        assert!(result.is_err(), "payload {:?} should fail the tick", payload);
        assert!(follower.lookup("common").is_some());
    }

    leader.teardown().await;
    follower.teardown().await;
}

/// Test: A definition referencing a sink this process lacks fails bootstrap
#[tokio::test]
async fn bootstrap_with_missing_sink_fails() {
    let store = RecordingStore::new();
    let audit = Arc::new(RecordingSink::new());

    let leader = registry_on(StaticTopology::leader(), &store, sinks_with("audit", audit));
    leader.bootstrap().await.unwrap();
    leader
        .save(
            "logged",
            RewriterDefinition::new(
                "replace",
                json!({ "rules": [{ "input": "a", "output": ["b"] }] }),
            )
            .with_sink("audit"),
        )
        .await
        .unwrap();

    let follower = registry_on(StaticTopology::follower(), &store, Arc::new(SinkMap::new()));
    let err = follower.bootstrap().await.expect_err("sink missing here");

    match &err {
        RegistryError::CompileDrift { reasons, .. } => {
            assert!(reasons.iter().any(|r| r.contains("audit")), "{:?}", reasons);
        }
        other => panic!("expected compile drift, got {:?}", other),
    }
    assert_eq!(follower.state(), RegistryState::Failed);
    assert!(follower.lookup("logged").is_none());

    leader.teardown().await;
    follower.teardown().await;
}

// =============================================================================
// Concurrency
// =============================================================================

/// Test: Concurrent saves and poll ticks converge on the same set
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_saves_and_polls_converge() {
    let store = RecordingStore::new();
    let (leader, follower) = leader_and_follower(&store).await;
    let leader = Arc::new(leader);
    let follower = Arc::new(follower);

    let mut tasks = Vec::new();
    for i in 0..16 {
        let leader = Arc::clone(&leader);
        tasks.push(tokio::spawn(async move {
            let id = format!("r{}", i);
            leader
                .save(&id, replace_def(&format!("in{}", i), &["out"]))
                .await
                .map(|_| ())
        }));
    }
    for _ in 0..8 {
        let follower = Arc::clone(&follower);
        tasks.push(tokio::spawn(async move {
            follower.poll_tick().await.map(|_| ())
        }));
    }
    for task in tasks {
        task.await.expect("task panicked").expect("operation failed");
    }

    // Settle: one more tick sees the final generation
    follower.poll_tick().await.unwrap();
    assert_eq!(follower.snapshot().ids(), leader.snapshot().ids());
    assert_eq!(follower.snapshot().len(), 16);
    assert_eq!(follower.generation(), leader.generation());

    leader.teardown().await;
    follower.teardown().await;
}
