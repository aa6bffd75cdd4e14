// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration for the rewriter registry.
//!
//! Configuration is passed to [`RewriterRegistry::new()`](crate::RewriterRegistry::new)
//! and can be constructed programmatically or deserialized from YAML/JSON.
//!
//! # Quick Start
//!
//! ```rust
//! use rewriter_registry::config::RegistryConfig;
//!
//! let config = RegistryConfig {
//!     tenant: "products".into(),
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```
//!
//! # Configuration Structure
//!
//! ```text
//! RegistryConfig
//! ├── tenant: String               # Scope of rewriter ids
//! ├── polling: PollingConfig       # Follower poll timer
//! ├── bootstrap: BootstrapConfig   # Store availability retry at startup
//! └── store: StoreConfig           # Bundled SQLite store
//! ```
//!
//! # YAML Example
//!
//! ```yaml
//! tenant: "products"
//!
//! polling:
//!   interval: "20s"
//!
//! bootstrap:
//!   max_attempts: 20
//!   initial_delay_ms: 500
//!
//! store:
//!   sqlite_path: "/var/lib/search/rewriters.db"
//!   page_size: 100
//! ```

use crate::error::{RegistryError, Result};
use crate::resilience::RetryConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ═══════════════════════════════════════════════════════════════════════════════
// Top-level config: passed from host to RewriterRegistry::new()
// ═══════════════════════════════════════════════════════════════════════════════

/// The top-level config object passed to `RewriterRegistry::new()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Scope within which rewriter ids are unique (e.g. one search index).
    pub tenant: String,

    /// Follower polling settings. Ignored on the leader.
    #[serde(default)]
    pub polling: PollingConfig,

    /// Retry budget for reaching the store during bootstrap.
    #[serde(default)]
    pub bootstrap: BootstrapConfig,

    /// Settings for the bundled SQLite store.
    #[serde(default)]
    pub store: StoreConfig,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            tenant: "default".to_string(),
            polling: PollingConfig::default(),
            bootstrap: BootstrapConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl RegistryConfig {
    /// Create a minimal config for testing.
    ///
    /// Polls every hour (tests drive ticks by hand) and never retries
    /// bootstrap store reads.
    pub fn for_testing(tenant: &str) -> Self {
        Self {
            tenant: tenant.to_string(),
            polling: PollingConfig {
                interval: "1h".to_string(),
            },
            bootstrap: BootstrapConfig {
                max_attempts: 1,
                initial_delay_ms: 1,
                max_delay_ms: 1,
            },
            store: StoreConfig::in_memory(),
        }
    }

    /// Reject configurations the registry cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.tenant.trim().is_empty() {
            return Err(RegistryError::Config("tenant must not be empty".to_string()));
        }
        if self.store.page_size == 0 {
            return Err(RegistryError::Config(
                "store.page_size must be greater than zero".to_string(),
            ));
        }
        if self.bootstrap.max_attempts == 0 {
            return Err(RegistryError::Config(
                "bootstrap.max_attempts must be at least 1".to_string(),
            ));
        }
        match humantime::parse_duration(&self.polling.interval) {
            Ok(d) if d.is_zero() => Err(RegistryError::Config(
                "polling.interval must be greater than zero".to_string(),
            )),
            Ok(_) => Ok(()),
            Err(e) => Err(RegistryError::Config(format!(
                "invalid polling.interval '{}': {}",
                self.polling.interval, e
            ))),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PollingConfig: follower generation polling
// ═══════════════════════════════════════════════════════════════════════════════

/// Follower poll timer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Fixed delay between generation checks (humantime, e.g. "20s", "1m").
    #[serde(default = "default_poll_interval")]
    pub interval: String,
}

fn default_poll_interval() -> String {
    "20s".to_string()
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: default_poll_interval(),
        }
    }
}

impl PollingConfig {
    /// Parse the interval string to a Duration.
    pub fn interval_duration(&self) -> Duration {
        humantime::parse_duration(&self.interval).unwrap_or(Duration::from_secs(20))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BootstrapConfig: store availability at startup
// ═══════════════════════════════════════════════════════════════════════════════

/// Retry budget for the store reads performed by bootstrap.
///
/// Only store failures are retried. A stored definition that fails to
/// compile aborts bootstrap immediately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapConfig {
    #[serde(default = "default_bootstrap_attempts")]
    pub max_attempts: usize,

    #[serde(default = "default_bootstrap_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_bootstrap_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_bootstrap_attempts() -> usize {
    20
}

fn default_bootstrap_initial_delay_ms() -> u64 {
    500
}

fn default_bootstrap_max_delay_ms() -> u64 {
    30_000
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_bootstrap_attempts(),
            initial_delay_ms: default_bootstrap_initial_delay_ms(),
            max_delay_ms: default_bootstrap_max_delay_ms(),
        }
    }
}

impl BootstrapConfig {
    /// Build the retry schedule used for bootstrap store reads.
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts.max(1),
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms.max(self.initial_delay_ms)),
            ..RetryConfig::startup()
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// StoreConfig: bundled SQLite definition store
// ═══════════════════════════════════════════════════════════════════════════════

/// SQLite definition store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite database holding rewriter definitions.
    pub sqlite_path: String,

    /// Documents fetched per enumeration page.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_page_size() -> usize {
    100
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            sqlite_path: "rewriter_definitions.db".to_string(),
            page_size: default_page_size(),
        }
    }
}

impl StoreConfig {
    /// Create an in-memory config for testing.
    pub fn in_memory() -> Self {
        Self {
            sqlite_path: ":memory:".to_string(),
            page_size: default_page_size(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
