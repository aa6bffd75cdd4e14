// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Replica role of this process.
//!
//! The host decides whether this process is the single writer or a
//! read-replica and exposes that as one boolean capability. The registry
//! asks once, at construction, and never again.

use std::fmt;
use std::str::FromStr;

/// Leader/follower designation, fixed for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Single writer: accepts Save/Delete.
    Leader,
    /// Read-replica: rejects writes, polls the store for changes.
    Follower,
}

impl Role {
    pub fn is_follower(self) -> bool {
        matches!(self, Role::Follower)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Leader => "leader",
            Role::Follower => "follower",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "leader" | "primary" => Ok(Role::Leader),
            "follower" | "replica" => Ok(Role::Follower),
            other => Err(format!("unknown replica role: {}", other)),
        }
    }
}

/// Answers whether this process is a follower.
pub trait TopologyProvider: Send + Sync {
    fn is_follower(&self) -> bool;
}

/// Topology fixed at construction time.
#[derive(Debug, Clone, Copy)]
pub struct StaticTopology(pub Role);

impl StaticTopology {
    pub fn leader() -> Self {
        Self(Role::Leader)
    }

    pub fn follower() -> Self {
        Self(Role::Follower)
    }
}

impl TopologyProvider for StaticTopology {
    fn is_follower(&self) -> bool {
        self.0.is_follower()
    }
}

impl<F> TopologyProvider for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_follower(&self) -> bool {
        self()
    }
}
