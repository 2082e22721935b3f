// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::Deserialize;

use crate::config::consts::DEFAULT_QUEUE_CAPACITY;

/// Which scheduler a pipeline file asks for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerPolicy {
    Fixed,
    #[default]
    Adaptive,
}

/// How the adaptive scheduler chooses among nodes that all match a task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Heuristic {
    /// Cycle through the candidates in node order.
    #[default]
    RoundRobin,
    /// Pick the candidate with the fewest contexts bound so far.
    LeastLoaded,
}

/// Tunables shared by both schedulers.
///
/// # Example
/// ```yaml
/// queue_capacity: 8
/// heuristic: least_loaded
/// allow_remote: true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SchedulerOptions {
    /// Buffers an edge holds before its producer suspends.
    pub queue_capacity: usize,
    pub heuristic: Heuristic,
    /// Let the adaptive scheduler place transforms on remote nodes by itself.
    pub allow_remote: bool,
    /// Spread tasks without any device preference over every eligible node
    /// instead of keeping them on the default node.
    pub spread_unpinned: bool,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            heuristic: Heuristic::default(),
            allow_remote: false,
            spread_unpinned: false,
        }
    }
}

/// The `scheduler` section of a pipeline file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default)]
    pub policy: SchedulerPolicy,
    #[serde(flatten)]
    pub options: SchedulerOptions,
}
