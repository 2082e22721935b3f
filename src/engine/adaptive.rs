// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::HashMap;

use async_trait::async_trait;

use crate::arch::{ArchGraph, DeviceKind, DeviceNode, NodeId};
use crate::buffer::BufferPool;
use crate::engine::{Binding, Heuristic, SchedulerOptions};
use crate::errors::ExecutionError;
use crate::graph::{TaskGraph, TaskNode};
use crate::traits::{Affinity, Scheduler};

/// Scheduler that fills in placement the graph leaves open.
///
/// Pinned tasks stay where they are pinned and expansion requests replicate a
/// task across every node of the requested kind. Tasks that declare a device
/// affinity are spread over the matching nodes using the configured
/// [`Heuristic`]; tasks without one run on the default node, or are spread
/// over every node when `spread_unpinned` is set. Remote nodes are considered
/// only with `allow_remote`, and only for tasks that have both inputs and
/// outputs.
///
/// Placement is decided once, at bind time.
#[derive(Debug, Clone, Default)]
pub struct AdaptiveScheduler {
    options: SchedulerOptions,
    pool: BufferPool,
}

impl AdaptiveScheduler {
    pub fn new(options: SchedulerOptions) -> Self {
        Self {
            options,
            pool: BufferPool::default(),
        }
    }

    pub fn with_pool(mut self, pool: BufferPool) -> Self {
        self.pool = pool;
        self
    }

    fn eligible(&self, task: &TaskNode, node: &DeviceNode) -> bool {
        if !node.is_remote() {
            return true;
        }
        let arity = task.arity();
        self.options.allow_remote && !arity.is_source() && !arity.is_sink()
    }
}

/// Running per-node context counts plus one round-robin cursor per candidate set.
#[derive(Default)]
struct Placer {
    load: HashMap<NodeId, usize>,
    cursors: HashMap<Option<DeviceKind>, usize>,
}

impl Placer {
    fn record(&mut self, nodes: &[NodeId]) {
        for node in nodes {
            *self.load.entry(*node).or_default() += 1;
        }
    }

    fn pick(&mut self, heuristic: Heuristic, key: Option<DeviceKind>, candidates: &[NodeId]) -> Option<NodeId> {
        let node = match heuristic {
            Heuristic::RoundRobin => {
                let cursor = self.cursors.entry(key).or_default();
                let node = candidates.get(*cursor % candidates.len().max(1)).copied();
                *cursor += 1;
                node
            }
            Heuristic::LeastLoaded => candidates
                .iter()
                .min_by_key(|n| self.load.get(n).copied().unwrap_or(0))
                .copied(),
        }?;
        self.record(&[node]);
        Some(node)
    }
}

#[async_trait]
impl Scheduler for AdaptiveScheduler {
    fn name(&self) -> &'static str {
        "adaptive"
    }

    fn options(&self) -> &SchedulerOptions {
        &self.options
    }

    fn pool(&self) -> &BufferPool {
        &self.pool
    }

    fn bind(&self, graph: &TaskGraph, arch: &ArchGraph) -> Result<Binding, ExecutionError> {
        let default = arch.default_node().map(|n| n.id);
        let mut placer = Placer::default();

        // Pins and expansions first so the heuristic sees their load.
        let mut placements: Vec<Option<Vec<NodeId>>> = graph
            .tasks()
            .map(|(_, task)| {
                if let Some(pin) = task.pinned() {
                    return Ok(Some(vec![pin]));
                }
                let Some(kind) = task.expansion() else {
                    return Ok(None);
                };
                let nodes: Vec<NodeId> = arch
                    .get_device_nodes(kind)
                    .into_iter()
                    .filter(|n| self.eligible(task, n))
                    .map(|n| n.id)
                    .collect();
                if nodes.is_empty() {
                    return Err(ExecutionError::Binding {
                        task: task.name().to_string(),
                        reason: format!("expansion requested over {kind} nodes but there are none"),
                    });
                }
                Ok(Some(nodes))
            })
            .collect::<Result<_, _>>()?;
        for nodes in placements.iter().flatten() {
            placer.record(nodes);
        }

        for ((_, task), slot) in graph.tasks().zip(placements.iter_mut()) {
            if slot.is_some() {
                continue;
            }
            let key = match task.task().affinity() {
                Affinity::Device(kind) => Some(kind),
                Affinity::Any if self.options.spread_unpinned => None,
                Affinity::Any => {
                    *slot = Some(default.into_iter().collect());
                    continue;
                }
            };
            let candidates: Vec<NodeId> = arch
                .nodes()
                .iter()
                .filter(|n| key.map_or(true, |kind| n.kind == kind))
                .filter(|n| self.eligible(task, n))
                .map(|n| n.id)
                .collect();
            let node = placer.pick(self.options.heuristic, key, &candidates).or(default);
            *slot = Some(node.into_iter().collect());
        }

        Binding::new(graph, arch, placements.into_iter().map(Option::unwrap_or_default).collect())
    }
}
