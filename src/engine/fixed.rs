// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::HashMap;

use async_trait::async_trait;

use crate::arch::{ArchGraph, DeviceKind, NodeId};
use crate::buffer::BufferPool;
use crate::engine::{Binding, SchedulerOptions};
use crate::errors::ExecutionError;
use crate::graph::{TaskGraph, TaskId};
use crate::traits::Scheduler;

/// Scheduler that places tasks exactly where it is told to.
///
/// Placement precedence for each task:
/// 1. an explicit [`assign`](Self::assign) or [`expand`](Self::expand) on the scheduler
/// 2. a pin recorded on the graph
/// 3. an expansion request on the graph, over the local nodes of that kind
///    (or the nodes given to [`set_gpu_nodes`](Self::set_gpu_nodes) for GPUs)
/// 4. the architecture's default node
///
/// There is no load balancing.
#[derive(Debug, Clone, Default)]
pub struct FixedScheduler {
    options: SchedulerOptions,
    pool: BufferPool,
    placements: HashMap<TaskId, Vec<NodeId>>,
    gpu_nodes: Option<Vec<NodeId>>,
}

impl FixedScheduler {
    pub fn new(options: SchedulerOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn with_pool(mut self, pool: BufferPool) -> Self {
        self.pool = pool;
        self
    }

    /// Runs `task` on `node`.
    pub fn assign(&mut self, task: TaskId, node: NodeId) -> &mut Self {
        self.placements.insert(task, vec![node]);
        self
    }

    /// Runs one replica of `task` on each of `nodes`.
    pub fn expand(&mut self, task: TaskId, nodes: impl IntoIterator<Item = NodeId>) -> &mut Self {
        self.placements.insert(task, nodes.into_iter().collect());
        self
    }

    /// Restricts GPU expansions requested on the graph to `nodes`.
    pub fn set_gpu_nodes(&mut self, nodes: impl IntoIterator<Item = NodeId>) -> &mut Self {
        self.gpu_nodes = Some(nodes.into_iter().collect());
        self
    }

    fn expansion_nodes(&self, arch: &ArchGraph, kind: DeviceKind) -> Vec<NodeId> {
        match (kind, &self.gpu_nodes) {
            (DeviceKind::Gpu, Some(nodes)) => nodes.clone(),
            _ => arch
                .get_device_nodes(kind)
                .into_iter()
                .filter(|n| !n.is_remote())
                .map(|n| n.id)
                .collect(),
        }
    }
}

#[async_trait]
impl Scheduler for FixedScheduler {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn options(&self) -> &SchedulerOptions {
        &self.options
    }

    fn pool(&self) -> &BufferPool {
        &self.pool
    }

    fn bind(&self, graph: &TaskGraph, arch: &ArchGraph) -> Result<Binding, ExecutionError> {
        let default = arch.default_node().map(|n| n.id);
        let mut placements = Vec::with_capacity(graph.len());

        for (id, task) in graph.tasks() {
            let nodes = if let Some(nodes) = self.placements.get(&id) {
                nodes.clone()
            } else if let Some(pin) = task.pinned() {
                vec![pin]
            } else if let Some(kind) = task.expansion() {
                let nodes = self.expansion_nodes(arch, kind);
                if nodes.is_empty() {
                    return Err(ExecutionError::Binding {
                        task: task.name().to_string(),
                        reason: format!("expansion requested over {kind} nodes but there are none"),
                    });
                }
                nodes
            } else {
                default.into_iter().collect()
            };
            placements.push(nodes);
        }

        Binding::new(graph, arch, placements)
    }
}
