// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::arch::{ArchGraph, NodeId};
use crate::errors::ExecutionError;
use crate::graph::{TaskGraph, TaskId};
use crate::observability::messages::{engine::TaskBound, StructuredLog};

/// Node placement for every task of one graph, indexed by task id.
///
/// A task placed on more than one node runs as that many replicas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    placements: Vec<Vec<NodeId>>,
}

impl Binding {
    /// Checks `placements` against the graph and the architecture: one entry
    /// per task, every node known, replication only for tasks with an input
    /// to share.
    pub fn new(graph: &TaskGraph, arch: &ArchGraph, placements: Vec<Vec<NodeId>>) -> Result<Self, ExecutionError> {
        if placements.len() != graph.len() {
            return Err(ExecutionError::Internal {
                message: format!("binding covers {} of {} tasks", placements.len(), graph.len()),
            });
        }

        for ((_, task), nodes) in graph.tasks().zip(&placements) {
            let fail = |reason: String| ExecutionError::Binding {
                task: task.name().to_string(),
                reason,
            };
            if nodes.is_empty() {
                return Err(fail("no node assigned".into()));
            }
            if nodes.len() > 1 && task.arity().is_source() {
                return Err(fail(format!("sources cannot be replicated ({} nodes requested)", nodes.len())));
            }
            let mut labels = Vec::with_capacity(nodes.len());
            for id in nodes {
                let node = arch.node(*id).ok_or_else(|| fail(format!("{id} is not part of the architecture")))?;
                labels.push(node.label.clone());
            }
            TaskBound {
                task: task.name(),
                nodes: &labels,
            }
            .log();
        }

        Ok(Self { placements })
    }

    pub fn nodes_for(&self, task: TaskId) -> &[NodeId] {
        self.placements.get(task.index()).map(Vec::as_slice).unwrap_or_default()
    }

    /// Total number of execution contexts this binding produces.
    pub fn context_count(&self) -> usize {
        self.placements.iter().map(Vec::len).sum()
    }
}
