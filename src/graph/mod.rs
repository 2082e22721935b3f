// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Task graph topology.
//!
//! A [`TaskGraph`] owns its tasks and the edges between their ports. It checks
//! structure as it is built (port ranges, single producer per input port, no
//! cycles) and once more in [`TaskGraph::validate`] before a run (every port
//! connected). It never executes anything itself.

mod traversal;

use std::fmt;

use crate::arch::{DeviceKind, NodeId};
use crate::config::{validate_options, TaskConfig};
use crate::errors::{ConfigurationError, PortDirection, TopologyError};
use crate::traits::{Arity, Task};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub(crate) usize);

impl TaskId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(pub(crate) usize);

impl EdgeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// One port of one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Port {
    pub task: TaskId,
    pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub id: EdgeId,
    pub from: Port,
    pub to: Port,
}

/// A task plus everything the graph knows about it.
pub struct TaskNode {
    name: String,
    task: Box<dyn Task>,
    config: TaskConfig,
    arity: Arity,
    pinned: Option<NodeId>,
    expansion: Option<DeviceKind>,
}

impl TaskNode {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn task(&self) -> &dyn Task {
        self.task.as_ref()
    }

    pub fn config(&self) -> &TaskConfig {
        &self.config
    }

    pub fn arity(&self) -> Arity {
        self.arity
    }

    pub fn pinned(&self) -> Option<NodeId> {
        self.pinned
    }

    /// Kind of node this task should be replicated across, if requested.
    pub fn expansion(&self) -> Option<DeviceKind> {
        self.expansion
    }

    pub(crate) fn into_parts(self) -> (String, Box<dyn Task>, TaskConfig) {
        (self.name, self.task, self.config)
    }
}

impl fmt::Debug for TaskNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskNode")
            .field("name", &self.name)
            .field("type", &self.task.type_name())
            .field("arity", &self.arity)
            .field("pinned", &self.pinned)
            .field("expansion", &self.expansion)
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct TaskGraph {
    nodes: Vec<TaskNode>,
    edges: Vec<Edge>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a task under a unique `name`. `config` is checked against the
    /// task's option schema here; `setup` sees it later, at run time.
    pub fn add_task(
        &mut self,
        name: impl Into<String>,
        task: Box<dyn Task>,
        config: TaskConfig,
    ) -> Result<TaskId, ConfigurationError> {
        let name = name.into();
        if self.find(&name).is_some() {
            return Err(ConfigurationError::DuplicateTaskName(name));
        }
        validate_options(&name, task.schema(), &config)?;

        let id = TaskId(self.nodes.len());
        let arity = task.arity();
        self.nodes.push(TaskNode {
            name,
            task,
            config,
            arity,
            pinned: None,
            expansion: None,
        });
        Ok(id)
    }

    /// Connects output `out_port` of `from` to input `in_port` of `to`.
    ///
    /// An output port may feed any number of edges (each receives every buffer);
    /// an input port accepts exactly one edge.
    pub fn connect(
        &mut self,
        from: TaskId,
        out_port: usize,
        to: TaskId,
        in_port: usize,
    ) -> Result<EdgeId, TopologyError> {
        let producer = self.node(from)?;
        if out_port >= producer.arity.outputs {
            return Err(TopologyError::PortOutOfRange {
                task: producer.name.clone(),
                direction: PortDirection::Output,
                port: out_port,
                arity: producer.arity.outputs,
            });
        }
        let consumer = self.node(to)?;
        if in_port >= consumer.arity.inputs {
            return Err(TopologyError::PortOutOfRange {
                task: consumer.name.clone(),
                direction: PortDirection::Input,
                port: in_port,
                arity: consumer.arity.inputs,
            });
        }
        if self.edges.iter().any(|e| e.to.task == to && e.to.index == in_port) {
            return Err(TopologyError::PortAlreadyConnected {
                task: consumer.name.clone(),
                port: in_port,
            });
        }
        if let Some(path) = traversal::path(&self.edges, to, from) {
            let mut names = vec![self.nodes[from.0].name.clone()];
            names.extend(path.into_iter().map(|id| self.nodes[id.0].name.clone()));
            return Err(TopologyError::Cycle { path: names });
        }

        let id = EdgeId(self.edges.len());
        self.edges.push(Edge {
            id,
            from: Port {
                task: from,
                index: out_port,
            },
            to: Port {
                task: to,
                index: in_port,
            },
        });
        Ok(id)
    }

    /// `connect(from, 0, to, 0)`.
    pub fn connect_nodes(&mut self, from: TaskId, to: TaskId) -> Result<EdgeId, TopologyError> {
        self.connect(from, 0, to, 0)
    }

    /// Requires `task` to run on `node`.
    pub fn pin(&mut self, task: TaskId, node: NodeId) -> Result<(), TopologyError> {
        self.node_mut(task)?.pinned = Some(node);
        Ok(())
    }

    /// Asks the scheduler to replicate `task` across every node of `kind`.
    pub fn expand(&mut self, task: TaskId, kind: DeviceKind) -> Result<(), TopologyError> {
        self.node_mut(task)?.expansion = Some(kind);
        Ok(())
    }

    /// Every input port has exactly one edge and every output port at least one.
    pub fn validate(&self) -> Result<(), TopologyError> {
        if self.nodes.is_empty() {
            return Err(TopologyError::Empty);
        }
        for (index, node) in self.nodes.iter().enumerate() {
            let id = TaskId(index);
            for port in 0..node.arity.inputs {
                if !self.edges.iter().any(|e| e.to.task == id && e.to.index == port) {
                    return Err(TopologyError::Incomplete {
                        task: node.name.clone(),
                        direction: PortDirection::Input,
                        port,
                    });
                }
            }
            for port in 0..node.arity.outputs {
                if !self.edges.iter().any(|e| e.from.task == id && e.from.index == port) {
                    return Err(TopologyError::Incomplete {
                        task: node.name.clone(),
                        direction: PortDirection::Output,
                        port,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn task(&self, id: TaskId) -> Option<&TaskNode> {
        self.nodes.get(id.0)
    }

    pub fn tasks(&self) -> impl Iterator<Item = (TaskId, &TaskNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (TaskId(i), n))
    }

    pub fn find(&self, name: &str) -> Option<TaskId> {
        self.nodes.iter().position(|n| n.name == name).map(TaskId)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Edges into `task`, ordered by input port.
    pub fn incoming(&self, task: TaskId) -> Vec<&Edge> {
        let mut edges: Vec<_> = self.edges.iter().filter(|e| e.to.task == task).collect();
        edges.sort_by_key(|e| e.to.index);
        edges
    }

    pub fn outgoing(&self, task: TaskId) -> Vec<&Edge> {
        self.edges.iter().filter(|e| e.from.task == task).collect()
    }

    pub fn sources(&self) -> Vec<TaskId> {
        self.tasks()
            .filter(|(_, n)| n.arity.is_source())
            .map(|(id, _)| id)
            .collect()
    }

    pub fn sinks(&self) -> Vec<TaskId> {
        self.tasks()
            .filter(|(_, n)| n.arity.is_sink())
            .map(|(id, _)| id)
            .collect()
    }

    /// Tasks ordered so every producer precedes its consumers.
    pub fn topological_order(&self) -> Vec<TaskId> {
        traversal::topological_order(self.nodes.len(), &self.edges)
    }

    pub(crate) fn into_parts(self) -> (Vec<TaskNode>, Vec<Edge>) {
        (self.nodes, self.edges)
    }

    fn node(&self, id: TaskId) -> Result<&TaskNode, TopologyError> {
        self.nodes.get(id.0).ok_or(TopologyError::UnknownTask(id.0))
    }

    fn node_mut(&mut self, id: TaskId) -> Result<&mut TaskNode, TopologyError> {
        self.nodes.get_mut(id.0).ok_or(TopologyError::UnknownTask(id.0))
    }
}
