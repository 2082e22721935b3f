// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Compute resources a run can be bound to.
//!
//! An [`ArchGraph`] lists device nodes: the local CPU, local GPUs, and nodes
//! exported by remote daemons. The scheduler treats all of them alike; only the
//! [`NodeLocation`] tells an execution context whether to run in-process or over
//! a remote session.

mod probe;

use std::fmt;
use std::time::Duration;

use serde::Deserialize;

use crate::errors::ConnectionError;
use crate::observability::messages::{remote::RemoteBound, StructuredLog};
use crate::remote::client::Session;

/// Stable identity of a node for the duration of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Cpu,
    Gpu,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::Cpu => f.write_str("cpu"),
            DeviceKind::Gpu => f.write_str("gpu"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeLocation {
    /// In this process; `ordinal` counts nodes of the same kind.
    Local { ordinal: usize },
    /// Exported by the daemon at `address` as its node `index`.
    Remote { address: String, index: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceNode {
    pub id: NodeId,
    pub kind: DeviceKind,
    pub location: NodeLocation,
    pub label: String,
}

impl DeviceNode {
    pub fn is_remote(&self) -> bool {
        matches!(self.location, NodeLocation::Remote { .. })
    }
}

/// Bounded retry for remote connects. The default makes a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 1,
            backoff_ms: 100,
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff_ms: backoff.as_millis() as u64,
        }
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

/// The `arch` section of a pipeline file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArchConfig {
    /// Number of local GPU nodes; probed from the host when unset.
    pub gpus: Option<usize>,
    #[serde(default)]
    pub remotes: Vec<String>,
    #[serde(default)]
    pub retry: RetryPolicy,
}

#[derive(Debug, Clone, Default)]
pub struct ArchGraph {
    nodes: Vec<DeviceNode>,
    remotes: Vec<String>,
    retry: RetryPolicy,
}

impl ArchGraph {
    /// Local host: one CPU node followed by the configured or probed GPUs.
    pub fn local(config: &ArchConfig) -> Self {
        let gpus = config.gpus.unwrap_or_else(probe::local_gpu_count);
        let mut kinds = vec![DeviceKind::Cpu];
        kinds.extend(std::iter::repeat(DeviceKind::Gpu).take(gpus));
        let mut arch = Self::with_devices(&kinds);
        arch.retry = config.retry;
        arch
    }

    /// Local nodes of exactly the given kinds, in order.
    pub fn with_devices(kinds: &[DeviceKind]) -> Self {
        let mut arch = Self::default();
        for &kind in kinds {
            let ordinal = arch.nodes.iter().filter(|n| n.kind == kind && !n.is_remote()).count();
            arch.push(kind, NodeLocation::Local { ordinal }, format!("{kind}-{ordinal}"));
        }
        arch
    }

    /// Local nodes plus every remote endpoint listed in `config`.
    pub async fn connect(config: &ArchConfig) -> Result<Self, ConnectionError> {
        let mut arch = Self::local(config);
        for address in &config.remotes {
            arch.bind_remote(address).await?;
        }
        Ok(arch)
    }

    pub fn set_retry_policy(&mut self, retry: RetryPolicy) {
        self.retry = retry;
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Handshakes with the daemon at `address` and adds the nodes it exports.
    pub async fn bind_remote(&mut self, address: &str) -> Result<Vec<NodeId>, ConnectionError> {
        let session = Session::open(address, self.retry).await?;
        let exported = session.nodes().to_vec();
        let endpoint = session.address().to_string();
        session.close().await;

        let ids = exported
            .into_iter()
            .enumerate()
            .map(|(index, (kind, label))| {
                self.push(
                    kind,
                    NodeLocation::Remote {
                        address: endpoint.clone(),
                        index: index as u32,
                    },
                    format!("{endpoint}/{label}"),
                )
            })
            .collect::<Vec<_>>();

        RemoteBound {
            address: &endpoint,
            node_count: ids.len(),
        }
        .log();
        self.remotes.push(endpoint);
        Ok(ids)
    }

    /// Nodes of `kind` in id order; empty when there are none.
    pub fn get_device_nodes(&self, kind: DeviceKind) -> Vec<&DeviceNode> {
        self.nodes.iter().filter(|n| n.kind == kind).collect()
    }

    pub fn gpu_nodes(&self) -> Vec<&DeviceNode> {
        self.get_device_nodes(DeviceKind::Gpu)
    }

    pub fn nodes(&self) -> &[DeviceNode] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&DeviceNode> {
        self.nodes.get(id.0)
    }

    /// Where unpinned tasks run: the first local CPU node, else the first local node.
    pub fn default_node(&self) -> Option<&DeviceNode> {
        self.nodes
            .iter()
            .find(|n| n.kind == DeviceKind::Cpu && !n.is_remote())
            .or_else(|| self.nodes.iter().find(|n| !n.is_remote()))
    }

    /// Addresses of every bound remote daemon.
    pub fn remotes(&self) -> &[String] {
        &self.remotes
    }

    pub(crate) fn push(&mut self, kind: DeviceKind, location: NodeLocation, label: String) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(DeviceNode {
            id,
            kind,
            location,
            label,
        });
        id
    }
}
