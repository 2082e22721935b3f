// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirection {
    Input,
    Output,
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortDirection::Input => write!(f, "input"),
            PortDirection::Output => write!(f, "output"),
        }
    }
}

/// Structural errors in a task graph. All of them are detected before a run starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TopologyError {
    /// The connection would close a cycle
    #[error("connection would create a cycle: {}", .path.join(" -> "))]
    Cycle { path: Vec<String> },

    #[error("task '{task}' has no {direction} port {port} (declares {arity})")]
    PortOutOfRange {
        task: String,
        direction: PortDirection,
        port: usize,
        arity: usize,
    },

    #[error("input port {port} of task '{task}' is already connected")]
    PortAlreadyConnected { task: String, port: usize },

    /// A required port has no edge
    #[error("{direction} port {port} of task '{task}' is not connected")]
    Incomplete {
        task: String,
        direction: PortDirection,
        port: usize,
    },

    #[error("task id {0} does not belong to this graph")]
    UnknownTask(usize),

    #[error("graph contains no tasks")]
    Empty,
}
