// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

use super::{ConfigurationError, ConnectionError, ProtocolError, TopologyError};

/// Errors raised by a task while processing buffers.
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("buffer allocation of {bytes} bytes failed")]
    Allocation { bytes: usize },

    #[error("unsupported shape {shape:?}: {reason}")]
    UnsupportedShape { shape: Vec<usize>, reason: String },

    #[error("unsupported element type {0}")]
    UnsupportedType(String),

    #[error("expected {expected} input buffer(s), got {found}")]
    InputArity { expected: usize, found: usize },

    #[error("emitted to output port {port} but only {arity} declared")]
    InvalidOutputPort { port: usize, arity: usize },

    /// Storage length disagrees with the element count of the shape
    #[error("storage holds {found} elements, shape needs {expected}")]
    LengthMismatch { expected: usize, found: usize },

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("{0}")]
    Failed(String),
}

/// Errors reported by `Scheduler::run` and `RunHandle::join`.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Topology(#[from] TopologyError),

    /// The scheduler could not place a task
    #[error("cannot bind task '{task}': {reason}")]
    Binding { task: String, reason: String },

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error("task '{task}' (replica {replica}) failed: {source}")]
    TaskFailed {
        task: String,
        replica: usize,
        #[source]
        source: ProcessingError,
    },

    #[error("remote task '{task}' (replica {replica}) failed: {message}")]
    RemoteFailed {
        task: String,
        replica: usize,
        message: String,
    },

    #[error("run was cancelled")]
    Cancelled,

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl ExecutionError {
    /// Name of the task that triggered the error, when there is one.
    pub fn task(&self) -> Option<&str> {
        match self {
            ExecutionError::Binding { task, .. }
            | ExecutionError::TaskFailed { task, .. }
            | ExecutionError::RemoteFailed { task, .. } => Some(task),
            _ => None,
        }
    }
}
