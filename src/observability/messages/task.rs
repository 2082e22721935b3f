// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for execution context lifecycle events.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// Context moved from Idle to Running.
///
/// # Log Level
/// `debug!`
pub struct ContextStarted<'a> {
    pub task: &'a str,
    pub replica: usize,
    pub node: &'a str,
}

impl Display for ContextStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Context '{}'[{}] running on {}",
            self.task, self.replica, self.node
        )
    }
}

impl StructuredLog for ContextStarted<'_> {
    fn log(&self) {
        tracing::debug!(task = self.task, replica = self.replica, node = self.node, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "context",
            span_name = name,
            task = self.task,
            replica = self.replica,
            node = self.node,
        )
    }
}

/// Context drained its inputs and finished.
///
/// # Log Level
/// `debug!`
pub struct ContextFinished<'a> {
    pub task: &'a str,
    pub replica: usize,
    pub processed: u64,
    pub duration: std::time::Duration,
}

impl Display for ContextFinished<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Context '{}'[{}] finished: processed={} in {:?}",
            self.task, self.replica, self.processed, self.duration
        )
    }
}

impl StructuredLog for ContextFinished<'_> {
    fn log(&self) {
        tracing::debug!(
            task = self.task,
            replica = self.replica,
            processed = self.processed,
            duration_ms = self.duration.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "context_finished",
            span_name = name,
            task = self.task,
            replica = self.replica,
            processed = self.processed,
        )
    }
}

/// Context failed; the whole run is being aborted.
///
/// # Log Level
/// `error!`
pub struct ContextFailed<'a> {
    pub task: &'a str,
    pub replica: usize,
    pub error: &'a dyn std::error::Error,
}

impl Display for ContextFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Context '{}'[{}] failed: {}",
            self.task, self.replica, self.error
        )
    }
}

impl StructuredLog for ContextFailed<'_> {
    fn log(&self) {
        tracing::error!(task = self.task, replica = self.replica, error = %self.error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "context_failed",
            span_name = name,
            task = self.task,
            replica = self.replica,
            error = %self.error,
        )
    }
}

/// Context stopped because the run was aborted elsewhere.
pub struct ContextAborted<'a> {
    pub task: &'a str,
    pub replica: usize,
}

impl Display for ContextAborted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Context '{}'[{}] stopped by abort request", self.task, self.replica)
    }
}

impl StructuredLog for ContextAborted<'_> {
    fn log(&self) {
        tracing::warn!(task = self.task, replica = self.replica, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("context_aborted", span_name = name, task = self.task, replica = self.replica)
    }
}

/// Task setup rejected its configuration before the run started.
pub struct TaskSetupFailed<'a> {
    pub task: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for TaskSetupFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Setup of task '{}' failed: {}", self.task, self.error)
    }
}

impl StructuredLog for TaskSetupFailed<'_> {
    fn log(&self) {
        tracing::error!(task = self.task, error = %self.error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("task_setup_failed", span_name = name, task = self.task)
    }
}

/// A shape-polymorphic task rebuilt its per-shape state.
pub struct ShapeReconfigured<'a> {
    pub task: &'a str,
    pub shape: &'a dyn Display,
}

impl Display for ShapeReconfigured<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Task '{}' reconfigured for shape {}", self.task, self.shape)
    }
}

impl StructuredLog for ShapeReconfigured<'_> {
    fn log(&self) {
        tracing::debug!(task = self.task, shape = %self.shape, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("shape_reconfigured", span_name = name, task = self.task)
    }
}
