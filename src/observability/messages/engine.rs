// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for scheduler runs.
//!
//! This module contains message types for logging events related to:
//! * Task-to-node binding decisions
//! * Run lifecycle (start, completion, failure, cancellation)

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// Run started after every context was set up.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use dataflow_engine::observability::messages::engine::RunStarted;
///
/// let msg = RunStarted {
///     scheduler: "fixed",
///     task_count: 3,
///     context_count: 3,
///     queue_capacity: 4,
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct RunStarted<'a> {
    pub scheduler: &'a str,
    pub task_count: usize,
    pub context_count: usize,
    pub queue_capacity: usize,
}

impl Display for RunStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Starting run with {} scheduler: {} tasks in {} contexts, queue_capacity={}",
            self.scheduler, self.task_count, self.context_count, self.queue_capacity
        )
    }
}

impl StructuredLog for RunStarted<'_> {
    fn log(&self) {
        tracing::info!(
            scheduler = self.scheduler,
            task_count = self.task_count,
            context_count = self.context_count,
            queue_capacity = self.queue_capacity,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "run",
            span_name = name,
            scheduler = self.scheduler,
            task_count = self.task_count,
            context_count = self.context_count,
        )
    }
}

/// Every context drained and joined.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use dataflow_engine::observability::messages::engine::RunCompleted;
/// use std::time::Duration;
///
/// let msg = RunCompleted {
///     scheduler: "adaptive",
///     context_count: 5,
///     duration: Duration::from_millis(250),
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct RunCompleted<'a> {
    pub scheduler: &'a str,
    pub context_count: usize,
    pub duration: std::time::Duration,
}

impl Display for RunCompleted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Run completed with {} scheduler: {} contexts in {:?}",
            self.scheduler, self.context_count, self.duration
        )
    }
}

impl StructuredLog for RunCompleted<'_> {
    fn log(&self) {
        tracing::info!(
            scheduler = self.scheduler,
            context_count = self.context_count,
            duration_ms = self.duration.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "run_completed",
            span_name = name,
            scheduler = self.scheduler,
            context_count = self.context_count,
            duration = ?self.duration,
        )
    }
}

/// Run aborted, either by a failed context or an external cancel.
///
/// # Log Level
/// `error!` - Failure requiring attention
///
/// # Example
/// ```
/// use dataflow_engine::observability::messages::engine::RunAborted;
///
/// let error = std::io::Error::new(std::io::ErrorKind::Other, "device lost");
/// let msg = RunAborted {
///     scheduler: "fixed",
///     error: &error,
/// };
///
/// tracing::error!("{}", msg);
/// ```
pub struct RunAborted<'a> {
    pub scheduler: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for RunAborted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Run aborted with {} scheduler: {}", self.scheduler, self.error)
    }
}

impl StructuredLog for RunAborted<'_> {
    fn log(&self) {
        tracing::error!(
            scheduler = self.scheduler,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "run_aborted",
            span_name = name,
            scheduler = self.scheduler,
            error = %self.error,
        )
    }
}

/// A task was placed on one or more nodes.
///
/// # Log Level
/// `debug!` - Binding detail
pub struct TaskBound<'a> {
    pub task: &'a str,
    pub nodes: &'a [String],
}

impl Display for TaskBound<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Task '{}' bound to [{}]", self.task, self.nodes.join(", "))
    }
}

impl StructuredLog for TaskBound<'_> {
    fn log(&self) {
        tracing::debug!(
            task = self.task,
            replicas = self.nodes.len(),
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "task_bound",
            span_name = name,
            task = self.task,
            replicas = self.nodes.len(),
        )
    }
}
