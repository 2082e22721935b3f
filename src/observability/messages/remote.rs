// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for the daemon and remote sessions.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// Daemon bound its listener.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use dataflow_engine::observability::messages::remote::DaemonListening;
///
/// let msg = DaemonListening {
///     address: "127.0.0.1:5554",
///     node_count: 3,
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct DaemonListening<'a> {
    pub address: &'a str,
    pub node_count: usize,
}

impl Display for DaemonListening<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Daemon listening on {} with {} nodes",
            self.address, self.node_count
        )
    }
}

impl StructuredLog for DaemonListening<'_> {
    fn log(&self) {
        tracing::info!(address = self.address, node_count = self.node_count, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("daemon", span_name = name, address = self.address)
    }
}

/// Daemon stopped; `aborted` sessions outlived the grace period.
///
/// # Log Level
/// `info!`
pub struct DaemonStopped<'a> {
    pub address: &'a str,
    pub aborted: bool,
}

impl Display for DaemonStopped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        if self.aborted {
            write!(f, "Daemon on {} stopped after aborting in-flight sessions", self.address)
        } else {
            write!(f, "Daemon on {} stopped", self.address)
        }
    }
}

impl StructuredLog for DaemonStopped<'_> {
    fn log(&self) {
        tracing::info!(address = self.address, aborted = self.aborted, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("daemon_stopped", span_name = name, address = self.address)
    }
}

/// A peer connected to the daemon.
pub struct SessionOpened<'a> {
    pub peer: &'a str,
}

impl Display for SessionOpened<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Session opened by {}", self.peer)
    }
}

impl StructuredLog for SessionOpened<'_> {
    fn log(&self) {
        tracing::debug!(peer = self.peer, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("session", span_name = name, peer = self.peer)
    }
}

/// A session ended.
pub struct SessionClosed<'a> {
    pub peer: &'a str,
    pub reason: &'a str,
}

impl Display for SessionClosed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Session with {} closed: {}", self.peer, self.reason)
    }
}

impl StructuredLog for SessionClosed<'_> {
    fn log(&self) {
        tracing::debug!(peer = self.peer, reason = self.reason, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("session_closed", span_name = name, peer = self.peer)
    }
}

/// A peer submitted a task for execution.
pub struct TaskSubmitted<'a> {
    pub peer: &'a str,
    pub task: &'a str,
    pub task_type: &'a str,
    pub node_index: u32,
}

impl Display for TaskSubmitted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} submitted task '{}' ({}) for node {}",
            self.peer, self.task, self.task_type, self.node_index
        )
    }
}

impl StructuredLog for TaskSubmitted<'_> {
    fn log(&self) {
        tracing::info!(
            peer = self.peer,
            task = self.task,
            task_type = self.task_type,
            node_index = self.node_index,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "remote_task",
            span_name = name,
            task = self.task,
            task_type = self.task_type,
        )
    }
}

/// Remote nodes were added to an ArchGraph.
pub struct RemoteBound<'a> {
    pub address: &'a str,
    pub node_count: usize,
}

impl Display for RemoteBound<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Bound {} nodes from {}", self.node_count, self.address)
    }
}

impl StructuredLog for RemoteBound<'_> {
    fn log(&self) {
        tracing::info!(address = self.address, node_count = self.node_count, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("remote_bound", span_name = name, address = self.address)
    }
}

/// One connection attempt failed; more may follow under the retry policy.
///
/// # Log Level
/// `warn!`
pub struct ConnectAttemptFailed<'a> {
    pub address: &'a str,
    pub attempt: u32,
    pub attempts: u32,
    pub error: &'a dyn std::error::Error,
}

impl Display for ConnectAttemptFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Connecting to {} failed (attempt {}/{}): {}",
            self.address, self.attempt, self.attempts, self.error
        )
    }
}

impl StructuredLog for ConnectAttemptFailed<'_> {
    fn log(&self) {
        tracing::warn!(
            address = self.address,
            attempt = self.attempt,
            attempts = self.attempts,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("connect_attempt", span_name = name, address = self.address)
    }
}
