// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! # Organization
//!
//! * `engine` - scheduler runs: binding, start, completion, abort
//! * `task` - execution context lifecycle
//! * `remote` - daemon and remote session events
//! * `validation` - graph and pipeline config validation
//!
//! # Usage Pattern
//!
//! ```rust
//! use dataflow_engine::observability::messages::engine::RunStarted;
//!
//! let msg = RunStarted {
//!     scheduler: "adaptive",
//!     task_count: 3,
//!     context_count: 5,
//!     queue_capacity: 4,
//! };
//!
//! tracing::info!("{}", msg);
//! ```

pub mod engine;
pub mod remote;
pub mod task;
pub mod validation;

use std::fmt::Display;
use tracing::Span;

/// A log message that knows its own level and structured fields.
pub trait StructuredLog: Display {
    /// Emits the event at the message's level.
    fn log(&self);

    /// Opens a span carrying the message's fields.
    fn span(&self, name: &str) -> Span;
}
