// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability module for structured logging and tracing.
//!
//! Message types live under [`messages`], grouped by subsystem. Each one is a
//! plain struct implementing `Display` plus [`messages::StructuredLog`], so the
//! wording of an event lives in exactly one place and every call site emits the
//! same structured fields.
//!
//! # Usage
//!
//! ```rust
//! use dataflow_engine::observability::messages::{task::ContextStarted, StructuredLog};
//!
//! ContextStarted {
//!     task: "median",
//!     replica: 0,
//!     node: "gpu-0",
//! }
//! .log();
//! ```

pub mod messages;

use tracing_subscriber::EnvFilter;

use crate::config::consts::DEFAULT_LOG_FILTER;

/// Installs a `fmt` subscriber filtered by `RUST_LOG` (default `info`).
///
/// Safe to call more than once; only the first call installs anything.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
