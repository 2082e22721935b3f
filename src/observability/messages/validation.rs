// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for graph and pipeline config validation.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// Pipeline config failed validation.
///
/// # Log Level
/// `error!`
///
/// # Example
/// ```
/// use dataflow_engine::observability::messages::validation::ConfigValidationFailed;
///
/// let msg = ConfigValidationFailed { error_count: 2 };
/// tracing::error!("{}", msg);
/// ```
pub struct ConfigValidationFailed {
    pub error_count: usize,
}

impl Display for ConfigValidationFailed {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Pipeline config has {} validation error(s)", self.error_count)
    }
}

impl StructuredLog for ConfigValidationFailed {
    fn log(&self) {
        tracing::error!(error_count = self.error_count, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("config_validation", span_name = name, error_count = self.error_count)
    }
}

/// Task graph rejected before execution.
pub struct GraphRejected<'a> {
    pub error: &'a dyn std::error::Error,
}

impl Display for GraphRejected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Task graph rejected: {}", self.error)
    }
}

impl StructuredLog for GraphRejected<'_> {
    fn log(&self) {
        tracing::error!(error = %self.error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("graph_rejected", span_name = name, error = %self.error)
    }
}
