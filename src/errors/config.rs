// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while configuring tasks, before any data flows.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// A required option was not supplied and has no default
    #[error("task '{task}': missing required option '{option}'")]
    MissingOption { task: String, option: String },

    /// The option is not part of the task's declared schema
    #[error("task '{task}': unknown option '{option}'")]
    UnknownOption { task: String, option: String },

    /// The option value has the wrong type
    #[error("task '{task}': option '{option}' expects {expected}, got {found}")]
    MistypedOption {
        task: String,
        option: String,
        expected: &'static str,
        found: &'static str,
    },

    /// The option value lies outside the declared range
    #[error("task '{task}': option '{option}' is out of range: {reason}")]
    OutOfRange {
        task: String,
        option: String,
        reason: String,
    },

    /// No factory is registered under this task type
    #[error("unknown task type '{0}'")]
    UnknownTaskType(String),

    /// Two tasks in one graph share a name
    #[error("duplicate task name '{0}'")]
    DuplicateTaskName(String),

    /// Task-specific setup failure
    #[error("task '{task}': setup failed: {reason}")]
    Setup { task: String, reason: String },

    #[error("failed to read config '{}': {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Structural problems found in a pipeline file
    #[error("invalid pipeline config: {}", format_validation(.0))]
    Invalid(Vec<ValidationError>),
}

fn format_validation(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors found while validating a pipeline configuration file.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A circular dependency was detected between tasks
    #[error("cyclic dependency detected: {}", .cycle.join(" -> "))]
    CyclicDependency {
        /// The cycle path, first element repeated at the end
        cycle: Vec<String>,
    },

    /// A task reads from a task that doesn't exist
    #[error("task '{task_id}' reads from '{missing_input}' which does not exist")]
    UnresolvedInput {
        task_id: String,
        missing_input: String,
    },

    #[error("duplicate task id: '{task_id}'")]
    DuplicateTaskId { task_id: String },

    /// An input reference is not of the form `task` or `task:port`
    #[error("task '{task_id}' has malformed input reference '{reference}'")]
    MalformedInput { task_id: String, reference: String },
}
