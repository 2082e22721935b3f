// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::arch::{ArchConfig, DeviceKind};
use crate::config::options::TaskConfig;
use crate::config::validation::validate_pipeline;
use crate::engine::SchedulerConfig;
use crate::errors::ConfigurationError;
use crate::observability::messages::{validation::ConfigValidationFailed, StructuredLog};

/// A pipeline as written in a YAML file.
///
/// # Example
/// ```yaml
/// scheduler:
///   policy: fixed
///   queue_capacity: 8
/// arch:
///   gpus: 2
///   remotes: ["tcp://10.0.0.7:5554"]
/// tasks:
///   - id: frames
///     type: generate
///     options: { number: 10, width: 64, height: 64 }
///   - id: halve
///     type: scale
///     options: { factor: 0.5 }
///     inputs: [frames]
///     expand: gpu
///   - id: sink
///     type: "null"
///     inputs: ["halve:0"]
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub arch: ArchConfig,
    pub tasks: Vec<TaskEntry>,
}

/// One task of a pipeline file.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub task_type: String,
    #[serde(default)]
    pub options: TaskConfig,
    /// One reference per input port, in port order.
    #[serde(default)]
    pub inputs: Vec<String>,
    /// Replicate across every node of this kind.
    pub expand: Option<DeviceKind>,
    /// Pin to this node index of the ArchGraph.
    pub node: Option<usize>,
}

/// A parsed `task` or `task:port` input reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputRef<'a> {
    pub task: &'a str,
    pub port: usize,
}

impl<'a> InputRef<'a> {
    /// `None` when the reference is empty or the port is not a number.
    pub fn parse(reference: &'a str) -> Option<Self> {
        let (task, port) = match reference.rsplit_once(':') {
            Some((task, port)) => (task, port.parse().ok()?),
            None => (reference, 0),
        };
        if task.is_empty() {
            return None;
        }
        Some(Self { task, port })
    }
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<PipelineConfig, ConfigurationError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| ConfigurationError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let cfg: PipelineConfig = serde_yaml::from_str(&content)?;
    Ok(cfg)
}

/// [`load_config`] plus structural checks: unique ids, resolvable inputs, no cycles.
pub fn load_and_validate_config<P: AsRef<Path>>(path: P) -> Result<PipelineConfig, ConfigurationError> {
    let cfg = load_config(path)?;

    if let Err(errors) = validate_pipeline(&cfg) {
        ConfigValidationFailed {
            error_count: errors.len(),
        }
        .log();
        return Err(ConfigurationError::Invalid(errors));
    }

    Ok(cfg)
}
