// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::arch::{ArchConfig, ArchGraph, NodeId};
use crate::buffer::BufferPool;
use crate::config::loader::{InputRef, PipelineConfig};
use crate::config::validation::validate_pipeline;
use crate::config::TaskRegistry;
use crate::engine::{RunHandle, RunReport, SchedulerFactory};
use crate::errors::{ConfigurationError, ExecutionError};
use crate::graph::TaskGraph;
use crate::traits::Scheduler;

/// Turns a [`PipelineConfig`] into a runnable [`Pipeline`].
///
/// # Examples
///
/// ```
/// use dataflow_engine::config::{PipelineBuilder, PipelineConfig};
///
/// let config: PipelineConfig = serde_yaml::from_str(r#"
/// tasks:
///   - id: frames
///     type: generate
///     options: { number: 2, width: 4, height: 4 }
///   - id: sink
///     type: "null"
///     inputs: [frames]
/// "#).unwrap();
///
/// let pipeline = PipelineBuilder::new().build(&config).unwrap();
/// assert_eq!(pipeline.graph().len(), 2);
/// assert_eq!(pipeline.scheduler().name(), "adaptive");
/// ```
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    registry: TaskRegistry,
    pool: BufferPool,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineBuilder {
    /// A builder resolving task types against the built-in tasks.
    pub fn new() -> Self {
        Self::with_registry(TaskRegistry::with_builtins())
    }

    pub fn with_registry(registry: TaskRegistry) -> Self {
        Self {
            registry,
            pool: BufferPool::new(),
        }
    }

    /// Pool the scheduler hands to every context.
    pub fn with_pool(mut self, pool: BufferPool) -> Self {
        self.pool = pool;
        self
    }

    /// Validates `config`, instantiates every task and wires the graph.
    ///
    /// Remote endpoints are not contacted here; that happens in [`Pipeline::run`].
    pub fn build(&self, config: &PipelineConfig) -> Result<Pipeline, ExecutionError> {
        validate_pipeline(config).map_err(ConfigurationError::Invalid)?;

        let mut graph = TaskGraph::new();
        for entry in &config.tasks {
            let task = self.registry.create(&entry.task_type)?;
            let id = graph.add_task(entry.id.as_str(), task, entry.options.clone())?;
            if let Some(kind) = entry.expand {
                graph.expand(id, kind)?;
            }
            if let Some(node) = entry.node {
                graph.pin(id, NodeId(node))?;
            }
        }

        for entry in &config.tasks {
            let to = graph.find(&entry.id).ok_or_else(|| internal(&entry.id))?;
            for (in_port, reference) in entry.inputs.iter().enumerate() {
                let input = InputRef::parse(reference).ok_or_else(|| internal(reference))?;
                let from = graph.find(input.task).ok_or_else(|| internal(input.task))?;
                graph.connect(from, input.port, to, in_port)?;
            }
        }
        graph.validate()?;

        Ok(Pipeline {
            graph,
            scheduler: SchedulerFactory::from_config(&config.scheduler, self.pool.clone()),
            arch_config: config.arch.clone(),
        })
    }
}

fn internal(name: &str) -> ExecutionError {
    ExecutionError::Internal {
        message: format!("'{name}' passed validation but did not resolve"),
    }
}

/// A wired task graph plus the scheduler and architecture it runs on.
pub struct Pipeline {
    graph: TaskGraph,
    scheduler: Box<dyn Scheduler>,
    arch_config: ArchConfig,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("graph", &self.graph)
            .field("scheduler", &self.scheduler.name())
            .field("arch_config", &self.arch_config)
            .finish()
    }
}

impl Pipeline {
    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    pub fn scheduler(&self) -> &dyn Scheduler {
        self.scheduler.as_ref()
    }

    pub fn arch_config(&self) -> &ArchConfig {
        &self.arch_config
    }

    /// Starts the pipeline on `arch` without waiting for it.
    pub async fn start(self, arch: &ArchGraph) -> Result<RunHandle, ExecutionError> {
        self.scheduler.run(self.graph, arch).await
    }

    /// Builds the ArchGraph from the `arch` section, binding every listed
    /// remote, then runs the pipeline to completion.
    pub async fn run(self) -> Result<RunReport, ExecutionError> {
        let arch = ArchGraph::connect(&self.arch_config).await?;
        self.start(&arch).await?.join().await
    }
}
