// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use crate::arch::ArchGraph;
use crate::buffer::BufferPool;
use crate::engine::{executor, Binding, RunHandle, SchedulerOptions};
use crate::errors::ExecutionError;
use crate::graph::TaskGraph;
use crate::observability::messages::{validation::GraphRejected, StructuredLog};

#[async_trait]
pub trait Scheduler: Send + Sync {
    fn name(&self) -> &'static str;

    fn options(&self) -> &SchedulerOptions;

    /// Pool shared by every context this scheduler starts.
    fn pool(&self) -> &BufferPool;

    /// Decides which node(s) each task runs on. Called once per run; the
    /// result is not revisited while the run is in progress.
    fn bind(&self, graph: &TaskGraph, arch: &ArchGraph) -> Result<Binding, ExecutionError>;

    /// Validates, binds and sets up the graph, then starts every context.
    ///
    /// Returns as soon as the contexts are running. Configuration, topology and
    /// binding errors are reported here, before any data moves.
    async fn run(&self, graph: TaskGraph, arch: &ArchGraph) -> Result<RunHandle, ExecutionError> {
        if let Err(error) = graph.validate() {
            GraphRejected { error: &error }.log();
            return Err(error.into());
        }
        let binding = self.bind(&graph, arch)?;
        executor::launch(graph, arch, binding, self.options(), self.pool(), self.name()).await
    }
}
