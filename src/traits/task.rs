// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use crate::arch::{DeviceKind, DeviceNode};
use crate::buffer::{Buffer, BufferPool};
use crate::config::{OptionSpec, TaskConfig};
use crate::errors::{ConfigurationError, ProcessingError};

/// Number of input and output ports a task declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arity {
    pub inputs: usize,
    pub outputs: usize,
}

impl Arity {
    pub const fn source(outputs: usize) -> Self {
        Self { inputs: 0, outputs }
    }

    pub const fn sink(inputs: usize) -> Self {
        Self { inputs, outputs: 0 }
    }

    pub const fn transform(inputs: usize, outputs: usize) -> Self {
        Self { inputs, outputs }
    }

    pub fn is_source(&self) -> bool {
        self.inputs == 0
    }

    pub fn is_sink(&self) -> bool {
        self.outputs == 0
    }
}

/// Device preference a task declares. Used by the adaptive scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Affinity {
    #[default]
    Any,
    Device(DeviceKind),
}

/// Buffers produced by one `process` or `flush` call, grouped by output port.
#[derive(Debug, Clone, Default)]
pub struct Outputs {
    ports: Vec<Vec<Buffer>>,
}

impl Outputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// A single buffer on port 0.
    pub fn one(buffer: Buffer) -> Self {
        Self {
            ports: vec![vec![buffer]],
        }
    }

    pub fn push(&mut self, port: usize, buffer: Buffer) {
        if self.ports.len() <= port {
            self.ports.resize_with(port + 1, Vec::new);
        }
        self.ports[port].push(buffer);
    }

    pub fn len(&self) -> usize {
        self.ports.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Port-indexed buffers; ports nothing was emitted on may be missing at the tail.
    pub fn into_ports(self) -> Vec<Vec<Buffer>> {
        self.ports
    }
}

impl FromIterator<Buffer> for Outputs {
    fn from_iter<I: IntoIterator<Item = Buffer>>(iter: I) -> Self {
        Self {
            ports: vec![iter.into_iter().collect()],
        }
    }
}

/// Result of one `process` call.
#[derive(Debug)]
pub enum Outcome {
    /// Zero or more buffers; the task wants to be called again.
    Emit(Outputs),
    /// The task will produce nothing more.
    Finished,
}

/// What a task sees of its execution context.
#[derive(Debug, Clone, Copy)]
pub struct TaskContext<'a> {
    pub task: &'a str,
    pub node: &'a DeviceNode,
    pub pool: &'a BufferPool,
    pub replica: usize,
    pub replicas: usize,
}

/// Object-safe cloning for task templates, so a scheduler can stamp out one
/// instance per replica.
pub trait TaskClone {
    fn clone_box(&self) -> Box<dyn Task>;
}

impl<T> TaskClone for T
where
    T: Task + Clone + 'static,
{
    fn clone_box(&self) -> Box<dyn Task> {
        Box::new(self.clone())
    }
}

impl Clone for Box<dyn Task> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// The processing contract every operator implements.
///
/// Lifecycle per instance: `setup` once, `process` until it returns
/// [`Outcome::Finished`] or an input port runs dry, `flush` once after inputs
/// drain, and `teardown` exactly once whenever `setup` succeeded, including on
/// abort. Transforms must cope with the input shape changing between calls.
#[async_trait]
pub trait Task: TaskClone + Send {
    /// Registry name of this task type.
    fn type_name(&self) -> &'static str;

    fn arity(&self) -> Arity;

    fn affinity(&self) -> Affinity {
        Affinity::Any
    }

    /// Options accepted by `setup`. Anything else is rejected before `setup` runs.
    fn schema(&self) -> &'static [OptionSpec] {
        &[]
    }

    async fn setup(&mut self, _config: &TaskConfig, _ctx: &TaskContext<'_>) -> Result<(), ConfigurationError> {
        Ok(())
    }

    /// Receives exactly one buffer per input port (none for sources).
    async fn process(&mut self, inputs: Vec<Buffer>, ctx: &TaskContext<'_>) -> Result<Outcome, ProcessingError>;

    /// Emits whatever is still buffered once inputs are exhausted.
    async fn flush(&mut self, _ctx: &TaskContext<'_>) -> Result<Outputs, ProcessingError> {
        Ok(Outputs::new())
    }

    /// Called exactly once after a successful `setup`, however the context
    /// ended, including after `process` or `flush` panicked.
    async fn teardown(&mut self) {}
}
