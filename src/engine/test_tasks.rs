// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Small tasks used by the engine, graph and config tests.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::arch::DeviceKind;
use crate::buffer::{Buffer, DType, Shape};
use crate::config::TaskConfig;
use crate::errors::{ConfigurationError, ProcessingError};
use crate::traits::{Affinity, Arity, Outcome, Outputs, Task, TaskContext};

/// Shared counters a test keeps after handing the task to a graph.
#[derive(Debug, Clone, Default)]
pub(crate) struct Probe {
    setups: Arc<AtomicUsize>,
    teardowns: Arc<AtomicUsize>,
    processed: Arc<AtomicUsize>,
    replicas: Arc<Mutex<BTreeSet<usize>>>,
}

impl Probe {
    pub(crate) fn setups(&self) -> usize {
        self.setups.load(Ordering::SeqCst)
    }

    pub(crate) fn teardowns(&self) -> usize {
        self.teardowns.load(Ordering::SeqCst)
    }

    pub(crate) fn processed(&self) -> usize {
        self.processed.load(Ordering::SeqCst)
    }

    /// Replica indices that processed at least one tuple.
    pub(crate) fn replicas(&self) -> BTreeSet<usize> {
        self.replicas.lock().unwrap().clone()
    }

    fn on_setup(&self) {
        self.setups.fetch_add(1, Ordering::SeqCst);
    }

    fn on_process(&self, ctx: &TaskContext<'_>) {
        self.processed.fetch_add(1, Ordering::SeqCst);
        self.replicas.lock().unwrap().insert(ctx.replica);
    }

    fn on_teardown(&self) {
        self.teardowns.fetch_add(1, Ordering::SeqCst);
    }
}

/// Forwards its single input unchanged.
#[derive(Debug, Clone, Default)]
pub(crate) struct Passthrough {
    affinity: Affinity,
    probe: Probe,
}

impl Passthrough {
    pub(crate) fn on(kind: DeviceKind) -> Self {
        Self {
            affinity: Affinity::Device(kind),
            ..Self::default()
        }
    }

    pub(crate) fn with_probe(mut self, probe: Probe) -> Self {
        self.probe = probe;
        self
    }
}

#[async_trait]
impl Task for Passthrough {
    fn type_name(&self) -> &'static str {
        "passthrough"
    }

    fn arity(&self) -> Arity {
        Arity::transform(1, 1)
    }

    fn affinity(&self) -> Affinity {
        self.affinity
    }

    async fn setup(&mut self, _config: &TaskConfig, _ctx: &TaskContext<'_>) -> Result<(), ConfigurationError> {
        self.probe.on_setup();
        Ok(())
    }

    async fn process(&mut self, mut inputs: Vec<Buffer>, ctx: &TaskContext<'_>) -> Result<Outcome, ProcessingError> {
        self.probe.on_process(ctx);
        // let other replicas get a turn at the shared queue
        tokio::task::yield_now().await;
        let buffer = inputs.pop().ok_or(ProcessingError::InputArity { expected: 1, found: 0 })?;
        Ok(Outcome::Emit(Outputs::one(buffer)))
    }

    async fn teardown(&mut self) {
        self.probe.on_teardown();
    }
}

/// Source emitting `[i]` as u32 for `i` in `0..limit`, or a sink collecting buffers.
#[derive(Debug, Clone)]
pub(crate) struct Counter {
    limit: Option<u32>,
    source: bool,
    next: u32,
    collected: Arc<Mutex<Vec<Buffer>>>,
    probe: Probe,
}

impl Counter {
    pub(crate) fn source(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            source: true,
            next: 0,
            collected: Arc::default(),
            probe: Probe::default(),
        }
    }

    pub(crate) fn endless() -> Self {
        Self {
            limit: None,
            ..Self::source(0)
        }
    }

    pub(crate) fn sink() -> Self {
        Self {
            source: false,
            ..Self::source(0)
        }
    }

    pub(crate) fn with_probe(mut self, probe: Probe) -> Self {
        self.probe = probe;
        self
    }

    /// Handle onto what the sink collects; stays valid after the task moves into a graph.
    pub(crate) fn collected(&self) -> Arc<Mutex<Vec<Buffer>>> {
        Arc::clone(&self.collected)
    }
}

#[async_trait]
impl Task for Counter {
    fn type_name(&self) -> &'static str {
        if self.source {
            "counter_source"
        } else {
            "counter_sink"
        }
    }

    fn arity(&self) -> Arity {
        if self.source {
            Arity::source(1)
        } else {
            Arity::sink(1)
        }
    }

    async fn setup(&mut self, _config: &TaskConfig, _ctx: &TaskContext<'_>) -> Result<(), ConfigurationError> {
        self.probe.on_setup();
        Ok(())
    }

    async fn process(&mut self, inputs: Vec<Buffer>, ctx: &TaskContext<'_>) -> Result<Outcome, ProcessingError> {
        self.probe.on_process(ctx);
        if !self.source {
            self.collected.lock().unwrap().extend(inputs);
            return Ok(Outcome::Emit(Outputs::new()));
        }
        if self.limit.is_some_and(|limit| self.next >= limit) {
            return Ok(Outcome::Finished);
        }
        let shape = Shape::new(vec![1])?;
        let mut buffer = ctx.pool.acquire(DType::U32, &shape)?;
        if let Some(values) = buffer.as_mut_slice::<u32>() {
            values[0] = self.next;
        }
        self.next += 1;
        tokio::task::yield_now().await;
        Ok(Outcome::Emit(Outputs::one(buffer.freeze())))
    }

    async fn teardown(&mut self) {
        self.probe.on_teardown();
    }
}

/// Two inputs, emits the first after checking both carry the same elements.
#[derive(Debug, Clone, Default)]
pub(crate) struct Zip;

#[async_trait]
impl Task for Zip {
    fn type_name(&self) -> &'static str {
        "zip"
    }

    fn arity(&self) -> Arity {
        Arity::transform(2, 1)
    }

    async fn process(&mut self, inputs: Vec<Buffer>, _ctx: &TaskContext<'_>) -> Result<Outcome, ProcessingError> {
        let [left, right]: [Buffer; 2] = inputs
            .try_into()
            .map_err(|v: Vec<Buffer>| ProcessingError::InputArity { expected: 2, found: v.len() })?;
        if left.shape().num_elements() != right.shape().num_elements() {
            return Err(ProcessingError::LengthMismatch {
                expected: left.shape().num_elements(),
                found: right.shape().num_elements(),
            });
        }
        if left != right {
            return Err(ProcessingError::Failed("inputs are out of step".into()));
        }
        Ok(Outcome::Emit(Outputs::one(left)))
    }
}

#[derive(Debug, Clone, Copy)]
enum FailureMode {
    Process { after: usize },
    Setup,
    Panic,
}

/// Transform that fails on purpose.
#[derive(Debug, Clone)]
pub(crate) struct Failing {
    mode: FailureMode,
    calls: usize,
    linger: Duration,
    probe: Probe,
}

impl Failing {
    /// Forwards `after` tuples, then fails.
    pub(crate) fn after(after: usize) -> Self {
        Self::with_mode(FailureMode::Process { after })
    }

    pub(crate) fn at_setup() -> Self {
        Self::with_mode(FailureMode::Setup)
    }

    pub(crate) fn panicking() -> Self {
        Self::with_mode(FailureMode::Panic)
    }

    pub(crate) fn with_probe(mut self, probe: Probe) -> Self {
        self.probe = probe;
        self
    }

    /// Makes `teardown` take `linger` before returning.
    pub(crate) fn with_slow_teardown(mut self, linger: Duration) -> Self {
        self.linger = linger;
        self
    }

    fn with_mode(mode: FailureMode) -> Self {
        Self {
            mode,
            calls: 0,
            linger: Duration::ZERO,
            probe: Probe::default(),
        }
    }
}

#[async_trait]
impl Task for Failing {
    fn type_name(&self) -> &'static str {
        "failing"
    }

    fn arity(&self) -> Arity {
        Arity::transform(1, 1)
    }

    async fn setup(&mut self, _config: &TaskConfig, ctx: &TaskContext<'_>) -> Result<(), ConfigurationError> {
        if let FailureMode::Setup = self.mode {
            return Err(ConfigurationError::Setup {
                task: ctx.task.to_string(),
                reason: "refusing to start".into(),
            });
        }
        self.probe.on_setup();
        Ok(())
    }

    async fn process(&mut self, mut inputs: Vec<Buffer>, ctx: &TaskContext<'_>) -> Result<Outcome, ProcessingError> {
        self.probe.on_process(ctx);
        self.calls += 1;
        match self.mode {
            FailureMode::Process { after } if self.calls > after => {
                Err(ProcessingError::Failed(format!("gave up after {after} buffers")))
            }
            FailureMode::Panic => panic!("task exploded"),
            _ => {
                let buffer = inputs.pop().ok_or(ProcessingError::InputArity { expected: 1, found: 0 })?;
                Ok(Outcome::Emit(Outputs::one(buffer)))
            }
        }
    }

    async fn teardown(&mut self) {
        if !self.linger.is_zero() {
            tokio::time::sleep(self.linger).await;
        }
        self.probe.on_teardown();
    }
}

/// Multiplies f32 data by a factor, keeping a per-shape "plan" that is
/// rebuilt whenever the input shape changes.
#[derive(Debug, Clone)]
pub(crate) struct Planned {
    factor: f32,
    plan: Option<Shape>,
    rebuilds: Arc<AtomicUsize>,
}

impl Planned {
    pub(crate) fn new(factor: f32) -> Self {
        Self {
            factor,
            plan: None,
            rebuilds: Arc::default(),
        }
    }

    pub(crate) fn rebuilds(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.rebuilds)
    }
}

#[async_trait]
impl Task for Planned {
    fn type_name(&self) -> &'static str {
        "planned"
    }

    fn arity(&self) -> Arity {
        Arity::transform(1, 1)
    }

    async fn process(&mut self, inputs: Vec<Buffer>, ctx: &TaskContext<'_>) -> Result<Outcome, ProcessingError> {
        let input = &inputs[0];
        if self.plan.as_ref() != Some(input.shape()) {
            self.plan = Some(input.shape().clone());
            self.rebuilds.fetch_add(1, Ordering::SeqCst);
        }
        let values = input
            .as_slice::<f32>()
            .ok_or_else(|| ProcessingError::UnsupportedType(input.dtype().to_string()))?;
        let mut output = ctx.pool.acquire(DType::F32, input.shape())?;
        if let Some(out) = output.as_mut_slice::<f32>() {
            for (o, v) in out.iter_mut().zip(values) {
                *o = v * self.factor;
            }
        }
        Ok(Outcome::Emit(Outputs::one(output.freeze())))
    }
}
