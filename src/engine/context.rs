// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Execution contexts: one running instance of a task on one node.
//!
//! A context moves through `Idle -> Running -> {Finished | Failed | Aborted}`.
//! While running it repeatedly:
//! 1. checks the run's cancellation token
//! 2. takes one buffer from every input port
//! 3. calls `process`
//! 4. pushes the emitted buffers to every edge of their port
//!
//! Steps 2 and 4 are the suspension points; both also wake on cancellation.
//! Whatever happens, a task whose `setup` succeeded gets exactly one
//! `teardown`.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::arch::{DeviceNode, NodeId};
use crate::buffer::{Buffer, BufferPool};
use crate::config::TaskConfig;
use crate::engine::edge::{OutputSet, SharedInputs};
use crate::errors::{ConfigurationError, ExecutionError, ProcessingError};
use crate::observability::messages::task::{
    ContextAborted, ContextFailed, ContextFinished, ContextStarted, TaskSetupFailed,
};
use crate::observability::messages::StructuredLog;
use crate::traits::{Outcome, Outputs, Task, TaskContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Idle,
    Running,
    Finished,
    Failed,
    Aborted,
}

/// What one context did during a run.
#[derive(Debug, Clone)]
pub struct ContextSummary {
    pub task: String,
    pub replica: usize,
    pub node: NodeId,
    pub state: ContextState,
    /// Number of completed `process` calls.
    pub processed: u64,
    pub duration: Duration,
}

/// State shared by every context of one run: the cancellation token and the
/// error that triggered it.
#[derive(Debug, Default)]
pub(crate) struct RunControl {
    cancel: CancellationToken,
    first_error: Mutex<Option<ExecutionError>>,
}

impl RunControl {
    pub(crate) fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            first_error: Mutex::new(None),
        }
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Records `error` unless an earlier one is already recorded, then aborts the run.
    pub(crate) fn fail(&self, error: ExecutionError) {
        {
            let mut slot = self.first_error.lock().unwrap_or_else(PoisonError::into_inner);
            if slot.is_none() {
                *slot = Some(error);
            }
        }
        self.cancel.cancel();
    }

    pub(crate) fn take_error(&self) -> Option<ExecutionError> {
        self.first_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

/// Why a context left its running loop early.
#[derive(Debug)]
pub(crate) enum Stop {
    Cancelled,
    Failed(ExecutionError),
}

/// Whether downstream still wants data after a send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Closed,
}

/// Identity of a context for logs and summaries.
#[derive(Debug, Clone)]
pub(crate) struct ContextId {
    pub task: String,
    pub replica: usize,
    pub replicas: usize,
    pub node: DeviceNode,
}

impl ContextId {
    pub(crate) fn started(&self) -> ContextStarted<'_> {
        ContextStarted {
            task: &self.task,
            replica: self.replica,
            node: &self.node.label,
        }
    }

    /// Maps the loop result to a terminal state, logging it and recording
    /// failures on the run.
    pub(crate) fn conclude(
        &self,
        result: Result<(), Stop>,
        control: &RunControl,
        processed: u64,
        started: Instant,
    ) -> ContextSummary {
        let duration = started.elapsed();
        let state = match result {
            Ok(()) => {
                ContextFinished {
                    task: &self.task,
                    replica: self.replica,
                    processed,
                    duration,
                }
                .log();
                ContextState::Finished
            }
            Err(Stop::Cancelled) => {
                ContextAborted {
                    task: &self.task,
                    replica: self.replica,
                }
                .log();
                ContextState::Aborted
            }
            Err(Stop::Failed(error)) => {
                ContextFailed {
                    task: &self.task,
                    replica: self.replica,
                    error: &error,
                }
                .log();
                control.fail(error);
                ContextState::Failed
            }
        };
        ContextSummary {
            task: self.task.clone(),
            replica: self.replica,
            node: self.node.id,
            state,
            processed,
            duration,
        }
    }
}

/// Runs a task in-process.
pub(crate) struct LocalContext {
    id: ContextId,
    task: Box<dyn Task>,
    config: TaskConfig,
    inputs: SharedInputs,
    outputs: OutputSet,
    pool: BufferPool,
    set_up: bool,
    processed: u64,
}

impl LocalContext {
    pub(crate) fn new(
        id: ContextId,
        task: Box<dyn Task>,
        config: TaskConfig,
        inputs: SharedInputs,
        outputs: OutputSet,
        pool: BufferPool,
    ) -> Self {
        Self {
            id,
            task,
            config,
            inputs,
            outputs,
            pool,
            set_up: false,
            processed: 0,
        }
    }

    pub(crate) fn id(&self) -> &ContextId {
        &self.id
    }

    pub(crate) async fn setup(&mut self) -> Result<(), ConfigurationError> {
        let ctx = TaskContext {
            task: &self.id.task,
            node: &self.id.node,
            pool: &self.pool,
            replica: self.id.replica,
            replicas: self.id.replicas,
        };
        match self.task.setup(&self.config, &ctx).await {
            Ok(()) => {
                self.set_up = true;
                Ok(())
            }
            Err(error) => {
                TaskSetupFailed {
                    task: &self.id.task,
                    error: &error,
                }
                .log();
                Err(error)
            }
        }
    }

    /// Undoes a successful `setup` for a context that will never run.
    pub(crate) async fn teardown(mut self) {
        if self.set_up {
            self.task.teardown().await;
        }
    }

    pub(crate) async fn run(mut self, control: &RunControl) -> ContextSummary {
        let span = self.id.started().span("context");
        async move {
            self.id.started().log();
            let started = Instant::now();

            let result = self.drive(control.token()).await;

            // a failure cancels the run before downstream can see end of stream
            let summary = self.id.conclude(result, control, self.processed, started);
            self.outputs.close();
            if self.set_up {
                self.task.teardown().await;
            }
            summary
        }
        .instrument(span)
        .await
    }

    async fn drive(&mut self, cancel: &CancellationToken) -> Result<(), Stop> {
        loop {
            if cancel.is_cancelled() {
                return Err(Stop::Cancelled);
            }
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Stop::Cancelled),
                next = pull(&self.inputs) => next,
            };
            let Some(inputs) = next else {
                break;
            };
            if cancel.is_cancelled() {
                return Err(Stop::Cancelled);
            }

            let ctx = TaskContext {
                task: &self.id.task,
                node: &self.id.node,
                pool: &self.pool,
                replica: self.id.replica,
                replicas: self.id.replicas,
            };
            let outcome = guarded(self.task.process(inputs, &ctx)).await.map_err(|source| {
                Stop::Failed(ExecutionError::TaskFailed {
                    task: self.id.task.clone(),
                    replica: self.id.replica,
                    source,
                })
            })?;
            self.processed += 1;

            match outcome {
                Outcome::Emit(outputs) => {
                    if self.emit(outputs, cancel).await? == Flow::Closed {
                        return Ok(());
                    }
                }
                Outcome::Finished => return Ok(()),
            }
        }

        // inputs exhausted; an upstream failure closes them too
        if cancel.is_cancelled() {
            return Err(Stop::Cancelled);
        }
        let ctx = TaskContext {
            task: &self.id.task,
            node: &self.id.node,
            pool: &self.pool,
            replica: self.id.replica,
            replicas: self.id.replicas,
        };
        let rest = guarded(self.task.flush(&ctx)).await.map_err(|source| {
            Stop::Failed(ExecutionError::TaskFailed {
                task: self.id.task.clone(),
                replica: self.id.replica,
                source,
            })
        })?;
        if !rest.is_empty() {
            self.emit(rest, cancel).await?;
        }
        Ok(())
    }

    async fn emit(&mut self, outputs: Outputs, cancel: &CancellationToken) -> Result<Flow, Stop> {
        if outputs.is_empty() {
            return Ok(Flow::Continue);
        }
        let sent = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Stop::Cancelled),
            sent = self.outputs.send(outputs) => sent,
        };
        sent.map_err(|source| {
            Stop::Failed(ExecutionError::TaskFailed {
                task: self.id.task.clone(),
                replica: self.id.replica,
                source,
            })
        })?;
        if self.outputs.is_exhausted() {
            Ok(Flow::Closed)
        } else {
            Ok(Flow::Continue)
        }
    }
}

async fn pull(inputs: &SharedInputs) -> Option<Vec<Buffer>> {
    inputs.lock().await.next().await
}

/// Runs a task callback, reporting a panic as a processing error so the
/// context keeps ownership of the task and can still tear it down.
async fn guarded<T>(call: impl Future<Output = Result<T, ProcessingError>>) -> Result<T, ProcessingError> {
    match AssertUnwindSafe(call).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(ProcessingError::Failed(format!("panicked: {}", panic_message(panic.as_ref())))),
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
