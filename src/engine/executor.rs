// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Turns a bound graph into running contexts.
//!
//! [`launch`] is shared by every scheduler: the scheduler decides placement,
//! this module wires the channels, instantiates one task per placement, runs
//! every `setup` and spawns the contexts. The returned [`RunHandle`] is the
//! only way to observe the run afterwards.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::arch::ArchGraph;
use crate::buffer::{Buffer, BufferPool};
use crate::engine::context::{panic_message, ContextId, ContextState, ContextSummary, LocalContext, RunControl};
use crate::engine::edge::{EdgeSender, InputSet, OutputSet};
use crate::engine::{Binding, SchedulerOptions};
use crate::errors::{ExecutionError, ProcessingError};
use crate::graph::{EdgeId, TaskGraph, TaskId};
use crate::observability::messages::engine::{RunAborted, RunCompleted, RunStarted};
use crate::observability::messages::StructuredLog;
use crate::remote::proxy::RemoteContext;

enum Context {
    Local(LocalContext),
    Remote(RemoteContext),
}

impl Context {
    fn id(&self) -> &ContextId {
        match self {
            Context::Local(context) => context.id(),
            Context::Remote(context) => context.id(),
        }
    }

    async fn setup(&mut self) -> Result<(), ExecutionError> {
        match self {
            Context::Local(context) => Ok(context.setup().await?),
            Context::Remote(context) => context.setup().await,
        }
    }

    async fn teardown(self) {
        match self {
            Context::Local(context) => context.teardown().await,
            Context::Remote(context) => context.teardown().await,
        }
    }

    async fn run(self, control: &RunControl) -> ContextSummary {
        match self {
            Context::Local(context) => context.run(control).await,
            Context::Remote(context) => context.run(control).await,
        }
    }
}

/// Instantiates, sets up and spawns every context of `graph` as placed by `binding`.
///
/// When any `setup` fails the contexts already set up are torn down and the
/// error is returned; nothing has been spawned at that point.
pub(crate) async fn launch(
    graph: TaskGraph,
    arch: &ArchGraph,
    binding: Binding,
    options: &SchedulerOptions,
    pool: &BufferPool,
    scheduler: &'static str,
) -> Result<RunHandle, ExecutionError> {
    let capacity = options.queue_capacity.max(1);
    let task_count = graph.len();
    let (nodes, edges) = graph.into_parts();

    let mut receivers: Vec<Vec<Option<(EdgeId, mpsc::Receiver<Buffer>)>>> = nodes
        .iter()
        .map(|node| (0..node.arity().inputs).map(|_| None).collect())
        .collect();
    let mut senders: Vec<Vec<Vec<EdgeSender>>> = nodes
        .iter()
        .map(|node| vec![Vec::new(); node.arity().outputs])
        .collect();
    for edge in &edges {
        let (tx, rx) = mpsc::channel(capacity);
        receivers[edge.to.task.index()][edge.to.index] = Some((edge.id, rx));
        senders[edge.from.task.index()][edge.from.index].push(EdgeSender::new(edge.id, tx));
    }

    let mut contexts = Vec::with_capacity(binding.context_count());
    for (index, ((node, ports_in), ports_out)) in nodes.into_iter().zip(receivers).zip(senders).enumerate() {
        let placement = binding.nodes_for(TaskId(index));
        let (name, template, config) = node.into_parts();
        let ports = ports_in
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| ExecutionError::Internal {
                message: format!("task '{name}' has an unconnected input port"),
            })?;
        let (input_edges, ports): (Vec<EdgeId>, Vec<_>) = ports.into_iter().unzip();
        let inputs = InputSet::new(ports).shared();

        for (replica, node_id) in placement.iter().enumerate() {
            let device = arch.node(*node_id).cloned().ok_or_else(|| ExecutionError::Binding {
                task: name.clone(),
                reason: format!("{node_id} is not part of the architecture"),
            })?;
            let id = ContextId {
                task: name.clone(),
                replica,
                replicas: placement.len(),
                node: device,
            };
            let outputs = OutputSet::new(ports_out.clone());
            let context = if id.node.is_remote() {
                Context::Remote(RemoteContext::new(
                    id,
                    template.as_ref(),
                    config.clone(),
                    inputs.clone(),
                    input_edges.clone(),
                    outputs,
                    pool.clone(),
                    arch.retry_policy(),
                ))
            } else {
                Context::Local(LocalContext::new(
                    id,
                    template.clone_box(),
                    config.clone(),
                    inputs.clone(),
                    outputs,
                    pool.clone(),
                ))
            };
            contexts.push(context);
        }
    }

    for index in 0..contexts.len() {
        if let Err(error) = contexts[index].setup().await {
            contexts.truncate(index);
            for context in contexts {
                context.teardown().await;
            }
            return Err(error);
        }
    }

    RunStarted {
        scheduler,
        task_count,
        context_count: contexts.len(),
        queue_capacity: capacity,
    }
    .log();

    let control = Arc::new(RunControl::new(CancellationToken::new()));
    let handles = contexts
        .into_iter()
        .map(|context| tokio::spawn(supervise(context, Arc::clone(&control))))
        .collect();

    Ok(RunHandle {
        control,
        handles,
        started: Instant::now(),
        scheduler,
    })
}

/// Runs one context. Task panics are caught inside the context; this only
/// catches what escapes it, such as a panicking `teardown`.
async fn supervise(context: Context, control: Arc<RunControl>) -> ContextSummary {
    let id = context.id().clone();
    let started = Instant::now();
    match AssertUnwindSafe(context.run(&control)).catch_unwind().await {
        Ok(summary) => summary,
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            control.fail(ExecutionError::TaskFailed {
                task: id.task.clone(),
                replica: id.replica,
                source: ProcessingError::Failed(format!("panicked: {message}")),
            });
            ContextSummary {
                task: id.task,
                replica: id.replica,
                node: id.node.id,
                state: ContextState::Failed,
                processed: 0,
                duration: started.elapsed(),
            }
        }
    }
}

/// A started run.
///
/// Dropping the handle does not stop the run; call [`RunHandle::cancel`] for that.
#[derive(Debug)]
pub struct RunHandle {
    control: Arc<RunControl>,
    handles: Vec<JoinHandle<ContextSummary>>,
    started: Instant,
    scheduler: &'static str,
}

impl RunHandle {
    /// Aborts the run from outside. `join` then reports [`ExecutionError::Cancelled`]
    /// unless a context had already failed.
    pub fn cancel(&self) {
        self.control.cancel();
    }

    pub fn context_count(&self) -> usize {
        self.handles.len()
    }

    /// Waits for every context.
    ///
    /// Returns the first recorded error of the run, `Cancelled` if the run was
    /// aborted from outside, and the run report otherwise.
    pub async fn join(self) -> Result<RunReport, ExecutionError> {
        let mut contexts = Vec::with_capacity(self.handles.len());
        for handle in self.handles {
            match handle.await {
                Ok(summary) => contexts.push(summary),
                Err(error) => self.control.fail(ExecutionError::Internal {
                    message: format!("context task did not complete: {error}"),
                }),
            }
        }
        let duration = self.started.elapsed();

        if let Some(error) = self.control.take_error() {
            RunAborted {
                scheduler: self.scheduler,
                error: &error,
            }
            .log();
            return Err(error);
        }
        if contexts.iter().any(|c| c.state == ContextState::Aborted) {
            let error = ExecutionError::Cancelled;
            RunAborted {
                scheduler: self.scheduler,
                error: &error,
            }
            .log();
            return Err(error);
        }

        RunCompleted {
            scheduler: self.scheduler,
            context_count: contexts.len(),
            duration,
        }
        .log();
        Ok(RunReport {
            scheduler: self.scheduler,
            duration,
            contexts,
        })
    }
}

/// Outcome of a run that drained completely.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub scheduler: &'static str,
    pub duration: Duration,
    pub contexts: Vec<ContextSummary>,
}

impl RunReport {
    /// `process` calls completed by all replicas of `task`.
    pub fn processed(&self, task: &str) -> u64 {
        self.contexts
            .iter()
            .filter(|c| c.task == task)
            .map(|c| c.processed)
            .sum()
    }

    pub fn replicas(&self, task: &str) -> usize {
        self.contexts.iter().filter(|c| c.task == task).count()
    }
}
