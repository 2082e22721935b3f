// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Execution context for a task placed on a remote node.
//!
//! Setup opens a session and submits the task. While running, a writer task
//! streams input tuples to the daemon and the context itself reads the
//! daemon's output and forwards it downstream, so both directions progress
//! independently.

use std::time::Instant;

use futures::stream::{SplitSink, SplitStream};
use futures::StreamExt;
use prost::bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::arch::{NodeLocation, RetryPolicy};
use crate::buffer::BufferPool;
use crate::config::TaskConfig;
use crate::engine::context::{ContextId, ContextSummary, RunControl, Stop};
use crate::engine::edge::{OutputSet, SharedInputs};
use crate::errors::{ConnectionError, ExecutionError, ProcessingError, ProtocolError};
use crate::graph::EdgeId;
use crate::observability::messages::StructuredLog;
use crate::proto::remote_v1::{Close, EndOfInput, Submit};
use crate::proto::Body;
use crate::remote::client::Session;
use crate::remote::codec::{self, Transport};
use crate::traits::{Arity, Outputs, Task};

pub(crate) struct RemoteContext {
    id: ContextId,
    task_type: &'static str,
    arity: Arity,
    config: TaskConfig,
    inputs: SharedInputs,
    input_edges: Vec<EdgeId>,
    outputs: OutputSet,
    pool: BufferPool,
    retry: RetryPolicy,
    transport: Option<Transport>,
    processed: u64,
}

impl RemoteContext {
    pub(crate) fn new(
        id: ContextId,
        template: &dyn Task,
        config: TaskConfig,
        inputs: SharedInputs,
        input_edges: Vec<EdgeId>,
        outputs: OutputSet,
        pool: BufferPool,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            id,
            task_type: template.type_name(),
            arity: template.arity(),
            config,
            inputs,
            input_edges,
            outputs,
            pool,
            retry,
            transport: None,
            processed: 0,
        }
    }

    pub(crate) fn id(&self) -> &ContextId {
        &self.id
    }

    fn address(&self) -> &str {
        match &self.id.node.location {
            NodeLocation::Remote { address, .. } => address,
            NodeLocation::Local { .. } => "",
        }
    }

    /// Opens a session and has the daemon instantiate and set up the task.
    pub(crate) async fn setup(&mut self) -> Result<(), ExecutionError> {
        let NodeLocation::Remote { address, index } = &self.id.node.location else {
            return Err(ExecutionError::Internal {
                message: format!("{} is not a remote node", self.id.node.id),
            });
        };
        let session = Session::open(address, self.retry).await?;
        let (accepted, transport) = session
            .submit(Submit {
                task_type: self.task_type.to_string(),
                task_name: self.id.task.clone(),
                options: codec::options_to_wire(&self.config),
                node_index: *index,
                replica: self.id.replica as u32,
                replicas: self.id.replicas as u32,
            })
            .await?;

        let remote = Arity::transform(accepted.inputs as usize, accepted.outputs as usize);
        if remote != self.arity {
            return Err(ExecutionError::Binding {
                task: self.id.task.clone(),
                reason: format!(
                    "remote '{}' has {}/{} ports, local template has {}/{}",
                    self.task_type, remote.inputs, remote.outputs, self.arity.inputs, self.arity.outputs
                ),
            });
        }
        self.transport = Some(transport);
        Ok(())
    }

    /// Tells the daemon to tear its instance down without running it.
    pub(crate) async fn teardown(mut self) {
        if let Some(mut transport) = self.transport.take() {
            if let Err(error) = codec::send(&mut transport, Body::Close(Close {})).await {
                tracing::debug!(task = %self.id.task, %error, "remote teardown not delivered");
            }
        }
    }

    pub(crate) async fn run(mut self, control: &RunControl) -> ContextSummary {
        let span = self.id.started().span("context");
        async move {
            self.id.started().log();
            let started = Instant::now();

            let result = match self.transport.take() {
                Some(transport) => self.stream(transport, control.token()).await,
                None => Err(Stop::Failed(ExecutionError::Internal {
                    message: format!("remote context '{}' was never set up", self.id.task),
                })),
            };

            let summary = self.id.conclude(result, control, self.processed, started);
            self.outputs.close();
            summary
        }
        .instrument(span)
        .await
    }

    async fn stream(&mut self, transport: Transport, cancel: &CancellationToken) -> Result<(), Stop> {
        let (sink, mut stream) = transport.split();
        let writer = tokio::spawn(feed(self.inputs.clone(), self.input_edges.clone(), sink));
        let result = self.receive(&mut stream, cancel).await;
        writer.abort();
        result
    }

    async fn receive(&mut self, stream: &mut SplitStream<Transport>, cancel: &CancellationToken) -> Result<(), Stop> {
        loop {
            let body = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Stop::Cancelled),
                body = codec::recv(stream) => body,
            };
            let body = body.map_err(|e| self.protocol_failure(e))?;

            match body {
                Some(Body::Data(data)) => {
                    let (port, _edge, buffer) = codec::decode_buffer(data, &self.pool).map_err(|e| self.protocol_failure(e))?;
                    let mut outputs = Outputs::new();
                    outputs.push(port, buffer);
                    let sent = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(Stop::Cancelled),
                        sent = self.outputs.send(outputs) => sent,
                    };
                    sent.map_err(|source| self.task_failure(source))?;
                    if self.outputs.is_exhausted() {
                        return Ok(());
                    }
                }
                Some(Body::Finished(finished)) => {
                    self.processed = finished.processed;
                    return Ok(());
                }
                Some(Body::Failure(failure)) => {
                    return Err(Stop::Failed(ExecutionError::RemoteFailed {
                        task: self.id.task.clone(),
                        replica: self.id.replica,
                        message: failure.message,
                    }))
                }
                Some(other) => return Err(self.protocol_failure(codec::unexpected("Data", &other))),
                None => {
                    return Err(Stop::Failed(ExecutionError::Connection(ConnectionError::Lost {
                        address: self.address().to_string(),
                        reason: "daemon closed the stream before finishing".into(),
                    })))
                }
            }
        }
    }

    fn task_failure(&self, source: ProcessingError) -> Stop {
        Stop::Failed(ExecutionError::TaskFailed {
            task: self.id.task.clone(),
            replica: self.id.replica,
            source,
        })
    }

    fn protocol_failure(&self, error: ProtocolError) -> Stop {
        self.task_failure(ProcessingError::Protocol(error))
    }
}

/// Streams input tuples to the daemon until the inputs are exhausted. Each
/// buffer is tagged with the graph edge it arrived on.
async fn feed(
    inputs: SharedInputs,
    edges: Vec<EdgeId>,
    mut sink: SplitSink<Transport, Bytes>,
) -> Result<(), ProtocolError> {
    loop {
        let next = inputs.lock().await.next().await;
        let Some(tuple) = next else {
            return codec::send(&mut sink, Body::EndOfInput(EndOfInput {})).await;
        };
        for (port, (buffer, edge)) in tuple.iter().zip(&edges).enumerate() {
            codec::send(&mut sink, Body::Data(codec::encode_buffer(port, *edge, buffer))).await?;
        }
    }
}
