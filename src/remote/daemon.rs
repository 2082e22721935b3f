// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Worker process side of remote execution.
//!
//! A [`Daemon`] exports the local nodes of its host. Each TCP connection is one
//! session: handshake, then either a plain `Close` (a client listing nodes) or
//! a single task submission that runs until the task ends or the client goes
//! away. Tasks run through the same context runner as local ones.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::SplitStream;
use futures::StreamExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::arch::{ArchConfig, ArchGraph, DeviceNode, NodeId};
use crate::buffer::{Buffer, BufferPool};
use crate::config::consts::{DEFAULT_DAEMON_ADDRESS, DEFAULT_GRACE_PERIOD, DEFAULT_QUEUE_CAPACITY, PROTOCOL_VERSION};
use crate::config::{validate_options, TaskRegistry};
use crate::engine::context::{ContextId, ContextState, LocalContext, RunControl};
use crate::engine::edge::{EdgeSender, InputSet, OutputSet};
use crate::errors::{ConnectionError, ProtocolError};
use crate::graph::EdgeId;
use crate::observability::messages::remote::{
    DaemonListening, DaemonStopped, SessionClosed, SessionOpened, TaskSubmitted,
};
use crate::observability::messages::StructuredLog;
use crate::proto::remote_v1::{
    Accepted, Failure, FailureKind, Finished, NodeInfo, Reject, RejectReason, Submit, Welcome,
};
use crate::proto::Body;
use crate::remote::codec::{self, Transport};

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// `host:port` to listen on; port 0 picks a free port.
    pub listen: String,
    /// GPU nodes to export; probed from the host when unset.
    pub gpus: Option<usize>,
    /// How long `stop` waits for running sessions before aborting them.
    pub grace_period: Duration,
    pub queue_capacity: usize,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            listen: DEFAULT_DAEMON_ADDRESS.to_string(),
            gpus: None,
            grace_period: DEFAULT_GRACE_PERIOD,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Everything a session needs, shared by all of them.
struct Shared {
    registry: Arc<TaskRegistry>,
    arch: ArchGraph,
    pool: BufferPool,
    queue_capacity: usize,
}

struct Running {
    address: SocketAddr,
    stop_accepting: CancellationToken,
    abort_sessions: CancellationToken,
    acceptor: JoinHandle<JoinSet<()>>,
}

pub struct Daemon {
    config: DaemonConfig,
    shared: Arc<Shared>,
    running: Option<Running>,
}

impl Daemon {
    pub fn new(config: DaemonConfig, registry: Arc<TaskRegistry>) -> Self {
        let arch = ArchGraph::local(&ArchConfig {
            gpus: config.gpus,
            ..ArchConfig::default()
        });
        let shared = Arc::new(Shared {
            registry,
            arch,
            pool: BufferPool::new(),
            queue_capacity: config.queue_capacity.max(1),
        });
        Self {
            config,
            shared,
            running: None,
        }
    }

    /// Nodes this daemon exports, in the index order clients address them by.
    pub fn nodes(&self) -> &[DeviceNode] {
        self.shared.arch.nodes()
    }

    /// Address the listener is bound to, while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|r| r.address)
    }

    /// Binds the listener and starts accepting sessions in the background.
    pub async fn start(&mut self) -> Result<SocketAddr, ConnectionError> {
        if let Some(running) = &self.running {
            return Ok(running.address);
        }
        let listen_error = |source| ConnectionError::Listen {
            address: self.config.listen.clone(),
            source,
        };
        let listener = TcpListener::bind(&self.config.listen).await.map_err(listen_error)?;
        let address = listener.local_addr().map_err(listen_error)?;

        let stop_accepting = CancellationToken::new();
        let abort_sessions = CancellationToken::new();
        let acceptor = tokio::spawn(accept(
            listener,
            Arc::clone(&self.shared),
            stop_accepting.clone(),
            abort_sessions.clone(),
        ));

        DaemonListening {
            address: &address.to_string(),
            node_count: self.shared.arch.nodes().len(),
        }
        .log();
        self.running = Some(Running {
            address,
            stop_accepting,
            abort_sessions,
            acceptor,
        });
        Ok(address)
    }

    /// Stops accepting, gives running sessions the grace period to finish,
    /// then aborts the rest. The port is free once this returns.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        running.stop_accepting.cancel();
        let mut sessions = match running.acceptor.await {
            Ok(sessions) => sessions,
            Err(error) => {
                tracing::warn!(%error, "daemon acceptor did not shut down cleanly");
                JoinSet::new()
            }
        };

        let drained = tokio::time::timeout(self.config.grace_period, drain(&mut sessions)).await;
        let aborted = drained.is_err();
        if aborted {
            running.abort_sessions.cancel();
            // sessions observe the token, tear their task down and exit
            if tokio::time::timeout(self.config.grace_period, drain(&mut sessions)).await.is_err() {
                sessions.abort_all();
                drain(&mut sessions).await;
            }
        }

        DaemonStopped {
            address: &running.address.to_string(),
            aborted,
        }
        .log();
    }
}

impl Drop for Daemon {
    fn drop(&mut self) {
        if let Some(running) = &self.running {
            running.stop_accepting.cancel();
            running.abort_sessions.cancel();
        }
    }
}

async fn drain(sessions: &mut JoinSet<()>) {
    while sessions.join_next().await.is_some() {}
}

/// Accept loop; returns the live sessions once told to stop. The listener is
/// dropped on return.
async fn accept(
    listener: TcpListener,
    shared: Arc<Shared>,
    stop: CancellationToken,
    abort: CancellationToken,
) -> JoinSet<()> {
    let mut sessions = JoinSet::new();
    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let _ = stream.set_nodelay(true);
                    sessions.spawn(session(stream, peer, Arc::clone(&shared), abort.child_token()));
                }
                Err(error) => tracing::warn!(%error, "accept failed"),
            },
            // reap finished sessions so the set does not grow without bound
            Some(_) = sessions.join_next(), if !sessions.is_empty() => {}
        }
    }
    sessions
}

async fn session(stream: TcpStream, peer: SocketAddr, shared: Arc<Shared>, abort: CancellationToken) {
    let peer = peer.to_string();
    SessionOpened { peer: &peer }.log();
    let reason = match serve(codec::framed(stream), &peer, &shared, abort).await {
        Ok(reason) => reason,
        Err(error) => format!("protocol error: {error}"),
    };
    SessionClosed {
        peer: &peer,
        reason: &reason,
    }
    .log();
}

async fn reject(transport: &mut Transport, reason: RejectReason, message: String) -> Result<String, ProtocolError> {
    let summary = format!("rejected: {message}");
    codec::send(
        transport,
        Body::Reject(Reject {
            reason: reason as i32,
            message,
        }),
    )
    .await?;
    Ok(summary)
}

/// Drives one session; returns a short description of how it ended.
async fn serve(
    mut transport: Transport,
    peer: &str,
    shared: &Shared,
    abort: CancellationToken,
) -> Result<String, ProtocolError> {
    match codec::recv(&mut transport).await? {
        Some(Body::Hello(hello)) if hello.protocol_version == PROTOCOL_VERSION => {}
        Some(Body::Hello(hello)) => {
            let message = format!(
                "protocol version {} is not supported (daemon speaks {PROTOCOL_VERSION})",
                hello.protocol_version
            );
            return reject(&mut transport, RejectReason::VersionMismatch, message).await;
        }
        Some(other) => {
            let message = format!("expected Hello, got {}", codec::body_name(&other));
            return reject(&mut transport, RejectReason::Unexpected, message).await;
        }
        None => return Ok("closed before handshake".into()),
    }

    let nodes = shared
        .arch
        .nodes()
        .iter()
        .map(|node| NodeInfo {
            kind: codec::kind_code(node.kind) as i32,
            label: node.label.clone(),
        })
        .collect();
    codec::send(
        &mut transport,
        Body::Welcome(Welcome {
            protocol_version: PROTOCOL_VERSION,
            nodes,
        }),
    )
    .await?;

    match codec::recv(&mut transport).await? {
        Some(Body::Submit(submit)) => run_submission(transport, peer, shared, submit, abort).await,
        Some(Body::Close(_)) | None => Ok("node listing".into()),
        Some(other) => {
            let message = format!("expected Submit or Close, got {}", codec::body_name(&other));
            reject(&mut transport, RejectReason::Unexpected, message).await
        }
    }
}

async fn run_submission(
    mut transport: Transport,
    peer: &str,
    shared: &Shared,
    submit: Submit,
    abort: CancellationToken,
) -> Result<String, ProtocolError> {
    TaskSubmitted {
        peer,
        task: &submit.task_name,
        task_type: &submit.task_type,
        node_index: submit.node_index,
    }
    .log();

    let Some(node) = shared.arch.node(NodeId(submit.node_index as usize)).cloned() else {
        let message = format!("node index {} out of range", submit.node_index);
        return reject(&mut transport, RejectReason::InvalidNode, message).await;
    };
    let task = match shared.registry.create(&submit.task_type) {
        Ok(task) => task,
        Err(error) => return reject(&mut transport, RejectReason::UnknownTaskType, error.to_string()).await,
    };
    let config = codec::options_from_wire(submit.options)?;
    if let Err(error) = validate_options(&submit.task_name, task.schema(), &config) {
        return reject(&mut transport, RejectReason::InvalidConfig, error.to_string()).await;
    }

    let arity = task.arity();
    let capacity = shared.queue_capacity;
    let (input_senders, input_receivers): (Vec<_>, Vec<_>) =
        (0..arity.inputs).map(|_| mpsc::channel::<Buffer>(capacity)).unzip();
    let (output_senders, output_receivers): (Vec<_>, Vec<_>) =
        (0..arity.outputs).map(|_| mpsc::channel::<Buffer>(capacity)).unzip();
    // the session's own output edges, one per port
    let output_edges: Vec<EdgeId> = (0..arity.outputs).map(EdgeId).collect();
    let outputs = output_senders
        .into_iter()
        .zip(&output_edges)
        .map(|(tx, &edge)| vec![EdgeSender::new(edge, tx)])
        .collect();

    let replica = submit.replica as usize;
    let mut context = LocalContext::new(
        ContextId {
            task: submit.task_name.clone(),
            replica,
            replicas: (submit.replicas as usize).max(replica + 1),
            node,
        },
        task,
        config,
        InputSet::new(input_receivers).shared(),
        OutputSet::new(outputs),
        shared.pool.clone(),
    );
    if let Err(error) = context.setup().await {
        return reject(&mut transport, RejectReason::InvalidConfig, error.to_string()).await;
    }
    codec::send(
        &mut transport,
        Body::Accepted(Accepted {
            inputs: arity.inputs as u32,
            outputs: arity.outputs as u32,
        }),
    )
    .await?;

    let control = Arc::new(RunControl::new(abort));
    let (mut sink, stream) = transport.split();
    let reader = tokio::spawn(read_inputs(stream, input_senders, shared.pool.clone(), Arc::clone(&control)));
    let (merged_tx, mut merged_rx) = mpsc::channel::<(usize, Buffer)>(capacity);
    for (port, mut rx) in output_receivers.into_iter().enumerate() {
        let merged_tx = merged_tx.clone();
        tokio::spawn(async move {
            while let Some(buffer) = rx.recv().await {
                if merged_tx.send((port, buffer)).await.is_err() {
                    break;
                }
            }
        });
    }
    drop(merged_tx);

    let runner = {
        let control = Arc::clone(&control);
        tokio::spawn(async move { context.run(&control).await })
    };

    let mut write_error = None;
    while let Some((port, buffer)) = merged_rx.recv().await {
        let data = codec::encode_buffer(port, output_edges[port], &buffer);
        if let Err(error) = codec::send(&mut sink, Body::Data(data)).await {
            control.cancel();
            write_error = Some(error);
            break;
        }
    }
    drop(merged_rx);

    let summary = runner.await;
    reader.abort();
    if let Some(error) = write_error {
        return Err(error);
    }
    if let Ok(Err(error)) = reader.await {
        codec::send(
            &mut sink,
            Body::Failure(Failure {
                kind: FailureKind::Protocol as i32,
                message: error.to_string(),
            }),
        )
        .await?;
        return Err(error);
    }

    match summary {
        Ok(summary) if summary.state == ContextState::Finished => {
            codec::send(&mut sink, Body::Finished(Finished { processed: summary.processed })).await?;
            Ok(format!("'{}' finished after {} calls", summary.task, summary.processed))
        }
        Ok(summary) if summary.state == ContextState::Failed => {
            let message = control
                .take_error()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "task failed".into());
            codec::send(
                &mut sink,
                Body::Failure(Failure {
                    kind: FailureKind::Processing as i32,
                    message: message.clone(),
                }),
            )
            .await?;
            Ok(format!("'{}' failed: {message}", summary.task))
        }
        Ok(summary) => Ok(format!("'{}' aborted", summary.task)),
        Err(error) => {
            let message = format!("task runner crashed: {error}");
            codec::send(
                &mut sink,
                Body::Failure(Failure {
                    kind: FailureKind::Processing as i32,
                    message: message.clone(),
                }),
            )
            .await?;
            Ok(message)
        }
    }
}

/// Feeds incoming `Data` into the task's input channels. `EndOfInput` closes
/// them; `Close` or a dropped connection aborts the task. A malformed or
/// unexpected message aborts it too and is returned, as does a port whose
/// buffers stop arriving on the edge that first fed it.
async fn read_inputs(
    mut stream: SplitStream<Transport>,
    ports: Vec<mpsc::Sender<Buffer>>,
    pool: BufferPool,
    control: Arc<RunControl>,
) -> Result<(), ProtocolError> {
    let mut edges: Vec<Option<u64>> = vec![None; ports.len()];
    let mut ports = Some(ports);
    loop {
        let body = tokio::select! {
            _ = control.token().cancelled() => return Ok(()),
            body = codec::recv(&mut stream) => body,
        };
        let body = match body {
            Ok(body) => body,
            Err(error) => {
                control.cancel();
                return Err(error);
            }
        };
        match body {
            Some(Body::Data(data)) => {
                let decoded = codec::decode_buffer(data, &pool).and_then(|(port, edge, buffer)| {
                    let tx = ports
                        .as_ref()
                        .and_then(|p| p.get(port))
                        .ok_or_else(|| ProtocolError::InvalidBuffer(format!("no input port {port}")))?;
                    match edges[port].replace(edge) {
                        Some(first) if first != edge => Err(ProtocolError::InvalidBuffer(format!(
                            "port {port} switched from edge {first} to edge {edge}"
                        ))),
                        _ => Ok((tx, buffer)),
                    }
                });
                let (tx, buffer) = match decoded {
                    Ok(decoded) => decoded,
                    Err(error) => {
                        control.cancel();
                        return Err(error);
                    }
                };
                tokio::select! {
                    _ = control.token().cancelled() => return Ok(()),
                    // a closed port means the task stopped reading; drop the buffer
                    _ = tx.send(buffer) => {}
                }
            }
            Some(Body::EndOfInput(_)) => ports = None,
            Some(Body::Close(_)) | None => {
                if ports.is_some() {
                    control.cancel();
                }
                return Ok(());
            }
            Some(other) => {
                control.cancel();
                return Err(codec::unexpected("Data", &other));
            }
        }
    }
}
