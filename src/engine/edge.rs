// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Channel plumbing between execution contexts.
//!
//! Every graph edge is one bounded `mpsc` channel. The receiving side of all
//! edges into a task forms its [`InputSet`]; replicas of that task share the
//! set behind a lock so each tuple is taken whole by exactly one replica. The
//! sending side forms an [`OutputSet`] that each replica holds a clone of, so
//! an edge closes only when every replica of its producer is done.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use crate::buffer::Buffer;
use crate::errors::ProcessingError;
use crate::graph::EdgeId;
use crate::traits::Outputs;

pub(crate) type SharedInputs = Arc<Mutex<InputSet>>;

#[derive(Debug)]
pub(crate) struct InputSet {
    ports: Vec<mpsc::Receiver<Buffer>>,
}

impl InputSet {
    pub(crate) fn new(ports: Vec<mpsc::Receiver<Buffer>>) -> Self {
        Self { ports }
    }

    pub(crate) fn shared(self) -> SharedInputs {
        Arc::new(Mutex::new(self))
    }

    /// One buffer from every port, in port order. `None` once any port is
    /// exhausted: its producers are gone and its queue is drained.
    ///
    /// A task without inputs always gets an empty tuple.
    pub(crate) async fn next(&mut self) -> Option<Vec<Buffer>> {
        let mut tuple = Vec::with_capacity(self.ports.len());
        for port in &mut self.ports {
            tuple.push(port.recv().await?);
        }
        Some(tuple)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct EdgeSender {
    edge: EdgeId,
    tx: mpsc::Sender<Buffer>,
}

impl EdgeSender {
    pub(crate) fn new(edge: EdgeId, tx: mpsc::Sender<Buffer>) -> Self {
        Self { edge, tx }
    }
}

/// Outgoing edges grouped by output port.
#[derive(Debug, Clone, Default)]
pub(crate) struct OutputSet {
    ports: Vec<Vec<EdgeSender>>,
}

impl OutputSet {
    pub(crate) fn new(ports: Vec<Vec<EdgeSender>>) -> Self {
        Self { ports }
    }

    /// Delivers every buffer to every live edge of its port, suspending while
    /// a queue is full. Edges whose consumer hung up are dropped.
    pub(crate) async fn send(&mut self, outputs: Outputs) -> Result<(), ProcessingError> {
        let arity = self.ports.len();
        for (port, buffers) in outputs.into_ports().into_iter().enumerate() {
            if buffers.is_empty() {
                continue;
            }
            let edges = self
                .ports
                .get_mut(port)
                .ok_or(ProcessingError::InvalidOutputPort { port, arity })?;

            for buffer in buffers {
                let mut closed = Vec::new();
                for sender in edges.iter() {
                    if sender.tx.send(buffer.clone()).await.is_err() {
                        closed.push(sender.edge);
                    }
                }
                if !closed.is_empty() {
                    edges.retain(|sender| !closed.contains(&sender.edge));
                }
            }
        }
        Ok(())
    }

    /// True when the task has outputs and every one of its edges is closed.
    pub(crate) fn is_exhausted(&self) -> bool {
        !self.ports.is_empty() && self.ports.iter().all(Vec::is_empty)
    }

    /// Drops every sender, signalling end of stream downstream.
    pub(crate) fn close(&mut self) {
        self.ports.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(value: u32) -> Buffer {
        Buffer::from_vec(vec![1], vec![value]).unwrap()
    }

    #[tokio::test]
    async fn input_set_stops_at_first_exhausted_port() {
        let (tx_a, rx_a) = mpsc::channel(4);
        let (tx_b, rx_b) = mpsc::channel(4);
        let mut inputs = InputSet::new(vec![rx_a, rx_b]);

        tx_a.send(buffer(1)).await.unwrap();
        tx_a.send(buffer(2)).await.unwrap();
        tx_b.send(buffer(10)).await.unwrap();
        drop(tx_b);

        let tuple = inputs.next().await.unwrap();
        assert_eq!(tuple[0].as_slice::<u32>(), Some(&[1u32][..]));
        assert_eq!(tuple[1].as_slice::<u32>(), Some(&[10u32][..]));
        assert!(inputs.next().await.is_none());
    }

    #[tokio::test]
    async fn source_input_set_yields_empty_tuples() {
        let mut inputs = InputSet::new(Vec::new());
        assert_eq!(inputs.next().await.map(|t| t.len()), Some(0));
    }

    #[tokio::test]
    async fn fan_out_shares_one_buffer_between_edges() {
        let (tx_a, mut rx_a) = mpsc::channel(4);
        let (tx_b, mut rx_b) = mpsc::channel(4);
        let mut outputs = OutputSet::new(vec![vec![
            EdgeSender::new(EdgeId(0), tx_a),
            EdgeSender::new(EdgeId(1), tx_b),
        ]]);

        outputs.send(Outputs::one(buffer(7))).await.unwrap();
        let a = rx_a.recv().await.unwrap();
        let b = rx_b.recv().await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.consumers(), 2);
    }

    #[tokio::test]
    async fn closed_edges_are_dropped_until_exhausted() {
        let (tx_a, rx_a) = mpsc::channel(4);
        let (tx_b, mut rx_b) = mpsc::channel(4);
        let mut outputs = OutputSet::new(vec![vec![
            EdgeSender::new(EdgeId(0), tx_a),
            EdgeSender::new(EdgeId(1), tx_b),
        ]]);

        drop(rx_a);
        outputs.send(Outputs::one(buffer(1))).await.unwrap();
        assert!(!outputs.is_exhausted());
        assert!(rx_b.recv().await.is_some());

        drop(rx_b);
        outputs.send(Outputs::one(buffer(2))).await.unwrap();
        assert!(outputs.is_exhausted());
    }

    #[tokio::test]
    async fn emitting_on_undeclared_port_fails() {
        let mut outputs = OutputSet::new(Vec::new());
        let mut emitted = Outputs::new();
        emitted.push(1, buffer(1));
        let err = outputs.send(emitted).await.unwrap_err();
        assert!(matches!(err, ProcessingError::InvalidOutputPort { port: 1, arity: 0 }));
        assert!(!outputs.is_exhausted());
    }
}
