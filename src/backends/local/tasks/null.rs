// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::buffer::Buffer;
use crate::errors::ProcessingError;
use crate::traits::{Arity, Outcome, Outputs, Task, TaskContext};

/// Sink that drops every buffer it receives. Clones share one counter.
#[derive(Debug, Clone, Default)]
pub struct NullSink {
    received: Arc<AtomicU64>,
}

impl NullSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffers dropped so far, across all replicas.
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Task for NullSink {
    fn type_name(&self) -> &'static str {
        "null"
    }

    fn arity(&self) -> Arity {
        Arity::sink(1)
    }

    async fn process(&mut self, inputs: Vec<Buffer>, _ctx: &TaskContext<'_>) -> Result<Outcome, ProcessingError> {
        self.received.fetch_add(inputs.len() as u64, Ordering::Relaxed);
        Ok(Outcome::Emit(Outputs::new()))
    }
}
