// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Tasks that move buffers between a graph and the calling program.
//!
//! Neither is registered by type name: their data lives in this process, so
//! they are built through the API and never shipped to a remote daemon.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::buffer::Buffer;
use crate::errors::ProcessingError;
use crate::traits::{Arity, Outcome, Outputs, Task, TaskContext};

/// Source that emits the buffers it was built with, in order, then finishes.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    pending: VecDeque<Buffer>,
}

impl MemorySource {
    pub fn new(buffers: Vec<Buffer>) -> Self {
        Self {
            pending: buffers.into(),
        }
    }
}

#[async_trait]
impl Task for MemorySource {
    fn type_name(&self) -> &'static str {
        "memory_source"
    }

    fn arity(&self) -> Arity {
        Arity::source(1)
    }

    async fn process(&mut self, _inputs: Vec<Buffer>, _ctx: &TaskContext<'_>) -> Result<Outcome, ProcessingError> {
        Ok(match self.pending.pop_front() {
            Some(buffer) => Outcome::Emit(Outputs::one(buffer)),
            None => Outcome::Finished,
        })
    }
}

/// Handle on the buffers a [`MemorySink`] collected.
#[derive(Debug, Clone, Default)]
pub struct MemoryContents(Arc<Mutex<Vec<Buffer>>>);

impl MemoryContents {
    fn lock(&self) -> MutexGuard<'_, Vec<Buffer>> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Removes and returns everything collected so far, in arrival order.
    pub fn take(&self) -> Vec<Buffer> {
        std::mem::take(&mut *self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Sink that keeps every buffer it receives. Replicas share one store.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    contents: MemoryContents,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> MemoryContents {
        self.contents.clone()
    }
}

#[async_trait]
impl Task for MemorySink {
    fn type_name(&self) -> &'static str {
        "memory_sink"
    }

    fn arity(&self) -> Arity {
        Arity::sink(1)
    }

    async fn process(&mut self, inputs: Vec<Buffer>, _ctx: &TaskContext<'_>) -> Result<Outcome, ProcessingError> {
        self.contents.lock().extend(inputs);
        Ok(Outcome::Emit(Outputs::new()))
    }
}
