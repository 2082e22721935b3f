// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Built-in tasks. Everything except the memory tasks is also reachable by
//! type name through the local task factory, and therefore from a remote daemon.

pub mod generate;
pub mod memory;
pub mod null;
pub mod scale;
pub mod slice;
pub mod stack;

pub use generate::Generate;
pub use memory::{MemoryContents, MemorySink, MemorySource};
pub use null::NullSink;
pub use scale::Scale;
pub use slice::Slice;
pub use stack::Stack;

use crate::buffer::Buffer;
use crate::errors::ProcessingError;

/// Takes the one buffer a single-input task receives per call.
pub(crate) fn single_input(mut inputs: Vec<Buffer>) -> Result<Buffer, ProcessingError> {
    match (inputs.pop(), inputs.len()) {
        (Some(buffer), 0) => Ok(buffer),
        (popped, rest) => Err(ProcessingError::InputArity {
            expected: 1,
            found: rest + usize::from(popped.is_some()),
        }),
    }
}

/// Owns what a [`crate::traits::TaskContext`] borrows, for driving tasks by hand.
#[cfg(test)]
pub(crate) struct Harness {
    arch: crate::arch::ArchGraph,
    pub(crate) pool: crate::buffer::BufferPool,
}

#[cfg(test)]
impl Harness {
    pub(crate) fn new() -> Self {
        Self {
            arch: crate::arch::ArchGraph::with_devices(&[crate::arch::DeviceKind::Cpu]),
            pool: crate::buffer::BufferPool::new(),
        }
    }

    pub(crate) fn ctx<'a>(&'a self, task: &'a str) -> crate::traits::TaskContext<'a> {
        crate::traits::TaskContext {
            task,
            node: &self.arch.nodes()[0],
            pool: &self.pool,
            replica: 0,
            replicas: 1,
        }
    }
}

/// Unwraps the buffers of port 0 from an `Emit` outcome.
#[cfg(test)]
pub(crate) fn emitted(outcome: crate::traits::Outcome) -> Vec<Buffer> {
    match outcome {
        crate::traits::Outcome::Emit(outputs) => outputs.into_ports().into_iter().next().unwrap_or_default(),
        crate::traits::Outcome::Finished => panic!("expected buffers, task finished"),
    }
}
