// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use crate::backends::local::tasks::single_input;
use crate::buffer::Buffer;
use crate::errors::ProcessingError;
use crate::traits::{Arity, Outcome, Outputs, Task, TaskContext};

/// Splits each buffer along its leading dimension, the inverse of `stack`.
#[derive(Debug, Clone, Default)]
pub struct Slice;

#[async_trait]
impl Task for Slice {
    fn type_name(&self) -> &'static str {
        "slice"
    }

    fn arity(&self) -> Arity {
        Arity::transform(1, 1)
    }

    async fn process(&mut self, inputs: Vec<Buffer>, ctx: &TaskContext<'_>) -> Result<Outcome, ProcessingError> {
        let buffer = single_input(inputs)?;
        let (count, inner) = buffer.shape().split_leading().ok_or_else(|| ProcessingError::UnsupportedShape {
            shape: buffer.shape().dims().to_vec(),
            reason: "slice needs at least two dimensions".into(),
        })?;

        let frame = inner.num_elements();
        let mut outputs = Outputs::new();
        for index in 0..count {
            let mut part = ctx.pool.acquire(buffer.dtype(), &inner)?;
            part.storage_mut().read_from(buffer.storage(), index * frame)?;
            outputs.push(0, part.freeze());
        }
        Ok(Outcome::Emit(outputs))
    }
}
