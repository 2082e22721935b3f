// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use crate::backends::local::tasks::single_input;
use crate::buffer::Buffer;
use crate::config::{OptionKind, OptionSpec, TaskConfig};
use crate::errors::{ConfigurationError, ProcessingError};
use crate::observability::messages::{task::ShapeReconfigured, StructuredLog};
use crate::traits::{Arity, Outcome, Outputs, Task, TaskContext};

const SCHEMA: &[OptionSpec] = &[OptionSpec::required("number", OptionKind::Int { min: 1, max: 65536 })];

/// Groups `number` consecutive buffers into one with an extra leading dimension.
///
/// A buffer whose element type or shape differs from the group in progress
/// closes that group early; whatever is left when inputs run dry is emitted by
/// `flush`. Either way the short group's leading extent is its actual size.
#[derive(Debug, Clone, Default)]
pub struct Stack {
    number: usize,
    group: Vec<Buffer>,
}

impl Stack {
    fn matches_group(&self, buffer: &Buffer) -> bool {
        self.group
            .first()
            .map_or(true, |first| first.dtype() == buffer.dtype() && first.shape() == buffer.shape())
    }

    fn seal(&mut self, ctx: &TaskContext<'_>) -> Result<Option<Buffer>, ProcessingError> {
        let Some(first) = self.group.first() else {
            return Ok(None);
        };
        let shape = first.shape().with_leading(self.group.len())?;
        let mut stacked = ctx.pool.acquire(first.dtype(), &shape)?;
        let frame = first.shape().num_elements();
        for (index, buffer) in self.group.drain(..).enumerate() {
            stacked.storage_mut().write_at(index * frame, buffer.storage())?;
        }
        Ok(Some(stacked.freeze()))
    }
}

#[async_trait]
impl Task for Stack {
    fn type_name(&self) -> &'static str {
        "stack"
    }

    fn arity(&self) -> Arity {
        Arity::transform(1, 1)
    }

    fn schema(&self) -> &'static [OptionSpec] {
        SCHEMA
    }

    async fn setup(&mut self, config: &TaskConfig, ctx: &TaskContext<'_>) -> Result<(), ConfigurationError> {
        self.number = config
            .get_int("number")
            .and_then(|v| usize::try_from(v).ok())
            .filter(|&n| n > 0)
            .ok_or_else(|| ConfigurationError::Setup {
                task: ctx.task.to_string(),
                reason: "'number' must be a positive integer".into(),
            })?;
        self.group = Vec::with_capacity(self.number);
        Ok(())
    }

    async fn process(&mut self, inputs: Vec<Buffer>, ctx: &TaskContext<'_>) -> Result<Outcome, ProcessingError> {
        let buffer = single_input(inputs)?;
        let mut outputs = Outputs::new();

        if !self.matches_group(&buffer) {
            ShapeReconfigured {
                task: ctx.task,
                shape: buffer.shape(),
            }
            .log();
            if let Some(partial) = self.seal(ctx)? {
                outputs.push(0, partial);
            }
        }

        self.group.push(buffer);
        if self.group.len() == self.number {
            if let Some(full) = self.seal(ctx)? {
                outputs.push(0, full);
            }
        }
        Ok(Outcome::Emit(outputs))
    }

    async fn flush(&mut self, ctx: &TaskContext<'_>) -> Result<Outputs, ProcessingError> {
        Ok(self.seal(ctx)?.into_iter().collect())
    }
}
