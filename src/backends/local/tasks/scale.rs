// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use crate::backends::local::tasks::single_input;
use crate::buffer::{Buffer, DType, Element, Shape};
use crate::config::{OptionKind, OptionSpec, TaskConfig};
use crate::errors::{ConfigurationError, ProcessingError};
use crate::observability::messages::{task::ShapeReconfigured, StructuredLog};
use crate::traits::{Arity, Outcome, Outputs, Task, TaskContext};

const SCHEMA: &[OptionSpec] = &[OptionSpec::required(
    "factor",
    OptionKind::Float { min: -1.0e12, max: 1.0e12 },
)];

/// Multiplies every element of a floating-point buffer by `factor`.
#[derive(Debug, Clone, Default)]
pub struct Scale {
    factor: f64,
    current: Option<(DType, Shape)>,
}

fn scaled<T: Element + std::ops::Mul<Output = T>>(
    input: &Buffer,
    factor: T,
    ctx: &TaskContext<'_>,
) -> Result<Buffer, ProcessingError> {
    let source = input
        .as_slice::<T>()
        .ok_or_else(|| ProcessingError::UnsupportedType(input.dtype().to_string()))?;
    let mut output = ctx.pool.acquire(T::DTYPE, input.shape())?;
    let target = output
        .as_mut_slice::<T>()
        .ok_or_else(|| ProcessingError::UnsupportedType(T::DTYPE.to_string()))?;
    for (out, &value) in target.iter_mut().zip(source) {
        *out = value * factor;
    }
    Ok(output.freeze())
}

#[async_trait]
impl Task for Scale {
    fn type_name(&self) -> &'static str {
        "scale"
    }

    fn arity(&self) -> Arity {
        Arity::transform(1, 1)
    }

    fn schema(&self) -> &'static [OptionSpec] {
        SCHEMA
    }

    async fn setup(&mut self, config: &TaskConfig, ctx: &TaskContext<'_>) -> Result<(), ConfigurationError> {
        self.factor = config.get_float("factor").ok_or_else(|| ConfigurationError::MissingOption {
            task: ctx.task.to_string(),
            option: "factor".into(),
        })?;
        self.current = None;
        Ok(())
    }

    async fn process(&mut self, inputs: Vec<Buffer>, ctx: &TaskContext<'_>) -> Result<Outcome, ProcessingError> {
        let input = single_input(inputs)?;
        let key = (input.dtype(), input.shape().clone());
        if self.current.as_ref() != Some(&key) {
            ShapeReconfigured {
                task: ctx.task,
                shape: input.shape(),
            }
            .log();
            self.current = Some(key);
        }

        let output = match input.dtype() {
            DType::F32 => scaled(&input, self.factor as f32, ctx)?,
            DType::F64 => scaled(&input, self.factor, ctx)?,
            other => {
                return Err(ProcessingError::UnsupportedType(format!(
                    "scale works on f32 and f64 buffers, got {other}"
                )))
            }
        };
        Ok(Outcome::Emit(Outputs::one(output)))
    }
}
