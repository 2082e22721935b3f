// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use crate::buffer::{Buffer, DType, Shape};
use crate::config::{OptionKind, OptionSpec, TaskConfig};
use crate::errors::{ConfigurationError, ProcessingError};
use crate::traits::{Arity, Outcome, Outputs, Task, TaskContext};

const DTYPES: &[&str] = &["u8", "u16", "u32", "i32", "f32", "f64"];
const DEFAULT_EXTENT: usize = 512;

const SCHEMA: &[OptionSpec] = &[
    OptionSpec::required("number", OptionKind::Int { min: 0, max: i64::MAX }),
    OptionSpec::optional("width", OptionKind::Int { min: 1, max: 65536 }),
    OptionSpec::optional("height", OptionKind::Int { min: 1, max: 65536 }),
    OptionSpec::optional("dtype", OptionKind::Str { choices: DTYPES }),
];

/// Source producing `number` frames of `height` x `width`, frame `i` filled with `i`.
#[derive(Debug, Clone)]
pub struct Generate {
    number: u64,
    shape: Option<Shape>,
    dtype: DType,
    produced: u64,
}

impl Default for Generate {
    fn default() -> Self {
        Self {
            number: 0,
            shape: None,
            dtype: DType::F32,
            produced: 0,
        }
    }
}

fn extent(config: &TaskConfig, name: &str) -> usize {
    config
        .get_int(name)
        .and_then(|v| usize::try_from(v).ok())
        .unwrap_or(DEFAULT_EXTENT)
}

#[async_trait]
impl Task for Generate {
    fn type_name(&self) -> &'static str {
        "generate"
    }

    fn arity(&self) -> Arity {
        Arity::source(1)
    }

    fn schema(&self) -> &'static [OptionSpec] {
        SCHEMA
    }

    async fn setup(&mut self, config: &TaskConfig, ctx: &TaskContext<'_>) -> Result<(), ConfigurationError> {
        let invalid = |reason: String| ConfigurationError::Setup {
            task: ctx.task.to_string(),
            reason,
        };
        self.number = config
            .get_int("number")
            .and_then(|v| u64::try_from(v).ok())
            .ok_or_else(|| invalid("'number' must be a non-negative integer".into()))?;
        self.dtype = match config.get_str("dtype") {
            Some(name) => name.parse().map_err(invalid)?,
            None => DType::F32,
        };
        let shape = Shape::new([extent(config, "height"), extent(config, "width")])
            .map_err(|e| invalid(e.to_string()))?;
        self.shape = Some(shape);
        self.produced = 0;
        Ok(())
    }

    async fn process(&mut self, _inputs: Vec<Buffer>, ctx: &TaskContext<'_>) -> Result<Outcome, ProcessingError> {
        if self.produced >= self.number {
            return Ok(Outcome::Finished);
        }
        let shape = self
            .shape
            .as_ref()
            .ok_or_else(|| ProcessingError::Failed("generate used before setup".into()))?;
        let mut frame = ctx.pool.acquire(self.dtype, shape)?;
        frame.storage_mut().fill(self.produced as f64);
        self.produced += 1;
        Ok(Outcome::Emit(Outputs::one(frame.freeze())))
    }
}
