// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod consts;
mod loader;
mod options;
mod registry;
mod runtime;
mod validation;


pub use loader::{load_and_validate_config, load_config, InputRef, PipelineConfig, TaskEntry};
pub use options::{validate_options, OptionKind, OptionSpec, OptionValue, TaskConfig};
pub use registry::TaskRegistry;
pub use runtime::{Pipeline, PipelineBuilder};
pub use validation::validate_pipeline;
