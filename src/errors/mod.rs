// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod config;
mod execution;
mod remote;
mod topology;

pub use config::{ConfigurationError, ValidationError};
pub use execution::{ExecutionError, ProcessingError};
pub use remote::{ConnectionError, ProtocolError};
pub use topology::{PortDirection, TopologyError};
