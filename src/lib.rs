// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod arch;           // compute resources, local and remote
pub mod backends;       // built-in tasks
pub mod buffer;         // typed buffers + pool
pub mod config;         // pipeline files, options, registry
pub mod engine;         // schedulers + execution contexts
pub mod errors;         // error handling
pub mod graph;          // task topology
pub mod observability;
pub mod proto;          // remote wire messages
pub mod remote;         // daemon + client
pub mod traits;         // Task and Scheduler
