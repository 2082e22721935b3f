// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Scheduling and execution of task graphs.
//!
//! Both schedulers share one execution model (see [`context`]); they differ
//! only in how [`Scheduler::bind`](crate::traits::Scheduler::bind) places tasks
//! on nodes.

pub mod adaptive;
pub mod binding;
pub mod context;
pub(crate) mod edge;
pub(crate) mod executor;
pub mod factory;
pub mod fixed;
pub mod options;

#[cfg(test)]
mod integration_tests;
#[cfg(test)]
pub(crate) mod test_tasks;

pub use adaptive::AdaptiveScheduler;
pub use binding::Binding;
pub use context::{ContextState, ContextSummary};
pub use executor::{RunHandle, RunReport};
pub use factory::SchedulerFactory;
pub use fixed::FixedScheduler;
pub use options::{Heuristic, SchedulerConfig, SchedulerOptions, SchedulerPolicy};
