// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod scheduler;
pub mod task;

pub use scheduler::Scheduler;
pub use task::{Affinity, Arity, Outcome, Outputs, Task, TaskClone, TaskContext};
