// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::buffer::BufferPool;
use crate::engine::{AdaptiveScheduler, FixedScheduler, SchedulerConfig, SchedulerPolicy};
use crate::traits::Scheduler;

/// Factory for creating schedulers from configuration
pub struct SchedulerFactory;

impl SchedulerFactory {
    /// Create a scheduler for the configured policy, drawing buffers from `pool`
    pub fn from_config(config: &SchedulerConfig, pool: BufferPool) -> Box<dyn Scheduler> {
        let options = config.options.clone();
        match config.policy {
            SchedulerPolicy::Fixed => Box::new(FixedScheduler::new(options).with_pool(pool)),
            SchedulerPolicy::Adaptive => Box::new(AdaptiveScheduler::new(options).with_pool(pool)),
        }
    }
}
