// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::backends::local::LocalTaskFactory;
use crate::errors::ConfigurationError;
use crate::traits::Task;

type Factory = Arc<dyn Fn() -> Result<Box<dyn Task>, ConfigurationError> + Send + Sync>;

/// Resolves task type names from pipeline files and remote submissions into
/// fresh task instances.
#[derive(Clone, Default)]
pub struct TaskRegistry {
    factories: BTreeMap<String, Factory>,
}

impl TaskRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in task the local factory knows.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for name in LocalTaskFactory::list_available_tasks() {
            registry
                .factories
                .insert(name.to_string(), Arc::new(move || LocalTaskFactory::create_task(name)));
        }
        registry
    }

    /// Adds or replaces the factory for `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Task> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(move || Ok(factory())));
    }

    pub fn create(&self, type_name: &str) -> Result<Box<dyn Task>, ConfigurationError> {
        let factory = self
            .factories
            .get(type_name)
            .ok_or_else(|| ConfigurationError::UnknownTaskType(type_name.to_string()))?;
        factory()
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    /// Registered type names, sorted.
    pub fn list(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}

impl fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRegistry").field("types", &self.list()).finish()
    }
}
