// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use super::tasks::*;
use crate::errors::ConfigurationError;
use crate::traits::Task;

/// Factory for the built-in tasks that can be created from a type name.
pub struct LocalTaskFactory;

impl LocalTaskFactory {
    /// Creates a fresh, not yet set up instance of `type_name`:
    /// - "generate" -> [`Generate`]
    /// - "null" -> [`NullSink`]
    /// - "stack" -> [`Stack`]
    /// - "slice" -> [`Slice`]
    /// - "scale" -> [`Scale`]
    pub fn create_task(type_name: &str) -> Result<Box<dyn Task>, ConfigurationError> {
        match type_name {
            "generate" => Ok(Box::new(Generate::default())),
            "null" => Ok(Box::new(NullSink::new())),
            "stack" => Ok(Box::new(Stack::default())),
            "slice" => Ok(Box::new(Slice)),
            "scale" => Ok(Box::new(Scale::default())),
            other => Err(ConfigurationError::UnknownTaskType(other.to_string())),
        }
    }

    pub fn list_available_tasks() -> Vec<&'static str> {
        vec!["generate", "null", "stack", "slice", "scale"]
    }

    pub fn is_task_available(type_name: &str) -> bool {
        Self::list_available_tasks().contains(&type_name)
    }
}
