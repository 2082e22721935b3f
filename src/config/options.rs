// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Task options and the schema each task declares for them.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigurationError;

/// A single option value as written in a pipeline file or sent over the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl OptionValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            OptionValue::Bool(_) => "bool",
            OptionValue::Int(_) => "int",
            OptionValue::Float(_) => "float",
            OptionValue::Str(_) => "string",
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(v) => write!(f, "{v}"),
            OptionValue::Int(v) => write!(f, "{v}"),
            OptionValue::Float(v) => write!(f, "{v}"),
            OptionValue::Str(v) => write!(f, "{v}"),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(v: bool) -> Self {
        OptionValue::Bool(v)
    }
}

impl From<i64> for OptionValue {
    fn from(v: i64) -> Self {
        OptionValue::Int(v)
    }
}

impl From<f64> for OptionValue {
    fn from(v: f64) -> Self {
        OptionValue::Float(v)
    }
}

impl From<&str> for OptionValue {
    fn from(v: &str) -> Self {
        OptionValue::Str(v.to_string())
    }
}

/// Name/value options handed to `Task::setup`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskConfig(pub BTreeMap<String, OptionValue>);

impl TaskConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: &str, value: impl Into<OptionValue>) -> Self {
        self.0.insert(name.to_string(), value.into());
        self
    }

    pub fn set(&mut self, name: &str, value: impl Into<OptionValue>) {
        self.0.insert(name.to_string(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.0.get(name)
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        match self.0.get(name) {
            Some(OptionValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    /// Integers are accepted where floats are expected.
    pub fn get_float(&self, name: &str) -> Option<f64> {
        match self.0.get(name) {
            Some(OptionValue::Float(v)) => Some(*v),
            Some(OptionValue::Int(v)) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.0.get(name) {
            Some(OptionValue::Bool(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        match self.0.get(name) {
            Some(OptionValue::Str(v)) => Some(v),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &OptionValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Type and allowed range of one option.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OptionKind {
    Bool,
    Int { min: i64, max: i64 },
    Float { min: f64, max: f64 },
    Str { choices: &'static [&'static str] },
}

/// One entry of a task's option schema.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptionSpec {
    pub name: &'static str,
    pub kind: OptionKind,
    pub required: bool,
}

impl OptionSpec {
    pub const fn required(name: &'static str, kind: OptionKind) -> Self {
        Self { name, kind, required: true }
    }

    pub const fn optional(name: &'static str, kind: OptionKind) -> Self {
        Self { name, kind, required: false }
    }
}

/// Checks `config` against `schema`: unknown, mistyped, out-of-range and missing
/// required options all fail.
pub fn validate_options(
    task: &str,
    schema: &[OptionSpec],
    config: &TaskConfig,
) -> Result<(), ConfigurationError> {
    for (name, value) in config.iter() {
        let spec = schema
            .iter()
            .find(|spec| spec.name == name)
            .ok_or_else(|| ConfigurationError::UnknownOption {
                task: task.to_string(),
                option: name.clone(),
            })?;
        check_value(task, spec, value)?;
    }

    if let Some(missing) = schema
        .iter()
        .find(|spec| spec.required && config.get(spec.name).is_none())
    {
        return Err(ConfigurationError::MissingOption {
            task: task.to_string(),
            option: missing.name.to_string(),
        });
    }
    Ok(())
}

fn check_value(task: &str, spec: &OptionSpec, value: &OptionValue) -> Result<(), ConfigurationError> {
    let mistyped = |expected: &'static str| ConfigurationError::MistypedOption {
        task: task.to_string(),
        option: spec.name.to_string(),
        expected,
        found: value.kind_name(),
    };
    let out_of_range = |reason: String| ConfigurationError::OutOfRange {
        task: task.to_string(),
        option: spec.name.to_string(),
        reason,
    };

    let check_float = |v: f64, min: f64, max: f64| {
        if v.is_finite() && v >= min && v <= max {
            Ok(())
        } else {
            Err(out_of_range(format!("{v} not in [{min}, {max}]")))
        }
    };

    match (spec.kind, value) {
        (OptionKind::Bool, OptionValue::Bool(_)) => Ok(()),
        (OptionKind::Bool, _) => Err(mistyped("bool")),
        (OptionKind::Int { min, max }, OptionValue::Int(v)) => {
            if (min..=max).contains(v) {
                Ok(())
            } else {
                Err(out_of_range(format!("{v} not in [{min}, {max}]")))
            }
        }
        (OptionKind::Int { .. }, _) => Err(mistyped("int")),
        (OptionKind::Float { min, max }, OptionValue::Float(v)) => check_float(*v, min, max),
        (OptionKind::Float { min, max }, OptionValue::Int(v)) => check_float(*v as f64, min, max),
        (OptionKind::Float { .. }, _) => Err(mistyped("float")),
        (OptionKind::Str { choices }, OptionValue::Str(v)) => {
            if choices.is_empty() || choices.contains(&v.as_str()) {
                Ok(())
            } else {
                Err(out_of_range(format!("'{v}' not one of {choices:?}")))
            }
        }
        (OptionKind::Str { .. }, _) => Err(mistyped("string")),
    }
}
