// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Structural validation of pipeline files.
//!
//! Checks run in order: task ids are unique, every input reference is well
//! formed and names an existing task, and the task graph is acyclic. Cycle
//! detection walks the graph depth-first with a recursion stack so the
//! reported error carries the actual cycle path. It only runs once the first
//! two checks pass, since it needs every reference to resolve.

use std::collections::{HashMap, HashSet};

use crate::config::loader::{InputRef, PipelineConfig};
use crate::errors::ValidationError;

/// Collects every structural problem in `config`.
pub fn validate_pipeline(config: &PipelineConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    errors.extend(duplicate_ids(config));
    errors.extend(unresolved_inputs(config));

    if errors.is_empty() {
        if let Some(cycle) = find_cycle(config) {
            errors.push(ValidationError::CyclicDependency { cycle });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn duplicate_ids(config: &PipelineConfig) -> Vec<ValidationError> {
    let mut seen = HashSet::new();
    config
        .tasks
        .iter()
        .filter(|task| !seen.insert(task.id.as_str()))
        .map(|task| ValidationError::DuplicateTaskId {
            task_id: task.id.clone(),
        })
        .collect()
}

fn unresolved_inputs(config: &PipelineConfig) -> Vec<ValidationError> {
    let ids: HashSet<&str> = config.tasks.iter().map(|t| t.id.as_str()).collect();
    let mut errors = Vec::new();

    for task in &config.tasks {
        for reference in &task.inputs {
            match InputRef::parse(reference) {
                None => errors.push(ValidationError::MalformedInput {
                    task_id: task.id.clone(),
                    reference: reference.clone(),
                }),
                Some(input) if !ids.contains(input.task) => errors.push(ValidationError::UnresolvedInput {
                    task_id: task.id.clone(),
                    missing_input: input.task.to_string(),
                }),
                Some(_) => {}
            }
        }
    }
    errors
}

/// First cycle found, as task ids with the first repeated at the end.
fn find_cycle(config: &PipelineConfig) -> Option<Vec<String>> {
    // producer -> consumers, in file order so the reported cycle is stable
    let mut graph: HashMap<&str, Vec<&str>> = config.tasks.iter().map(|t| (t.id.as_str(), Vec::new())).collect();
    for task in &config.tasks {
        for input in task.inputs.iter().filter_map(|r| InputRef::parse(r)) {
            if let Some(consumers) = graph.get_mut(input.task) {
                consumers.push(task.id.as_str());
            }
        }
    }

    let mut visited = HashSet::new();
    let mut rec_stack = HashSet::new();
    let mut path = Vec::new();

    config.tasks.iter().find_map(|task| {
        if visited.contains(task.id.as_str()) {
            return None;
        }
        dfs_cycle_detection(&task.id, &graph, &mut visited, &mut rec_stack, &mut path)
    })
}

/// Depth-first walk from `node`. A neighbour already on the recursion stack
/// closes a cycle; the path from that neighbour back to it is returned.
fn dfs_cycle_detection<'a>(
    node: &'a str,
    graph: &HashMap<&'a str, Vec<&'a str>>,
    visited: &mut HashSet<&'a str>,
    rec_stack: &mut HashSet<&'a str>,
    path: &mut Vec<&'a str>,
) -> Option<Vec<String>> {
    visited.insert(node);
    rec_stack.insert(node);
    path.push(node);

    for &neighbor in graph.get(node).map(Vec::as_slice).unwrap_or_default() {
        if rec_stack.contains(neighbor) {
            let start = path.iter().position(|&n| n == neighbor).unwrap_or(0);
            let mut cycle: Vec<String> = path[start..].iter().map(|n| n.to_string()).collect();
            cycle.push(neighbor.to_string());
            return Some(cycle);
        }
        if !visited.contains(neighbor) {
            if let Some(cycle) = dfs_cycle_detection(neighbor, graph, visited, rec_stack, path) {
                return Some(cycle);
            }
        }
    }

    rec_stack.remove(node);
    path.pop();
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::loader::TaskEntry;

    fn task(id: &str, inputs: &[&str]) -> TaskEntry {
        TaskEntry {
            id: id.to_string(),
            task_type: "scale".to_string(),
            options: Default::default(),
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            expand: None,
            node: None,
        }
    }

    fn pipeline(tasks: Vec<TaskEntry>) -> PipelineConfig {
        PipelineConfig {
            scheduler: Default::default(),
            arch: Default::default(),
            tasks,
        }
    }

    #[test]
    fn valid_chain_passes() {
        let config = pipeline(vec![task("a", &[]), task("b", &["a"]), task("c", &["b:0"])]);
        assert!(validate_pipeline(&config).is_ok());
    }

    #[test]
    fn duplicate_and_unresolved_are_reported_together() {
        let config = pipeline(vec![task("a", &[]), task("a", &["ghost"]), task("b", &["a:x"])]);
        let errors = validate_pipeline(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::DuplicateTaskId { task_id: "a".into() },
                ValidationError::UnresolvedInput {
                    task_id: "a".into(),
                    missing_input: "ghost".into()
                },
                ValidationError::MalformedInput {
                    task_id: "b".into(),
                    reference: "a:x".into()
                },
            ]
        );
    }

    #[test]
    fn cycle_path_is_reported() {
        let config = pipeline(vec![
            task("src", &[]),
            task("a", &["src"]),
            task("b", &["a"]),
            task("c", &["b"]),
            task("a2", &["c"]),
        ]);
        assert!(validate_pipeline(&config).is_ok());

        let config = pipeline(vec![task("a", &["c"]), task("b", &["a"]), task("c", &["b"])]);
        let errors = validate_pipeline(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::CyclicDependency {
                cycle: vec!["a".into(), "b".into(), "c".into(), "a".into()]
            }]
        );
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let config = pipeline(vec![task("a", &["a"])]);
        let errors = validate_pipeline(&config).unwrap_err();
        assert!(matches!(&errors[0], ValidationError::CyclicDependency { cycle } if cycle == &["a", "a"]));
    }
}
