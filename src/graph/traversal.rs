// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::{HashSet, VecDeque};

use super::{Edge, TaskId};

/// Depth-first search for a path `from -> ... -> to` along existing edges.
/// Returns the tasks on the path, both ends included.
pub(super) fn path(edges: &[Edge], from: TaskId, to: TaskId) -> Option<Vec<TaskId>> {
    let mut visited = HashSet::new();
    let mut stack = vec![from];
    dfs(edges, from, to, &mut visited, &mut stack).then_some(stack)
}

fn dfs(
    edges: &[Edge],
    current: TaskId,
    target: TaskId,
    visited: &mut HashSet<TaskId>,
    stack: &mut Vec<TaskId>,
) -> bool {
    if current == target {
        return true;
    }
    if !visited.insert(current) {
        return false;
    }
    for edge in edges.iter().filter(|e| e.from.task == current) {
        stack.push(edge.to.task);
        if dfs(edges, edge.to.task, target, visited, stack) {
            return true;
        }
        stack.pop();
    }
    false
}

/// Kahn's algorithm; ties resolved by task id. The graph is acyclic by
/// construction, so every task appears.
pub(super) fn topological_order(count: usize, edges: &[Edge]) -> Vec<TaskId> {
    let mut in_degree = vec![0usize; count];
    for edge in edges {
        in_degree[edge.to.task.0] += 1;
    }

    let mut ready: VecDeque<TaskId> = (0..count).filter(|&i| in_degree[i] == 0).map(TaskId).collect();
    let mut order = Vec::with_capacity(count);
    while let Some(task) = ready.pop_front() {
        order.push(task);
        for edge in edges.iter().filter(|e| e.from.task == task) {
            let degree = &mut in_degree[edge.to.task.0];
            *degree -= 1;
            if *degree == 0 {
                ready.push_back(edge.to.task);
            }
        }
    }
    order
}
