use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::TaskGroup;

/// Resolves task-group dependencies: existence, cycles, ordering and depth.
///
/// Iteration is over sorted group ids so results are deterministic.
#[derive(Debug, Clone, Default)]
pub struct DependencyResolver;

// Standalone helper for cycle detection (no self needed)
fn detect_cycle_util<'a>(
    node: &'a str,
    graph: &BTreeMap<&'a str, Vec<&'a str>>,
    visited: &mut HashSet<&'a str>,
    rec_stack: &mut HashSet<&'a str>,
    path: &mut Vec<&'a str>,
) -> bool {
    visited.insert(node);
    rec_stack.insert(node);
    path.push(node);

    if let Some(neighbors) = graph.get(node) {
        for &neighbor in neighbors {
            if !visited.contains(neighbor) {
                if detect_cycle_util(neighbor, graph, visited, rec_stack, path) {
                    return true;
                }
            } else if rec_stack.contains(neighbor) {
                if let Some(cycle_start) = path.iter().position(|&id| id == neighbor) {
                    path.drain(0..cycle_start);
                    // close the loop for display: a -> b -> a
                    path.push(neighbor);
                    return true;
                }
            }
        }
    }

    rec_stack.remove(node);
    path.pop();
    false
}

fn adjacency(groups: &[TaskGroup]) -> BTreeMap<&str, Vec<&str>> {
    let mut graph: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for group in groups {
        graph
            .entry(group.group_id.as_str())
            .or_default()
            .extend(group.dependencies.iter().map(String::as_str));
    }
    graph
}

impl DependencyResolver {
    pub fn new() -> Self {
        Self
    }

    /// Validate that every dependency names a known group.
    pub fn validate_dependencies(&self, groups: &[TaskGroup]) -> DomainResult<()> {
        let known: HashSet<&str> = groups.iter().map(|g| g.group_id.as_str()).collect();
        for group in groups {
            for dependency in &group.dependencies {
                if !known.contains(dependency.as_str()) {
                    return Err(DomainError::UnknownDependency {
                        group: group.group_id.clone(),
                        dependency: dependency.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Detect a dependency cycle, returning its path (first node repeated at the end).
    pub fn detect_cycle(&self, groups: &[TaskGroup]) -> Option<Vec<String>> {
        let graph = adjacency(groups);

        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        let mut path = Vec::new();

        for &group_id in graph.keys() {
            if !visited.contains(group_id)
                && detect_cycle_util(group_id, &graph, &mut visited, &mut rec_stack, &mut path)
            {
                return Some(path.into_iter().map(String::from).collect());
            }
        }

        None
    }

    /// Group ids in dependency order (dependencies before dependents).
    ///
    /// Ties are broken by group id.
    pub fn topological_order(&self, groups: &[TaskGroup]) -> DomainResult<Vec<String>> {
        self.validate_dependencies(groups)?;
        if let Some(cycle) = self.detect_cycle(groups) {
            return Err(DomainError::DependencyCycle(cycle));
        }

        let mut in_degree: BTreeMap<&str, usize> = BTreeMap::new();
        let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

        for group in groups {
            in_degree.entry(group.group_id.as_str()).or_insert(0);
            for dependency in &group.dependencies {
                dependents
                    .entry(dependency.as_str())
                    .or_default()
                    .push(group.group_id.as_str());
                *in_degree.entry(group.group_id.as_str()).or_insert(0) += 1;
            }
        }

        // Kahn's algorithm with an ordered frontier
        let mut frontier: BTreeSet<&str> = in_degree
            .iter()
            .filter(|&(_, &degree)| degree == 0)
            .map(|(&id, _)| id)
            .collect();

        let mut sorted = Vec::with_capacity(in_degree.len());
        while let Some(node) = frontier.pop_first() {
            sorted.push(node.to_string());
            if let Some(children) = dependents.get(node) {
                for &child in children {
                    if let Some(degree) = in_degree.get_mut(child) {
                        *degree -= 1;
                        if *degree == 0 {
                            frontier.insert(child);
                        }
                    }
                }
            }
        }

        if sorted.len() != in_degree.len() {
            let unsorted = in_degree
                .into_iter()
                .filter(|&(_, degree)| degree > 0)
                .map(|(id, _)| id.to_string())
                .collect();
            return Err(DomainError::DependencyCycle(unsorted));
        }

        Ok(sorted)
    }

    /// Longest dependency chain below each group (roots have depth 0).
    pub fn depths(&self, groups: &[TaskGroup]) -> DomainResult<BTreeMap<String, u32>> {
        let order = self.topological_order(groups)?;
        let by_id: BTreeMap<&str, &TaskGroup> =
            groups.iter().map(|g| (g.group_id.as_str(), g)).collect();

        let mut depths: BTreeMap<String, u32> = BTreeMap::new();
        for group_id in order {
            let depth = by_id
                .get(group_id.as_str())
                .map(|group| {
                    group
                        .dependencies
                        .iter()
                        .filter_map(|dep| depths.get(dep))
                        .map(|d| d + 1)
                        .max()
                        .unwrap_or(0)
                })
                .unwrap_or(0);
            depths.insert(group_id, depth);
        }
        Ok(depths)
    }
}
