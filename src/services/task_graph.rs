//! Task graph: groups of todos with acyclic inter-group dependencies.
//!
//! The graph holds no execution state. Readiness is recomputed from todo
//! statuses on every query, and every read hands out owned copies.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use super::dependency_resolver::DependencyResolver;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{TaskGroup, Todo, TodoStatus};

/// Flat, serialisable form of the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    #[serde(default = "GraphSnapshot::current_version")]
    pub version: u32,
    #[serde(default)]
    pub groups: Vec<TaskGroup>,
}

impl GraphSnapshot {
    pub const CURRENT_VERSION: u32 = 1;

    fn current_version() -> u32 {
        Self::CURRENT_VERSION
    }

    pub fn new(groups: Vec<TaskGroup>) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            groups,
        }
    }
}

#[derive(Debug, Default)]
struct GraphState {
    /// Insertion order of group ids
    order: Vec<String>,
    groups: HashMap<String, TaskGroup>,
}

impl GraphState {
    fn group(&self, group_id: &str) -> DomainResult<&TaskGroup> {
        self.groups
            .get(group_id)
            .ok_or_else(|| DomainError::GroupNotFound(group_id.to_string()))
    }

    fn group_mut(&mut self, group_id: &str) -> DomainResult<&mut TaskGroup> {
        self.groups
            .get_mut(group_id)
            .ok_or_else(|| DomainError::GroupNotFound(group_id.to_string()))
    }

    fn ordered(&self) -> impl Iterator<Item = &TaskGroup> {
        self.order.iter().filter_map(|id| self.groups.get(id))
    }

    fn dependencies_satisfied(&self, group: &TaskGroup) -> bool {
        group.dependencies.iter().all(|dep| {
            self.groups
                .get(dep)
                .is_some_and(TaskGroup::satisfies_dependents)
        })
    }
}

/// Shared, mutable task graph.
#[derive(Debug, Default)]
pub struct TaskGraph {
    state: RwLock<GraphState>,
    resolver: DependencyResolver,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a group whose dependencies already exist in the graph.
    pub async fn create_group<I, S>(
        &self,
        group_id: impl Into<String>,
        specialization: impl Into<String>,
        description: impl Into<String>,
        dependencies: I,
    ) -> DomainResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let group_id = group_id.into();
        let dependencies: BTreeSet<String> = dependencies.into_iter().map(Into::into).collect();

        let mut state = self.state.write().await;
        if state.groups.contains_key(&group_id) {
            return Err(DomainError::DuplicateGroup(group_id));
        }
        if dependencies.contains(&group_id) {
            return Err(DomainError::DependencyCycle(vec![group_id.clone(), group_id]));
        }
        if let Some(missing) = dependencies.iter().find(|d| !state.groups.contains_key(*d)) {
            return Err(DomainError::UnknownDependency {
                group: group_id,
                dependency: missing.clone(),
            });
        }

        let mut group = TaskGroup::new(group_id.clone(), specialization, description);
        group.dependencies = dependencies;

        debug!(group_id = %group_id, deps = group.dependencies.len(), "Created task group");
        state.order.push(group_id.clone());
        state.groups.insert(group_id, group);
        Ok(())
    }

    /// Add a dependency edge, rejecting edges that would close a cycle.
    pub async fn add_dependency(&self, group_id: &str, dependency: &str) -> DomainResult<()> {
        let mut state = self.state.write().await;
        state.group(group_id)?;
        if !state.groups.contains_key(dependency) {
            return Err(DomainError::UnknownDependency {
                group: group_id.to_string(),
                dependency: dependency.to_string(),
            });
        }

        let mut candidate: Vec<TaskGroup> = state.ordered().cloned().collect();
        if let Some(group) = candidate.iter_mut().find(|g| g.group_id == group_id) {
            group.dependencies.insert(dependency.to_string());
        }
        if let Some(cycle) = self.resolver.detect_cycle(&candidate) {
            return Err(DomainError::DependencyCycle(cycle));
        }

        state
            .group_mut(group_id)?
            .dependencies
            .insert(dependency.to_string());
        Ok(())
    }

    /// Append a pending todo and return its id.
    pub async fn add_todo(&self, group_id: &str, title: impl Into<String>) -> DomainResult<Uuid> {
        self.add_todo_with(group_id, Todo::new(title)).await
    }

    /// Append a prepared todo and return its id.
    pub async fn add_todo_with(&self, group_id: &str, todo: Todo) -> DomainResult<Uuid> {
        let mut state = self.state.write().await;
        let group = state.group_mut(group_id)?;
        let id = todo.id;
        debug!(group_id, todo_id = %id, title = %todo.title, "Added todo");
        group.todos.push(todo);
        Ok(id)
    }

    pub async fn set_todo_status(
        &self,
        group_id: &str,
        todo_id: Uuid,
        status: TodoStatus,
    ) -> DomainResult<()> {
        let mut state = self.state.write().await;
        let todo = state
            .group_mut(group_id)?
            .todo_mut(todo_id)
            .ok_or(DomainError::TodoNotFound(todo_id))?;
        todo.transition_to(status)?;
        debug!(group_id, todo_id = %todo_id, status = %status, "Todo status changed");
        Ok(())
    }

    pub async fn assign_todo(
        &self,
        group_id: &str,
        todo_id: Uuid,
        assignee: Option<String>,
    ) -> DomainResult<()> {
        let mut state = self.state.write().await;
        state
            .group_mut(group_id)?
            .todo_mut(todo_id)
            .ok_or(DomainError::TodoNotFound(todo_id))?
            .assign(assignee);
        Ok(())
    }

    /// Incomplete groups whose dependency groups have every todo completed,
    /// in creation order.
    pub async fn ready_groups(&self) -> Vec<TaskGroup> {
        let state = self.state.read().await;
        state
            .ordered()
            .filter(|g| !g.is_complete() && state.dependencies_satisfied(g))
            .cloned()
            .collect()
    }

    /// True iff every todo in every group is completed or cancelled.
    pub async fn all_complete(&self) -> bool {
        let state = self.state.read().await;
        state.groups.values().all(TaskGroup::is_complete)
    }

    pub async fn group(&self, group_id: &str) -> Option<TaskGroup> {
        self.state.read().await.groups.get(group_id).cloned()
    }

    pub async fn groups(&self) -> Vec<TaskGroup> {
        self.state.read().await.ordered().cloned().collect()
    }

    pub async fn todos(&self, group_id: &str) -> DomainResult<Vec<Todo>> {
        Ok(self.state.read().await.group(group_id)?.todos.clone())
    }

    /// Count of todos in the group that are not completed or cancelled.
    pub async fn remaining_todos(&self, group_id: &str) -> DomainResult<usize> {
        Ok(self.state.read().await.group(group_id)?.remaining_count())
    }

    /// Ids of groups with outstanding todos, in creation order.
    pub async fn incomplete_groups(&self) -> Vec<String> {
        self.state
            .read()
            .await
            .ordered()
            .filter(|g| !g.is_complete())
            .map(|g| g.group_id.clone())
            .collect()
    }

    /// Every group that depends on `group_id`, directly or transitively.
    pub async fn dependents_of(&self, group_id: &str) -> HashSet<String> {
        let state = self.state.read().await;
        let mut found = HashSet::new();
        let mut queue = VecDeque::from([group_id.to_string()]);
        while let Some(current) = queue.pop_front() {
            for group in state.ordered() {
                if group.dependencies.contains(&current) && found.insert(group.group_id.clone()) {
                    queue.push_back(group.group_id.clone());
                }
            }
        }
        found
    }

    /// Delete every todo of the group. Returns how many were removed.
    pub async fn reset_scope(&self, group_id: &str) -> DomainResult<usize> {
        let mut state = self.state.write().await;
        let group = state.group_mut(group_id)?;
        let removed = group.todos.len();
        group.todos.clear();
        info!(group_id, removed, "Reset group scope");
        Ok(removed)
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.groups.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.groups.is_empty()
    }

    pub async fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot::new(self.groups().await)
    }

    /// Rebuild a graph, validating ids, dependencies and acyclicity.
    pub fn from_snapshot(snapshot: GraphSnapshot) -> DomainResult<Self> {
        let resolver = DependencyResolver::new();

        let mut seen = HashSet::new();
        for group in &snapshot.groups {
            if !seen.insert(group.group_id.as_str()) {
                return Err(DomainError::DuplicateGroup(group.group_id.clone()));
            }
        }
        resolver.validate_dependencies(&snapshot.groups)?;
        if let Some(cycle) = resolver.detect_cycle(&snapshot.groups) {
            return Err(DomainError::DependencyCycle(cycle));
        }

        let mut state = GraphState::default();
        for group in snapshot.groups {
            state.order.push(group.group_id.clone());
            state.groups.insert(group.group_id.clone(), group);
        }

        Ok(Self {
            state: RwLock::new(state),
            resolver,
        })
    }
}
