//! Task group domain model.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use super::todo::{Todo, TodoStatus};

/// A set of related todos with declared dependencies on other groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskGroup {
    pub group_id: String,
    #[serde(default)]
    pub specialization: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub dependencies: BTreeSet<String>,
    #[serde(default)]
    pub todos: Vec<Todo>,
}

impl TaskGroup {
    pub fn new(
        group_id: impl Into<String>,
        specialization: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            specialization: specialization.into(),
            description: description.into(),
            dependencies: BTreeSet::new(),
            todos: Vec::new(),
        }
    }

    pub fn with_dependency(mut self, dependency: impl Into<String>) -> Self {
        self.dependencies.insert(dependency.into());
        self
    }

    pub fn with_todo(mut self, todo: Todo) -> Self {
        self.todos.push(todo);
        self
    }

    /// `{specialization}-{group_id}`, with `worker` standing in for an empty specialization.
    pub fn worker_id(&self) -> String {
        let specialization = if self.specialization.is_empty() {
            "worker"
        } else {
            self.specialization.as_str()
        };
        format!("{specialization}-{}", self.group_id)
    }

    /// True when every todo is completed or cancelled (vacuously true when empty).
    pub fn is_complete(&self) -> bool {
        self.todos.iter().all(|t| t.status.is_terminal())
    }

    /// True when every todo is completed. Only then may dependents start;
    /// a cancelled todo leaves the group complete but unsatisfied.
    pub fn satisfies_dependents(&self) -> bool {
        self.todos.iter().all(|t| t.status == TodoStatus::Completed)
    }

    /// Todos that still need work.
    pub fn remaining(&self) -> impl Iterator<Item = &Todo> {
        self.todos.iter().filter(|t| !t.status.is_terminal())
    }

    pub fn remaining_count(&self) -> usize {
        self.remaining().count()
    }

    pub fn count_with_status(&self, status: TodoStatus) -> usize {
        self.todos.iter().filter(|t| t.status == status).count()
    }

    pub fn todo(&self, todo_id: Uuid) -> Option<&Todo> {
        self.todos.iter().find(|t| t.id == todo_id)
    }

    pub fn todo_mut(&mut self, todo_id: Uuid) -> Option<&mut Todo> {
        self.todos.iter_mut().find(|t| t.id == todo_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_group_is_complete() {
        let group = TaskGroup::new("a", "backend", "");
        assert!(group.is_complete());
        assert_eq!(group.remaining_count(), 0);
    }

    #[test]
    fn test_completion_tracks_todos() {
        let group = TaskGroup::new("a", "backend", "")
            .with_todo(Todo::new("one").with_status(TodoStatus::Completed))
            .with_todo(Todo::new("two"));
        assert!(!group.is_complete());
        assert_eq!(group.remaining_count(), 1);
        assert_eq!(group.count_with_status(TodoStatus::Completed), 1);
    }

    #[test]
    fn test_cancelled_todo_completes_but_does_not_satisfy() {
        let group = TaskGroup::new("a", "backend", "")
            .with_todo(Todo::new("one").with_status(TodoStatus::Completed))
            .with_todo(Todo::new("two").with_status(TodoStatus::Cancelled));
        assert!(group.is_complete());
        assert!(!group.satisfies_dependents());
    }

    #[test]
    fn test_in_progress_blocks_dependents() {
        let group = TaskGroup::new("a", "backend", "")
            .with_todo(Todo::new("one").with_status(TodoStatus::InProgress));
        assert!(!group.is_complete());
        assert!(!group.satisfies_dependents());
    }
}
