//! Todo domain model.
//!
//! A todo is the atomic unit of work tracked by status inside a task group.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};

/// Status of a todo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl TodoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Completed and cancelled todos need no further work.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl fmt::Display for TodoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TodoStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "pending" | "todo" => Ok(Self::Pending),
            "in_progress" | "active" => Ok(Self::InProgress),
            "completed" | "complete" | "done" => Ok(Self::Completed),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            other => Err(DomainError::Configuration(format!("unknown todo status: {other}"))),
        }
    }
}

/// An atomic unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: TodoStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Todo {
    /// Create a new pending todo.
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: String::new(),
            status: TodoStatus::Pending,
            tags: Vec::new(),
            assignee: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_status(mut self, status: TodoStatus) -> Self {
        self.status = status;
        self
    }

    /// Move the todo to `status`.
    ///
    /// A cancelled todo has to be reopened to `pending` before it can be
    /// worked on again. Transitioning to the current status is a no-op.
    pub fn transition_to(&mut self, status: TodoStatus) -> DomainResult<()> {
        if self.status == status {
            return Ok(());
        }
        if self.status == TodoStatus::Cancelled
            && matches!(status, TodoStatus::InProgress | TodoStatus::Completed)
        {
            return Err(DomainError::InvalidStateTransition {
                from: self.status.to_string(),
                to: status.to_string(),
                reason: "cancelled todos must be reopened as pending first".to_string(),
            });
        }
        self.status = status;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn assign(&mut self, assignee: Option<String>) {
        self.assignee = assignee;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_todo_is_pending() {
        let todo = Todo::new("write parser");
        assert_eq!(todo.status, TodoStatus::Pending);
        assert!(todo.tags.is_empty());
        assert!(todo.assignee.is_none());
    }

    #[test]
    fn test_transitions() {
        let mut todo = Todo::new("write parser");
        todo.transition_to(TodoStatus::InProgress).unwrap();
        todo.transition_to(TodoStatus::Completed).unwrap();
        assert!(todo.status.is_terminal());

        // Reopening a completed todo is allowed
        todo.transition_to(TodoStatus::Pending).unwrap();
        assert_eq!(todo.status, TodoStatus::Pending);
    }

    #[test]
    fn test_cancelled_cannot_complete_directly() {
        let mut todo = Todo::new("obsolete").with_status(TodoStatus::Cancelled);
        let err = todo.transition_to(TodoStatus::Completed).unwrap_err();
        assert!(matches!(err, DomainError::InvalidStateTransition { .. }));

        todo.transition_to(TodoStatus::Pending).unwrap();
        todo.transition_to(TodoStatus::Completed).unwrap();
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("done".parse::<TodoStatus>().unwrap(), TodoStatus::Completed);
        assert_eq!("in-progress".parse::<TodoStatus>().unwrap(), TodoStatus::InProgress);
        assert_eq!("Canceled".parse::<TodoStatus>().unwrap(), TodoStatus::Cancelled);
        assert!("blocked".parse::<TodoStatus>().is_err());
    }

    #[test]
    fn test_minimal_yaml_todo_gets_defaults() {
        let todo: Todo = serde_yaml::from_str("title: write docs\n").unwrap();
        assert_eq!(todo.title, "write docs");
        assert_eq!(todo.status, TodoStatus::Pending);
    }
}
