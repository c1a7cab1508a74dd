//! Worker configuration and per-run results.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Capability and budget ceiling for one agent loop. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub worker_id: String,
    #[serde(default)]
    pub scope_paths: Vec<PathBuf>,
    #[serde(default)]
    pub allowed_tool_names: Vec<String>,
    pub max_cost: f64,
    pub max_iterations: u32,
}

impl WorkerConfig {
    pub fn new(worker_id: impl Into<String>, max_cost: f64, max_iterations: u32) -> Self {
        Self {
            worker_id: worker_id.into(),
            scope_paths: Vec::new(),
            allowed_tool_names: Vec::new(),
            max_cost,
            max_iterations,
        }
    }

    pub fn with_scope_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.scope_paths.push(path.into());
        self
    }

    pub fn with_allowed_tools<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_tool_names = names.into_iter().map(Into::into).collect();
        self
    }
}

/// Which ceiling ended a loop early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitKind {
    Cost,
    Iterations,
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cost => f.write_str("cost"),
            Self::Iterations => f.write_str("iterations"),
        }
    }
}

/// How an agent loop terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "limit")]
pub enum Termination {
    Completed,
    Failed,
    Aborted(LimitKind),
}

/// Outcome of a single agent loop invocation. Produced once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: String,
    pub worker_id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub execution_time: Duration,
    pub cost: f64,
    pub iteration_count: u32,
    pub termination: Termination,
    /// Soft failures recorded while the loop kept going.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recorded_errors: Vec<String>,
}

impl TaskResult {
    /// A result for a run that never reached the model.
    pub fn rejected(
        task_id: impl Into<String>,
        worker_id: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            worker_id: worker_id.into(),
            success: false,
            result: None,
            error: Some(error.into()),
            execution_time: Duration::ZERO,
            cost: 0.0,
            iteration_count: 0,
            termination: Termination::Failed,
            recorded_errors: Vec::new(),
        }
    }
}
