//! Built-in todo tools, scoped to one task group.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt::Write as _;
use std::sync::Arc;
use uuid::Uuid;

use super::task_graph::TaskGraph;
use crate::domain::models::{Todo, TodoStatus};
use crate::domain::ports::{Tool, ToolOutput};

pub const TODO_LIST: &str = "todo_list";
pub const TODO_ADD: &str = "todo_add";
pub const TODO_UPDATE: &str = "todo_update";

/// Numbered listing: `1. [pending] title (id: ...)`.
pub fn format_todo_list(todos: &[Todo]) -> String {
    if todos.is_empty() {
        return "(no todos)".to_string();
    }
    let mut out = String::new();
    for (idx, todo) in todos.iter().enumerate() {
        let _ = writeln!(out, "{}. [{}] {} (id: {})", idx + 1, todo.status, todo.title, todo.id);
    }
    out
}

#[derive(Clone)]
struct Scope {
    graph: Arc<TaskGraph>,
    group_id: String,
}

/// Lists the todos of the scoped group.
pub struct TodoListTool {
    scope: Scope,
}

/// Appends a pending todo to the scoped group.
pub struct TodoAddTool {
    scope: Scope,
}

/// Changes a todo's status and marks the worker as its assignee.
pub struct TodoUpdateTool {
    scope: Scope,
    worker_id: String,
}

impl TodoListTool {
    pub fn new(graph: Arc<TaskGraph>, group_id: impl Into<String>) -> Self {
        Self {
            scope: Scope {
                graph,
                group_id: group_id.into(),
            },
        }
    }
}

/// The three todo tools for a worker on `group_id`.
pub fn todo_tools(
    graph: &Arc<TaskGraph>,
    group_id: &str,
    worker_id: &str,
) -> Vec<Arc<dyn Tool>> {
    let scope = Scope {
        graph: Arc::clone(graph),
        group_id: group_id.to_string(),
    };
    vec![
        Arc::new(TodoListTool { scope: scope.clone() }),
        Arc::new(TodoAddTool { scope: scope.clone() }),
        Arc::new(TodoUpdateTool {
            scope,
            worker_id: worker_id.to_string(),
        }),
    ]
}

#[async_trait]
impl Tool for TodoListTool {
    fn name(&self) -> &str {
        TODO_LIST
    }

    fn description(&self) -> &str {
        "List the todos of your task group with their status and ids."
    }

    fn input_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    fn read_only(&self) -> bool {
        true
    }

    async fn run(&self, _arguments: Value) -> ToolOutput {
        match self.scope.graph.todos(&self.scope.group_id).await {
            Ok(todos) => {
                let remaining = todos.iter().filter(|t| !t.status.is_terminal()).count();
                ToolOutput::ok(Value::String(format!(
                    "{}\nRemaining: {remaining}",
                    format_todo_list(&todos).trim_end()
                )))
            }
            Err(e) => ToolOutput::err(e.to_string()),
        }
    }
}

#[derive(Deserialize)]
struct AddArgs {
    title: String,
    #[serde(default)]
    description: String,
}

#[async_trait]
impl Tool for TodoAddTool {
    fn name(&self) -> &str {
        TODO_ADD
    }

    fn description(&self) -> &str {
        "Add a new pending todo to your task group."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "title": {"type": "string"},
                "description": {"type": "string"}
            },
            "required": ["title"]
        })
    }

    async fn run(&self, arguments: Value) -> ToolOutput {
        let args: AddArgs = match serde_json::from_value(arguments) {
            Ok(args) => args,
            Err(e) => return ToolOutput::err(format!("invalid arguments: {e}")),
        };
        if args.title.trim().is_empty() {
            return ToolOutput::err("title cannot be empty");
        }
        let todo = Todo::new(args.title).with_description(args.description);
        match self.scope.graph.add_todo_with(&self.scope.group_id, todo).await {
            Ok(id) => ToolOutput::ok(json!({"id": id, "status": TodoStatus::Pending})),
            Err(e) => ToolOutput::err(e.to_string()),
        }
    }
}

#[derive(Deserialize)]
struct UpdateArgs {
    #[serde(default)]
    id: Option<Uuid>,
    /// 1-based position in the listing
    #[serde(default)]
    index: Option<usize>,
    status: String,
}

#[async_trait]
impl Tool for TodoUpdateTool {
    fn name(&self) -> &str {
        TODO_UPDATE
    }

    fn description(&self) -> &str {
        "Set the status of one of your todos (pending, in_progress, completed, cancelled). \
         Identify it by id or by its 1-based index in todo_list."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": {"type": "string"},
                "index": {"type": "integer", "minimum": 1},
                "status": {
                    "type": "string",
                    "enum": ["pending", "in_progress", "completed", "cancelled"]
                }
            },
            "required": ["status"]
        })
    }

    async fn run(&self, arguments: Value) -> ToolOutput {
        let args: UpdateArgs = match serde_json::from_value(arguments) {
            Ok(args) => args,
            Err(e) => return ToolOutput::err(format!("invalid arguments: {e}")),
        };
        let status: TodoStatus = match args.status.parse() {
            Ok(status) => status,
            Err(e) => return ToolOutput::err(e.to_string()),
        };

        let graph = &self.scope.graph;
        let group_id = self.scope.group_id.as_str();

        let todo_id = match (args.id, args.index) {
            (Some(id), _) => id,
            (None, Some(index)) => match graph.todos(group_id).await {
                Ok(todos) => match index.checked_sub(1).and_then(|i| todos.get(i)) {
                    Some(todo) => todo.id,
                    None => {
                        return ToolOutput::err(format!(
                            "index {index} out of range (1..={})",
                            todos.len()
                        ))
                    }
                },
                Err(e) => return ToolOutput::err(e.to_string()),
            },
            (None, None) => return ToolOutput::err("either id or index is required"),
        };

        if let Err(e) = graph.set_todo_status(group_id, todo_id, status).await {
            return ToolOutput::err(e.to_string());
        }
        if let Err(e) = graph
            .assign_todo(group_id, todo_id, Some(self.worker_id.clone()))
            .await
        {
            return ToolOutput::err(e.to_string());
        }

        let remaining = graph.remaining_todos(group_id).await.unwrap_or_default();
        ToolOutput::ok(json!({"id": todo_id, "status": status, "remaining": remaining}))
    }
}
