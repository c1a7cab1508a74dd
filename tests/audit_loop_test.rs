//! Audit loop runs: verdict ceilings, read-only tool restriction and
//! free-text verdicts that reopen the group.

mod common;

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use swarmcore::adapters::backends::ScriptedBackend;
use swarmcore::application::{AuditOutcome, AUDIT_TAG};
use swarmcore::domain::models::{AuditConfig, ModelResponse, Role, Todo, TodoStatus, ToolCall};
use swarmcore::domain::ports::{Tool, ToolOutput};
use swarmcore::services::{TaskGraph, ToolRegistry};
use swarmcore::AuditLoop;

use common::context;

/// One finished group, ready for audit.
async fn finished_group() -> Arc<TaskGraph> {
    let graph = Arc::new(TaskGraph::new());
    graph
        .create_group("g", "dev", "Ship the feature", Vec::<String>::new())
        .await
        .unwrap();
    graph
        .add_todo_with(
            "g",
            Todo::new("Implement feature").with_status(TodoStatus::Completed),
        )
        .await
        .unwrap();
    graph
}

fn audit_config(max_iterations: u32) -> AuditConfig {
    AuditConfig {
        max_iterations,
        ..AuditConfig::default()
    }
}

struct NamedTool {
    name: &'static str,
    read_only: bool,
}

#[async_trait]
impl Tool for NamedTool {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "Test tool"
    }

    fn input_schema(&self) -> Value {
        json!({"type": "object"})
    }

    fn read_only(&self) -> bool {
        self.read_only
    }

    async fn run(&self, _args: Value) -> ToolOutput {
        ToolOutput::ok(json!("done"))
    }
}

#[tokio::test]
async fn test_iteration_ceiling_is_inconclusive_and_adds_no_todos() {
    let backend = Arc::new(ScriptedBackend::from_fn(|_| {
        Ok(ModelResponse::tool_calls(vec![ToolCall::new(
            "c1",
            "todo_list",
            json!({}),
        )]))
    }));
    let graph = finished_group().await;
    let audit = AuditLoop::new("g", context(backend.clone(), graph.clone()), audit_config(3))
        .await
        .unwrap();

    let report = audit.run().await;

    assert!(matches!(report.outcome, AuditOutcome::Inconclusive { .. }));
    assert_eq!(report.iterations, 3);
    assert!(report.verdict.is_none());
    assert!(report.new_todo_ids.is_empty());
    assert!(report.inconclusive_error().is_some());
    assert_eq!(backend.call_count(), 3);

    assert_eq!(graph.todos("g").await.unwrap().len(), 1);
    assert!(graph.all_complete().await);
}

#[tokio::test]
async fn test_auditor_only_gets_read_only_tools() {
    let registry = ToolRegistry::new()
        .with_tool(Arc::new(NamedTool {
            name: "read_file",
            read_only: true,
        }))
        .with_tool(Arc::new(NamedTool {
            name: "write_file",
            read_only: false,
        }));
    let backend = Arc::new(ScriptedBackend::new());
    let ctx = context(backend, finished_group().await).with_registry(registry);

    let audit = AuditLoop::new("g", ctx, audit_config(3)).await.unwrap();

    let tools = audit.tools();
    assert!(tools.all_read_only());
    assert!(tools.contains("read_file"));
    assert!(tools.contains("todo_list"));
    assert!(!tools.contains("write_file"));
}

#[tokio::test]
async fn test_free_text_failure_opens_tagged_todos() {
    let backend = Arc::new(ScriptedBackend::from_fn(|request| {
        let last = request.messages.last().expect("messages");
        Ok(if last.role == Role::User {
            ModelResponse::tool_calls(vec![ToolCall::new("c1", "todo_list", json!({}))])
        } else {
            ModelResponse::text(
                "Reviewed the work.\n\
                 VERDICT: FAIL\n\
                 REASONS:\n\
                 - no documentation\n\
                 TASKS:\n\
                 - Write the README\n\
                 - Document the config file",
            )
        })
    }));
    let graph = finished_group().await;
    let audit = AuditLoop::new("g", context(backend.clone(), graph.clone()), audit_config(5))
        .await
        .unwrap();

    let report = audit.run().await;

    assert_eq!(report.outcome, AuditOutcome::Failed);
    assert_eq!(report.iterations, 2);
    let verdict = report.verdict.expect("verdict");
    assert!(!verdict.passed);
    assert_eq!(verdict.reasons, vec!["no documentation"]);
    assert_eq!(report.new_todo_ids.len(), 2);

    let todos = graph.todos("g").await.unwrap();
    assert_eq!(todos.len(), 3);
    let opened: Vec<_> = todos[1..].iter().map(|t| t.title.as_str()).collect();
    assert_eq!(opened, ["Write the README", "Document the config file"]);
    for todo in &todos[1..] {
        assert_eq!(todo.status, TodoStatus::Pending);
        assert!(todo.tags.iter().any(|t| t == AUDIT_TAG));
    }
    assert!(!graph.all_complete().await);
}
