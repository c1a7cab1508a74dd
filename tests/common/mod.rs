//! Common test utilities for integration tests
//!
//! Provides a scripted "diligent" agent, audit verdict helpers and graph
//! fixtures shared across the integration test files.

#![allow(dead_code)]

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use swarmcore::adapters::backends::ScriptedBackend;
use swarmcore::domain::models::{
    AuditVerdict, ChatMessage, Config, ModelRequest, ModelResponse, Role, ToolCall,
};
use swarmcore::domain::ports::ModelBackend;
use swarmcore::infrastructure::gateway::{Gateway, RateLimiter, RetryPolicy};
use swarmcore::services::TaskGraph;
use swarmcore::{GatewayError, LoopContext};

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
/// Call this at the beginning of tests that need logging.
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Gateway with no spacing, a wide slot pool and millisecond retries.
pub fn fast_gateway(backend: Arc<ScriptedBackend>) -> Arc<Gateway> {
    fast_gateway_over(backend)
}

pub fn fast_gateway_over(backend: Arc<dyn ModelBackend>) -> Arc<Gateway> {
    Arc::new(
        Gateway::new(backend, Arc::new(RateLimiter::new(Duration::ZERO, 16)))
            .with_retry_policy(fast_retry(3)),
    )
}

pub fn fast_retry(max_retries: u32) -> RetryPolicy {
    RetryPolicy::new(max_retries, Duration::from_millis(1), Duration::from_millis(5))
}

/// Defaults with stall detection tuned for tests.
pub fn fast_config() -> Config {
    let mut config = Config::default();
    config.coordinator.stall_poll_interval_ms = 1;
    config.coordinator.stall_max_polls = 2;
    config
}

/// Build a graph from `(group_id, dependencies, todo titles)` rows, in order.
pub async fn graph_with(rows: &[(&str, &[&str], &[&str])]) -> Arc<TaskGraph> {
    let graph = Arc::new(TaskGraph::new());
    for (group_id, deps, todos) in rows {
        graph
            .create_group(*group_id, "dev", format!("Group {group_id}"), deps.iter().copied())
            .await
            .expect("create group");
        for title in *todos {
            graph.add_todo(group_id, *title).await.expect("add todo");
        }
    }
    graph
}

pub fn context(backend: Arc<ScriptedBackend>, graph: Arc<TaskGraph>) -> LoopContext {
    LoopContext::new(fast_gateway(backend), graph, "test-model")
}

pub fn is_audit_request(request: &ModelRequest) -> bool {
    request
        .messages
        .iter()
        .any(|m| m.role == Role::User && m.content.starts_with("Audit task group:"))
}

/// 1-based indices of `[pending]` and `[in_progress]` lines in a todo listing.
pub fn open_todo_indices(text: &str) -> Vec<usize> {
    text.lines()
        .filter(|line| line.contains("[pending]") || line.contains("[in_progress]"))
        .filter_map(|line| line.split('.').next()?.trim().parse().ok())
        .collect()
}

pub fn complete_all_calls(indices: &[usize]) -> ModelResponse {
    ModelResponse::tool_calls(
        indices
            .iter()
            .map(|i| {
                ToolCall::new(
                    format!("call-{i}"),
                    "todo_update",
                    json!({"index": i, "status": "completed"}),
                )
            })
            .collect(),
    )
}

pub fn verdict_response(verdict: &AuditVerdict) -> ModelResponse {
    ModelResponse::text(serde_json::to_string(verdict).expect("verdict json"))
}

/// Agent turn of a model that completes every listed todo, then says so.
pub fn diligent_agent_turn(messages: &[ChatMessage]) -> ModelResponse {
    match messages.last() {
        Some(last) if last.role == Role::User => {
            let open = open_todo_indices(&last.content);
            if open.is_empty() {
                ModelResponse::text("Nothing left to do. Task complete.")
            } else {
                complete_all_calls(&open)
            }
        }
        _ => ModelResponse::text("All todos are complete. Task complete."),
    }
}

/// Backend that works every todo and passes every audit.
pub fn diligent_backend() -> ScriptedBackend {
    ScriptedBackend::from_fn(|request| {
        if is_audit_request(request) {
            Ok(verdict_response(&AuditVerdict::pass()))
        } else {
            Ok(diligent_agent_turn(&request.messages))
        }
    })
}

/// Like `diligent_backend`, but every agent call for `group_id` is rejected
/// as unauthorized.
pub fn unauthorized_for(group_id: &'static str) -> ScriptedBackend {
    ScriptedBackend::from_fn(move |request| {
        let is_group = request
            .messages
            .iter()
            .any(|m| m.content.starts_with(&format!("Task group: {group_id}\n")));
        if is_group {
            Err(GatewayError::Unauthorized("revoked key".into()))
        } else if is_audit_request(request) {
            Ok(verdict_response(&AuditVerdict::pass()))
        } else {
            Ok(diligent_agent_turn(&request.messages))
        }
    })
}
