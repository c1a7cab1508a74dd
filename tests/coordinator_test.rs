//! Coordinator scenarios over scripted backends.

mod common;

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use swarmcore::adapters::backends::ScriptedBackend;
use swarmcore::application::AUDIT_TAG;
use swarmcore::domain::models::{
    AuditStatus, AuditVerdict, FailurePolicy, LimitKind, ModelRequest, ModelResponse,
    SwarmEvent, TodoStatus,
};
use swarmcore::domain::ports::ModelBackend;
use swarmcore::services::EventSink;
use swarmcore::{Coordinator, DomainError, GatewayError, LoopContext, StopReason};

use common::{
    context, diligent_agent_turn, diligent_backend, fast_config, fast_gateway_over, graph_with,
    is_audit_request, unauthorized_for, verdict_response,
};

#[tokio::test]
async fn test_dependent_group_runs_after_its_dependency() {
    let backend = Arc::new(diligent_backend());
    let graph = graph_with(&[("a", &[], &["a1", "a2"]), ("b", &["a"], &["b1"])]).await;
    let (events, mut rx) = EventSink::channel(256);
    let ctx = context(backend.clone(), graph.clone()).with_events(events);
    let coordinator = Coordinator::new(ctx, &fast_config());

    let report = coordinator.run().await.unwrap();

    assert_eq!(report.stop_reason, StopReason::AllComplete);
    assert!(report.is_success());
    assert_eq!(report.phases, 2);
    assert!(graph.all_complete().await);

    let a = report.group("a").unwrap();
    assert_eq!(a.attempts, 1);
    assert_eq!(a.audits, vec![AuditStatus::Passed]);

    // Two agent calls and one audit call per group.
    assert_eq!(report.total_iterations, 6);
    assert_eq!(backend.call_count(), 6);

    let mut phases = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let SwarmEvent::PhaseStarted { groups, .. } = event {
            phases.push(groups);
        }
    }
    assert_eq!(phases, vec![vec!["a".to_string()], vec!["b".to_string()]]);

    let status = coordinator.status().await;
    assert_eq!(status.phase, 2);
    assert_eq!(status.completed, 2);
    assert_eq!(status.failed, 0);
    assert_eq!(status.in_flight, 0);
    assert_eq!(status.total_iterations, 6);
}

#[tokio::test]
async fn test_halt_on_failure_stops_after_failing_phase() {
    let backend = Arc::new(unauthorized_for("a"));
    let graph = graph_with(&[
        ("a", &[], &["a1"]),
        ("b", &[], &["b1"]),
        ("c", &["b"], &["c1"]),
    ])
    .await;
    let coordinator = Coordinator::new(context(backend, graph), &fast_config());

    let report = coordinator.run().await.unwrap();

    assert_eq!(report.stop_reason, StopReason::HaltedOnFailure);
    assert_eq!(report.phases, 1);
    assert!(!report.is_success());

    let a = report.group("a").unwrap();
    assert!(!a.success);
    assert!(a.error.as_deref().unwrap().contains("Unauthorized"));

    assert!(report.group("b").unwrap().success);

    let c = report.group("c").unwrap();
    assert_eq!(c.attempts, 0);
    assert!(c.error.as_deref().unwrap().starts_with("not started"));
}

#[tokio::test]
async fn test_continue_independent_runs_unaffected_branches() {
    let backend = Arc::new(unauthorized_for("a"));
    let graph = graph_with(&[
        ("a", &[], &["a1"]),
        ("b", &[], &["b1"]),
        ("c", &["b"], &["c1"]),
        ("d", &["a"], &["d1"]),
    ])
    .await;
    let mut config = fast_config();
    config.coordinator.failure_policy = FailurePolicy::ContinueIndependent;

    let report = Coordinator::new(context(backend, graph), &config)
        .run()
        .await
        .unwrap();

    assert_eq!(report.stop_reason, StopReason::Blocked);
    assert!(report.group("b").unwrap().success);
    assert!(report.group("c").unwrap().success);
    assert!(!report.group("a").unwrap().success);

    let d = report.group("d").unwrap();
    assert!(!d.success);
    assert_eq!(d.error.as_deref(), Some("blocked by failed dependency a"));
    assert_eq!(report.failed_groups().count(), 2);
}

#[tokio::test]
async fn test_cancelled_dependency_surfaces_graph_stall() {
    let backend = Arc::new(diligent_backend());
    let graph = graph_with(&[("a", &[], &["a1"]), ("b", &["a"], &["b1"])]).await;
    let todo = graph.todos("a").await.unwrap()[0].id;
    graph
        .set_todo_status("a", todo, TodoStatus::Cancelled)
        .await
        .unwrap();

    let err = Coordinator::new(context(backend.clone(), graph), &fast_config())
        .run()
        .await
        .unwrap_err();

    match err {
        DomainError::GraphStall(groups) => assert_eq!(groups, vec!["b".to_string()]),
        other => panic!("expected GraphStall, got {other}"),
    }
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn test_failed_audit_reopens_group_until_it_passes() {
    let audits = Arc::new(AtomicU32::new(0));
    let seen = Arc::clone(&audits);
    let backend = Arc::new(ScriptedBackend::from_fn(move |request| {
        if is_audit_request(request) {
            let verdict = if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                AuditVerdict::fail(["Add integration tests"]).with_reason("no tests")
            } else {
                AuditVerdict::pass()
            };
            Ok(verdict_response(&verdict))
        } else {
            Ok(diligent_agent_turn(&request.messages))
        }
    }));
    let graph = graph_with(&[("g", &[], &["Implement feature"])]).await;

    let coordinator = Coordinator::new(context(backend, graph.clone()), &fast_config());
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.stop_reason, StopReason::AllComplete);
    assert_eq!(report.phases, 2);
    assert_eq!(audits.load(Ordering::SeqCst), 2);

    // The rerun does not count the group a second time.
    let status = coordinator.status().await;
    assert_eq!(status.completed, 1);
    assert_eq!(status.failed, 0);

    let g = report.group("g").unwrap();
    assert!(g.success);
    assert_eq!(g.attempts, 2);
    assert_eq!(g.audits, vec![AuditStatus::Failed, AuditStatus::Passed]);

    let todos = graph.todos("g").await.unwrap();
    assert_eq!(todos.len(), 2);
    assert!(todos.iter().all(|t| t.status == TodoStatus::Completed));
    assert_eq!(todos[1].title, "Add integration tests");
    assert!(todos[1].tags.iter().any(|t| t == AUDIT_TAG));
}

#[tokio::test]
async fn test_global_cost_budget_stops_new_groups() {
    let backend = Arc::new(ScriptedBackend::from_fn(|request| {
        Ok(diligent_agent_turn(&request.messages).with_cost(0.5))
    }));
    let graph = graph_with(&[
        ("a", &[], &["a1"]),
        ("b", &[], &["b1"]),
        ("c", &[], &["c1"]),
    ])
    .await;
    let mut config = fast_config();
    config.audit.enabled = false;
    config.coordinator.max_concurrent_workers = 1;
    config.coordinator.max_total_cost = 1.0;

    let report = Coordinator::new(context(backend.clone(), graph), &config)
        .run()
        .await
        .unwrap();

    assert_eq!(report.stop_reason, StopReason::BudgetExhausted(LimitKind::Cost));
    assert!((report.total_cost - 1.0).abs() < 1e-9);
    assert_eq!(backend.call_count(), 2);
    assert!(report.group("a").unwrap().success);
    for id in ["b", "c"] {
        let outcome = report.group(id).unwrap();
        assert_eq!(outcome.attempts, 0);
        assert!(!outcome.success);
    }
}

#[tokio::test]
async fn test_phase_limit_bounds_endless_audit_failures() {
    let backend = Arc::new(ScriptedBackend::from_fn(|request| {
        if is_audit_request(request) {
            Ok(verdict_response(&AuditVerdict::fail(["One more thing"])))
        } else {
            Ok(diligent_agent_turn(&request.messages))
        }
    }));
    let graph = graph_with(&[("g", &[], &["Start"])]).await;
    let mut config = fast_config();
    config.coordinator.max_phases = 3;

    let report = Coordinator::new(context(backend, graph.clone()), &config)
        .run()
        .await
        .unwrap();

    assert_eq!(report.stop_reason, StopReason::PhaseLimit);
    assert_eq!(report.phases, 3);

    let g = report.group("g").unwrap();
    assert_eq!(g.attempts, 3);
    assert!(!g.success);
    assert!(g.error.as_deref().unwrap().contains("still open"));
    assert_eq!(graph.remaining_todos("g").await.unwrap(), 1);
}

/// Diligent agent whose audit calls are slow and counted while in flight.
#[derive(Default)]
struct SlowAuditor {
    active: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl ModelBackend for SlowAuditor {
    fn name(&self) -> &'static str {
        "slow-auditor"
    }

    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse, GatewayError> {
        if !is_audit_request(request) {
            return Ok(diligent_agent_turn(&request.messages));
        }
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(verdict_response(&AuditVerdict::pass()))
    }
}

#[tokio::test]
async fn test_audits_respect_worker_limit() {
    let backend = Arc::new(SlowAuditor::default());
    let graph = graph_with(&[
        ("a", &[], &["a1"]),
        ("b", &[], &["b1"]),
        ("c", &[], &["c1"]),
        ("d", &[], &["d1"]),
    ])
    .await;
    let mut config = fast_config();
    config.coordinator.max_concurrent_workers = 2;

    let ctx = LoopContext::new(fast_gateway_over(backend.clone()), graph, "test-model");
    let report = Coordinator::new(ctx, &config).run().await.unwrap();

    assert_eq!(report.stop_reason, StopReason::AllComplete);
    assert_eq!(report.phases, 1);
    assert!(report
        .groups
        .iter()
        .all(|g| g.audits == vec![AuditStatus::Passed]));
    assert_eq!(backend.peak.load(Ordering::SeqCst), 2);
}
