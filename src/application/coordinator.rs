//! Phase-based scheduler that drives agent loops over the task graph.

use futures::future::join_all;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock, Semaphore};
use tracing::{debug, error, info, instrument, warn};

use super::agent_loop::AgentLoop;
use super::audit_loop::{AuditLoop, AuditReport};
use super::conversation::LoopContext;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    AuditConfig, AuditStatus, Config, CoordinatorConfig, FailurePolicy, LimitKind, SwarmEvent,
    TaskGroup, TaskResult, WorkerConfig, WorkerTemplate,
};

const MAX_STALL_BACKOFF: Duration = Duration::from_secs(5);

/// Why the coordinator stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "reason", content = "limit")]
pub enum StopReason {
    AllComplete,
    HaltedOnFailure,
    BudgetExhausted(LimitKind),
    /// Only groups that failed or depend on a failed group remain.
    Blocked,
    PhaseLimit,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllComplete => f.write_str("all groups complete"),
            Self::HaltedOnFailure => f.write_str("halted after a group failed"),
            Self::BudgetExhausted(limit) => write!(f, "global {limit} budget exhausted"),
            Self::Blocked => f.write_str("remaining groups are blocked by failures"),
            Self::PhaseLimit => f.write_str("phase limit reached"),
        }
    }
}

/// Final per-group result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupOutcome {
    pub group_id: String,
    pub success: bool,
    pub error: Option<String>,
    /// Agent loop runs, including reruns after an audit reopened the group
    pub attempts: u32,
    pub audits: Vec<AuditStatus>,
    pub cost: f64,
    pub iterations: u32,
}

impl GroupOutcome {
    fn new(group_id: &str) -> Self {
        Self {
            group_id: group_id.to_string(),
            success: false,
            error: None,
            attempts: 0,
            audits: Vec::new(),
            cost: 0.0,
            iterations: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoordinatorReport {
    pub stop_reason: StopReason,
    pub total_cost: f64,
    pub total_iterations: u64,
    pub phases: u32,
    pub groups: Vec<GroupOutcome>,
}

impl CoordinatorReport {
    pub fn is_success(&self) -> bool {
        self.stop_reason == StopReason::AllComplete && self.groups.iter().all(|g| g.success)
    }

    pub fn group(&self, group_id: &str) -> Option<&GroupOutcome> {
        self.groups.iter().find(|g| g.group_id == group_id)
    }

    pub fn failed_groups(&self) -> impl Iterator<Item = &GroupOutcome> {
        self.groups.iter().filter(|g| !g.success)
    }
}

/// Live counters, readable while a run is in progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CoordinatorStatus {
    pub phase: u32,
    pub total_cost: f64,
    pub total_iterations: u64,
    pub completed: usize,
    pub failed: usize,
    pub in_flight: usize,
}

/// Global spend across every loop in the run.
#[derive(Debug, Clone, Copy)]
struct BudgetLedger {
    cost: f64,
    iterations: u64,
    max_cost: f64,
    max_iterations: u64,
}

impl BudgetLedger {
    fn new(settings: &CoordinatorConfig) -> Self {
        Self {
            cost: 0.0,
            iterations: 0,
            max_cost: settings.max_total_cost,
            max_iterations: settings.max_total_iterations,
        }
    }

    fn record(&mut self, cost: f64, iterations: u32) {
        self.cost += cost;
        self.iterations += u64::from(iterations);
    }

    fn exceeded(&self) -> Option<LimitKind> {
        if self.cost >= self.max_cost {
            Some(LimitKind::Cost)
        } else if self.iterations >= self.max_iterations {
            Some(LimitKind::Iterations)
        } else {
            None
        }
    }
}

enum Readiness {
    Ready(Vec<TaskGroup>),
    Done,
    Blocked,
}

/// Runs agent loops phase by phase until the graph is complete or a stop
/// condition holds.
pub struct Coordinator {
    ctx: LoopContext,
    settings: CoordinatorConfig,
    audit: AuditConfig,
    worker_defaults: WorkerTemplate,
    specializations: HashMap<String, WorkerTemplate>,
    status: Arc<RwLock<CoordinatorStatus>>,
}

impl Coordinator {
    pub fn new(ctx: LoopContext, config: &Config) -> Self {
        Self {
            ctx,
            settings: config.coordinator.clone(),
            audit: config.audit.clone(),
            worker_defaults: config.worker_defaults.clone(),
            specializations: config.specializations.clone(),
            status: Arc::new(RwLock::new(CoordinatorStatus::default())),
        }
    }

    pub fn with_settings(mut self, settings: CoordinatorConfig) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_audit(mut self, audit: AuditConfig) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_worker_template(
        mut self,
        specialization: impl Into<String>,
        template: WorkerTemplate,
    ) -> Self {
        self.specializations.insert(specialization.into(), template);
        self
    }

    pub async fn status(&self) -> CoordinatorStatus {
        *self.status.read().await
    }

    /// Worker settings for a group: its specialization's template, or the defaults.
    pub fn worker_config(&self, group: &TaskGroup) -> WorkerConfig {
        let template = self
            .specializations
            .get(&group.specialization)
            .unwrap_or(&self.worker_defaults);

        WorkerConfig {
            worker_id: group.worker_id(),
            scope_paths: template.scope_paths.clone(),
            allowed_tool_names: template.allowed_tool_names.clone(),
            max_cost: template.max_cost,
            max_iterations: template.max_iterations,
        }
    }

    /// Run until every todo is done or a stop condition holds.
    ///
    /// # Errors
    /// `GraphStall` when groups remain incomplete, none is ready, and no
    /// failure explains the blockage.
    #[instrument(skip(self), fields(policy = ?self.settings.failure_policy))]
    pub async fn run(&self) -> DomainResult<CoordinatorReport> {
        let graph = Arc::clone(&self.ctx.graph);
        let ledger = Arc::new(Mutex::new(BudgetLedger::new(&self.settings)));
        let mut outcomes: HashMap<String, GroupOutcome> = HashMap::new();
        let mut failed: HashSet<String> = HashSet::new();
        let mut phase: u32 = 0;

        info!(groups = graph.len().await, "Coordinator started");

        let stop_reason = loop {
            if graph.all_complete().await {
                break StopReason::AllComplete;
            }
            if let Some(limit) = ledger.lock().await.exceeded() {
                break StopReason::BudgetExhausted(limit);
            }
            if phase >= self.settings.max_phases {
                break StopReason::PhaseLimit;
            }

            let ready = match self.await_ready(&failed).await? {
                Readiness::Ready(groups) => groups,
                Readiness::Done => break StopReason::AllComplete,
                Readiness::Blocked => break StopReason::Blocked,
            };

            phase += 1;
            self.status.write().await.phase = phase;
            let group_ids: Vec<String> = ready.iter().map(|g| g.group_id.clone()).collect();
            info!(phase, groups = ?group_ids, "Phase started");
            self.ctx.events.emit(SwarmEvent::PhaseStarted {
                phase,
                groups: group_ids,
            });

            let results = self.run_phase(&ready, &ledger).await;

            let mut succeeded = Vec::new();
            let mut phase_failures = 0_usize;
            for result in results {
                let outcome = outcomes
                    .entry(result.task_id.clone())
                    .or_insert_with(|| GroupOutcome::new(&result.task_id));
                outcome.attempts += 1;
                outcome.cost += result.cost;
                outcome.iterations += result.iteration_count;
                outcome.success = result.success;
                outcome.error.clone_from(&result.error);

                if result.success {
                    succeeded.push(result.task_id);
                } else {
                    warn!(group_id = %result.task_id, error = ?result.error, "Group failed");
                    failed.insert(result.task_id);
                    phase_failures += 1;
                }
            }

            self.status.write().await.failed = failed.len();
            self.ctx.events.emit(SwarmEvent::PhaseCompleted {
                phase,
                succeeded: succeeded.len(),
                failed: phase_failures,
            });

            if self.audit.enabled && !succeeded.is_empty() {
                for report in self.run_audits(&succeeded).await {
                    ledger.lock().await.record(report.cost, report.iterations);
                    if let Some(err) = report.inconclusive_error() {
                        warn!(error = %err, "Audit needs review");
                    }
                    if let Some(outcome) = outcomes.get_mut(&report.group_id) {
                        outcome.cost += report.cost;
                        outcome.audits.push(report.outcome.status());
                    }
                }
                let totals = *ledger.lock().await;
                self.sync_totals(&totals).await;
            }

            let completed = self.completed_groups(&outcomes).await;
            self.status.write().await.completed = completed;

            if phase_failures > 0 && self.settings.failure_policy == FailurePolicy::HaltOnFailure {
                break StopReason::HaltedOnFailure;
            }
        };

        let report = self
            .build_report(stop_reason, phase, outcomes, &failed, &ledger)
            .await;
        info!(
            stop_reason = %report.stop_reason,
            phases = report.phases,
            total_cost = report.total_cost,
            total_iterations = report.total_iterations,
            "Coordinator finished"
        );
        Ok(report)
    }

    /// Poll for runnable groups with bounded exponential backoff.
    async fn await_ready(&self, failed: &HashSet<String>) -> DomainResult<Readiness> {
        let graph = &self.ctx.graph;
        let mut delay = Duration::from_millis(self.settings.stall_poll_interval_ms);
        let mut incomplete = Vec::new();

        for poll in 0..=self.settings.stall_max_polls {
            let ready: Vec<TaskGroup> = graph
                .ready_groups()
                .await
                .into_iter()
                .filter(|g| !failed.contains(&g.group_id))
                .collect();
            if !ready.is_empty() {
                return Ok(Readiness::Ready(ready));
            }

            incomplete = graph.incomplete_groups().await;
            if incomplete.is_empty() {
                return Ok(Readiness::Done);
            }

            if !failed.is_empty() {
                let mut blocked: HashSet<String> = failed.clone();
                for group_id in failed {
                    blocked.extend(graph.dependents_of(group_id).await);
                }
                if incomplete.iter().all(|g| blocked.contains(g)) {
                    return Ok(Readiness::Blocked);
                }
            }

            if poll < self.settings.stall_max_polls {
                debug!(poll, delay_ms = ?delay, "No ready groups yet, backing off");
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(2).min(MAX_STALL_BACKOFF);
            }
        }

        error!(incomplete = ?incomplete, "Task graph stalled");
        Err(DomainError::GraphStall(incomplete))
    }

    /// Start one loop per group under the worker semaphore and join them all.
    ///
    /// Once the global budget is spent no further group is started; loops
    /// already running finish normally.
    async fn run_phase(
        &self,
        groups: &[TaskGroup],
        ledger: &Arc<Mutex<BudgetLedger>>,
    ) -> Vec<TaskResult> {
        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrent_workers.max(1)));
        let mut handles = Vec::with_capacity(groups.len());

        for group in groups {
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };
            if let Some(limit) = ledger.lock().await.exceeded() {
                info!(group_id = %group.group_id, %limit, "Global budget spent, not starting group");
                break;
            }

            let worker = self.worker_config(group);
            let group_id = group.group_id.clone();
            let ctx = self.ctx.clone();
            let ledger = Arc::clone(ledger);
            let status = Arc::clone(&self.status);

            status.write().await.in_flight += 1;
            let handle = tokio::spawn(async move {
                let _permit = permit;
                let worker_id = worker.worker_id.clone();
                let result = match AgentLoop::new(worker, &group_id, ctx).await {
                    Ok(agent) => agent.run().await,
                    Err(err) => {
                        error!(group_id = %group_id, error = %err, "Could not start agent loop");
                        TaskResult::rejected(&group_id, worker_id, err.to_string())
                    }
                };

                let totals = {
                    let mut ledger = ledger.lock().await;
                    ledger.record(result.cost, result.iteration_count);
                    (ledger.cost, ledger.iterations)
                };
                let mut status = status.write().await;
                status.in_flight = status.in_flight.saturating_sub(1);
                status.total_cost = totals.0;
                status.total_iterations = totals.1;
                result
            });
            handles.push((group.group_id.clone(), handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (group_id, handle) in handles {
            match handle.await {
                Ok(result) => results.push(result),
                Err(err) => {
                    error!(group_id = %group_id, error = %err, "Agent task panicked");
                    let mut status = self.status.write().await;
                    status.in_flight = status.in_flight.saturating_sub(1);
                    drop(status);
                    results.push(TaskResult::rejected(
                        &group_id,
                        "unknown",
                        format!("agent task aborted: {err}"),
                    ));
                }
            }
        }
        results
    }

    /// Audit the given groups, at most `max_concurrent_workers` at a time.
    async fn run_audits(&self, group_ids: &[String]) -> Vec<AuditReport> {
        let permits = Semaphore::new(self.settings.max_concurrent_workers.max(1));
        let permits = &permits;
        let audits = group_ids.iter().map(|group_id| async move {
            let _permit = permits.acquire().await.ok()?;
            self.audit_group(group_id).await
        });
        join_all(audits).await.into_iter().flatten().collect()
    }

    /// Groups whose last run succeeded and that no audit has reopened since.
    async fn completed_groups(&self, outcomes: &HashMap<String, GroupOutcome>) -> usize {
        let mut completed = 0;
        for outcome in outcomes.values().filter(|o| o.success) {
            let still_complete = self
                .ctx
                .graph
                .group(&outcome.group_id)
                .await
                .is_some_and(|group| group.is_complete());
            if still_complete {
                completed += 1;
            }
        }
        completed
    }

    async fn audit_group(&self, group_id: &str) -> Option<AuditReport> {
        match AuditLoop::new(group_id, self.ctx.clone(), self.audit.clone()).await {
            Ok(audit) => Some(audit.run().await),
            Err(err) => {
                warn!(group_id, error = %err, "Could not start audit");
                None
            }
        }
    }

    async fn build_report(
        &self,
        stop_reason: StopReason,
        phases: u32,
        mut outcomes: HashMap<String, GroupOutcome>,
        failed: &HashSet<String>,
        ledger: &Arc<Mutex<BudgetLedger>>,
    ) -> CoordinatorReport {
        let graph = &self.ctx.graph;
        let mut groups = Vec::new();

        for group in graph.groups().await {
            let mut outcome = outcomes
                .remove(&group.group_id)
                .unwrap_or_else(|| GroupOutcome::new(&group.group_id));

            let complete = group.is_complete();
            if failed.contains(&group.group_id) {
                outcome.success = false;
            } else if complete {
                outcome.success = true;
                outcome.error = None;
            } else {
                outcome.success = false;
                let blocker = group.dependencies.iter().find(|d| failed.contains(*d));
                outcome.error = Some(match (blocker, outcome.attempts) {
                    (Some(dep), _) => format!("blocked by failed dependency {dep}"),
                    (None, 0) => format!("not started: {stop_reason}"),
                    (None, _) => format!(
                        "{} todo(s) still open: {stop_reason}",
                        group.remaining_count()
                    ),
                });
            }
            groups.push(outcome);
        }

        let ledger = *ledger.lock().await;
        self.sync_totals(&ledger).await;
        CoordinatorReport {
            stop_reason,
            total_cost: ledger.cost,
            total_iterations: ledger.iterations,
            phases,
            groups,
        }
    }

    async fn sync_totals(&self, ledger: &BudgetLedger) {
        let mut status = self.status.write().await;
        status.total_cost = ledger.cost;
        status.total_iterations = ledger.iterations;
    }
}

impl fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("settings", &self.settings)
            .field("audit", &self.audit)
            .finish_non_exhaustive()
    }
}
