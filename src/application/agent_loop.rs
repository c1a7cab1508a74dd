//! Iterative request/tool-call loop that works one task group to completion.

use std::fmt::Write as _;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use super::conversation::{
    contains_completion_phrase, dispatch_tool_calls, push_section, tool_listing, LoopContext,
    LoopState, TOOL_CALL_RULE,
};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    ChatMessage, LimitKind, ModelRequest, Role, SwarmEvent, TaskGroup, TaskResult, Termination,
    WorkerConfig,
};
use crate::domain::ports::PromptRole;
use crate::services::{format_todo_list, todo_tools, ToolSet};

/// One worker bound to one task group.
///
/// Tools are resolved at construction; an unknown allowed tool name fails
/// here rather than mid-run.
pub struct AgentLoop {
    worker: WorkerConfig,
    group: TaskGroup,
    ctx: LoopContext,
    tools: ToolSet,
    state: LoopState,
}

impl AgentLoop {
    pub async fn new(worker: WorkerConfig, group_id: &str, ctx: LoopContext) -> DomainResult<Self> {
        let group = ctx
            .graph
            .group(group_id)
            .await
            .ok_or_else(|| DomainError::GroupNotFound(group_id.to_string()))?;

        let mut tools = ctx.registry.resolve(&worker.allowed_tool_names)?;
        for tool in todo_tools(&ctx.graph, group_id, &worker.worker_id) {
            tools.insert(tool);
        }

        Ok(Self {
            worker,
            group,
            ctx,
            tools,
            state: LoopState::Running,
        })
    }

    pub fn tools(&self) -> &ToolSet {
        &self.tools
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn worker(&self) -> &WorkerConfig {
        &self.worker
    }

    async fn seed_messages(&self) -> Vec<ChatMessage> {
        let mut system = self
            .ctx
            .prompts
            .system_prompt(PromptRole::Agent, &self.group.specialization);
        let _ = write!(
            system,
            "\n\nAvailable tools:\n{}\n{TOOL_CALL_RULE}",
            tool_listing(&self.tools)
        );

        let todos = self
            .ctx
            .graph
            .todos(&self.group.group_id)
            .await
            .unwrap_or_else(|_| self.group.todos.clone());

        let mut user = format!(
            "Task group: {}\n{}\n\n## Todos\n{}",
            self.group.group_id,
            self.group.description,
            format_todo_list(&todos).trim_end()
        );
        if !self.worker.scope_paths.is_empty() {
            let paths: Vec<String> = self
                .worker
                .scope_paths
                .iter()
                .map(|p| format!("- {}", p.display()))
                .collect();
            push_section(&mut user, "Scope", &paths.join("\n"));
        }
        push_section(&mut user, "Requirements", &self.ctx.documentation.requirements_text);
        push_section(&mut user, "Design", &self.ctx.documentation.design_text);

        vec![ChatMessage::system(system), ChatMessage::user(user)]
    }

    /// Drive the loop to a terminal state. Always yields a `TaskResult`.
    #[instrument(skip(self), fields(worker_id = %self.worker.worker_id, group_id = %self.group.group_id))]
    pub async fn run(mut self) -> TaskResult {
        let started = Instant::now();
        let worker_id = self.worker.worker_id.clone();
        let group_id = self.group.group_id.clone();

        self.ctx.events.emit(SwarmEvent::TaskStarted {
            group_id: group_id.clone(),
            worker_id: worker_id.clone(),
        });
        info!(tools = ?self.tools.names(), "Agent loop started");

        let mut messages = self.seed_messages().await;
        let schemas = self.tools.schemas();
        let sampling = self.ctx.sampling();

        let mut cost = 0.0_f64;
        let mut iterations: u32 = 0;
        let mut recorded_errors: Vec<String> = Vec::new();
        let mut final_text: Option<String> = None;
        let mut failure: Option<DomainError> = None;

        let termination = loop {
            if cost >= self.worker.max_cost {
                break Termination::Aborted(LimitKind::Cost);
            }
            if iterations >= self.worker.max_iterations {
                break Termination::Aborted(LimitKind::Iterations);
            }

            self.state = LoopState::AwaitingModel;
            iterations += 1;
            let request = ModelRequest::new(&self.ctx.model, messages.clone())
                .with_tools(schemas.clone())
                .with_sampling(sampling.clone());

            let response = match self.ctx.gateway.call(&request).await {
                Ok(response) => response,
                Err(err) if err.is_fatal() => {
                    error!(error = %err, "Fatal gateway error, aborting loop");
                    failure = Some(err.into());
                    break Termination::Failed;
                }
                Err(err) => {
                    warn!(iteration = iterations, error = %err, "Iteration failed, continuing");
                    recorded_errors.push(err.to_string());
                    self.state = LoopState::Running;
                    continue;
                }
            };

            cost += response.billable_cost();
            self.ctx.events.emit(SwarmEvent::CostDelta {
                worker_id: worker_id.clone(),
                delta: response.billable_cost(),
                total: cost,
            });
            self.ctx.events.emit(SwarmEvent::Message {
                worker_id: worker_id.clone(),
                role: Role::Assistant,
                content: response.content.clone(),
            });
            messages.push(ChatMessage::assistant(
                response.content.clone(),
                response.tool_calls.clone(),
            ));

            if response.has_tool_calls() {
                self.state = LoopState::ToolDispatch;
                let results = dispatch_tool_calls(&self.tools, &response.tool_calls).await;
                messages.extend(results);
                self.state = LoopState::Running;
                continue;
            }

            self.state = LoopState::Running;
            if !contains_completion_phrase(&response.content, &self.ctx.agent.completion_phrases) {
                debug!(iteration = iterations, "No tool calls and no completion claim");
                messages.push(ChatMessage::system(format!("Reminder: {TOOL_CALL_RULE}")));
                continue;
            }

            match self.ctx.graph.todos(&group_id).await {
                Ok(todos) => {
                    let remaining: Vec<_> =
                        todos.iter().filter(|t| !t.status.is_terminal()).cloned().collect();
                    if remaining.is_empty() {
                        final_text = Some(response.content);
                        break Termination::Completed;
                    }
                    debug!(remaining = remaining.len(), "Completion claimed with open todos");
                    messages.push(ChatMessage::system(format!(
                        "You reported completion, but {} todo(s) are still open:\n{}\n\
                         Continue working and update each todo with todo_update.",
                        remaining.len(),
                        format_todo_list(&remaining).trim_end()
                    )));
                }
                Err(err) => {
                    warn!(error = %err, "Todo lookup failed during completion check");
                    recorded_errors.push(err.to_string());
                }
            }
        };

        self.state = match termination {
            Termination::Completed => LoopState::Completed,
            Termination::Failed => LoopState::Failed,
            Termination::Aborted(limit) => LoopState::Aborted(limit),
        };

        let error = match termination {
            Termination::Completed => None,
            Termination::Failed => failure.map(|e| e.to_string()),
            Termination::Aborted(limit) => Some(
                DomainError::BudgetExceeded(format!(
                    "{limit} limit reached for {worker_id} after {iterations} iterations (cost ${cost:.4})"
                ))
                .to_string(),
            ),
        };

        let result = TaskResult {
            task_id: group_id,
            worker_id,
            success: termination == Termination::Completed,
            result: final_text,
            error,
            execution_time: started.elapsed(),
            cost,
            iteration_count: iterations,
            termination,
            recorded_errors,
        };

        info!(
            success = result.success,
            termination = ?result.termination,
            iterations = result.iteration_count,
            cost = result.cost,
            "Agent loop finished"
        );
        self.ctx.events.emit(SwarmEvent::TaskCompleted {
            result: result.clone(),
        });
        result
    }
}

impl std::fmt::Debug for AgentLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentLoop")
            .field("worker_id", &self.worker.worker_id)
            .field("group_id", &self.group.group_id)
            .field("tools", &self.tools)
            .field("state", &self.state)
            .finish()
    }
}
