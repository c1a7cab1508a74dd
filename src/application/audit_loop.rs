//! Read-only verification pass over a completed task group.
//!
//! A failing verdict reopens the group by appending new pending todos.

use serde_json::Value;
use std::fmt::Write as _;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::conversation::{dispatch_tool_calls, push_section, tool_listing, LoopContext};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    AuditConfig, AuditStatus, AuditVerdict, ChatMessage, ModelRequest, SwarmEvent, TaskGroup,
    Todo,
};
use crate::domain::ports::PromptRole;
use crate::services::{format_todo_list, TodoListTool, ToolSet};

/// Tag placed on todos created from a failing verdict.
pub const AUDIT_TAG: &str = "audit";

const VERDICT_REMINDER: &str = "Finish with a verdict: a JSON object \
    {\"passed\": true|false, \"reasons\": [...], \"additional_tasks\": [...]} \
    or the lines VERDICT: PASS|FAIL, REASONS:, TASKS:.";

/// How an audit ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditOutcome {
    Passed,
    Failed,
    /// No verdict before a ceiling or a fatal error. Needs review.
    Inconclusive { reason: String },
}

impl AuditOutcome {
    pub fn status(&self) -> AuditStatus {
        match self {
            Self::Passed => AuditStatus::Passed,
            Self::Failed => AuditStatus::Failed,
            Self::Inconclusive { .. } => AuditStatus::Inconclusive,
        }
    }
}

/// Result of one audit run.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditReport {
    pub group_id: String,
    pub outcome: AuditOutcome,
    pub verdict: Option<AuditVerdict>,
    pub iterations: u32,
    pub cost: f64,
    pub new_todo_ids: Vec<Uuid>,
}

impl AuditReport {
    /// The inconclusive case as a typed soft error.
    pub fn inconclusive_error(&self) -> Option<DomainError> {
        match &self.outcome {
            AuditOutcome::Inconclusive { reason } => Some(DomainError::AuditInconclusive {
                group_id: self.group_id.clone(),
                reason: reason.clone(),
            }),
            _ => None,
        }
    }
}

/// Auditor bound to one group, restricted to read-only tools.
pub struct AuditLoop {
    group: TaskGroup,
    ctx: LoopContext,
    config: AuditConfig,
    tools: ToolSet,
}

impl AuditLoop {
    pub async fn new(group_id: &str, ctx: LoopContext, config: AuditConfig) -> DomainResult<Self> {
        let group = ctx
            .graph
            .group(group_id)
            .await
            .ok_or_else(|| DomainError::GroupNotFound(group_id.to_string()))?;

        let mut tools = ctx.registry.read_only();
        tools.insert(std::sync::Arc::new(TodoListTool::new(
            std::sync::Arc::clone(&ctx.graph),
            group_id,
        )));

        Ok(Self {
            group,
            ctx,
            config,
            tools,
        })
    }

    pub fn tools(&self) -> &ToolSet {
        &self.tools
    }

    async fn seed_messages(&self) -> Vec<ChatMessage> {
        let mut system = self
            .ctx
            .prompts
            .system_prompt(PromptRole::Auditor, &self.group.specialization);
        let _ = write!(
            system,
            "\n\nAvailable read-only tools:\n{}\n{VERDICT_REMINDER}",
            tool_listing(&self.tools)
        );

        let todos = self
            .ctx
            .graph
            .todos(&self.group.group_id)
            .await
            .unwrap_or_else(|_| self.group.todos.clone());
        let mut user = format!(
            "Audit task group: {}\n{}\n\n## Todos\n{}",
            self.group.group_id,
            self.group.description,
            format_todo_list(&todos).trim_end()
        );
        push_section(&mut user, "Requirements", &self.ctx.documentation.requirements_text);
        push_section(&mut user, "Design", &self.ctx.documentation.design_text);

        vec![ChatMessage::system(system), ChatMessage::user(user)]
    }

    #[instrument(skip(self), fields(group_id = %self.group.group_id))]
    pub async fn run(self) -> AuditReport {
        let group_id = self.group.group_id.clone();
        let auditor_id = format!("auditor-{group_id}");
        let mut messages = self.seed_messages().await;
        let schemas = self.tools.schemas();
        let sampling = self.ctx.sampling();

        let mut cost = 0.0_f64;
        let mut iterations: u32 = 0;

        let (outcome, verdict) = loop {
            if iterations >= self.config.max_iterations {
                break (inconclusive("iteration ceiling reached without a verdict"), None);
            }
            if cost >= self.config.max_cost {
                break (inconclusive("cost ceiling reached without a verdict"), None);
            }

            iterations += 1;
            let request = ModelRequest::new(&self.ctx.model, messages.clone())
                .with_tools(schemas.clone())
                .with_sampling(sampling.clone());

            let response = match self.ctx.gateway.call(&request).await {
                Ok(response) => response,
                Err(err) if err.is_fatal() => {
                    break (inconclusive(&format!("fatal gateway error: {err}")), None);
                }
                Err(err) => {
                    warn!(error = %err, "Audit iteration failed, continuing");
                    continue;
                }
            };

            cost += response.billable_cost();
            self.ctx.events.emit(SwarmEvent::CostDelta {
                worker_id: auditor_id.clone(),
                delta: response.billable_cost(),
                total: cost,
            });
            messages.push(ChatMessage::assistant(
                response.content.clone(),
                response.tool_calls.clone(),
            ));

            if response.has_tool_calls() {
                let results = dispatch_tool_calls(&self.tools, &response.tool_calls).await;
                messages.extend(results);
                continue;
            }

            match parse_verdict(&response.content) {
                Some(verdict) if verdict.passed => break (AuditOutcome::Passed, Some(verdict)),
                Some(verdict) => break (AuditOutcome::Failed, Some(verdict)),
                None => messages.push(ChatMessage::system(VERDICT_REMINDER)),
            }
        };

        let mut new_todo_ids = Vec::new();
        if let (AuditOutcome::Failed, Some(verdict)) = (&outcome, &verdict) {
            for title in follow_up_titles(verdict) {
                let todo = Todo::new(title).with_tag(AUDIT_TAG);
                match self.ctx.graph.add_todo_with(&group_id, todo).await {
                    Ok(id) => new_todo_ids.push(id),
                    Err(err) => warn!(error = %err, "Failed to add audit follow-up todo"),
                }
            }
        }

        info!(
            outcome = %outcome.status(),
            iterations,
            cost,
            new_todos = new_todo_ids.len(),
            "Audit finished"
        );
        self.ctx.events.emit(SwarmEvent::AuditCompleted {
            group_id: group_id.clone(),
            status: outcome.status(),
            new_todos: new_todo_ids.len(),
        });

        AuditReport {
            group_id,
            outcome,
            verdict,
            iterations,
            cost,
            new_todo_ids,
        }
    }
}

fn inconclusive(reason: &str) -> AuditOutcome {
    AuditOutcome::Inconclusive {
        reason: reason.to_string(),
    }
}

/// Todos to open for a failing verdict. A failure without tasks still
/// reopens the group with one todo built from the reasons.
fn follow_up_titles(verdict: &AuditVerdict) -> Vec<String> {
    let tasks: Vec<String> = verdict
        .additional_tasks
        .iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    if !tasks.is_empty() {
        return tasks;
    }
    let reasons = if verdict.reasons.is_empty() {
        "no reasons given".to_string()
    } else {
        verdict.reasons.join("; ")
    };
    vec![format!("Address audit findings: {reasons}")]
}

/// Extract a verdict from a reply.
///
/// Accepts a JSON object with a boolean `passed` anywhere in the text, or
/// free text with a `VERDICT: PASS|FAIL` line and optional `REASONS:` and
/// `TASKS:` bullet lists.
pub fn parse_verdict(text: &str) -> Option<AuditVerdict> {
    parse_json_verdict(text).or_else(|| parse_text_verdict(text))
}

fn parse_json_verdict(text: &str) -> Option<AuditVerdict> {
    for (start, _) in text.match_indices('{') {
        let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        let Some(Ok(value)) = stream.next() else {
            continue;
        };
        if value.get("passed").is_some_and(Value::is_boolean) {
            if let Ok(verdict) = serde_json::from_value::<AuditVerdict>(value) {
                return Some(verdict);
            }
        }
    }
    None
}

#[derive(Clone, Copy)]
enum Section {
    None,
    Reasons,
    Tasks,
}

fn parse_text_verdict(text: &str) -> Option<AuditVerdict> {
    let mut passed: Option<bool> = None;
    let mut reasons = Vec::new();
    let mut tasks = Vec::new();
    let mut section = Section::None;

    for raw in text.lines() {
        let line = raw.trim();
        let upper = line.to_uppercase();

        if let Some(rest) = strip_label(line, &upper, "VERDICT:") {
            let value = rest.trim().to_uppercase();
            if value.starts_with("PASS") {
                passed = Some(true);
            } else if value.starts_with("FAIL") {
                passed = Some(false);
            }
            section = Section::None;
            continue;
        }
        if let Some(rest) = strip_label(line, &upper, "REASONS:") {
            section = Section::Reasons;
            push_item(&mut reasons, rest);
            continue;
        }
        if let Some(rest) = strip_label(line, &upper, "TASKS:") {
            section = Section::Tasks;
            push_item(&mut tasks, rest);
            continue;
        }

        match (bullet_item(line), section) {
            (Some(item), Section::Reasons) => push_item(&mut reasons, item),
            (Some(item), Section::Tasks) => push_item(&mut tasks, item),
            (Some(_), Section::None) => {}
            (None, _) if line.is_empty() => {}
            (None, _) => section = Section::None,
        }
    }

    passed.map(|passed| AuditVerdict {
        passed,
        reasons,
        additional_tasks: tasks,
    })
}

fn strip_label<'a>(line: &'a str, upper: &str, label: &str) -> Option<&'a str> {
    upper
        .starts_with(label)
        .then(|| line.get(label.len()..).unwrap_or_default())
}

fn bullet_item(line: &str) -> Option<&str> {
    if let Some(rest) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
        return Some(rest);
    }
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        let rest = &line[digits..];
        return rest
            .strip_prefix(". ")
            .or_else(|| rest.strip_prefix(") "));
    }
    None
}

fn push_item(items: &mut Vec<String>, item: &str) {
    let item = item.trim();
    if !item.is_empty() && !item.eq_ignore_ascii_case("none") {
        items.push(item.to_string());
    }
}
