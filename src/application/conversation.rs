//! Conversation primitives shared by the agent and audit loops.

use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::models::{
    AgentConfig, ChatMessage, DocumentationBundle, SamplingParams, ToolCall,
};
use crate::domain::ports::{PromptProvider, StaticPrompts};
use crate::infrastructure::gateway::Gateway;
use crate::services::{EventSink, TaskGraph, ToolRegistry, ToolSet};

/// Rule restated in every system prompt and in reminders.
pub const TOOL_CALL_RULE: &str =
    "Every turn must include at least one tool call. When all of your todos are completed, \
     reply without tool calls and state that the task is complete.";

/// Where a loop is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    AwaitingModel,
    ToolDispatch,
    Completed,
    Failed,
    Aborted(crate::domain::models::LimitKind),
}

impl LoopState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Aborted(_))
    }
}

/// Collaborators handed to every loop the coordinator starts.
#[derive(Clone)]
pub struct LoopContext {
    pub gateway: Arc<Gateway>,
    pub graph: Arc<TaskGraph>,
    pub registry: Arc<ToolRegistry>,
    pub prompts: Arc<dyn PromptProvider>,
    pub documentation: DocumentationBundle,
    pub model: String,
    pub agent: AgentConfig,
    pub events: EventSink,
}

impl LoopContext {
    pub fn new(gateway: Arc<Gateway>, graph: Arc<TaskGraph>, model: impl Into<String>) -> Self {
        Self {
            gateway,
            graph,
            registry: Arc::new(ToolRegistry::new()),
            prompts: Arc::new(StaticPrompts),
            documentation: DocumentationBundle::default(),
            model: model.into(),
            agent: AgentConfig::default(),
            events: EventSink::disabled(),
        }
    }

    pub fn with_registry(mut self, registry: ToolRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    pub fn with_prompts(mut self, prompts: Arc<dyn PromptProvider>) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_documentation(mut self, documentation: DocumentationBundle) -> Self {
        self.documentation = documentation;
        self
    }

    pub fn with_agent_config(mut self, agent: AgentConfig) -> Self {
        self.agent = agent;
        self
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    pub fn sampling(&self) -> SamplingParams {
        SamplingParams {
            temperature: self.agent.temperature,
            max_tokens: self.agent.max_tokens,
            top_p: None,
        }
    }
}

impl std::fmt::Debug for LoopContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopContext")
            .field("model", &self.model)
            .field("gateway", &self.gateway)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

/// `- name: description` per tool.
pub fn tool_listing(tools: &ToolSet) -> String {
    let mut out = String::new();
    for schema in tools.schemas() {
        let _ = writeln!(out, "- {}: {}", schema.name, schema.description);
    }
    out
}

/// Run each call in order and return one tool-result message per call.
///
/// Unknown names and tool failures come back as error results; nothing is raised.
pub async fn dispatch_tool_calls(tools: &ToolSet, calls: &[ToolCall]) -> Vec<ChatMessage> {
    let mut results = Vec::with_capacity(calls.len());
    for call in calls {
        let Some(tool) = tools.get(&call.name) else {
            warn!(tool = %call.name, "Model requested unknown tool");
            results.push(ChatMessage::tool_result(
                &call.id,
                format!(
                    "Error: unknown tool '{}'. Available tools: {}",
                    call.name,
                    tools.names().join(", ")
                ),
                true,
            ));
            continue;
        };

        let output = tool.run(call.arguments.clone()).await;
        debug!(tool = %call.name, success = output.success, "Tool call finished");
        results.push(ChatMessage::tool_result(&call.id, output.render(), !output.success));
    }
    results
}

/// Case-insensitive substring match against the configured phrases.
pub fn contains_completion_phrase<S: AsRef<str>>(text: &str, phrases: &[S]) -> bool {
    let lower = text.to_lowercase();
    phrases
        .iter()
        .any(|phrase| lower.contains(&phrase.as_ref().to_lowercase()))
}

/// Append a labelled documentation section when the text is non-empty.
pub(crate) fn push_section(out: &mut String, title: &str, body: &str) {
    let body = body.trim();
    if body.is_empty() {
        return;
    }
    let _ = write!(out, "\n\n## {title}\n{body}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{Tool, ToolOutput};
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo the input"
        }

        fn input_schema(&self) -> Value {
            json!({"type": "object"})
        }

        async fn run(&self, arguments: Value) -> ToolOutput {
            if arguments.get("fail").is_some() {
                ToolOutput::err("asked to fail")
            } else {
                ToolOutput::ok(arguments)
            }
        }
    }

    fn tools() -> ToolSet {
        let mut set = ToolSet::default();
        set.insert(Arc::new(Echo));
        set
    }

    #[tokio::test]
    async fn test_dispatch_unknown_and_failing_tools() {
        let calls = vec![
            ToolCall::new("1", "echo", json!({"x": 1})),
            ToolCall::new("2", "rm_rf", json!({})),
            ToolCall::new("3", "echo", json!({"fail": true})),
        ];
        let results = dispatch_tool_calls(&tools(), &calls).await;

        assert_eq!(results.len(), 3);
        assert!(!results[0].is_error);
        assert!(results[1].is_error);
        assert!(results[1].content.contains("unknown tool 'rm_rf'"));
        assert!(results[2].is_error);
        assert_eq!(results[2].tool_call_id.as_deref(), Some("3"));
    }

    #[test]
    fn test_completion_phrase_is_case_insensitive() {
        let phrases = ["task complete"];
        assert!(contains_completion_phrase("All done. TASK COMPLETE.", &phrases));
        assert!(!contains_completion_phrase("still working", &phrases));
    }

    #[test]
    fn test_tool_listing() {
        assert_eq!(tool_listing(&tools()), "- echo: Echo the input\n");
    }
}
