//! Prompt provider port.

use std::fmt;

/// Which loop a system prompt is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptRole {
    Planner,
    Agent,
    Auditor,
}

impl fmt::Display for PromptRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Planner => f.write_str("planner"),
            Self::Agent => f.write_str("agent"),
            Self::Auditor => f.write_str("auditor"),
        }
    }
}

/// Source of role-specific system prompt text. The text is opaque here.
pub trait PromptProvider: Send + Sync {
    fn system_prompt(&self, role: PromptRole, specialization: &str) -> String;
}

/// Minimal built-in prompts.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticPrompts;

impl PromptProvider for StaticPrompts {
    fn system_prompt(&self, role: PromptRole, specialization: &str) -> String {
        match role {
            PromptRole::Planner => {
                "You decompose work into task groups with explicit dependencies.".to_string()
            }
            PromptRole::Agent => format!(
                "You are a {specialization} agent. Work through your todo list using tools \
                 and mark each todo completed as you finish it."
            ),
            PromptRole::Auditor => format!(
                "You audit work done by a {specialization} agent. Inspect it with the \
                 read-only tools, then answer with a JSON verdict \
                 {{\"passed\": bool, \"reasons\": [..], \"additional_tasks\": [..]}}."
            ),
        }
    }
}
