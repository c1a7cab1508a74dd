//! Tool registry and per-loop resolved tool sets.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::warn;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::ToolSchema;
use crate::domain::ports::Tool;

/// All tools known to the process, by name.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if name.is_empty() || name.chars().any(char::is_control) {
            warn!(len = name.len(), "tool registry: rejecting tool with invalid name");
            return;
        }
        if self.tools.contains_key(&name) {
            warn!("tool registry: overwriting duplicate tool '{}'", name);
        }
        self.tools.insert(name, tool);
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Returns a sorted list of all registered tool names.
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Look up every allowed name. Unknown names are a configuration error.
    pub fn resolve<S: AsRef<str>>(&self, allowed: &[S]) -> DomainResult<ToolSet> {
        let mut set = ToolSet::default();
        for name in allowed {
            let name = name.as_ref();
            let tool = self.get(name).ok_or_else(|| {
                DomainError::Configuration(format!("unknown tool in allowed_tool_names: {name}"))
            })?;
            set.insert(tool);
        }
        Ok(set)
    }

    /// Every registered tool that reports itself read-only.
    pub fn read_only(&self) -> ToolSet {
        let mut set = ToolSet::default();
        for tool in self.tools.values().filter(|t| t.read_only()) {
            set.insert(Arc::clone(tool));
        }
        set
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tool_names())
            .finish()
    }
}

/// Name-to-tool map resolved once for a single loop.
#[derive(Default, Clone)]
pub struct ToolSet {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolSet {
    pub fn insert(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Schemas sorted by tool name.
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools.values().map(|t| t.schema()).collect()
    }

    pub fn all_read_only(&self) -> bool {
        self.tools.values().all(|t| t.read_only())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.tools.keys()).finish()
    }
}
