//! `swarmcore validate`

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::load_plan;
use crate::cli::output::{output, CommandOutput};
use crate::services::DependencyResolver;

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Plan file (.json, .yaml or .yml)
    pub plan: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct ValidateOutput {
    pub plan: String,
    pub groups: usize,
    pub todos: usize,
    /// Group ids in an order that respects every dependency
    pub order: Vec<String>,
    pub depths: BTreeMap<String, u32>,
}

impl CommandOutput for ValidateOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![format!(
            "Plan {} is valid: {} group(s), {} todo(s)",
            self.plan, self.groups, self.todos
        )];
        if !self.order.is_empty() {
            lines.push(String::new());
            lines.push("Execution order:".to_string());
            for (i, group_id) in self.order.iter().enumerate() {
                let depth = self.depths.get(group_id).copied().unwrap_or_default();
                lines.push(format!("  {}. {group_id} (depth {depth})", i + 1));
            }
        }
        lines.join("\n")
    }
}

pub async fn execute(args: ValidateArgs, json_mode: bool) -> Result<()> {
    let graph = load_plan(&args.plan).await?;
    let groups = graph.groups().await;
    let resolver = DependencyResolver::new();

    let result = ValidateOutput {
        plan: args.plan.display().to_string(),
        groups: groups.len(),
        todos: groups.iter().map(|g| g.todos.len()).sum(),
        order: resolver.topological_order(&groups)?,
        depths: resolver.depths(&groups)?,
    };

    output(&result, json_mode);
    Ok(())
}
