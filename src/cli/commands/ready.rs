//! `swarmcore ready`

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

use super::load_plan;
use crate::cli::output::{output, CommandOutput};

#[derive(Args, Debug)]
pub struct ReadyArgs {
    /// Plan file (.json, .yaml or .yml)
    pub plan: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct ReadyOutput {
    pub ready: Vec<String>,
    pub incomplete: Vec<String>,
    /// Incomplete groups with no ready group, which the coordinator reports as a stall
    pub stalled: bool,
}

impl CommandOutput for ReadyOutput {
    fn to_human(&self) -> String {
        if self.incomplete.is_empty() {
            return "All groups are complete.".to_string();
        }
        if self.stalled {
            return format!(
                "No group can start; blocked: {}",
                self.incomplete.join(", ")
            );
        }
        self.ready.join("\n")
    }
}

pub async fn execute(args: ReadyArgs, json_mode: bool) -> Result<()> {
    let graph = load_plan(&args.plan).await?;
    let ready: Vec<String> = graph
        .ready_groups()
        .await
        .into_iter()
        .map(|g| g.group_id)
        .collect();
    let incomplete = graph.incomplete_groups().await;

    let result = ReadyOutput {
        stalled: ready.is_empty() && !incomplete.is_empty(),
        ready,
        incomplete,
    };
    output(&result, json_mode);
    Ok(())
}
