//! `swarmcore status`

use anyhow::Result;
use clap::Args;
use comfy_table::{Attribute, Cell, Color};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use super::load_plan;
use crate::cli::output::{base_table, output, supports_color, truncate, CommandOutput};
use crate::domain::models::{Config, TaskGroup, TodoStatus};

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Plan file (.json, .yaml or .yml)
    pub plan: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "waiting_on")]
pub enum GroupState {
    Complete,
    Ready,
    Waiting(Vec<String>),
}

impl GroupState {
    fn label(&self) -> String {
        match self {
            Self::Complete => "complete".to_string(),
            Self::Ready => "ready".to_string(),
            Self::Waiting(deps) => format!("waiting on {}", deps.join(", ")),
        }
    }

    const fn color(&self) -> Color {
        match self {
            Self::Complete => Color::Green,
            Self::Ready => Color::Cyan,
            Self::Waiting(_) => Color::Yellow,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GroupRow {
    pub group_id: String,
    pub specialization: String,
    pub description: String,
    pub dependencies: Vec<String>,
    pub completed: usize,
    pub cancelled: usize,
    pub total: usize,
    pub state: GroupState,
    pub worker_id: String,
    pub max_cost: f64,
    pub max_iterations: u32,
}

#[derive(Debug, Serialize)]
pub struct StatusOutput {
    pub groups: Vec<GroupRow>,
}

impl CommandOutput for StatusOutput {
    fn to_human(&self) -> String {
        if self.groups.is_empty() {
            return "Plan has no groups.".to_string();
        }

        let use_colors = supports_color();
        let mut table = base_table();
        table.set_header(
            ["Group", "Specialization", "Description", "Todos", "State", "Budget"]
                .into_iter()
                .map(|h| Cell::new(h).add_attribute(Attribute::Bold)),
        );

        for row in &self.groups {
            let todos = if row.cancelled > 0 {
                format!("{}/{} ({} cancelled)", row.completed, row.total, row.cancelled)
            } else {
                format!("{}/{}", row.completed, row.total)
            };
            let state = if use_colors {
                Cell::new(row.state.label()).fg(row.state.color())
            } else {
                Cell::new(row.state.label())
            };
            table.add_row(vec![
                Cell::new(&row.group_id),
                Cell::new(&row.specialization),
                Cell::new(truncate(&row.description, 40)),
                Cell::new(todos),
                state,
                Cell::new(format!("${:.2} / {} calls", row.max_cost, row.max_iterations)),
            ]);
        }
        table.to_string()
    }
}

fn group_state(group: &TaskGroup, ready: &HashSet<String>, all: &HashMap<String, TaskGroup>) -> GroupState {
    if group.is_complete() {
        return GroupState::Complete;
    }
    if ready.contains(&group.group_id) {
        return GroupState::Ready;
    }
    let waiting = group
        .dependencies
        .iter()
        .filter(|dep| all.get(*dep).is_none_or(|d| !d.satisfies_dependents()))
        .cloned()
        .collect();
    GroupState::Waiting(waiting)
}

pub async fn execute(args: StatusArgs, config: &Config, json_mode: bool) -> Result<()> {
    let graph = load_plan(&args.plan).await?;
    let groups = graph.groups().await;
    let ready: HashSet<String> = graph
        .ready_groups()
        .await
        .into_iter()
        .map(|g| g.group_id)
        .collect();
    let by_id: HashMap<String, TaskGroup> = groups
        .iter()
        .map(|g| (g.group_id.clone(), g.clone()))
        .collect();

    let rows = groups
        .iter()
        .map(|group| {
            let template = config.worker_template(&group.specialization);
            GroupRow {
                group_id: group.group_id.clone(),
                specialization: group.specialization.clone(),
                description: group.description.clone(),
                dependencies: group.dependencies.iter().cloned().collect(),
                completed: group.count_with_status(TodoStatus::Completed),
                cancelled: group.count_with_status(TodoStatus::Cancelled),
                total: group.todos.len(),
                state: group_state(group, &ready, &by_id),
                worker_id: group.worker_id(),
                max_cost: template.max_cost,
                max_iterations: template.max_iterations,
            }
        })
        .collect();

    output(&StatusOutput { groups: rows }, json_mode);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Todo;

    #[test]
    fn test_group_state() {
        let mut done = TaskGroup::new("a", "dev", "");
        done.todos.push(Todo::new("x").with_status(TodoStatus::Completed));
        let mut cancelled = TaskGroup::new("c", "dev", "");
        cancelled.todos.push(Todo::new("y").with_status(TodoStatus::Cancelled));
        let mut b = TaskGroup::new("b", "dev", "").with_dependency("a").with_dependency("c");
        b.todos.push(Todo::new("z"));

        let all: HashMap<String, TaskGroup> = [done.clone(), cancelled, b.clone()]
            .into_iter()
            .map(|g| (g.group_id.clone(), g))
            .collect();

        assert_eq!(group_state(&done, &HashSet::new(), &all), GroupState::Complete);
        assert_eq!(
            group_state(&b, &HashSet::new(), &all),
            GroupState::Waiting(vec!["c".to_string()])
        );
        let ready = HashSet::from(["b".to_string()]);
        assert_eq!(group_state(&b, &ready, &all), GroupState::Ready);
    }
}
