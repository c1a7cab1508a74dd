//! CLI command implementations.

pub mod ready;
pub mod status;
pub mod validate;

use anyhow::{Context, Result};
use std::path::Path;

use crate::infrastructure::PlanStore;
use crate::services::TaskGraph;

/// Load and validate a plan file into a task graph.
pub(crate) async fn load_plan(path: &Path) -> Result<TaskGraph> {
    let store = PlanStore::new(path)
        .with_context(|| format!("Unsupported plan file: {}", path.display()))?;
    store
        .load_graph()
        .await
        .with_context(|| format!("Failed to load plan from {}", path.display()))
}
