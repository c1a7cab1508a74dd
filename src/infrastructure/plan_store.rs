//! File persistence for graph snapshots.

use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::services::task_graph::{GraphSnapshot, TaskGraph};

/// On-disk encoding, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanFormat {
    Json,
    Yaml,
}

impl PlanFormat {
    pub fn from_path(path: &Path) -> DomainResult<Self> {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("json") => Ok(Self::Json),
            Some("yaml" | "yml") => Ok(Self::Yaml),
            _ => Err(DomainError::Configuration(format!(
                "unsupported plan file extension: {} (expected .json, .yaml or .yml)",
                path.display()
            ))),
        }
    }
}

/// Reads and writes a `GraphSnapshot` at a fixed path.
#[derive(Debug, Clone)]
pub struct PlanStore {
    path: PathBuf,
    format: PlanFormat,
}

impl PlanStore {
    pub fn new(path: impl Into<PathBuf>) -> DomainResult<Self> {
        let path = path.into();
        let format = PlanFormat::from_path(&path)?;
        Ok(Self { path, format })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> PlanFormat {
        self.format
    }

    pub async fn load(&self) -> DomainResult<GraphSnapshot> {
        let text = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            DomainError::Io(format!("failed to read {}: {e}", self.path.display()))
        })?;
        let snapshot = match self.format {
            PlanFormat::Json => serde_json::from_str(&text)?,
            PlanFormat::Yaml => serde_yaml::from_str(&text)?,
        };
        Ok(snapshot)
    }

    /// Load and validate into a live graph.
    pub async fn load_graph(&self) -> DomainResult<TaskGraph> {
        TaskGraph::from_snapshot(self.load().await?)
    }

    /// Write via a sibling temp file and rename, so readers never see a partial file.
    pub async fn save(&self, snapshot: &GraphSnapshot) -> DomainResult<()> {
        let text = match self.format {
            PlanFormat::Json => serde_json::to_string_pretty(snapshot)?,
            PlanFormat::Yaml => serde_yaml::to_string(snapshot)?,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let file_name = self
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("plan");
        let tmp = self
            .path
            .with_file_name(format!(".{file_name}.{}.tmp", Uuid::new_v4().simple()));

        tokio::fs::write(&tmp, text).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        debug!(path = %self.path.display(), groups = snapshot.groups.len(), "Saved plan");
        Ok(())
    }

    pub async fn save_graph(&self, graph: &TaskGraph) -> DomainResult<()> {
        self.save(&graph.snapshot().await).await
    }
}
