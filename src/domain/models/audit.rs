//! Audit verdict models.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Structured verdict emitted by the auditor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditVerdict {
    pub passed: bool,
    #[serde(default)]
    pub reasons: Vec<String>,
    #[serde(default)]
    pub additional_tasks: Vec<String>,
}

impl AuditVerdict {
    pub fn pass() -> Self {
        Self {
            passed: true,
            ..Default::default()
        }
    }

    pub fn fail<I, S>(additional_tasks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            passed: false,
            reasons: Vec::new(),
            additional_tasks: additional_tasks.into_iter().map(Into::into).collect(),
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reasons.push(reason.into());
        self
    }
}

/// Coarse audit outcome, used in events and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    Passed,
    Failed,
    /// No verdict before the ceiling. Needs review; not a failure.
    Inconclusive,
}

impl fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => f.write_str("passed"),
            Self::Failed => f.write_str("failed"),
            Self::Inconclusive => f.write_str("inconclusive"),
        }
    }
}
