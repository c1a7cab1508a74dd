//! Typed monitoring events.

use serde::{Deserialize, Serialize};

use super::audit::AuditStatus;
use super::message::Role;
use super::worker::TaskResult;

/// Event emitted by loops and the coordinator. Delivery is fire-and-forget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SwarmEvent {
    PhaseStarted {
        phase: u32,
        groups: Vec<String>,
    },
    TaskStarted {
        group_id: String,
        worker_id: String,
    },
    Message {
        worker_id: String,
        role: Role,
        content: String,
    },
    CostDelta {
        worker_id: String,
        delta: f64,
        total: f64,
    },
    TaskCompleted {
        result: TaskResult,
    },
    AuditCompleted {
        group_id: String,
        status: AuditStatus,
        new_todos: usize,
    },
    PhaseCompleted {
        phase: u32,
        succeeded: usize,
        failed: usize,
    },
}
