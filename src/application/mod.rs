//! Application layer: the agent loop, the audit loop and the coordinator
//! that schedules them over the task graph.

pub mod agent_loop;
pub mod audit_loop;
pub mod conversation;
pub mod coordinator;

pub use agent_loop::AgentLoop;
pub use audit_loop::{parse_verdict, AuditLoop, AuditOutcome, AuditReport, AUDIT_TAG};
pub use conversation::{
    contains_completion_phrase, dispatch_tool_calls, tool_listing, LoopContext, LoopState,
    TOOL_CALL_RULE,
};
pub use coordinator::{
    Coordinator, CoordinatorReport, CoordinatorStatus, GroupOutcome, StopReason,
};
