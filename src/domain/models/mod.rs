//! Domain models for task groups, conversations, workers and configuration.

pub mod audit;
pub mod config;
pub mod documentation;
pub mod event;
pub mod message;
pub mod task_group;
pub mod todo;
pub mod worker;

pub use audit::{AuditStatus, AuditVerdict};
pub use config::{
    AgentConfig, AuditConfig, CacheConfig, Config, CoordinatorConfig, FailurePolicy,
    GatewayConfig, LogFormat, LoggingConfig, RateLimitConfig, RetryConfig, RotationPolicy,
    WorkerTemplate,
};
pub use documentation::DocumentationBundle;
pub use event::SwarmEvent;
pub use message::{
    ChatMessage, ModelRequest, ModelResponse, Role, SamplingParams, ToolCall, ToolSchema, Usage,
};
pub use task_group::TaskGroup;
pub use todo::{Todo, TodoStatus};
pub use worker::{LimitKind, TaskResult, Termination, WorkerConfig};
