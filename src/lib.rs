//! swarmcore - task-execution core for agent swarms
//!
//! Groups of todos with dependencies between them are executed by agent
//! loops that talk to a language model through a shared, rate-limited
//! gateway. Completed groups are audited; failed audits reopen the group
//! with follow-up todos.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, errors and port traits
//! - **Application Layer** (`application`): agent loop, audit loop, coordinator
//! - **Service Layer** (`services`): task graph, dependency resolution, tools
//! - **Infrastructure Layer** (`infrastructure`): gateway, config, logging, plan files
//! - **Adapters** (`adapters`): model backends
//! - **CLI Layer** (`cli`): plan inspection commands
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use swarmcore::{Config, Coordinator, Gateway, LoopContext, RateLimiter, TaskGraph};
//!
//! async fn run(backend: Arc<dyn swarmcore::ModelBackend>, config: &Config) -> anyhow::Result<()> {
//!     let limiter = Arc::new(RateLimiter::from_config(&config.gateway.rate_limit));
//!     let gateway = Arc::new(Gateway::from_config(backend, limiter, &config.gateway));
//!     let graph = Arc::new(TaskGraph::new());
//!     graph.create_group("api", "backend", "Build the API", Vec::<String>::new()).await?;
//!     graph.add_todo("api", "Define routes").await?;
//!
//!     let ctx = LoopContext::new(gateway, graph, config.default_model.clone());
//!     let report = Coordinator::new(ctx, config).run().await?;
//!     println!("{}", report.stop_reason);
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use adapters::backends::ScriptedBackend;
pub use application::{
    AgentLoop, AuditLoop, AuditOutcome, AuditReport, Coordinator, CoordinatorReport,
    CoordinatorStatus, GroupOutcome, LoopContext, LoopState, StopReason,
};
pub use domain::models::{
    AuditStatus, AuditVerdict, ChatMessage, Config, DocumentationBundle, FailurePolicy,
    LimitKind, ModelRequest, ModelResponse, Role, SwarmEvent, TaskGroup, TaskResult, Todo,
    TodoStatus, ToolCall, Usage, WorkerConfig,
};
pub use domain::ports::{ModelBackend, PromptProvider, PromptRole, StaticPrompts, Tool, ToolOutput};
pub use domain::{DomainError, DomainResult, GatewayError};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use infrastructure::gateway::{Gateway, GatewayStats, RateLimiter, RetryPolicy};
pub use infrastructure::{PlanFormat, PlanStore};
pub use services::{DependencyResolver, EventSink, GraphSnapshot, TaskGraph, ToolRegistry};
