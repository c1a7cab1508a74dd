//! Service layer: task graph, dependency resolution, tools, pricing, events.

pub mod dependency_resolver;
pub mod event_sink;
pub mod pricing;
pub mod task_graph;
pub mod todo_tools;
pub mod tool_registry;

pub use dependency_resolver::DependencyResolver;
pub use event_sink::EventSink;
pub use pricing::{estimate_cost, get_model_pricing, ModelPricing};
pub use task_graph::{GraphSnapshot, TaskGraph};
pub use todo_tools::{format_todo_list, todo_tools, TodoListTool};
pub use tool_registry::{ToolRegistry, ToolSet};
