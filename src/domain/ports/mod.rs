//! Port trait definitions.
//!
//! - `ModelBackend`: the single upstream seam behind the gateway
//! - `Tool`: side-effecting or read-only capabilities offered to agents
//! - `PromptProvider`: opaque role-specific system prompt text

pub mod model_backend;
pub mod prompt_provider;
pub mod tool;

pub use model_backend::ModelBackend;
pub use prompt_provider::{PromptProvider, PromptRole, StaticPrompts};
pub use tool::{Tool, ToolOutput};
