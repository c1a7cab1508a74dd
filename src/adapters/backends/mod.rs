//! Model backend implementations.

pub mod mock;

pub use mock::{Responder, ScriptedBackend};
