//! Adapters for external systems.

pub mod backends;
