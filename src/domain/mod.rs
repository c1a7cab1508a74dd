//! Domain layer for the swarmcore execution core
//!
//! This module contains core models, error types and the port traits that
//! adapters implement.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult, GatewayError};
