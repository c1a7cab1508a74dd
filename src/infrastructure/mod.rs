//! Infrastructure layer module
//!
//! - Request gateway (rate limiting, retry, response cache)
//! - Configuration management
//! - Logging infrastructure
//! - Plan file persistence

pub mod config;
pub mod gateway;
pub mod logging;
pub mod plan_store;

pub use plan_store::{PlanFormat, PlanStore};
