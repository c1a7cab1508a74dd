//! Model backend port - interface for upstream model providers.

use async_trait::async_trait;

use crate::domain::errors::GatewayError;
use crate::domain::models::{ModelRequest, ModelResponse};

/// A request/response model provider.
///
/// Implementations translate the provider-neutral request into their wire
/// format and classify failures into `GatewayError` variants so the gateway
/// knows which ones to retry.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Short backend name used in logs.
    fn name(&self) -> &'static str;

    /// Issue one upstream call. No retries, caching or rate limiting here.
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse, GatewayError>;
}
