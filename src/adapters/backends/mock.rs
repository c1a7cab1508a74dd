//! Scripted model backend for tests and dry runs.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

use crate::domain::errors::GatewayError;
use crate::domain::models::{ModelRequest, ModelResponse};
use crate::domain::ports::ModelBackend;

/// Computes a reply from the request when the script is empty.
pub type Responder =
    Arc<dyn Fn(&ModelRequest) -> Result<ModelResponse, GatewayError> + Send + Sync>;

/// Deterministic in-process backend.
///
/// Replies come from, in order: the queued script, the responder closure,
/// then the fallback response.
pub struct ScriptedBackend {
    script: Mutex<VecDeque<Result<ModelResponse, GatewayError>>>,
    responder: Option<Responder>,
    fallback: ModelResponse,
    latency: Option<Duration>,
    calls: AtomicU32,
    requests: RwLock<Vec<ModelRequest>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            responder: None,
            fallback: ModelResponse::text("Mock response."),
            latency: None,
            calls: AtomicU32::new(0),
            requests: RwLock::new(Vec::new()),
        }
    }

    /// Backend that answers every call from `responder`.
    pub fn from_fn<F>(responder: F) -> Self
    where
        F: Fn(&ModelRequest) -> Result<ModelResponse, GatewayError> + Send + Sync + 'static,
    {
        Self {
            responder: Some(Arc::new(responder)),
            ..Self::new()
        }
    }

    /// Backend that always fails with `error`.
    pub fn failing(error: GatewayError) -> Self {
        Self::from_fn(move |_| Err(error.clone()))
    }

    pub fn with_script<I>(self, outcomes: I) -> Self
    where
        I: IntoIterator<Item = Result<ModelResponse, GatewayError>>,
    {
        Self {
            script: Mutex::new(outcomes.into_iter().collect()),
            ..self
        }
    }

    pub fn with_fallback(mut self, response: ModelResponse) -> Self {
        self.fallback = response;
        self
    }

    /// Simulated upstream latency per call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Queue one more outcome at the end of the script.
    pub async fn push(&self, outcome: Result<ModelResponse, GatewayError>) {
        self.script.lock().await.push_back(outcome);
    }

    /// Number of upstream calls received.
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every request received, in arrival order.
    pub async fn requests(&self) -> Vec<ModelRequest> {
        self.requests.read().await.clone()
    }
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.write().await.push(request.clone());

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if let Some(outcome) = self.script.lock().await.pop_front() {
            return outcome;
        }
        match &self.responder {
            Some(responder) => responder(request),
            None => Ok(self.fallback.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ChatMessage;

    fn request() -> ModelRequest {
        ModelRequest::new("test-model", vec![ChatMessage::user("hi")])
    }

    #[tokio::test]
    async fn test_script_then_fallback() {
        let backend = ScriptedBackend::new()
            .with_script([Err(GatewayError::Throttled("429".into()))])
            .with_fallback(ModelResponse::text("done"));

        assert!(backend.complete(&request()).await.is_err());
        let response = backend.complete(&request()).await.unwrap();
        assert_eq!(response.content, "done");
        assert_eq!(backend.call_count(), 2);
        assert_eq!(backend.requests().await.len(), 2);
    }

    #[tokio::test]
    async fn test_responder_sees_request() {
        let backend = ScriptedBackend::from_fn(|req| {
            Ok(ModelResponse::text(format!("{} messages", req.messages.len())))
        });
        let response = backend.complete(&request()).await.unwrap();
        assert_eq!(response.content, "1 messages");
    }

    #[tokio::test]
    async fn test_failing_backend() {
        let backend = ScriptedBackend::failing(GatewayError::Unauthorized("key".into()));
        let err = backend.complete(&request()).await.unwrap_err();
        assert!(err.is_fatal());
    }
}
