//! Domain errors for the swarmcore execution core.

use thiserror::Error;
use uuid::Uuid;

/// Format a cycle path as a human-readable string: `A -> B -> C -> A`.
fn format_cycle_path(path: &[String]) -> String {
    path.join(" -> ")
}

/// Errors raised by the request gateway and the backends behind it.
///
/// `Throttled`, `ServerFault` and `MalformedResponse` are transient and
/// retried by the gateway; `Unauthorized` and `UnknownModel` are fatal.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Upstream throttled the request: {0}")]
    Throttled(String),

    #[error("Upstream server fault: {0}")]
    ServerFault(String),

    #[error("Malformed upstream response: {0}")]
    MalformedResponse(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Gateway gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<GatewayError>,
    },

    #[error("Rate limiter closed")]
    LimiterClosed,
}

impl GatewayError {
    /// Returns true if the gateway should back off and try again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Throttled(_) | Self::ServerFault(_) | Self::MalformedResponse(_)
        )
    }

    /// Returns true if the error must abort the calling loop immediately.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Unauthorized(_) | Self::UnknownModel(_))
    }
}

/// Domain-level errors that can occur in the execution core.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Task group already exists: {0}")]
    DuplicateGroup(String),

    #[error("Task group {group} depends on unknown group {dependency}")]
    UnknownDependency { group: String, dependency: String },

    #[error("Task group dependency cycle detected: {}", format_cycle_path(.0))]
    DependencyCycle(Vec<String>),

    #[error("Task group not found: {0}")]
    GroupNotFound(String),

    #[error("Todo not found: {0}")]
    TodoNotFound(Uuid),

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition { from: String, to: String, reason: String },

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Budget exceeded: {0}")]
    BudgetExceeded(String),

    #[error("Task graph stalled: no ready groups but {} incomplete: {}", .0.len(), .0.join(", "))]
    GraphStall(Vec<String>),

    #[error("Audit inconclusive for group {group_id}: {reason}")]
    AuditInconclusive { group_id: String, reason: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl DomainError {
    /// Fatal errors stop the surrounding loop or run instead of being recorded.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Configuration(_) | Self::GraphStall(_) => true,
            Self::Gateway(err) => err.is_fatal(),
            _ => false,
        }
    }
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for DomainError {
    fn from(err: serde_yaml::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for DomainError {
    fn from(err: std::io::Error) -> Self {
        DomainError::Io(err.to_string())
    }
}
