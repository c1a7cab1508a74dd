use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Main configuration structure for swarmcore
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Model identifier sent with every gateway request
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Gateway configuration (rate limit, retry, cache)
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Agent loop behaviour
    #[serde(default)]
    pub agent: AgentConfig,

    /// Audit loop behaviour
    #[serde(default)]
    pub audit: AuditConfig,

    /// Coordinator scheduling and global budgets
    #[serde(default)]
    pub coordinator: CoordinatorConfig,

    /// Worker capabilities used when a specialization has no override
    #[serde(default)]
    pub worker_defaults: WorkerTemplate,

    /// Per-specialization worker overrides
    #[serde(default)]
    pub specializations: HashMap<String, WorkerTemplate>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_model() -> String {
    "claude-sonnet-4-5".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_model: default_model(),
            gateway: GatewayConfig::default(),
            agent: AgentConfig::default(),
            audit: AuditConfig::default(),
            coordinator: CoordinatorConfig::default(),
            worker_defaults: WorkerTemplate::default(),
            specializations: HashMap::new(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Worker template for a specialization, falling back to the defaults.
    pub fn worker_template(&self, specialization: &str) -> &WorkerTemplate {
        self.specializations
            .get(specialization)
            .unwrap_or(&self.worker_defaults)
    }
}

/// Gateway configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GatewayConfig {
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub cache: CacheConfig,
}

/// Rate limiting configuration, shared by every gateway in the process
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RateLimitConfig {
    /// Minimum spacing between consecutive upstream calls (0 disables)
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,

    /// Maximum number of upstream calls in flight at once
    #[serde(default = "default_max_global_concurrency")]
    pub max_global_concurrency: usize,
}

const fn default_min_interval_ms() -> u64 {
    200
}

const fn default_max_global_concurrency() -> usize {
    8
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: default_min_interval_ms(),
            max_global_concurrency: default_max_global_concurrency(),
        }
    }
}

/// Retry policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry in milliseconds
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Exponential growth factor between retries
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Upper bound on any single delay in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Lower bound of the additive jitter, as a fraction of the delay
    #[serde(default = "default_jitter_min")]
    pub jitter_min: f64,

    /// Upper bound of the additive jitter, as a fraction of the delay
    #[serde(default = "default_jitter_max")]
    pub jitter_max: f64,
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_base_delay_ms() -> u64 {
    1_000
}

const fn default_multiplier() -> f64 {
    2.0
}

const fn default_max_delay_ms() -> u64 {
    60_000
}

const fn default_jitter_min() -> f64 {
    0.10
}

const fn default_jitter_max() -> f64 {
    0.30
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            multiplier: default_multiplier(),
            max_delay_ms: default_max_delay_ms(),
            jitter_min: default_jitter_min(),
            jitter_max: default_jitter_max(),
        }
    }
}

/// Response cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Capacity bound; entries never expire by age
    #[serde(default = "default_cache_max_entries")]
    pub max_entries: u64,
}

const fn default_true() -> bool {
    true
}

const fn default_cache_max_entries() -> u64 {
    1_024
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: default_cache_max_entries(),
        }
    }
}

/// Agent loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AgentConfig {
    /// Phrases that mark a free-text completion claim (case-insensitive)
    #[serde(default = "default_completion_phrases")]
    pub completion_phrases: Vec<String>,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: Option<u32>,

    #[serde(default)]
    pub temperature: Option<f32>,
}

fn default_completion_phrases() -> Vec<String> {
    [
        "task complete",
        "task is complete",
        "all todos are complete",
        "all todos completed",
        "all tasks complete",
        "all tasks completed",
        "work is complete",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

#[allow(clippy::unnecessary_wraps)]
const fn default_max_tokens() -> Option<u32> {
    Some(4_096)
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            completion_phrases: default_completion_phrases(),
            max_tokens: default_max_tokens(),
            temperature: None,
        }
    }
}

/// Audit loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AuditConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_audit_max_iterations")]
    pub max_iterations: u32,

    #[serde(default = "default_audit_max_cost")]
    pub max_cost: f64,
}

const fn default_audit_max_iterations() -> u32 {
    20
}

const fn default_audit_max_cost() -> f64 {
    2.0
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_iterations: default_audit_max_iterations(),
            max_cost: default_audit_max_cost(),
        }
    }
}

/// What the coordinator does once a group fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop starting phases and report partial results
    #[default]
    HaltOnFailure,
    /// Keep running branches that do not depend on a failed group
    ContinueIndependent,
}

/// Coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CoordinatorConfig {
    #[serde(default = "default_max_concurrent_workers")]
    pub max_concurrent_workers: usize,

    /// Global cost ceiling across all loops, in USD
    #[serde(default = "default_max_total_cost")]
    pub max_total_cost: f64,

    /// Global model-call ceiling across all loops
    #[serde(default = "default_max_total_iterations")]
    pub max_total_iterations: u64,

    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// First backoff step when no group is ready yet
    #[serde(default = "default_stall_poll_interval_ms")]
    pub stall_poll_interval_ms: u64,

    /// Re-polls before an empty ready set is declared a stall
    #[serde(default = "default_stall_max_polls")]
    pub stall_max_polls: u32,

    /// Upper bound on scheduling phases, including audit reopen cycles
    #[serde(default = "default_max_phases")]
    pub max_phases: u32,
}

const fn default_max_concurrent_workers() -> usize {
    4
}

const fn default_max_total_cost() -> f64 {
    50.0
}

const fn default_max_total_iterations() -> u64 {
    1_000
}

const fn default_stall_poll_interval_ms() -> u64 {
    250
}

const fn default_stall_max_polls() -> u32 {
    5
}

const fn default_max_phases() -> u32 {
    100
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_workers: default_max_concurrent_workers(),
            max_total_cost: default_max_total_cost(),
            max_total_iterations: default_max_total_iterations(),
            failure_policy: FailurePolicy::default(),
            stall_poll_interval_ms: default_stall_poll_interval_ms(),
            stall_max_polls: default_stall_max_polls(),
            max_phases: default_max_phases(),
        }
    }
}

/// Capabilities and per-loop budget handed to workers of one specialization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct WorkerTemplate {
    #[serde(default)]
    pub allowed_tool_names: Vec<String>,

    #[serde(default)]
    pub scope_paths: Vec<PathBuf>,

    #[serde(default = "default_worker_max_cost")]
    pub max_cost: f64,

    #[serde(default = "default_worker_max_iterations")]
    pub max_iterations: u32,
}

const fn default_worker_max_cost() -> f64 {
    5.0
}

const fn default_worker_max_iterations() -> u32 {
    50
}

impl Default for WorkerTemplate {
    fn default() -> Self {
        Self {
            allowed_tool_names: Vec::new(),
            scope_paths: Vec::new(),
            max_cost: default_worker_max_cost(),
            max_iterations: default_worker_max_iterations(),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// Log file rotation policy
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RotationPolicy {
    #[default]
    Daily,
    Hourly,
    Never,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,

    /// Directory for rolling log files (stderr only when unset)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    #[serde(default)]
    pub rotation: RotationPolicy,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            log_dir: None,
            rotation: RotationPolicy::default(),
        }
    }
}
