use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::config::{Config, WorkerTemplate};

/// Directory holding project-local configuration.
pub const CONFIG_DIR: &str = ".swarmcore";

/// Prefix for environment overrides; `__` separates nested keys.
pub const ENV_PREFIX: &str = "SWARMCORE_";

/// Configuration error types
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid {0}: must be at least 1")]
    InvalidConcurrency(&'static str),

    #[error("Invalid budget {field}: {value}. Must be positive")]
    InvalidBudget { field: String, value: f64 },

    #[error("Invalid {0}: must be at least 1")]
    InvalidLimit(String),

    #[error("Invalid retry multiplier: {0}. Must be at least 1.0")]
    InvalidMultiplier(f64),

    #[error("Invalid backoff configuration: base_delay_ms ({0}) must not exceed max_delay_ms ({1})")]
    InvalidBackoff(u64, u64),

    #[error("Invalid jitter range: {0}..{1}. Must satisfy 0 <= min <= max")]
    InvalidJitter(f64, f64),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .swarmcore/config.yaml (project config)
    /// 3. .swarmcore/local.yaml (project local overrides, optional)
    /// 4. Environment variables (SWARMCORE_* prefix, highest priority)
    pub fn load() -> Result<Config> {
        Self::load_from_root(Path::new("."))
    }

    /// Same layering as [`ConfigLoader::load`], rooted at `root`.
    pub fn load_from_root(root: &Path) -> Result<Config> {
        let dir = root.join(CONFIG_DIR);
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(dir.join("config.yaml")))
            .merge(Yaml::file(dir.join("local.yaml")))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.default_model.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "default_model cannot be empty".to_string(),
            ));
        }

        // Gateway
        let gateway = &config.gateway;
        if gateway.rate_limit.max_global_concurrency == 0 {
            return Err(ConfigError::InvalidConcurrency(
                "gateway.rate_limit.max_global_concurrency",
            ));
        }
        let retry = &gateway.retry;
        if !retry.multiplier.is_finite() || retry.multiplier < 1.0 {
            return Err(ConfigError::InvalidMultiplier(retry.multiplier));
        }
        if retry.base_delay_ms > retry.max_delay_ms {
            return Err(ConfigError::InvalidBackoff(
                retry.base_delay_ms,
                retry.max_delay_ms,
            ));
        }
        if !(retry.jitter_min.is_finite() && retry.jitter_max.is_finite())
            || retry.jitter_min < 0.0
            || retry.jitter_min > retry.jitter_max
        {
            return Err(ConfigError::InvalidJitter(retry.jitter_min, retry.jitter_max));
        }
        if gateway.cache.enabled && gateway.cache.max_entries == 0 {
            return Err(ConfigError::InvalidLimit("gateway.cache.max_entries".to_string()));
        }

        // Coordinator
        let coordinator = &config.coordinator;
        if coordinator.max_concurrent_workers == 0 {
            return Err(ConfigError::InvalidConcurrency(
                "coordinator.max_concurrent_workers",
            ));
        }
        check_budget("coordinator.max_total_cost", coordinator.max_total_cost)?;
        if coordinator.max_total_iterations == 0 {
            return Err(ConfigError::InvalidLimit(
                "coordinator.max_total_iterations".to_string(),
            ));
        }
        if coordinator.max_phases == 0 {
            return Err(ConfigError::InvalidLimit("coordinator.max_phases".to_string()));
        }

        // Audit
        check_budget("audit.max_cost", config.audit.max_cost)?;
        if config.audit.max_iterations == 0 {
            return Err(ConfigError::InvalidLimit("audit.max_iterations".to_string()));
        }

        // Workers
        check_template("worker_defaults", &config.worker_defaults)?;
        for (name, template) in &config.specializations {
            check_template(&format!("specializations.{name}"), template)?;
        }

        // Logging
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        Ok(())
    }
}

fn check_budget(field: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidBudget {
            field: field.to_string(),
            value,
        })
    }
}

fn check_template(prefix: &str, template: &WorkerTemplate) -> Result<(), ConfigError> {
    check_budget(&format!("{prefix}.max_cost"), template.max_cost)?;
    if template.max_iterations == 0 {
        return Err(ConfigError::InvalidLimit(format!("{prefix}.max_iterations")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::config::LogFormat;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_default_config_is_valid() {
        ConfigLoader::validate(&Config::default()).expect("Default config should be valid");
    }

    #[test]
    fn test_validate_zero_workers() {
        let mut config = Config::default();
        config.coordinator.max_concurrent_workers = 0;
        assert_eq!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidConcurrency("coordinator.max_concurrent_workers"))
        );
    }

    #[test]
    fn test_validate_negative_budget() {
        let mut config = Config::default();
        config.coordinator.max_total_cost = -1.0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidBudget { .. })
        ));
    }

    #[test]
    fn test_validate_specialization_template() {
        let mut config = Config::default();
        config.specializations.insert(
            "tester".to_string(),
            WorkerTemplate {
                max_iterations: 0,
                ..WorkerTemplate::default()
            },
        );
        match ConfigLoader::validate(&config) {
            Err(ConfigError::InvalidLimit(field)) => {
                assert_eq!(field, "specializations.tester.max_iterations");
            }
            other => panic!("Expected InvalidLimit, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_retry_shape() {
        let mut config = Config::default();
        config.gateway.retry.multiplier = 0.5;
        assert_eq!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidMultiplier(0.5))
        );

        let mut config = Config::default();
        config.gateway.retry.base_delay_ms = 10_000;
        config.gateway.retry.max_delay_ms = 1_000;
        assert_eq!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidBackoff(10_000, 1_000))
        );

        let mut config = Config::default();
        config.gateway.retry.jitter_min = 0.5;
        config.gateway.retry.jitter_max = 0.2;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidJitter(_, _))
        ));
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "loud".to_string();
        assert_eq!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidLogLevel("loud".to_string()))
        );
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "coordinator:\n  max_concurrent_workers: 2\nlogging:\n  format: pretty"
        )
        .unwrap();
        file.flush().unwrap();

        let config = ConfigLoader::load_from_file(file.path()).unwrap();
        assert_eq!(config.coordinator.max_concurrent_workers, 2);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.gateway.retry.max_retries, 3);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "audit:\n  max_iterations: 0").unwrap();
        file.flush().unwrap();

        assert!(ConfigLoader::load_from_file(file.path()).is_err());
    }

    #[test]
    fn test_layering_and_env_override() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join(CONFIG_DIR);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("config.yaml"),
            "default_model: base-model\ncoordinator:\n  max_phases: 10\n",
        )
        .unwrap();
        std::fs::write(dir.join("local.yaml"), "coordinator:\n  max_phases: 20\n").unwrap();

        temp_env::with_vars(
            [
                ("SWARMCORE_LOGGING__LEVEL", Some("debug")),
                ("SWARMCORE_COORDINATOR__MAX_CONCURRENT_WORKERS", Some("7")),
            ],
            || {
                let config = ConfigLoader::load_from_root(root.path()).unwrap();
                assert_eq!(config.default_model, "base-model");
                assert_eq!(config.coordinator.max_phases, 20, "local.yaml should win");
                assert_eq!(config.coordinator.max_concurrent_workers, 7);
                assert_eq!(config.logging.level, "debug");
            },
        );
    }
}
