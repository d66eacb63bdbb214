//! Engine configuration.
//!
//! This module provides configuration for both execution backends: the
//! cluster address, the task-graph scheduler address, the pipeline template
//! path, and the retry budgets governing the job-state wait.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    /// IO error while reading configuration.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Retry budgets for the two-phase job wait.
///
/// The start phase models cold-start latency (the job leaving `Pending`);
/// the finish phase models processing latency (the job leaving
/// `Starting`/`Running`). Fixed delay, no backoff.
#[derive(Debug, Clone)]
pub struct RetryBudgets {
    /// Attempts allowed for the job to get scheduled.
    pub start_retries: u32,
    /// Attempts allowed for the job to finish once scheduled.
    pub finish_retries: u32,
    /// Sleep between attempts.
    pub delay: Duration,
}

impl Default for RetryBudgets {
    fn default() -> Self {
        Self {
            start_retries: 120,
            finish_retries: 50,
            delay: Duration::from_secs(1),
        }
    }
}

/// Configuration for the validation engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    // Cluster settings
    /// Base URL of the pipeline cluster API.
    pub cluster_address: String,
    /// Base URL of the task-graph scheduler (taskgraph backend only).
    pub scheduler_address: String,
    /// Timeout applied to unary cluster requests (not subscriptions).
    pub request_timeout: Duration,

    // Pipeline settings
    /// Optional path to a pipeline template; the built-in template is used
    /// when unset.
    pub template_path: Option<PathBuf>,

    // Wait settings
    /// Retry budgets for the two-phase job wait.
    pub budgets: RetryBudgets,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cluster_address: "http://localhost:30650".to_string(),
            scheduler_address: "http://localhost:8786".to_string(),
            request_timeout: Duration::from_secs(30),
            template_path: None,
            budgets: RetryBudgets::default(),
        }
    }
}

impl EngineConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `VERIFLOW_CLUSTER_ADDRESS`: Cluster API base URL (default: http://localhost:30650)
    /// - `VERIFLOW_SCHEDULER_ADDRESS`: Task-graph scheduler URL (default: http://localhost:8786)
    /// - `VERIFLOW_REQUEST_TIMEOUT_SECS`: Unary request timeout (default: 30)
    /// - `VERIFLOW_TEMPLATE_PATH`: Pipeline template path (default: built-in)
    /// - `VERIFLOW_START_RETRIES`: Start-phase retry budget (default: 120)
    /// - `VERIFLOW_FINISH_RETRIES`: Finish-phase retry budget (default: 50)
    /// - `VERIFLOW_RETRY_DELAY_MS`: Delay between poll attempts (default: 1000)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable has an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("VERIFLOW_CLUSTER_ADDRESS") {
            config.cluster_address = val;
        }

        if let Ok(val) = std::env::var("VERIFLOW_SCHEDULER_ADDRESS") {
            config.scheduler_address = val;
        }

        if let Ok(val) = std::env::var("VERIFLOW_REQUEST_TIMEOUT_SECS") {
            let secs: u64 = parse_env_value(&val, "VERIFLOW_REQUEST_TIMEOUT_SECS")?;
            config.request_timeout = Duration::from_secs(secs);
        }

        if let Ok(val) = std::env::var("VERIFLOW_TEMPLATE_PATH") {
            config.template_path = Some(PathBuf::from(val));
        }

        if let Ok(val) = std::env::var("VERIFLOW_START_RETRIES") {
            config.budgets.start_retries = parse_env_value(&val, "VERIFLOW_START_RETRIES")?;
        }

        if let Ok(val) = std::env::var("VERIFLOW_FINISH_RETRIES") {
            config.budgets.finish_retries = parse_env_value(&val, "VERIFLOW_FINISH_RETRIES")?;
        }

        if let Ok(val) = std::env::var("VERIFLOW_RETRY_DELAY_MS") {
            let ms: u64 = parse_env_value(&val, "VERIFLOW_RETRY_DELAY_MS")?;
            config.budgets.delay = Duration::from_millis(ms);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cluster_address.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "cluster_address cannot be empty".to_string(),
            ));
        }

        if self.scheduler_address.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "scheduler_address cannot be empty".to_string(),
            ));
        }

        if self.budgets.start_retries == 0 {
            return Err(ConfigError::ValidationFailed(
                "start_retries must be greater than 0".to_string(),
            ));
        }

        if self.budgets.finish_retries == 0 {
            return Err(ConfigError::ValidationFailed(
                "finish_retries must be greater than 0".to_string(),
            ));
        }

        if self.budgets.delay.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "retry delay must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Builder method to set the cluster address.
    pub fn with_cluster_address(mut self, address: impl Into<String>) -> Self {
        self.cluster_address = address.into();
        self
    }

    /// Builder method to set the scheduler address.
    pub fn with_scheduler_address(mut self, address: impl Into<String>) -> Self {
        self.scheduler_address = address.into();
        self
    }

    /// Builder method to set the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Builder method to set the pipeline template path.
    pub fn with_template_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.template_path = Some(path.into());
        self
    }

    /// Builder method to set the start-phase retry budget.
    pub fn with_start_retries(mut self, retries: u32) -> Self {
        self.budgets.start_retries = retries;
        self
    }

    /// Builder method to set the finish-phase retry budget.
    pub fn with_finish_retries(mut self, retries: u32) -> Self {
        self.budgets.finish_retries = retries;
        self
    }

    /// Builder method to set the delay between poll attempts.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.budgets.delay = delay;
        self
    }
}

/// Parse an environment variable value into a type.
fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}
