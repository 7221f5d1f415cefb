use std::env;
use std::path::Path;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError};

use crate::auth::ActorRole;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const CONFIG_DIR: &str = "config";
const DEFAULT_API_BASE_URL: &str = "http://localhost:5000/api";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 1;
const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 500;
const DEFAULT_ACTOR_ROLE: &str = "backoffice";

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct WorkflowConfig {
    /// Base URL of the persistence/notification collaborator
    #[serde(default = "default_api_base_url")]
    #[validate(custom = "validate_base_url")]
    pub api_base_url: String,

    /// Bearer token attached to every collaborator request
    #[serde(default)]
    pub api_token: Option<String>,

    /// Application environment
    #[serde(default = "default_environment")]
    #[validate(length(min = 1))]
    pub environment: String,

    /// Per-request timeout (seconds)
    #[serde(default = "default_request_timeout_secs")]
    #[validate(custom = "validate_timeout")]
    pub request_timeout_secs: u64,

    /// Total attempts per collaborator call. 1 disables retries; higher
    /// values retry transport/5xx failures with exponential backoff.
    #[serde(default = "default_retry_max_attempts")]
    #[validate(custom = "validate_retry_attempts")]
    pub retry_max_attempts: u32,

    /// Base delay for the retry backoff (milliseconds)
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Send `expectedVersion` with mutating calls when the fetched entity
    /// carries a version
    #[serde(default = "default_true_bool")]
    pub optimistic_locking: bool,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Role assumed when the operator does not pass one explicitly
    #[serde(default = "default_actor_role")]
    pub default_actor_role: ActorRole,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            api_token: None,
            environment: default_environment(),
            request_timeout_secs: default_request_timeout_secs(),
            retry_max_attempts: default_retry_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            optimistic_locking: default_true_bool(),
            log_level: default_log_level(),
            log_json: false,
            default_actor_role: default_actor_role(),
        }
    }
}

impl WorkflowConfig {
    /// Checks if running in production environment
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Checks if running in development environment
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// Gets log level reference
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    /// Whether the retry policy is active
    pub fn retries_enabled(&self) -> bool {
        self.retry_max_attempts > 1
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum WorkflowConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Default value functions
fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_retry_max_attempts() -> u32 {
    DEFAULT_RETRY_MAX_ATTEMPTS
}

fn default_retry_base_delay_ms() -> u64 {
    DEFAULT_RETRY_BASE_DELAY_MS
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_true_bool() -> bool {
    true
}

fn default_actor_role() -> ActorRole {
    ActorRole::Backoffice
}

fn validate_base_url(value: &str) -> Result<(), ValidationError> {
    match url::Url::parse(value) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => Ok(()),
        _ => {
            let mut err = ValidationError::new("api_base_url");
            err.message = Some("Must be an absolute http(s) URL".into());
            Err(err)
        }
    }
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

fn validate_timeout(value: u64) -> Result<(), ValidationError> {
    if value == 0 {
        let mut err = ValidationError::new("request_timeout_secs");
        err.message = Some("request_timeout_secs must be greater than 0".into());
        return Err(err);
    }
    Ok(())
}

fn validate_retry_attempts(value: u32) -> Result<(), ValidationError> {
    if value == 0 || value > 10 {
        let mut err = ValidationError::new("retry_max_attempts");
        err.message = Some("retry_max_attempts must be between 1 and 10".into());
        return Err(err);
    }
    Ok(())
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::fmt;

    let default_directive = format!("quoteflow={}", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt().with_env_filter(filter_directive).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter_directive).try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml, selected by RUN_ENV or
///    APP_ENV)
/// 4. Environment variables (APP__*)
pub fn load_config() -> Result<WorkflowConfig, WorkflowConfigError> {
    load_config_from(Path::new(CONFIG_DIR))
}

/// Loads configuration with an explicit config directory.
pub fn load_config_from(config_dir: &Path) -> Result<WorkflowConfig, WorkflowConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !config_dir.exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            config_dir.display()
        );
    }

    let config = Config::builder()
        .set_default("api_base_url", DEFAULT_API_BASE_URL)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("request_timeout_secs", DEFAULT_REQUEST_TIMEOUT_SECS as i64)?
        .set_default("retry_max_attempts", DEFAULT_RETRY_MAX_ATTEMPTS as i64)?
        .set_default("retry_base_delay_ms", DEFAULT_RETRY_BASE_DELAY_MS as i64)?
        .set_default("optimistic_locking", true)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .set_default("default_actor_role", DEFAULT_ACTOR_ROLE)?
        .add_source(File::from(config_dir.join("default")).required(false))
        .add_source(File::from(config_dir.join(run_env.as_str())).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let workflow_config: WorkflowConfig = config.try_deserialize()?;

    workflow_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        WorkflowConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(workflow_config)
}
