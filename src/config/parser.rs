use crate::config::types::{Config, SchedulerConfig};
use crate::config::validation::{validate, validate_scheduler_config};
use crate::{ConfigError, ConfigResult};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::Duration;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use vessel::config::load_config;
///
/// let config = load_config(Path::new("vessel.toml")).unwrap();
/// println!("Max threads: {}", config.scheduler.max_threads);
/// ```
pub fn load_config(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration from a TOML string
pub fn parse_config(content: &str) -> ConfigResult<Config> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> ConfigResult<String> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> ConfigResult<(Config, String)> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

impl Config {
    /// Converts the file configuration into a runtime scheduler configuration
    ///
    /// Second-based settings become `Duration`s; the result is validated
    /// again so hand-edited values cannot slip through.
    pub fn scheduler_config(&self) -> ConfigResult<SchedulerConfig> {
        let settings = &self.scheduler;

        let config = SchedulerConfig {
            min_threads: settings.min_threads,
            max_threads: settings.max_threads,
            delay: seconds("delay", settings.delay)?,
            timeout: settings
                .timeout
                .map(|secs| seconds("timeout", secs))
                .transpose()?,
            shutdown_timeout: seconds("shutdown-timeout", settings.shutdown_timeout)?,
            headers: settings.headers.clone(),
            intercept: None,
            engine: self.engine.clone(),
        };

        validate_scheduler_config(&config)?;
        Ok(config)
    }
}

fn seconds(name: &str, value: f64) -> ConfigResult<Duration> {
    Duration::try_from_secs_f64(value)
        .map_err(|e| ConfigError::Validation(format!("Invalid {}: {}", name, e)))
}
