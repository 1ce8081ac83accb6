use crate::config::types::{Config, EngineOptions, SchedulerConfig, SchedulerSettings};
use crate::{ConfigError, ConfigResult};
use reqwest::header::{HeaderName, HeaderValue};
use std::collections::HashMap;

/// Largest worker pool a configuration may request
pub const MAX_THREADS_LIMIT: usize = 256;

/// Validates a configuration file as loaded from disk
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_settings(&config.scheduler)?;
    validate_engine_options(&config.engine)?;
    Ok(())
}

/// Validates a runtime scheduler configuration
pub fn validate_scheduler_config(config: &SchedulerConfig) -> ConfigResult<()> {
    validate_thread_bounds(config.min_threads, config.max_threads)?;

    if let Some(timeout) = config.timeout {
        if timeout.is_zero() {
            return Err(ConfigError::Validation(
                "timeout must be greater than zero".to_string(),
            ));
        }
    }

    if config.shutdown_timeout.is_zero() {
        return Err(ConfigError::Validation(
            "shutdown_timeout must be greater than zero".to_string(),
        ));
    }

    if let Some(headers) = &config.headers {
        validate_headers(headers)?;
    }

    validate_engine_options(&config.engine)?;

    Ok(())
}

/// Validates the `[scheduler]` section
fn validate_settings(settings: &SchedulerSettings) -> ConfigResult<()> {
    validate_thread_bounds(settings.min_threads, settings.max_threads)?;
    validate_seconds("delay", settings.delay, true)?;
    validate_seconds("shutdown-timeout", settings.shutdown_timeout, false)?;

    if let Some(timeout) = settings.timeout {
        validate_seconds("timeout", timeout, false)?;
    }

    if let Some(headers) = &settings.headers {
        validate_headers(headers)?;
    }

    Ok(())
}

/// Validates the `[engine]` section
fn validate_engine_options(options: &EngineOptions) -> ConfigResult<()> {
    if options.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if HeaderValue::from_str(&options.user_agent).is_err() {
        return Err(ConfigError::Validation(format!(
            "user-agent contains invalid characters: '{}'",
            options.user_agent
        )));
    }

    if let Some(timeout) = options.timeout {
        validate_seconds("engine timeout", timeout, false)?;
    }

    Ok(())
}

fn validate_thread_bounds(min_threads: usize, max_threads: usize) -> ConfigResult<()> {
    if max_threads < 1 || max_threads > MAX_THREADS_LIMIT {
        return Err(ConfigError::Validation(format!(
            "max_threads must be between 1 and {}, got {}",
            MAX_THREADS_LIMIT, max_threads
        )));
    }

    if min_threads > max_threads {
        return Err(ConfigError::Validation(format!(
            "min_threads ({}) cannot exceed max_threads ({})",
            min_threads, max_threads
        )));
    }

    Ok(())
}

/// Checks a duration given in seconds
///
/// `allow_zero` distinguishes "0 disables" settings such as the delay from
/// timeouts, which must be positive.
fn validate_seconds(name: &str, value: f64, allow_zero: bool) -> ConfigResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::Validation(format!(
            "{} must be a finite, non-negative number of seconds, got {}",
            name, value
        )));
    }

    if !allow_zero && value == 0.0 {
        return Err(ConfigError::Validation(format!(
            "{} must be greater than zero",
            name
        )));
    }

    Ok(())
}

fn validate_headers(headers: &HashMap<String, String>) -> ConfigResult<()> {
    for (name, value) in headers {
        if HeaderName::from_bytes(name.as_bytes()).is_err() {
            return Err(ConfigError::Validation(format!(
                "Invalid header name: '{}'",
                name
            )));
        }

        if HeaderValue::from_str(value).is_err() {
            return Err(ConfigError::Validation(format!(
                "Invalid value for header '{}'",
                name
            )));
        }
    }

    Ok(())
}
