use crate::engine::InterceptHandler;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Default grace period `stop()` waits for workers before forcing termination
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Default user agent sent by the HTTP engine
pub const DEFAULT_USER_AGENT: &str = concat!("vessel/", env!("CARGO_PKG_VERSION"));

/// Default redirect limit for the HTTP engine
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

/// Configuration file structure for Vessel
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scheduler: SchedulerSettings,
    #[serde(default)]
    pub engine: EngineOptions,
}

/// The `[scheduler]` section as written in the configuration file
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSettings {
    /// Worker threads kept alive even when idle
    #[serde(rename = "min-threads", default)]
    pub min_threads: usize,

    /// Upper bound on concurrently executing tasks
    #[serde(rename = "max-threads", default = "default_max_threads")]
    pub max_threads: usize,

    /// Pause before each navigation in seconds (single-worker pools only)
    #[serde(default)]
    pub delay: f64,

    /// Navigation timeout in seconds, merged into the engine options
    #[serde(default)]
    pub timeout: Option<f64>,

    /// Grace period in seconds for a graceful shutdown
    #[serde(rename = "shutdown-timeout", default = "default_shutdown_timeout")]
    pub shutdown_timeout: f64,

    /// Extra headers applied to every page
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            min_threads: 0,
            max_threads: default_max_threads(),
            delay: 0.0,
            timeout: None,
            shutdown_timeout: default_shutdown_timeout(),
            headers: None,
        }
    }
}

fn default_max_threads() -> usize {
    1
}

fn default_shutdown_timeout() -> f64 {
    DEFAULT_SHUTDOWN_TIMEOUT.as_secs_f64()
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_max_redirects() -> usize {
    DEFAULT_MAX_REDIRECTS
}

/// Construction options handed to the navigation engine
///
/// Keys the engine does not know about are kept in `extra` untouched so
/// engine implementations can read their own settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EngineOptions {
    /// User agent the engine identifies itself with
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum redirect hops followed by a single navigation
    #[serde(rename = "max-redirects", default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Per-navigation timeout in seconds
    #[serde(default)]
    pub timeout: Option<f64>,

    /// Engine-specific options passed through opaquely
    #[serde(flatten)]
    pub extra: toml::Table,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            max_redirects: default_max_redirects(),
            timeout: None,
            extra: toml::Table::new(),
        }
    }
}

impl EngineOptions {
    /// Returns the navigation timeout as a `Duration`, if one is set
    pub fn timeout_duration(&self) -> Option<Duration> {
        self.timeout.and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }

    /// Looks up a pass-through option by key
    pub fn extra(&self, key: &str) -> Option<&toml::Value> {
        self.extra.get(key)
    }
}

/// Runtime configuration of a [`Scheduler`](crate::crawler::Scheduler)
///
/// Built once and never mutated for the scheduler's lifetime.
#[derive(Clone)]
pub struct SchedulerConfig {
    pub min_threads: usize,
    pub max_threads: usize,
    pub delay: Duration,
    pub timeout: Option<Duration>,
    pub shutdown_timeout: Duration,
    pub headers: Option<HashMap<String, String>>,
    pub intercept: Option<InterceptHandler>,
    pub engine: EngineOptions,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            min_threads: 0,
            max_threads: 1,
            delay: Duration::ZERO,
            timeout: None,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            headers: None,
            intercept: None,
            engine: EngineOptions::default(),
        }
    }
}

impl fmt::Debug for SchedulerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerConfig")
            .field("min_threads", &self.min_threads)
            .field("max_threads", &self.max_threads)
            .field("delay", &self.delay)
            .field("timeout", &self.timeout)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .field("headers", &self.headers)
            .field("intercept", &self.intercept.is_some())
            .field("engine", &self.engine)
            .finish()
    }
}

impl SchedulerConfig {
    pub fn with_threads(mut self, min_threads: usize, max_threads: usize) -> Self {
        self.min_threads = min_threads;
        self.max_threads = max_threads;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_shutdown_timeout(mut self, shutdown_timeout: Duration) -> Self {
        self.shutdown_timeout = shutdown_timeout;
        self
    }

    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = Some(headers);
        self
    }

    pub fn with_intercept(mut self, intercept: InterceptHandler) -> Self {
        self.intercept = Some(intercept);
        self
    }

    pub fn with_engine_options(mut self, engine: EngineOptions) -> Self {
        self.engine = engine;
        self
    }

    /// Returns the engine construction options with the scheduler-level
    /// timeout merged in
    ///
    /// When a scheduler timeout is set it replaces whatever timeout the
    /// engine options carried.
    pub fn engine_options(&self) -> EngineOptions {
        let mut options = self.engine.clone();
        if let Some(timeout) = self.timeout {
            options.timeout = Some(timeout.as_secs_f64());
        }
        options
    }

    /// Returns true when tasks pause before navigating
    ///
    /// Pacing only produces a global rate when tasks run strictly one at a
    /// time, so it is disabled for pools with more than one worker.
    pub fn pacing_enabled(&self) -> bool {
        self.max_threads == 1 && !self.delay.is_zero()
    }
}
