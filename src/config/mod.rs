//! Configuration module for Vessel
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files, and turning them into the runtime [`SchedulerConfig`].
//!
//! # Example
//!
//! ```no_run
//! use vessel::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("vessel.toml")).unwrap();
//! let scheduler_config = config.scheduler_config().unwrap();
//! println!("Scheduler will use up to {} threads", scheduler_config.max_threads);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, EngineOptions, SchedulerConfig, SchedulerSettings, DEFAULT_MAX_REDIRECTS,
    DEFAULT_SHUTDOWN_TIMEOUT, DEFAULT_USER_AGENT,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::{validate_scheduler_config, MAX_THREADS_LIMIT};
