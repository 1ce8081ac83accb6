//! Vessel: a bounded-concurrency page scheduler
//!
//! This crate dispatches navigation requests onto a pool of worker threads.
//! Each worker opens a page on a shared navigation engine, optionally paces
//! itself, navigates, and delivers a [`NavigationResult`] to an output sink.
//! Navigation failures are captured as data, never propagated as faults.

pub mod config;
pub mod crawler;
pub mod engine;
pub mod output;
pub mod state;

use thiserror::Error;

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Errors raised while starting a navigation engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Engine failed to launch: {0}")]
    Launch(String),

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Invalid engine option '{key}': {message}")]
    InvalidOption { key: String, message: String },
}

/// Errors returned by the scheduler's public operations
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Scheduler is {0} and no longer accepts requests")]
    Stopped(state::SchedulerState),

    #[error("Invalid scheduler configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to start navigation engine: {0}")]
    Engine(#[from] EngineError),

    /// The pool refused a request partway through a batch
    ///
    /// `submitted` holds the handles of the requests accepted before the
    /// failure; those tasks still run and deliver their results.
    #[error("Worker pool rejected a request after {} were submitted: {source}", .submitted.len())]
    Rejected {
        source: crawler::PoolError,
        submitted: Vec<crawler::TaskHandle>,
    },
}

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for engine construction
pub type EngineResult<T> = std::result::Result<T, EngineError>;

// Re-export commonly used types
pub use config::{EngineOptions, SchedulerConfig};
pub use crawler::{
    NavigationOutcome, NavigationResult, Request, ResultSink, Scheduler, TaskHandle, TaskStatus,
    WorkerPool,
};
pub use engine::{
    Engine, HttpEngine, HttpPage, InterceptHandler, InterceptedRequest, NavigationError,
    NavigationErrorKind, Page,
};
pub use state::SchedulerState;
