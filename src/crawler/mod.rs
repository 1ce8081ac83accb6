//! Crawler module: scheduling navigations onto worker threads
//!
//! This module contains the core scheduling logic, including:
//! - Requests and the results produced for them
//! - The navigation task run for each request
//! - An elastic worker thread pool with completion handles
//! - Output sinks that receive results
//! - The scheduler façade tying these together

mod pool;
mod request;
mod scheduler;
mod sink;
mod task;


pub use pool::{PoolError, TaskHandle, TaskStatus, WorkerPool, DEFAULT_KEEP_ALIVE};
pub use request::Request;
pub use scheduler::{Scheduler, ShutdownReport};
pub use sink::ResultSink;
pub use task::{NavigationOutcome, NavigationResult, NavigationSettings, NavigationTask};

use std::any::Any;

/// Extracts a readable message from a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
