//! State module for tracking scheduler lifecycle
//!
//! # Components
//!
//! - `SchedulerState`: Tracks where a scheduler is in its lifecycle
//!   (constructed, running, stopping, stopped)

mod scheduler_state;

// Re-export main types
pub use scheduler_state::SchedulerState;
