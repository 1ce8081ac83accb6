//! Scheduler: the public façade over the worker pool and engine
//!
//! This module handles:
//! - Launching the shared navigation engine
//! - Wrapping each request into a navigation task and submitting it
//! - Routing every task's result into the output sink
//! - Graceful-then-forced shutdown and engine release

use crate::config::{validate_scheduler_config, SchedulerConfig};
use crate::crawler::task::{NavigationSettings, NavigationTask};
use crate::crawler::{Request, ResultSink, TaskHandle, WorkerPool};
use crate::engine::Engine;
use crate::state::SchedulerState;
use crate::SchedulerError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Outcome of a call to [`Scheduler::stop`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    /// True if every worker finished within the grace period
    pub graceful: bool,
}

/// Dispatches requests onto a bounded pool of workers
///
/// Every request posted produces exactly one
/// [`NavigationResult`](crate::crawler::NavigationResult) in the sink, and
/// the result is pushed before the request's [`TaskHandle`] resolves.
pub struct Scheduler<E, S>
where
    E: Engine,
    S: ResultSink<E::Page>,
{
    engine: Arc<E>,
    sink: Arc<S>,
    pool: WorkerPool,
    settings: Arc<NavigationSettings>,
    config: SchedulerConfig,
    state: Mutex<SchedulerState>,
}

impl<E, S> Scheduler<E, S>
where
    E: Engine,
    S: ResultSink<E::Page>,
{
    /// Creates a scheduler and launches its engine
    ///
    /// The scheduler-level timeout is merged into the engine options before
    /// launch. An engine that fails to start fails construction.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use vessel::{HttpEngine, Request, Scheduler, SchedulerConfig};
    ///
    /// let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    /// let scheduler: Scheduler<HttpEngine, _> =
    ///     Scheduler::new(tx, SchedulerConfig::default()).unwrap();
    ///
    /// let handles = scheduler
    ///     .post(vec![Request::parse("https://example.com/").unwrap()])
    ///     .unwrap();
    /// for handle in handles {
    ///     handle.wait();
    /// }
    /// let result = rx.try_recv().unwrap();
    /// println!("{} loaded: {}", result.request, result.is_loaded());
    /// scheduler.stop();
    /// ```
    pub fn new(sink: S, config: SchedulerConfig) -> Result<Self, SchedulerError> {
        validate_scheduler_config(&config)?;

        let engine = E::launch(&config.engine_options())?;
        Ok(Self::assemble(sink, config, engine))
    }

    /// Creates a scheduler around an engine the caller already started
    ///
    /// An invalid configuration is rejected before the engine is touched.
    pub fn with_engine(sink: S, config: SchedulerConfig, engine: E) -> Result<Self, SchedulerError> {
        validate_scheduler_config(&config)?;

        Ok(Self::assemble(sink, config, engine))
    }

    /// Wires a validated configuration and a running engine together
    fn assemble(sink: S, config: SchedulerConfig, engine: E) -> Self {
        let scheduler = Self {
            engine: Arc::new(engine),
            sink: Arc::new(sink),
            pool: WorkerPool::new(config.min_threads, config.max_threads),
            settings: Arc::new(NavigationSettings::from_config(&config)),
            config,
            state: Mutex::new(SchedulerState::Constructed),
        };
        scheduler.transition(SchedulerState::Running);

        tracing::info!(
            min_threads = scheduler.config.min_threads,
            max_threads = scheduler.config.max_threads,
            pacing = ?scheduler.settings.pacing,
            "Scheduler started"
        );

        scheduler
    }

    /// Submits one navigation task per request
    ///
    /// Returns immediately with one handle per request, in input order.
    /// Completion order is up to the workers. Posting to a scheduler that
    /// has been stopped returns [`SchedulerError::Stopped`].
    ///
    /// If the pool rejects a request partway through, the error is
    /// [`SchedulerError::Rejected`] and carries the handles of the requests
    /// already accepted. Those tasks still run; the rest of the batch is
    /// not submitted.
    pub fn post<I>(&self, requests: I) -> Result<Vec<TaskHandle>, SchedulerError>
    where
        I: IntoIterator<Item = Request>,
    {
        // Held for the whole batch so stop() cannot interleave.
        let state = self.lock_state();
        if !state.is_accepting() {
            return Err(SchedulerError::Stopped(*state));
        }

        let requests = requests.into_iter();
        let mut handles = Vec::with_capacity(requests.size_hint().0);

        for request in requests {
            tracing::debug!(url = %request.url(), stub = request.is_stub(), "Posting request");

            let task = NavigationTask::new(
                Arc::clone(&self.engine),
                Arc::clone(&self.settings),
                request,
            );
            let sink = Arc::clone(&self.sink);

            match self.pool.submit(move || sink.push(task.run())) {
                Ok(handle) => handles.push(handle),
                Err(source) => {
                    tracing::error!(
                        submitted = handles.len(),
                        error = %source,
                        "Worker pool rejected request, abandoning rest of batch"
                    );
                    return Err(SchedulerError::Rejected {
                        source,
                        submitted: handles,
                    });
                }
            }
        }

        Ok(handles)
    }

    /// Shuts the scheduler down and releases the engine
    ///
    /// Stops the pool, waits up to the configured grace period (30 s by
    /// default) for queued and running tasks, force-terminates the pool if
    /// they did not finish, then quits the engine. The engine is quit
    /// exactly once whichever path is taken. Returns `None` if the
    /// scheduler was already stopped.
    pub fn stop(&self) -> Option<ShutdownReport> {
        {
            let mut state = self.lock_state();
            if state.is_shutting_down() {
                return None;
            }
            *state = SchedulerState::Stopping;
        }

        tracing::info!(
            queued = self.queue_length(),
            grace_period = ?self.config.shutdown_timeout,
            "Stopping scheduler"
        );

        self.pool.shutdown();
        let graceful = self.pool.await_termination(self.config.shutdown_timeout);
        if !graceful {
            tracing::warn!(
                grace_period = ?self.config.shutdown_timeout,
                "Workers did not finish in time, forcing termination"
            );
            self.pool.force_terminate();
        }

        self.engine.quit();
        self.transition(SchedulerState::Stopped);

        tracing::info!(
            graceful,
            scheduled = self.scheduled_task_count(),
            completed = self.completed_task_count(),
            "Scheduler stopped"
        );

        Some(ShutdownReport { graceful })
    }

    /// Total number of tasks ever submitted
    pub fn scheduled_task_count(&self) -> u64 {
        self.pool.scheduled_task_count()
    }

    /// Number of tasks that have finished
    pub fn completed_task_count(&self) -> u64 {
        self.pool.completed_task_count()
    }

    /// Number of tasks waiting for a worker
    pub fn queue_length(&self) -> usize {
        self.pool.queue_length()
    }

    pub fn state(&self) -> SchedulerState {
        *self.lock_state()
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn delay(&self) -> Duration {
        self.config.delay
    }

    pub fn headers(&self) -> Option<&HashMap<String, String>> {
        self.config.headers.as_ref()
    }

    fn lock_state(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self, next: SchedulerState) {
        let mut state = self.lock_state();
        debug_assert!(
            state.can_transition_to(next),
            "invalid scheduler transition {} -> {}",
            *state,
            next
        );
        tracing::trace!(from = %*state, to = %next, "Scheduler state change");
        *state = next;
    }
}

impl<E, S> Drop for Scheduler<E, S>
where
    E: Engine,
    S: ResultSink<E::Page>,
{
    fn drop(&mut self) {
        if self.state().is_accepting() {
            self.stop();
        }
    }
}
