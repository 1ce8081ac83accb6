//! Elastic worker thread pool
//!
//! This module handles:
//! - An unbounded backlog of submitted jobs (submission never blocks)
//! - Growing the set of OS worker threads up to `max_threads` on demand
//! - Reclaiming idle workers down to `min_threads` after a keep-alive period
//! - Graceful shutdown, bounded waiting, and forced termination
//! - Task counters for observability

use crate::crawler::panic_message;
use std::collections::VecDeque;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::oneshot;

/// How long a surplus idle worker waits for work before exiting
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(60);

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Errors returned when submitting to the pool
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("worker pool has been shut down")]
    Shutdown,

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// How a submitted job ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// The job ran to completion
    Completed,

    /// The job panicked; the worker survived
    Panicked,

    /// The job was discarded by a forced termination before it ran
    Cancelled,
}

impl TaskStatus {
    /// Returns true if the job actually executed
    pub fn has_run(&self) -> bool {
        matches!(self, Self::Completed | Self::Panicked)
    }
}

/// Completion handle for a submitted job
///
/// Resolves once the job has finished. It can be waited on from a plain
/// thread with [`wait`](Self::wait) or awaited from async code.
#[derive(Debug)]
pub struct TaskHandle {
    rx: oneshot::Receiver<TaskStatus>,
    status: Option<TaskStatus>,
}

impl TaskHandle {
    fn new(rx: oneshot::Receiver<TaskStatus>) -> Self {
        Self { rx, status: None }
    }

    /// Returns true once the job has finished (or was discarded)
    pub fn is_finished(&mut self) -> bool {
        if self.status.is_some() {
            return true;
        }

        match self.rx.try_recv() {
            Ok(status) => {
                self.status = Some(status);
                true
            }
            Err(oneshot::error::TryRecvError::Empty) => false,
            Err(oneshot::error::TryRecvError::Closed) => {
                self.status = Some(TaskStatus::Cancelled);
                true
            }
        }
    }

    /// Blocks the current thread until the job finishes
    ///
    /// Must not be called from inside an async runtime; `.await` the handle
    /// there instead.
    pub fn wait(self) -> TaskStatus {
        if let Some(status) = self.status {
            return status;
        }
        self.rx.blocking_recv().unwrap_or(TaskStatus::Cancelled)
    }
}

impl Future for TaskHandle {
    type Output = TaskStatus;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(status) = self.status {
            return Poll::Ready(status);
        }

        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(TaskStatus::Cancelled))
    }
}

struct QueuedJob {
    job: Job,
    done: oneshot::Sender<TaskStatus>,
}

#[derive(Default)]
struct PoolState {
    backlog: VecDeque<QueuedJob>,
    live: usize,
    idle: usize,
    largest: usize,
    next_worker_id: usize,
    shutdown: bool,
    killed: bool,
}

struct Shared {
    state: Mutex<PoolState>,
    work_available: Condvar,
    terminated: Condvar,
    scheduled: AtomicU64,
    completed: AtomicU64,
    min_threads: usize,
    max_threads: usize,
    keep_alive: Duration,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A bounded pool of worker threads draining an unbounded backlog
///
/// At most `max_threads` jobs execute at once. Workers are started lazily
/// as work arrives; idle workers beyond `min_threads` exit after the
/// keep-alive period.
pub struct WorkerPool {
    shared: Arc<Shared>,
}

impl WorkerPool {
    /// Creates a pool; no threads are started until work is submitted
    ///
    /// `max_threads` is raised to 1 and `min_threads` clamped to
    /// `max_threads` so the pool can always make progress.
    pub fn new(min_threads: usize, max_threads: usize) -> Self {
        Self::with_keep_alive(min_threads, max_threads, DEFAULT_KEEP_ALIVE)
    }

    pub fn with_keep_alive(min_threads: usize, max_threads: usize, keep_alive: Duration) -> Self {
        let max_threads = max_threads.max(1);
        let min_threads = min_threads.min(max_threads);

        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(PoolState::default()),
                work_available: Condvar::new(),
                terminated: Condvar::new(),
                scheduled: AtomicU64::new(0),
                completed: AtomicU64::new(0),
                min_threads,
                max_threads,
                keep_alive,
            }),
        }
    }

    /// Queues `job` for execution and returns immediately
    ///
    /// A new worker is started when no idle worker can pick the job up and
    /// the pool is below `max_threads`.
    pub fn submit<F>(&self, job: F) -> Result<TaskHandle, PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.shared.lock();

        if state.shutdown {
            return Err(PoolError::Shutdown);
        }

        let needs_worker =
            state.backlog.len() >= state.idle && state.live < self.shared.max_threads;
        if needs_worker {
            if let Err(err) = spawn_worker(&self.shared, &mut state) {
                if state.live == 0 {
                    return Err(err.into());
                }
                tracing::warn!(error = %err, "Failed to grow worker pool, queueing on existing workers");
            }
        }

        let (done, rx) = oneshot::channel();
        state.backlog.push_back(QueuedJob {
            job: Box::new(job),
            done,
        });
        self.shared.scheduled.fetch_add(1, Ordering::SeqCst);
        drop(state);

        self.shared.work_available.notify_one();
        Ok(TaskHandle::new(rx))
    }

    /// Stops accepting work; workers exit once the backlog is drained
    pub fn shutdown(&self) {
        let mut state = self.shared.lock();
        if state.shutdown {
            return;
        }
        state.shutdown = true;
        tracing::debug!(
            backlog = state.backlog.len(),
            workers = state.live,
            "Worker pool shutting down"
        );
        drop(state);

        self.shared.work_available.notify_all();
    }

    /// Waits until every worker has exited after a shutdown
    ///
    /// Returns false if `timeout` elapsed first.
    pub fn await_termination(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.lock();

        while !(state.shutdown && state.live == 0) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }

            let (guard, _) = self
                .shared
                .terminated
                .wait_timeout(state, remaining)
                .unwrap_or_else(PoisonError::into_inner);
            state = guard;
        }

        true
    }

    /// Aborts the pool without waiting
    ///
    /// Queued jobs are discarded and their handles resolve as
    /// [`TaskStatus::Cancelled`]. A thread cannot be preempted in the middle
    /// of a job, so workers that are still running are detached and exit as
    /// soon as their current job returns.
    pub fn force_terminate(&self) {
        let mut state = self.shared.lock();
        state.shutdown = true;
        state.killed = true;
        let discarded: Vec<QueuedJob> = state.backlog.drain(..).collect();
        let running = state.live - state.idle;
        drop(state);

        tracing::warn!(
            discarded = discarded.len(),
            running,
            "Worker pool force terminated"
        );

        // Dropping the senders resolves the handles as cancelled.
        drop(discarded);
        self.shared.work_available.notify_all();
    }

    /// Total number of jobs ever accepted
    pub fn scheduled_task_count(&self) -> u64 {
        self.shared.scheduled.load(Ordering::SeqCst)
    }

    /// Number of jobs that have finished running
    pub fn completed_task_count(&self) -> u64 {
        self.shared.completed.load(Ordering::SeqCst)
    }

    /// Number of jobs waiting for a worker
    pub fn queue_length(&self) -> usize {
        self.shared.lock().backlog.len()
    }

    /// Number of live worker threads
    pub fn pool_size(&self) -> usize {
        self.shared.lock().live
    }

    /// Most worker threads ever alive at once
    pub fn largest_pool_size(&self) -> usize {
        self.shared.lock().largest
    }

    pub fn min_threads(&self) -> usize {
        self.shared.min_threads
    }

    pub fn max_threads(&self) -> usize {
        self.shared.max_threads
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.lock().shutdown
    }

    pub fn is_terminated(&self) -> bool {
        let state = self.shared.lock();
        state.shutdown && state.live == 0
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Lets idle workers exit instead of parking forever.
        self.shutdown();
    }
}

fn spawn_worker(shared: &Arc<Shared>, state: &mut PoolState) -> std::io::Result<()> {
    let id = state.next_worker_id;
    let worker_shared = Arc::clone(shared);

    thread::Builder::new()
        .name(format!("vessel-worker-{}", id))
        .spawn(move || run_worker(worker_shared, id))?;

    state.next_worker_id += 1;
    state.live += 1;
    state.largest = state.largest.max(state.live);

    tracing::debug!(worker = id, live = state.live, "Started worker thread");
    Ok(())
}

fn run_worker(shared: Arc<Shared>, id: usize) {
    let mut state = shared.lock();

    loop {
        if state.killed {
            break;
        }

        if let Some(queued) = state.backlog.pop_front() {
            drop(state);
            run_job(&shared, id, queued);
            state = shared.lock();
            continue;
        }

        if state.shutdown {
            break;
        }

        state.idle += 1;
        let (guard, wait) = shared
            .work_available
            .wait_timeout(state, shared.keep_alive)
            .unwrap_or_else(PoisonError::into_inner);
        state = guard;
        state.idle -= 1;

        if wait.timed_out()
            && state.backlog.is_empty()
            && !state.shutdown
            && state.live > shared.min_threads
        {
            tracing::debug!(worker = id, "Reclaiming idle worker");
            break;
        }
    }

    state.live -= 1;
    let live = state.live;
    drop(state);

    tracing::trace!(worker = id, live, "Worker exited");
    if live == 0 {
        shared.terminated.notify_all();
    }
}

fn run_job(shared: &Shared, id: usize, queued: QueuedJob) {
    let QueuedJob { job, done } = queued;

    let status = match panic::catch_unwind(AssertUnwindSafe(job)) {
        Ok(()) => TaskStatus::Completed,
        Err(payload) => {
            tracing::error!(
                worker = id,
                panic = %panic_message(payload.as_ref()),
                "Job panicked"
            );
            TaskStatus::Panicked
        }
    };

    shared.completed.fetch_add(1, Ordering::SeqCst);
    // The submitter may have dropped its handle.
    let _ = done.send(status);
}
