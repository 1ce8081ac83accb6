//! Integration tests for the scheduler
//!
//! These tests drive the public scheduler API with an in-memory engine that
//! records when each navigation starts, counts `quit` calls, and can be
//! told to fail or hang based on the URL path.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};
use url::Url;
use vessel::config::EngineOptions;
use vessel::crawler::NavigationResult;
use vessel::{
    Engine, EngineError, InterceptHandler, InterceptedRequest, NavigationError,
    NavigationErrorKind, Page, Request, Scheduler, SchedulerConfig, SchedulerError,
    SchedulerState, TaskStatus,
};

/// Shared recorder behind every engine and page
#[derive(Default)]
struct Probe {
    pages_created: AtomicUsize,
    quits: AtomicUsize,
    goto_starts: Mutex<Vec<(String, Instant)>>,
    released: Mutex<bool>,
    release_signal: Condvar,
}

impl Probe {
    fn release(&self) {
        *self.released.lock().unwrap() = true;
        self.release_signal.notify_all();
    }

    fn wait_for_release(&self) {
        let released = self.released.lock().unwrap();
        let _ = self
            .release_signal
            .wait_timeout_while(released, Duration::from_secs(10), |released| !*released)
            .unwrap();
    }

    fn starts(&self) -> Vec<(String, Instant)> {
        let mut starts = self.goto_starts.lock().unwrap().clone();
        starts.sort_by_key(|(_, at)| *at);
        starts
    }
}

struct RecordingEngine {
    probe: Arc<Probe>,
}

impl Engine for RecordingEngine {
    type Page = RecordingPage;

    fn launch(options: &EngineOptions) -> Result<Self, EngineError> {
        if options.extra("fail-launch").is_some() {
            return Err(EngineError::Launch("browser binary not found".to_string()));
        }
        Ok(Self {
            probe: Arc::new(Probe::default()),
        })
    }

    fn create_page(&self) -> Result<RecordingPage, NavigationError> {
        self.probe.pages_created.fetch_add(1, Ordering::SeqCst);
        Ok(RecordingPage {
            probe: Arc::clone(&self.probe),
            headers: HashMap::new(),
            interceptor: None,
            visited: None,
        })
    }

    fn quit(&self) {
        self.probe.quits.fetch_add(1, Ordering::SeqCst);
    }
}

struct RecordingPage {
    probe: Arc<Probe>,
    headers: HashMap<String, String>,
    interceptor: Option<InterceptHandler>,
    visited: Option<Url>,
}

impl std::fmt::Debug for RecordingPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingPage")
            .field("visited", &self.visited)
            .finish()
    }
}

impl Page for RecordingPage {
    fn set_headers(&mut self, headers: &HashMap<String, String>) -> Result<(), NavigationError> {
        self.headers = headers.clone();
        Ok(())
    }

    fn enable_interception(&mut self, handler: InterceptHandler) -> Result<(), NavigationError> {
        self.interceptor = Some(handler);
        Ok(())
    }

    fn goto(&mut self, url: &Url) -> Result<(), NavigationError> {
        self.probe
            .goto_starts
            .lock()
            .unwrap()
            .push((url.path().to_string(), Instant::now()));

        if let Some(handler) = &self.interceptor {
            let mut request = InterceptedRequest::new("GET", url.clone(), self.headers.clone());
            handler(&mut request);
            if request.decision() == vessel::engine::InterceptDecision::Abort {
                return Err(NavigationError::Aborted {
                    url: url.to_string(),
                });
            }
        }

        match url.path() {
            "/fail" => Err(NavigationError::Navigation {
                url: url.to_string(),
                message: "net::ERR_CONNECTION_REFUSED".to_string(),
            }),
            "/hang" => {
                self.probe.wait_for_release();
                self.visited = Some(url.clone());
                Ok(())
            }
            _ => {
                self.visited = Some(url.clone());
                Ok(())
            }
        }
    }
}

type Results = Arc<Mutex<Vec<NavigationResult<RecordingPage>>>>;

fn start(config: SchedulerConfig) -> (Scheduler<RecordingEngine, Results>, Results, Arc<Probe>) {
    let probe = Arc::new(Probe::default());
    let results: Results = Arc::new(Mutex::new(Vec::new()));
    let engine = RecordingEngine {
        probe: Arc::clone(&probe),
    };
    let scheduler = Scheduler::with_engine(Arc::clone(&results), config, engine)
        .expect("Failed to create scheduler");
    (scheduler, results, probe)
}

fn request(path: &str) -> Request {
    Request::parse(&format!("https://example.com{}", path)).expect("valid URL")
}

fn stub(path: &str) -> Request {
    Request::stub(Url::parse(&format!("https://example.com{}", path)).expect("valid URL"))
}

fn wait_all(handles: Vec<vessel::TaskHandle>) -> Vec<TaskStatus> {
    handles.into_iter().map(|handle| handle.wait()).collect()
}

#[test]
fn test_stub_requests_never_touch_engine() {
    let (scheduler, results, probe) = start(SchedulerConfig::default().with_threads(0, 4));

    let statuses = wait_all(scheduler.post(vec![stub("/a"), stub("/b")]).unwrap());
    assert!(statuses.iter().all(|s| *s == TaskStatus::Completed));

    let results = results.lock().unwrap();
    assert_eq!(results.len(), 2);
    for result in results.iter() {
        assert!(result.page.is_none());
        assert!(result.error().is_none());
        assert!(result.request.is_stub());
    }
    assert_eq!(probe.pages_created.load(Ordering::SeqCst), 0);
    assert!(probe.starts().is_empty());
}

#[test]
fn test_successful_navigation_delivers_page() {
    let (scheduler, results, _probe) = start(SchedulerConfig::default());

    wait_all(scheduler.post(vec![request("/ok")]).unwrap());

    let mut results = results.lock().unwrap();
    let result = results.pop().unwrap();
    assert!(result.is_loaded());
    assert_eq!(result.request, request("/ok"));
    let page = result.page.expect("loaded result carries a page");
    assert_eq!(page.visited.as_ref().map(Url::path), Some("/ok"));
}

#[test]
fn test_failed_navigation_is_data_not_fault() {
    let (scheduler, results, _probe) = start(SchedulerConfig::default().with_threads(0, 2));

    let statuses = wait_all(scheduler.post(vec![request("/fail"), request("/ok")]).unwrap());
    assert_eq!(statuses, vec![TaskStatus::Completed, TaskStatus::Completed]);

    let results = results.lock().unwrap();
    let failed = results
        .iter()
        .find(|r| r.request.url().path() == "/fail")
        .unwrap();
    assert_eq!(
        failed.error().map(NavigationError::kind),
        Some(NavigationErrorKind::Navigation)
    );
    assert!(failed.page.is_some());

    let loaded = results
        .iter()
        .find(|r| r.request.url().path() == "/ok")
        .unwrap();
    assert!(loaded.is_loaded());
}

#[test]
fn test_post_returns_one_handle_per_request() {
    let (scheduler, results, _probe) = start(SchedulerConfig::default().with_threads(1, 3));

    let requests: Vec<Request> = (0..7).map(|i| request(&format!("/page{}", i))).collect();
    let handles = scheduler.post(requests.clone()).unwrap();
    assert_eq!(handles.len(), requests.len());

    wait_all(handles);

    let results = results.lock().unwrap();
    let mut delivered: Vec<String> = results.iter().map(|r| r.request.to_string()).collect();
    let mut expected: Vec<String> = requests.iter().map(|r| r.to_string()).collect();
    delivered.sort();
    expected.sort();
    assert_eq!(delivered, expected);
}

#[test]
fn test_pacing_with_single_worker() {
    let delay = Duration::from_millis(200);
    let (scheduler, _results, probe) = start(
        SchedulerConfig::default()
            .with_threads(0, 1)
            .with_delay(delay),
    );

    wait_all(scheduler.post(vec![request("/first"), request("/second")]).unwrap());

    let starts = probe.starts();
    assert_eq!(starts.len(), 2);
    assert_eq!(starts[0].0, "/first");
    assert!(starts[1].1.duration_since(starts[0].1) >= delay);
}

#[test]
fn test_pacing_disabled_with_multiple_workers() {
    let (scheduler, _results, probe) = start(
        SchedulerConfig::default()
            .with_threads(0, 2)
            .with_delay(Duration::from_secs(2)),
    );

    let posted = Instant::now();
    wait_all(scheduler.post(vec![request("/a"), request("/b")]).unwrap());

    assert!(posted.elapsed() < Duration::from_secs(1));
    let starts = probe.starts();
    assert_eq!(starts.len(), 2);
    assert!(starts[1].1.duration_since(starts[0].1) < Duration::from_millis(500));
}

#[test]
fn test_headers_and_interceptor_applied_to_pages() {
    let mut headers = HashMap::new();
    headers.insert("Accept-Language".to_string(), "en".to_string());
    let intercepted = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&intercepted);

    let config = SchedulerConfig::default()
        .with_threads(0, 2)
        .with_headers(headers)
        .with_intercept(Arc::new(move |request: &mut InterceptedRequest| {
            seen.fetch_add(1, Ordering::SeqCst);
            if request.url().path() == "/blocked" {
                request.abort();
            }
        }));
    let (scheduler, results, _probe) = start(config);

    wait_all(scheduler.post(vec![request("/ok"), request("/blocked")]).unwrap());
    assert_eq!(intercepted.load(Ordering::SeqCst), 2);

    let results = results.lock().unwrap();
    for result in results.iter() {
        let page = result.page.as_ref().unwrap();
        assert_eq!(page.headers.get("Accept-Language").map(String::as_str), Some("en"));

        if result.request.url().path() == "/blocked" {
            assert_eq!(
                result.error().map(NavigationError::kind),
                Some(NavigationErrorKind::Aborted)
            );
        } else {
            assert!(result.is_loaded());
        }
    }
}

#[test]
fn test_counters_track_submissions() {
    let (scheduler, _results, _probe) = start(SchedulerConfig::default().with_threads(0, 3));

    let handles = scheduler
        .post((0..5).map(|i| request(&format!("/n{}", i))))
        .unwrap();
    assert_eq!(scheduler.scheduled_task_count(), 5);

    wait_all(handles);
    assert_eq!(scheduler.completed_task_count(), 5);
    assert_eq!(scheduler.queue_length(), 0);
}

#[test]
fn test_empty_post_changes_nothing() {
    let (scheduler, results, _probe) = start(SchedulerConfig::default());

    let handles = scheduler.post(Vec::new()).unwrap();

    assert!(handles.is_empty());
    assert_eq!(scheduler.scheduled_task_count(), 0);
    assert_eq!(scheduler.completed_task_count(), 0);
    assert!(results.lock().unwrap().is_empty());
}

#[test]
fn test_graceful_stop_drains_backlog_and_quits_once() {
    let (scheduler, results, probe) = start(SchedulerConfig::default().with_threads(0, 1));

    let handles = scheduler
        .post((0..4).map(|i| request(&format!("/q{}", i))))
        .unwrap();

    let report = scheduler.stop().unwrap();
    assert!(report.graceful);
    assert_eq!(scheduler.state(), SchedulerState::Stopped);
    assert_eq!(probe.quits.load(Ordering::SeqCst), 1);
    assert_eq!(results.lock().unwrap().len(), 4);
    assert!(wait_all(handles).iter().all(|s| *s == TaskStatus::Completed));
}

#[test]
fn test_forced_stop_still_quits_engine_once() {
    let (scheduler, results, probe) = start(
        SchedulerConfig::default()
            .with_threads(0, 1)
            .with_shutdown_timeout(Duration::from_millis(100)),
    );

    let mut handles = scheduler
        .post(vec![request("/hang"), request("/never")])
        .unwrap();

    let started = Instant::now();
    let report = scheduler.stop().unwrap();
    assert!(!report.graceful);
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(probe.quits.load(Ordering::SeqCst), 1);

    // The queued request was discarded by the forced termination.
    let never = handles.pop().unwrap();
    assert_eq!(never.wait(), TaskStatus::Cancelled);

    probe.release();
    let hung = handles.pop().unwrap();
    assert_eq!(hung.wait(), TaskStatus::Completed);

    assert_eq!(scheduler.stop(), None);
    assert_eq!(probe.quits.load(Ordering::SeqCst), 1);

    let results = results.lock().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].request.url().path(), "/hang");
}

#[test]
fn test_post_after_stop_is_rejected() {
    let (scheduler, _results, _probe) = start(SchedulerConfig::default());
    scheduler.stop();

    let result = scheduler.post(vec![request("/late")]);
    assert!(matches!(result, Err(SchedulerError::Stopped(_))));
}

#[test]
fn test_drop_stops_running_scheduler() {
    let (scheduler, _results, probe) = start(SchedulerConfig::default());
    wait_all(scheduler.post(vec![request("/ok")]).unwrap());

    drop(scheduler);
    assert_eq!(probe.quits.load(Ordering::SeqCst), 1);
}

#[test]
fn test_engine_launch_failure_is_fatal() {
    let mut engine = EngineOptions::default();
    engine
        .extra
        .insert("fail-launch".to_string(), toml::Value::Boolean(true));

    let results: Results = Arc::new(Mutex::new(Vec::new()));
    let outcome: Result<Scheduler<RecordingEngine, Results>, SchedulerError> =
        Scheduler::new(results, SchedulerConfig::default().with_engine_options(engine));

    assert!(matches!(outcome, Err(SchedulerError::Engine(EngineError::Launch(_)))));
}

#[tokio::test]
async fn test_results_stream_through_async_channel() {
    let (tx, mut rx) =
        tokio::sync::mpsc::unbounded_channel::<NavigationResult<RecordingPage>>();
    let engine = RecordingEngine {
        probe: Arc::new(Probe::default()),
    };
    let scheduler = Scheduler::with_engine(tx, SchedulerConfig::default().with_threads(0, 2), engine)
        .expect("Failed to create scheduler");

    let handles = scheduler
        .post(vec![request("/one"), stub("/two"), request("/fail")])
        .unwrap();
    for handle in handles {
        assert_eq!(handle.await, TaskStatus::Completed);
    }

    let mut loaded = 0;
    let mut skipped = 0;
    let mut failed = 0;
    for _ in 0..3 {
        let result = rx.recv().await.unwrap();
        if result.is_loaded() {
            loaded += 1;
        } else if result.is_skipped() {
            skipped += 1;
        } else {
            failed += 1;
        }
    }
    assert_eq!((loaded, skipped, failed), (1, 1, 1));
}
