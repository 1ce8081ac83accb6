//! Navigation task: turns one request into one result
//!
//! A task never fails. Every problem met while opening, configuring or
//! navigating the page, including a panic inside the engine, is captured
//! and returned as data in the [`NavigationResult`].

use crate::config::SchedulerConfig;
use crate::crawler::{panic_message, Request};
use crate::engine::{Engine, InterceptHandler, NavigationError, Page};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

/// How a navigation ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// Stub request, the engine was never contacted
    Skipped,

    /// The page navigated successfully
    Loaded,

    /// Something failed along the way
    Failed(NavigationError),
}

/// The value delivered to the output sink for every submitted request
///
/// `page` holds whatever page existed when the task finished: `None` for
/// stubs and for failures before a page could be created.
#[derive(Debug)]
pub struct NavigationResult<P> {
    pub page: Option<P>,
    pub request: Request,
    pub outcome: NavigationOutcome,
}

impl<P> NavigationResult<P> {
    /// Result for a stub request
    pub fn skipped(request: Request) -> Self {
        Self {
            page: None,
            request,
            outcome: NavigationOutcome::Skipped,
        }
    }

    pub fn loaded(page: P, request: Request) -> Self {
        Self {
            page: Some(page),
            request,
            outcome: NavigationOutcome::Loaded,
        }
    }

    pub fn failed(page: Option<P>, request: Request, error: NavigationError) -> Self {
        Self {
            page,
            request,
            outcome: NavigationOutcome::Failed(error),
        }
    }

    pub fn error(&self) -> Option<&NavigationError> {
        match &self.outcome {
            NavigationOutcome::Failed(error) => Some(error),
            _ => None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.outcome, NavigationOutcome::Loaded)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, NavigationOutcome::Skipped)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, NavigationOutcome::Failed(_))
    }

    /// Splits the result into the `(page, request, error)` triple
    pub fn into_parts(self) -> (Option<P>, Request, Option<NavigationError>) {
        let error = match self.outcome {
            NavigationOutcome::Failed(error) => Some(error),
            _ => None,
        };
        (self.page, self.request, error)
    }
}

/// Per-page settings shared by every task of a scheduler
#[derive(Clone, Default)]
pub struct NavigationSettings {
    pub headers: Option<HashMap<String, String>>,
    pub intercept: Option<InterceptHandler>,

    /// Pause before navigating; `None` when pacing is disabled
    pub pacing: Option<Duration>,
}

impl NavigationSettings {
    /// Derives task settings from a scheduler configuration
    ///
    /// Pacing is only kept for single-worker pools, see
    /// [`SchedulerConfig::pacing_enabled`].
    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self {
            headers: config.headers.clone(),
            intercept: config.intercept.clone(),
            pacing: config.pacing_enabled().then_some(config.delay),
        }
    }
}

/// One request bound to the engine that will navigate it
pub struct NavigationTask<E: Engine> {
    engine: Arc<E>,
    settings: Arc<NavigationSettings>,
    request: Request,
}

impl<E: Engine> NavigationTask<E> {
    pub fn new(engine: Arc<E>, settings: Arc<NavigationSettings>, request: Request) -> Self {
        Self {
            engine,
            settings,
            request,
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Runs the navigation on the current thread
    ///
    /// Blocks for the pacing delay (if any) and for the engine call.
    pub fn run(self) -> NavigationResult<E::Page> {
        let Self {
            engine,
            settings,
            request,
        } = self;

        if request.is_stub() {
            tracing::trace!(url = %request.url(), "Skipping stub request");
            return NavigationResult::skipped(request);
        }

        let mut page = None;
        let attempt = panic::catch_unwind(AssertUnwindSafe(|| {
            navigate(engine.as_ref(), &settings, &request, &mut page)
        }));

        let error = match attempt {
            Ok(Ok(())) => None,
            Ok(Err(error)) => Some(error),
            Err(payload) => Some(NavigationError::Panicked(panic_message(payload.as_ref()))),
        };

        match (error, page) {
            (None, Some(page)) => {
                tracing::trace!(url = %request.url(), "Navigation finished");
                NavigationResult::loaded(page, request)
            }
            (None, None) => NavigationResult::failed(
                None,
                request,
                NavigationError::PageCreation("engine returned no page".to_string()),
            ),
            (Some(error), page) => {
                tracing::warn!(
                    url = %request.url(),
                    kind = %error.kind(),
                    error = %error,
                    "Navigation failed"
                );
                NavigationResult::failed(page, request, error)
            }
        }
    }
}

/// Opens, configures and navigates a page
///
/// The page is stored in `slot` as soon as it exists so a failure in a
/// later step still hands it back to the caller.
fn navigate<E: Engine>(
    engine: &E,
    settings: &NavigationSettings,
    request: &Request,
    slot: &mut Option<E::Page>,
) -> Result<(), NavigationError> {
    let page = slot.insert(engine.create_page()?);

    if let Some(headers) = &settings.headers {
        page.set_headers(headers)?;
    }

    if let Some(handler) = &settings.intercept {
        page.enable_interception(Arc::clone(handler))?;
    }

    if let Some(delay) = settings.pacing {
        tracing::trace!(url = %request.url(), ?delay, "Pacing before navigation");
        std::thread::sleep(delay);
    }

    page.goto(request.url())
}
