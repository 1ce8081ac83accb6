//! Navigation engine contract
//!
//! The scheduler never talks to a network stack directly. It drives an
//! [`Engine`], which hands out [`Page`]s that can be configured and
//! navigated. This module contains:
//! - The `Engine` and `Page` traits
//! - Request interception types
//! - The per-navigation error type carried inside results
//! - An HTTP-backed engine built on reqwest

mod http;
mod parser;

pub use http::{HttpEngine, HttpPage, PageSnapshot};
pub use parser::{parse_html, ParsedPage};

use crate::config::EngineOptions;
use crate::EngineResult;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use url::Url;

/// Callback fired for every network request a page issues while
/// interception is enabled
pub type InterceptHandler = Arc<dyn Fn(&mut InterceptedRequest) + Send + Sync>;

/// A navigation engine shared by every worker of a scheduler
///
/// One instance lives for the whole lifetime of a scheduler and is used
/// from many worker threads at once. The `Sync` bound is the contract that
/// `create_page` is safe to call concurrently; engines wrapping a backend
/// without that guarantee must serialize page creation internally (a lock
/// around `create_page` only, never around navigation).
pub trait Engine: Send + Sync + Sized + 'static {
    /// Page handle produced by this engine
    type Page: Page;

    /// Starts the engine
    ///
    /// Failing here is fatal for the scheduler being constructed.
    fn launch(options: &EngineOptions) -> EngineResult<Self>;

    /// Opens a fresh page
    fn create_page(&self) -> Result<Self::Page, NavigationError>;

    /// Releases all engine resources
    fn quit(&self);
}

/// A single page owned exclusively by one task
pub trait Page: Send + 'static {
    /// Replaces the extra headers sent with every request of this page
    fn set_headers(&mut self, headers: &HashMap<String, String>) -> Result<(), NavigationError>;

    /// Turns on request interception and registers `handler` for it
    fn enable_interception(&mut self, handler: InterceptHandler) -> Result<(), NavigationError>;

    /// Navigates the page to `url`
    fn goto(&mut self, url: &Url) -> Result<(), NavigationError>;
}

/// What happens to an intercepted request once the handler returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterceptDecision {
    #[default]
    Continue,
    Abort,
}

/// A network request paused by interception
#[derive(Debug, Clone)]
pub struct InterceptedRequest {
    method: String,
    url: Url,
    headers: HashMap<String, String>,
    decision: InterceptDecision,
}

impl InterceptedRequest {
    pub fn new(method: impl Into<String>, url: Url, headers: HashMap<String, String>) -> Self {
        Self {
            method: method.into(),
            url,
            headers,
            decision: InterceptDecision::Continue,
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Adds or replaces a header on the outgoing request
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name.into(), value.into());
    }

    /// Lets the request through (the default)
    pub fn resume(&mut self) {
        self.decision = InterceptDecision::Continue;
    }

    /// Drops the request; the navigation that issued it fails
    pub fn abort(&mut self) {
        self.decision = InterceptDecision::Abort;
    }

    pub fn decision(&self) -> InterceptDecision {
        self.decision
    }

    pub(crate) fn into_headers(self) -> HashMap<String, String> {
        self.headers
    }
}

/// Where in the navigation a failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NavigationErrorKind {
    PageCreation,
    Headers,
    Interception,
    Aborted,
    Timeout,
    Navigation,
    Panicked,
}

impl NavigationErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PageCreation => "page_creation",
            Self::Headers => "headers",
            Self::Interception => "interception",
            Self::Aborted => "aborted",
            Self::Timeout => "timeout",
            Self::Navigation => "navigation",
            Self::Panicked => "panicked",
        }
    }
}

impl fmt::Display for NavigationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure captured while running one navigation
///
/// These never escape a task; they travel to the output sink inside a
/// [`NavigationResult`](crate::crawler::NavigationResult).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavigationError {
    #[error("Failed to create page: {0}")]
    PageCreation(String),

    #[error("Failed to apply headers: {0}")]
    Headers(String),

    #[error("Failed to enable request interception: {0}")]
    Interception(String),

    #[error("Request to {url} was aborted by the interceptor")]
    Aborted { url: String },

    #[error("Navigation to {url} timed out")]
    Timeout { url: String },

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Task panicked: {0}")]
    Panicked(String),
}

impl NavigationError {
    pub fn kind(&self) -> NavigationErrorKind {
        match self {
            Self::PageCreation(_) => NavigationErrorKind::PageCreation,
            Self::Headers(_) => NavigationErrorKind::Headers,
            Self::Interception(_) => NavigationErrorKind::Interception,
            Self::Aborted { .. } => NavigationErrorKind::Aborted,
            Self::Timeout { .. } => NavigationErrorKind::Timeout,
            Self::Navigation { .. } => NavigationErrorKind::Navigation,
            Self::Panicked(_) => NavigationErrorKind::Panicked,
        }
    }
}
