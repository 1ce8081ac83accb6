//! HTTP navigation engine
//!
//! A lightweight [`Engine`] that "navigates" by issuing a GET request with a
//! shared reqwest client and keeping the response as the page content. It
//! does not run scripts or load subresources; interception therefore sees
//! the document request only.
//!
//! Like a browser, a page that answers with a 4xx/5xx status still counts
//! as loaded. Only transport failures (DNS, connection, TLS, timeouts,
//! redirect limits) fail the navigation.

use crate::config::EngineOptions;
use crate::crawler::panic_message;
use crate::engine::{
    parse_html, Engine, InterceptDecision, InterceptHandler, InterceptedRequest, NavigationError,
    Page, ParsedPage,
};
use crate::{EngineError, EngineResult};
use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::redirect::Policy;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use url::Url;

/// Engine-specific option: skip TLS certificate verification
const OPT_ACCEPT_INVALID_CERTS: &str = "accept-invalid-certs";

/// Engine-specific option: route all requests through this proxy URL
const OPT_PROXY: &str = "proxy";

/// Engine-specific option: connect timeout in seconds
const OPT_CONNECT_TIMEOUT: &str = "connect-timeout";

/// The response a page holds after a navigation
#[derive(Debug, Clone)]
pub struct PageSnapshot {
    /// URL after redirects
    pub url: Url,

    /// HTTP status code
    pub status: u16,

    /// Content-Type header value
    pub content_type: Option<String>,

    /// Response body
    pub body: String,

    /// When the response finished downloading
    pub fetched_at: DateTime<Utc>,
}

impl PageSnapshot {
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.contains("text/html"))
            .unwrap_or(false)
    }
}

/// Navigation engine backed by a blocking reqwest client
///
/// The client is shared by every page; reqwest clients are safe to use
/// from many threads, which satisfies the concurrent page-creation
/// contract without extra locking.
pub struct HttpEngine {
    client: Client,
    closed: Arc<AtomicBool>,
    options: EngineOptions,
}

impl fmt::Debug for HttpEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpEngine")
            .field("closed", &self.is_closed())
            .field("options", &self.options)
            .finish()
    }
}

impl HttpEngine {
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Engine for HttpEngine {
    type Page = HttpPage;

    /// Builds the shared client on a short-lived helper thread
    ///
    /// The blocking client owns an internal runtime and cannot be built on a
    /// thread that is already inside one. Launching from async code is fine.
    fn launch(options: &EngineOptions) -> EngineResult<Self> {
        let client = thread::scope(|scope| -> EngineResult<Client> {
            thread::Builder::new()
                .name("vessel-engine-launch".to_string())
                .spawn_scoped(scope, || build_http_client(options))
                .map_err(|e| EngineError::Launch(format!("failed to spawn launch thread: {}", e)))?
                .join()
                .map_err(|payload| {
                    EngineError::Launch(format!(
                        "HTTP client construction panicked: {}",
                        panic_message(payload.as_ref())
                    ))
                })?
        })?;

        tracing::debug!(
            user_agent = %options.user_agent,
            timeout = ?options.timeout_duration(),
            max_redirects = options.max_redirects,
            "HTTP engine launched"
        );

        Ok(Self {
            client,
            closed: Arc::new(AtomicBool::new(false)),
            options: options.clone(),
        })
    }

    fn create_page(&self) -> Result<HttpPage, NavigationError> {
        if self.is_closed() {
            return Err(NavigationError::PageCreation(
                "engine has been shut down".to_string(),
            ));
        }

        Ok(HttpPage {
            client: self.client.clone(),
            closed: Arc::clone(&self.closed),
            headers: HeaderMap::new(),
            interceptor: None,
            snapshot: None,
        })
    }

    fn quit(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            tracing::debug!("HTTP engine closed");
        }
    }
}

/// Builds the shared HTTP client from engine options
///
/// Recognized pass-through options: `accept-invalid-certs` (bool),
/// `proxy` (URL string) and `connect-timeout` (seconds).
fn build_http_client(options: &EngineOptions) -> EngineResult<Client> {
    let mut builder = Client::builder()
        .user_agent(options.user_agent.as_str())
        .timeout(options.timeout_duration())
        .redirect(Policy::limited(options.max_redirects))
        .gzip(true)
        .brotli(true);

    if let Some(value) = options.extra(OPT_ACCEPT_INVALID_CERTS) {
        let accept = value.as_bool().ok_or_else(|| EngineError::InvalidOption {
            key: OPT_ACCEPT_INVALID_CERTS.to_string(),
            message: "expected a boolean".to_string(),
        })?;
        builder = builder.danger_accept_invalid_certs(accept);
    }

    if let Some(value) = options.extra(OPT_PROXY) {
        let proxy_url = value.as_str().ok_or_else(|| EngineError::InvalidOption {
            key: OPT_PROXY.to_string(),
            message: "expected a URL string".to_string(),
        })?;
        let proxy = reqwest::Proxy::all(proxy_url).map_err(|e| EngineError::InvalidOption {
            key: OPT_PROXY.to_string(),
            message: e.to_string(),
        })?;
        builder = builder.proxy(proxy);
    }

    if let Some(value) = options.extra(OPT_CONNECT_TIMEOUT) {
        let secs = value
            .as_float()
            .or_else(|| value.as_integer().map(|i| i as f64))
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .ok_or_else(|| EngineError::InvalidOption {
                key: OPT_CONNECT_TIMEOUT.to_string(),
                message: "expected a non-negative number of seconds".to_string(),
            })?;
        builder = builder.connect_timeout(secs);
    }

    Ok(builder.build()?)
}

/// A page opened on an [`HttpEngine`]
pub struct HttpPage {
    client: Client,
    closed: Arc<AtomicBool>,
    headers: HeaderMap,
    interceptor: Option<InterceptHandler>,
    snapshot: Option<PageSnapshot>,
}

impl fmt::Debug for HttpPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpPage")
            .field("headers", &self.headers)
            .field("intercepting", &self.interceptor.is_some())
            .field("snapshot", &self.snapshot)
            .finish()
    }
}

impl HttpPage {
    /// The response of the last successful navigation
    pub fn snapshot(&self) -> Option<&PageSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn url(&self) -> Option<&Url> {
        self.snapshot.as_ref().map(|s| &s.url)
    }

    pub fn status(&self) -> Option<u16> {
        self.snapshot.as_ref().map(|s| s.status)
    }

    pub fn body(&self) -> Option<&str> {
        self.snapshot.as_ref().map(|s| s.body.as_str())
    }

    /// Parses the loaded document, if it is HTML
    pub fn parse(&self) -> Option<ParsedPage> {
        self.snapshot
            .as_ref()
            .filter(|s| s.is_html())
            .map(|s| parse_html(&s.body, &s.url))
    }

    pub fn title(&self) -> Option<String> {
        self.parse().and_then(|parsed| parsed.title)
    }

    pub fn links(&self) -> Vec<Url> {
        self.parse().map(|parsed| parsed.links).unwrap_or_default()
    }

    /// Runs the interceptor, returning the headers to send
    fn intercept(&self, url: &Url) -> Result<HeaderMap, NavigationError> {
        let Some(handler) = &self.interceptor else {
            return Ok(self.headers.clone());
        };

        let mut request = InterceptedRequest::new("GET", url.clone(), header_map_to_hash(&self.headers));
        handler(&mut request);

        if request.decision() == InterceptDecision::Abort {
            return Err(NavigationError::Aborted {
                url: url.to_string(),
            });
        }

        hash_to_header_map(&request.into_headers()).map_err(NavigationError::Interception)
    }
}

impl Page for HttpPage {
    fn set_headers(&mut self, headers: &HashMap<String, String>) -> Result<(), NavigationError> {
        self.headers = hash_to_header_map(headers).map_err(NavigationError::Headers)?;
        Ok(())
    }

    fn enable_interception(&mut self, handler: InterceptHandler) -> Result<(), NavigationError> {
        self.interceptor = Some(handler);
        Ok(())
    }

    fn goto(&mut self, url: &Url) -> Result<(), NavigationError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(NavigationError::Navigation {
                url: url.to_string(),
                message: "engine has been shut down".to_string(),
            });
        }

        let headers = self.intercept(url)?;

        let response = self
            .client
            .get(url.clone())
            .headers(headers)
            .send()
            .map_err(|e| classify_error(url, e))?;

        let status = response.status().as_u16();
        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response.text().map_err(|e| classify_error(url, e))?;

        tracing::trace!(url = %url, final_url = %final_url, status, "page loaded");

        self.snapshot = Some(PageSnapshot {
            url: final_url,
            status,
            content_type,
            body,
            fetched_at: Utc::now(),
        });

        Ok(())
    }
}

/// Maps a reqwest failure onto a navigation error
fn classify_error(url: &Url, error: reqwest::Error) -> NavigationError {
    if error.is_timeout() {
        NavigationError::Timeout {
            url: url.to_string(),
        }
    } else if error.is_redirect() {
        NavigationError::Navigation {
            url: url.to_string(),
            message: "too many redirects".to_string(),
        }
    } else if error.is_connect() {
        NavigationError::Navigation {
            url: url.to_string(),
            message: format!("connection failed: {}", error),
        }
    } else {
        NavigationError::Navigation {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}

fn hash_to_header_map(headers: &HashMap<String, String>) -> Result<HeaderMap, String> {
    let mut map = HeaderMap::with_capacity(headers.len());

    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| format!("invalid header name '{}'", name))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| format!("invalid value for header '{}'", name))?;
        map.insert(name, value);
    }

    Ok(map)
}

fn header_map_to_hash(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}
