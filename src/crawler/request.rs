use std::fmt;
use std::str::FromStr;
use url::Url;

/// A unit of work submitted to the scheduler
///
/// Requests are immutable; the scheduler only reads them and hands them
/// back inside the matching [`NavigationResult`](super::NavigationResult).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Request {
    url: Url,
    stub: bool,
}

impl Request {
    /// Creates a request that will be navigated
    pub fn new(url: Url) -> Self {
        Self { url, stub: false }
    }

    /// Creates a stub request
    ///
    /// Stubs never reach the navigation engine; they produce a result with
    /// no page and no error.
    pub fn stub(url: Url) -> Self {
        Self { url, stub: true }
    }

    /// Parses `url` into a navigable request
    pub fn parse(url: &str) -> Result<Self, url::ParseError> {
        Url::parse(url).map(Self::new)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn is_stub(&self) -> bool {
        self.stub
    }
}

impl FromStr for Request {
    type Err = url::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Url> for Request {
    fn from(url: Url) -> Self {
        Self::new(url)
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.stub {
            write!(f, "{} (stub)", self.url)
        } else {
            write!(f, "{}", self.url)
        }
    }
}
