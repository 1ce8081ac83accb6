//! HTML metadata extraction for loaded pages
//!
//! Pulls the title, meta description and outgoing links out of a page body
//! so consumers of navigation results do not each need an HTML parser.

use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Metadata extracted from an HTML document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedPage {
    /// Trimmed contents of the first `<title>` element
    pub title: Option<String>,

    /// Contents of `<meta name="description">`
    pub description: Option<String>,

    /// Absolute http(s) links, in document order
    pub links: Vec<Url>,
}

/// Parses an HTML document relative to the URL it was loaded from
///
/// Links come from `<a href>` and `<link rel="canonical">`. Anchors with a
/// `download` attribute, fragment-only hrefs, and `javascript:`, `mailto:`,
/// `tel:` or `data:` targets are skipped.
///
/// ```
/// use url::Url;
/// use vessel::engine::parse_html;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/next">Next</a></body></html>"#;
/// let parsed = parse_html(html, &Url::parse("https://example.com/").unwrap());
/// assert_eq!(parsed.title.as_deref(), Some("Test"));
/// assert_eq!(parsed.links[0].as_str(), "https://example.com/next");
/// ```
pub fn parse_html(html: &str, base_url: &Url) -> ParsedPage {
    let document = Html::parse_document(html);

    ParsedPage {
        title: first_text(&document, "title"),
        description: first_attr(&document, "meta[name='description'][content]", "content"),
        links: extract_links(&document, base_url),
    }
}

fn first_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;

    document
        .select(&selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn first_attr(document: &Html, selector: &str, attr: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;

    document
        .select(&selector)
        .next()
        .and_then(|element| element.value().attr(attr))
        .map(|value| value.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn extract_links(document: &Html, base_url: &Url) -> Vec<Url> {
    let mut links = Vec::new();

    for selector in ["a[href]", "link[rel='canonical'][href]"] {
        let Ok(selector) = Selector::parse(selector) else {
            continue;
        };

        links.extend(
            document
                .select(&selector)
                .filter(|element| !is_download(element))
                .filter_map(|element| element.value().attr("href"))
                .filter_map(|href| resolve_link(href, base_url)),
        );
    }

    links
}

fn is_download(element: &ElementRef<'_>) -> bool {
    element.value().attr("download").is_some()
}

/// Resolves an href against the page URL, keeping only http(s) targets
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| href.starts_with(scheme))
    {
        return None;
    }

    base_url
        .join(href)
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https"))
}
