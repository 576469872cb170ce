//! HTML parser for extracting links and metadata
//!
//! This module handles parsing HTML content to extract:
//! - Links to follow (anchors, canonical links, frames)
//! - Page title

use crate::crawler::document::CrawlDocument;
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Extracts outbound links from a fetched document
pub trait LinkExtractor: Send + Sync {
    /// Returns absolute URLs, without duplicates, in document order
    fn extract_links(&self, document: &CrawlDocument) -> Vec<String>;
}

/// Link extractor for HTML documents; other content types yield nothing
#[derive(Debug, Clone, Default)]
pub struct HtmlLinkExtractor;

impl LinkExtractor for HtmlLinkExtractor {
    fn extract_links(&self, document: &CrawlDocument) -> Vec<String> {
        if !document.is_html() {
            return Vec::new();
        }
        let Ok(base_url) = Url::parse(document.url()) else {
            return Vec::new();
        };
        parse_html(&document.text(), &base_url).links
    }
}

/// Extracted information from an HTML page
#[derive(Debug, Clone)]
pub struct ParsedPage {
    /// The page title (from <title> tag)
    pub title: Option<String>,

    /// All links found on the page (absolute URLs)
    pub links: Vec<String>,
}

/// Parses HTML content and extracts links and the title
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">`
/// - `<link rel="canonical" href="...">`
/// - `<frame src="...">` and `<iframe src="...">`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links
/// - Data URIs and fragment-only links
///
/// Relative links resolve against `<base href>` when present, else `base_url`.
///
/// # Example
///
/// ```
/// use ripple_frontier::crawler::parse_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let parsed = parse_html(html, &base_url);
/// assert_eq!(parsed.title, Some("Test".to_string()));
/// assert_eq!(parsed.links, vec!["https://example.com/page".to_string()]);
/// ```
pub fn parse_html(html: &str, base_url: &Url) -> ParsedPage {
    let document = Html::parse_document(html);

    let base = extract_base(&document, base_url).unwrap_or_else(|| base_url.clone());

    ParsedPage {
        title: extract_title(&document),
        links: extract_links(&document, &base),
    }
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Reads `<base href>`, resolved against the document URL
fn extract_base(document: &Html, base_url: &Url) -> Option<Url> {
    let selector = Selector::parse("base[href]").ok()?;
    let href = document.select(&selector).next()?.value().attr("href")?;
    base_url.join(href.trim()).ok()
}

/// Extracts all valid links from the HTML document
fn extract_links(document: &Html, base_url: &Url) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    let sources = [
        ("a[href]", "href"),
        ("link[rel='canonical'][href]", "href"),
        ("frame[src]", "src"),
        ("iframe[src]", "src"),
    ];

    for (selector, attribute) in sources {
        let Ok(selector) = Selector::parse(selector) else {
            continue;
        };
        for element in document.select(&selector) {
            if element.value().name() == "a" && element.value().attr("download").is_some() {
                continue;
            }

            if let Some(absolute_url) = element
                .value()
                .attr(attribute)
                .and_then(|href| resolve_link(href, base_url))
            {
                if seen.insert(absolute_url.clone()) {
                    links.push(absolute_url);
                }
            }
        }
    }

    links
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - fragment-only links
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let absolute_url = base_url.join(href).ok()?;
    match absolute_url.scheme() {
        "http" | "https" => Some(absolute_url.to_string()),
        _ => None,
    }
}
