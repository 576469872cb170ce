//! URL handling module for Ripple-Frontier
//!
//! This module provides URL normalization, site-root extraction and the
//! crawl scope strategy that decides which discovered URLs may be followed.

mod normalize;
mod scope;

use url::Url;

// Re-export main types and functions
pub use normalize::{normalize_url, GenericUrlNormalizer, UrlNormalizer};
pub use scope::CrawlScopeStrategy;

/// Extracts the site root (scheme and authority) of a URL
///
/// Default ports are omitted, so `https://a.com:443/x` and `https://a.com/y`
/// share the root `https://a.com`.
///
/// # Examples
///
/// ```
/// use ripple_frontier::url::url_root;
///
/// assert_eq!(url_root("https://EXAMPLE.com/path?q=1").as_deref(), Some("https://example.com"));
/// assert_eq!(url_root("http://example.com:8080/").as_deref(), Some("http://example.com:8080"));
/// assert_eq!(url_root("not a url"), None);
/// ```
pub fn url_root(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(match parsed.port() {
        Some(port) => format!("{}://{}:{}", parsed.scheme(), host, port),
        None => format!("{}://{}", parsed.scheme(), host),
    })
}
