use crate::config::NormalizerConfig;
use crate::UrlError;
use url::Url;

/// List of tracking query parameters to remove during normalization
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "mc_eid",
];

/// Canonicalizes URLs before they are de-duplicated and queued
pub trait UrlNormalizer: Send + Sync {
    /// Returns the canonical form of `url`, or `None` when it is not crawlable
    fn normalize(&self, url: &str) -> Option<String>;
}

/// Default normalizer driven by [`NormalizerConfig`]
#[derive(Debug, Clone, Default)]
pub struct GenericUrlNormalizer {
    config: NormalizerConfig,
}

impl GenericUrlNormalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }
}

impl UrlNormalizer for GenericUrlNormalizer {
    fn normalize(&self, url: &str) -> Option<String> {
        match normalize_url(url, &self.config) {
            Ok(normalized) => Some(normalized.to_string()),
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "URL rejected by normalizer");
                None
            }
        }
    }
}

/// Normalizes a URL according to the configured rules
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed (dot segments are resolved and
///    the host is lower-cased while parsing, default ports are dropped)
/// 2. Reject anything but HTTP and HTTPS, and URLs without a host
/// 3. Collapse empty path segments; empty path becomes /
/// 4. Optionally remove the trailing slash (except for root /)
/// 5. Remove fragment (everything after #)
/// 6. Optionally remove tracking query parameters
/// 7. Optionally sort remaining query parameters by key
/// 8. Remove empty query string (trailing ?)
///
/// # Examples
///
/// ```
/// use ripple_frontier::config::NormalizerConfig;
/// use ripple_frontier::url::normalize_url;
///
/// let url = normalize_url("HTTP://EXAMPLE.COM/a/../page#top", &NormalizerConfig::default()).unwrap();
/// assert_eq!(url.as_str(), "http://example.com/page");
/// ```
pub fn normalize_url(url_str: &str, config: &NormalizerConfig) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().map(str::is_empty).unwrap_or(true) {
        return Err(UrlError::MissingHost);
    }

    let normalized_path = normalize_path(url.path(), config.remove_trailing_slash);
    url.set_path(&normalized_path);

    url.set_fragment(None);

    if url.query().is_some() {
        let params = filter_and_sort_query_params(&url, config);
        if params.is_empty() {
            url.set_query(None);
        } else if config.remove_tracking_params || config.sort_query_params {
            url.query_pairs_mut().clear().extend_pairs(params);
        }
    }

    Ok(url)
}

/// Collapses empty and dot segments, optionally dropping the trailing slash
fn normalize_path(path: &str, remove_trailing_slash: bool) -> String {
    let trailing_slash = path.len() > 1 && path.ends_with('/');

    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    if segments.is_empty() {
        return "/".to_string();
    }

    let mut result = format!("/{}", segments.join("/"));
    if trailing_slash && !remove_trailing_slash {
        result.push('/');
    }
    result
}

/// Filters out tracking parameters and sorts remaining query parameters
fn filter_and_sort_query_params(url: &Url, config: &NormalizerConfig) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !(config.remove_tracking_params && is_tracking_param(key)))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    if config.sort_query_params {
        // Stable sort keeps repeated keys in their original order
        params.sort_by(|a, b| a.0.cmp(&b.0));
    }

    params
}

/// Checks if a query parameter is a tracking parameter
fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key) || key.starts_with("utm_")
}
