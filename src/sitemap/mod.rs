//! Sitemap discovery
//!
//! A [`SitemapResolver`] turns a site root into the URLs its sitemaps list.
//! The admission pipeline asks for each site root at most once per run and
//! feeds the results back into itself with sitemap expansion disabled.

mod resolver;

pub use resolver::HttpSitemapResolver;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// A URL listed in a sitemap, with its optional hints
#[derive(Debug, Clone, PartialEq)]
pub struct SitemapUrl {
    pub url: String,
    pub last_mod: Option<DateTime<Utc>>,
    pub change_freq: Option<String>,
    pub priority: Option<f32>,
}

impl SitemapUrl {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            last_mod: None,
            change_freq: None,
            priority: None,
        }
    }
}

/// Resolves the sitemaps of a site
///
/// Failures are logged and yield whatever was collected so far.
#[async_trait]
pub trait SitemapResolver: Send + Sync {
    /// `hint_locations` are sitemap URLs already known, e.g. from robots.txt.
    /// Without hints the resolver probes the conventional locations.
    async fn resolve_sitemaps(&self, url_root: &str, hint_locations: &[String]) -> Vec<SitemapUrl>;
}
