use crate::state::ReferenceStatus;
use crate::url::url_root;
use chrono::{DateTime, Utc};

/// A URL under consideration, plus the crawl metadata attached to it
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    /// Normalized URL
    pub url: String,

    /// Hop distance from a start URL
    pub depth: u32,

    /// Scheme and authority of `url`, used for sitemap and delay grouping
    pub url_root: String,

    // Sitemap hints, never authoritative
    pub sitemap_last_mod: Option<DateTime<Utc>>,
    pub sitemap_change_freq: Option<String>,
    pub sitemap_priority: Option<f32>,

    /// Outcome of the latest processing attempt
    pub status: Option<ReferenceStatus>,

    pub head_checksum: Option<String>,
    pub doc_checksum: Option<String>,

    /// Links extracted from the document on its latest fetch
    pub referenced_urls: Vec<String>,
}

impl Reference {
    /// Creates a reference with no outcome or hints yet
    pub fn new(url: impl Into<String>, depth: u32) -> Self {
        let url = url.into();
        let url_root = url_root(&url).unwrap_or_default();
        Self {
            url,
            depth,
            url_root,
            sitemap_last_mod: None,
            sitemap_change_freq: None,
            sitemap_priority: None,
            status: None,
            head_checksum: None,
            doc_checksum: None,
            referenced_urls: Vec::new(),
        }
    }

    /// Replaces the URL, recomputing the URL root
    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = url.into();
        self.url_root = url_root(&self.url).unwrap_or_default();
    }

    /// Returns the status, treating a missing outcome as not good
    pub fn has_good_status(&self) -> bool {
        self.status.map(|s| s.is_good()).unwrap_or(false)
    }
}
