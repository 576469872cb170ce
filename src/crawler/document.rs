//! Documents and their metadata as they travel through the fetch pipeline

use crate::state::Reference;
use serde::Serialize;
use std::collections::BTreeMap;

/// Metadata keys set by the crawler itself
pub mod keys {
    pub const URL: &str = "collector.url";
    pub const DEPTH: &str = "collector.depth";
    pub const CONTENT_TYPE: &str = "collector.content-type";
    pub const CONTENT_ENCODING: &str = "collector.content-encoding";
    pub const SITEMAP_LAST_MOD: &str = "collector.sm-lastmod";
    pub const SITEMAP_CHANGE_FREQ: &str = "collector.sm-changefreq";
    pub const SITEMAP_PRIORITY: &str = "collector.sm-priority";
    pub const REDIRECT_TARGET: &str = "collector.redirect-target";
}

/// Multi-valued metadata with case-insensitive keys
///
/// The first spelling of a key is kept, so HTTP headers keep the case the
/// server sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Metadata(BTreeMap<String, Vec<String>>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    fn key_for(&self, key: &str) -> Option<String> {
        self.0.keys().find(|k| k.eq_ignore_ascii_case(key)).cloned()
    }

    /// Appends a value to a key
    pub fn add(&mut self, key: &str, value: impl Into<String>) {
        let key = self.key_for(key).unwrap_or_else(|| key.to_string());
        self.0.entry(key).or_default().push(value.into());
    }

    /// Replaces all values of a key with a single value
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.remove(key);
        self.0.insert(key.to_string(), vec![value.into()]);
    }

    /// Removes a key, returning its values
    pub fn remove(&mut self, key: &str) -> Option<Vec<String>> {
        let existing = self.key_for(key)?;
        self.0.remove(&existing)
    }

    /// Returns the first value of a key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.get_all(key).first().map(String::as_str)
    }

    /// Returns every value of a key
    pub fn get_all(&self, key: &str) -> &[String] {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.key_for(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copies every entry of `other` into this metadata, appending values
    pub fn extend_from(&mut self, other: &Metadata) {
        for (key, values) in other.iter() {
            for value in values {
                self.add(key, value.clone());
            }
        }
    }
}

/// A fetched document
#[derive(Debug, Clone)]
pub struct CrawlDocument {
    pub reference: Reference,
    pub content: Vec<u8>,
    /// Mime type without parameters, e.g. `text/html`
    pub content_type: Option<String>,
    /// Character set from the `Content-Type` header
    pub content_encoding: Option<String>,
    pub metadata: Metadata,
}

impl CrawlDocument {
    pub fn new(reference: Reference) -> Self {
        Self {
            reference,
            content: Vec::new(),
            content_type: None,
            content_encoding: None,
            metadata: Metadata::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.reference.url
    }

    /// Returns true for HTML and XHTML documents
    pub fn is_html(&self) -> bool {
        matches!(
            self.content_type.as_deref(),
            Some("text/html") | Some("application/xhtml+xml")
        )
    }

    /// Content decoded as text, replacing invalid UTF-8 sequences
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.content).into_owned()
    }
}

/// Splits a `Content-Type` header into a lower-cased mime type and charset
pub fn parse_content_type(value: &str) -> (Option<String>, Option<String>) {
    let mut parts = value.split(';');
    let mime = parts
        .next()
        .map(|m| m.trim().to_ascii_lowercase())
        .filter(|m| !m.is_empty());
    let charset = parts.find_map(|param| {
        let (name, value) = param.split_once('=')?;
        name.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"').to_string())
            .filter(|v| !v.is_empty())
    });
    (mime, charset)
}
