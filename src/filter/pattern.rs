use crate::config::FilterEntry;
use crate::crawler::{CrawlDocument, Metadata};
use crate::filter::{DocumentFilter, HeadersFilter, OnMatch, OnMatchFilter, UrlFilter};
use crate::ConfigError;
use regex::{Regex, RegexBuilder};
use std::sync::Arc;

fn compile(entry: &FilterEntry) -> Result<Regex, ConfigError> {
    RegexBuilder::new(&entry.pattern)
        .case_insensitive(!entry.case_sensitive)
        .build()
        .map_err(|e| ConfigError::InvalidPattern(format!("'{}': {}", entry.pattern, e)))
}

/// Turns a raw match into the filter's accept answer
fn verdict(on_match: OnMatch, matched: bool) -> bool {
    match on_match {
        OnMatch::Include => matched,
        OnMatch::Exclude => !matched,
    }
}

/// Matches the whole URL against a regular expression
#[derive(Debug, Clone)]
pub struct RegexUrlFilter {
    regex: Regex,
    on_match: OnMatch,
}

impl RegexUrlFilter {
    pub fn new(regex: Regex, on_match: OnMatch) -> Self {
        Self { regex, on_match }
    }
}

impl OnMatchFilter for RegexUrlFilter {
    fn on_match(&self) -> OnMatch {
        self.on_match
    }
}

impl UrlFilter for RegexUrlFilter {
    fn accept_url(&self, url: &str) -> bool {
        verdict(self.on_match, self.regex.is_match(url))
    }
}

/// Matches header values against a regular expression
///
/// With a field, only the values of that header are tested. Without one,
/// every `Name: value` line is.
#[derive(Debug, Clone)]
pub struct RegexHeaderFilter {
    field: Option<String>,
    regex: Regex,
    on_match: OnMatch,
}

impl RegexHeaderFilter {
    pub fn new(field: Option<String>, regex: Regex, on_match: OnMatch) -> Self {
        Self {
            field,
            regex,
            on_match,
        }
    }
}

impl OnMatchFilter for RegexHeaderFilter {
    fn on_match(&self) -> OnMatch {
        self.on_match
    }
}

impl HeadersFilter for RegexHeaderFilter {
    fn accept_headers(&self, _url: &str, headers: &Metadata) -> bool {
        verdict(self.on_match, metadata_matches(&self.regex, self.field.as_deref(), headers))
    }
}

/// Matches document content, or one metadata field, against a regular expression
#[derive(Debug, Clone)]
pub struct RegexDocumentFilter {
    field: Option<String>,
    regex: Regex,
    on_match: OnMatch,
}

impl RegexDocumentFilter {
    pub fn new(field: Option<String>, regex: Regex, on_match: OnMatch) -> Self {
        Self {
            field,
            regex,
            on_match,
        }
    }
}

impl OnMatchFilter for RegexDocumentFilter {
    fn on_match(&self) -> OnMatch {
        self.on_match
    }
}

impl DocumentFilter for RegexDocumentFilter {
    fn accept_document(&self, document: &CrawlDocument) -> bool {
        let matched = match &self.field {
            Some(_) => metadata_matches(&self.regex, self.field.as_deref(), &document.metadata),
            None => self.regex.is_match(&String::from_utf8_lossy(&document.content)),
        };
        verdict(self.on_match, matched)
    }
}

fn metadata_matches(regex: &Regex, field: Option<&str>, metadata: &Metadata) -> bool {
    match field {
        Some(field) => metadata.get_all(field).iter().any(|v| regex.is_match(v)),
        None => metadata.iter().any(|(name, values)| {
            values
                .iter()
                .any(|v| regex.is_match(&format!("{}: {}", name, v)))
        }),
    }
}

/// Builds URL filters from configuration entries
pub fn build_url_filters(entries: &[FilterEntry]) -> Result<Vec<Arc<dyn UrlFilter>>, ConfigError> {
    entries
        .iter()
        .map(|entry| {
            Ok(Arc::new(RegexUrlFilter::new(compile(entry)?, entry.on_match)) as Arc<dyn UrlFilter>)
        })
        .collect()
}

/// Builds header filters from configuration entries
pub fn build_header_filters(
    entries: &[FilterEntry],
) -> Result<Vec<Arc<dyn HeadersFilter>>, ConfigError> {
    entries
        .iter()
        .map(|entry| {
            let filter = RegexHeaderFilter::new(entry.field.clone(), compile(entry)?, entry.on_match);
            Ok(Arc::new(filter) as Arc<dyn HeadersFilter>)
        })
        .collect()
}

/// Builds document filters from configuration entries
pub fn build_document_filters(
    entries: &[FilterEntry],
) -> Result<Vec<Arc<dyn DocumentFilter>>, ConfigError> {
    entries
        .iter()
        .map(|entry| {
            let filter =
                RegexDocumentFilter::new(entry.field.clone(), compile(entry)?, entry.on_match);
            Ok(Arc::new(filter) as Arc<dyn DocumentFilter>)
        })
        .collect()
}
