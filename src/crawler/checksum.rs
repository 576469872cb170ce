//! Checksums used for incremental change detection

use crate::crawler::document::{CrawlDocument, Metadata};
use sha2::{Digest, Sha256};

/// Computes a fingerprint of response headers
pub trait HeadersChecksummer: Send + Sync {
    /// Returns `None` when the headers carry nothing to fingerprint
    fn create_checksum(&self, headers: &Metadata) -> Option<String>;
}

/// Computes a fingerprint of an imported document
pub trait DocumentChecksummer: Send + Sync {
    fn create_checksum(&self, document: &CrawlDocument) -> Option<String>;
}

/// SHA-256 over selected header fields
///
/// Only the configured fields take part, so volatile headers such as `Date`
/// do not defeat change detection. Fields are hashed in configuration order
/// as `name=value` lines.
#[derive(Debug, Clone)]
pub struct FieldsHeadersChecksummer {
    fields: Vec<String>,
}

impl FieldsHeadersChecksummer {
    pub fn new(fields: Vec<String>) -> Self {
        Self { fields }
    }
}

impl HeadersChecksummer for FieldsHeadersChecksummer {
    fn create_checksum(&self, headers: &Metadata) -> Option<String> {
        let mut hasher = Sha256::new();
        let mut found = false;

        for field in &self.fields {
            for value in headers.get_all(field) {
                found = true;
                hasher.update(field.to_ascii_lowercase().as_bytes());
                hasher.update(b"=");
                hasher.update(value.as_bytes());
                hasher.update(b"\n");
            }
        }

        found.then(|| hex::encode(hasher.finalize()))
    }
}

/// SHA-256 over the document content
#[derive(Debug, Clone, Default)]
pub struct ContentDocumentChecksummer;

impl DocumentChecksummer for ContentDocumentChecksummer {
    fn create_checksum(&self, document: &CrawlDocument) -> Option<String> {
        Some(hex::encode(Sha256::digest(&document.content)))
    }
}

/// Compares a fresh checksum with the one recorded on the previous run
///
/// Only an equal, non-blank pair counts as unmodified. A missing previous
/// checksum means the document is new.
pub fn is_unmodified(current: Option<&str>, previous: Option<&str>) -> bool {
    match (current, previous) {
        (Some(current), Some(previous)) => !current.trim().is_empty() && current == previous,
        _ => false,
    }
}
