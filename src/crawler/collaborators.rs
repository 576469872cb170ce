//! Interfaces of the components the pipelines hand documents to
//!
//! The importer transforms content, processors run around the import, and
//! the committer sends documents to their destination. They are application
//! edges, so they report failures as `anyhow::Error`.

use crate::crawler::document::{CrawlDocument, Metadata};
use crate::crawler::parser::parse_html;
use url::Url;

/// Transforms a fetched document before it is committed
pub trait Importer: Send + Sync {
    /// Returns `Ok(false)` to reject the document
    ///
    /// May rewrite `content` and add to `metadata`.
    fn import_document(
        &self,
        content: &mut Vec<u8>,
        content_type: Option<&str>,
        metadata: &mut Metadata,
        reference: &str,
    ) -> anyhow::Result<bool>;
}

/// Destination of crawled documents
///
/// Calls may be buffered; `commit` flushes whatever is pending.
pub trait Committer: Send + Sync {
    fn queue_add(&self, reference: &str, content: &[u8], metadata: &Metadata) -> anyhow::Result<()>;

    fn queue_remove(&self, reference: &str, metadata: &Metadata) -> anyhow::Result<()>;

    fn commit(&self) -> anyhow::Result<()>;
}

/// Hook run on a document just before or just after import
pub trait ImportProcessor: Send + Sync {
    fn process_document(&self, document: &mut CrawlDocument) -> anyhow::Result<()>;
}

/// Importer that accepts every document unchanged
///
/// HTML documents get their `<title>` recorded as `title` metadata.
#[derive(Debug, Clone, Default)]
pub struct PassthroughImporter;

impl Importer for PassthroughImporter {
    fn import_document(
        &self,
        content: &mut Vec<u8>,
        content_type: Option<&str>,
        metadata: &mut Metadata,
        reference: &str,
    ) -> anyhow::Result<bool> {
        if matches!(content_type, Some("text/html") | Some("application/xhtml+xml")) {
            let base = Url::parse(reference)?;
            let html = String::from_utf8_lossy(content);
            if let Some(title) = parse_html(&html, &base).title {
                metadata.set("title", title);
            }
        }
        Ok(true)
    }
}
