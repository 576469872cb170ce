//! Crawler module for the frontier and the two URL pipelines
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching that reports redirects instead of following them
//! - HTML parsing and link extraction
//! - Per-site politeness delays
//! - The frontier admission pipeline and the fetch pipeline
//! - Header and document checksums for incremental crawls
//! - Overall crawl coordination across a pool of workers

mod checksum;
mod collaborators;
mod context;
mod coordinator;
mod delay;
mod document;
mod document_processor;
mod event;
mod fetcher;
mod parser;
mod url_processor;

pub use checksum::{
    is_unmodified, ContentDocumentChecksummer, DocumentChecksummer, FieldsHeadersChecksummer,
    HeadersChecksummer,
};
pub use collaborators::{Committer, ImportProcessor, Importer, PassthroughImporter};
pub use coordinator::{run_crawl, CrawlSummary, Crawler, CrawlerBuilder, RunMode, StopHandle};
pub use delay::DelayResolver;
pub use document::{keys, parse_content_type, CrawlDocument, Metadata};
pub use event::{CrawlerEvent, CrawlerEventListener, EventDispatcher};
pub use fetcher::{
    build_http_client, FetchError, FetchMethod, FetchResponse, FetchState, GenericHttpFetcher,
    HttpFetcher,
};
pub use parser::{parse_html, HtmlLinkExtractor, LinkExtractor, ParsedPage};
pub use url_processor::Admission;
