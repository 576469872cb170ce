//! Crawler events
//!
//! Every notable step of a crawl is published as a [`CrawlerEvent`] to the
//! registered listeners. Listeners are best-effort: an error or a panic in a
//! listener is logged and never interrupts the crawl.

use crate::state::ReferenceStatus;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Something that happened during a crawl
#[derive(Debug, Clone, PartialEq)]
pub enum CrawlerEvent {
    CrawlerStarted { crawler_id: String, resumed: bool },
    CrawlerStopping { crawler_id: String },
    CrawlerFinished { crawler_id: String, processed: u64 },
    DocumentQueued { url: String, depth: u32 },
    /// The URL got a non-OK outcome; `reason` names the step that decided it
    Rejected {
        url: String,
        status: ReferenceStatus,
        reason: &'static str,
    },
    Redirected { url: String, target: String },
    HeadersFetched { url: String, status_code: u16 },
    DocumentFetched { url: String, status_code: u16 },
    UrlsExtracted { url: String, count: usize },
    DocumentImported { url: String },
    DocumentCommittedAdd { url: String },
    DocumentCommittedRemove { url: String },
    SitemapResolved { url_root: String, urls: usize },
    Error { url: String, message: String },
}

impl CrawlerEvent {
    /// Short, stable name of the event kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CrawlerStarted { .. } => "crawler-started",
            Self::CrawlerStopping { .. } => "crawler-stopping",
            Self::CrawlerFinished { .. } => "crawler-finished",
            Self::DocumentQueued { .. } => "document-queued",
            Self::Rejected { .. } => "rejected",
            Self::Redirected { .. } => "redirected",
            Self::HeadersFetched { .. } => "headers-fetched",
            Self::DocumentFetched { .. } => "document-fetched",
            Self::UrlsExtracted { .. } => "urls-extracted",
            Self::DocumentImported { .. } => "document-imported",
            Self::DocumentCommittedAdd { .. } => "document-committed-add",
            Self::DocumentCommittedRemove { .. } => "document-committed-remove",
            Self::SitemapResolved { .. } => "sitemap-resolved",
            Self::Error { .. } => "error",
        }
    }

    /// The URL the event is about, if any
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::DocumentQueued { url, .. }
            | Self::Rejected { url, .. }
            | Self::Redirected { url, .. }
            | Self::HeadersFetched { url, .. }
            | Self::DocumentFetched { url, .. }
            | Self::UrlsExtracted { url, .. }
            | Self::DocumentImported { url }
            | Self::DocumentCommittedAdd { url }
            | Self::DocumentCommittedRemove { url }
            | Self::Error { url, .. } => Some(url),
            Self::SitemapResolved { url_root, .. } => Some(url_root),
            Self::CrawlerStarted { .. }
            | Self::CrawlerStopping { .. }
            | Self::CrawlerFinished { .. } => None,
        }
    }
}

/// Receives crawler events
pub trait CrawlerEventListener: Send + Sync {
    fn on_event(&self, event: &CrawlerEvent) -> anyhow::Result<()>;
}

/// Fans events out to every listener
#[derive(Clone, Default)]
pub struct EventDispatcher {
    listeners: Vec<Arc<dyn CrawlerEventListener>>,
}

impl EventDispatcher {
    pub fn new(listeners: Vec<Arc<dyn CrawlerEventListener>>) -> Self {
        Self { listeners }
    }

    pub fn fire(&self, event: CrawlerEvent) {
        tracing::trace!(event = event.kind(), url = event.url().unwrap_or(""), "Crawler event");

        for listener in &self.listeners {
            match catch_unwind(AssertUnwindSafe(|| listener.on_event(&event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(event = event.kind(), error = %e, "Event listener failed");
                }
                Err(_) => {
                    tracing::warn!(event = event.kind(), "Event listener panicked");
                }
            }
        }
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
