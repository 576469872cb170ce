//! Components shared by every worker of a crawl

use crate::config::Config;
use crate::crawler::checksum::{DocumentChecksummer, HeadersChecksummer};
use crate::crawler::collaborators::{Committer, ImportProcessor, Importer};
use crate::crawler::delay::DelayResolver;
use crate::crawler::document::{keys, Metadata};
use crate::crawler::event::{CrawlerEvent, EventDispatcher};
use crate::crawler::fetcher::HttpFetcher;
use crate::crawler::parser::LinkExtractor;
use crate::filter::{DocumentFilter, HeadersFilter, UrlFilter};
use crate::robots::{RobotsMetaProvider, RobotsTxt, RobotsTxtProvider};
use crate::sitemap::SitemapResolver;
use crate::state::{Reference, ReferenceStatus};
use crate::storage::ReferenceStore;
use crate::url::{CrawlScopeStrategy, UrlNormalizer};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Everything the admission and fetch pipelines need, built once per crawler
///
/// Optional components are `None` when the matching feature is switched off
/// in the configuration.
pub(crate) struct CrawlContext {
    pub config: Arc<Config>,
    pub store: Arc<dyn ReferenceStore>,
    pub fetcher: Arc<dyn HttpFetcher>,
    pub delay: DelayResolver,
    pub scope: CrawlScopeStrategy,
    pub normalizer: Arc<dyn UrlNormalizer>,

    pub url_filters: Vec<Arc<dyn UrlFilter>>,
    pub header_filters: Vec<Arc<dyn HeadersFilter>>,
    pub document_filters: Vec<Arc<dyn DocumentFilter>>,

    pub robots_txt: Option<Arc<dyn RobotsTxtProvider>>,
    pub robots_meta: Option<Arc<dyn RobotsMetaProvider>>,
    pub sitemaps: Option<Arc<dyn SitemapResolver>>,

    pub link_extractor: Arc<dyn LinkExtractor>,
    pub headers_checksummer: Arc<dyn HeadersChecksummer>,
    pub document_checksummer: Arc<dyn DocumentChecksummer>,
    pub importer: Arc<dyn Importer>,
    pub committer: Arc<dyn Committer>,
    pub pre_processors: Vec<Arc<dyn ImportProcessor>>,
    pub post_processors: Vec<Arc<dyn ImportProcessor>>,

    pub events: EventDispatcher,

    /// Set by a stop request or a fatal worker error
    pub stop: Arc<AtomicBool>,
    pub counters: RunCounters,
}

/// Outcome counters of the current run
#[derive(Debug, Default)]
pub(crate) struct RunCounters {
    processed: AtomicU64,
    ok: AtomicU64,
}

impl CrawlContext {
    /// Robots.txt of a site root, or `None` when robots.txt is ignored
    pub async fn robots_txt(&self, url_root: &str) -> Option<Arc<RobotsTxt>> {
        if url_root.is_empty() {
            return None;
        }
        let provider = self.robots_txt.as_ref()?;
        Some(provider.get_robots_txt(url_root).await)
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// True once this run produced `max-urls` OK outcomes
    pub fn max_urls_reached(&self) -> bool {
        self.config
            .crawler
            .url_limit()
            .map(|limit| self.counters.ok.load(Ordering::SeqCst) >= limit)
            .unwrap_or(false)
    }

    /// Workers stop taking new references when this is true
    pub fn should_stop(&self) -> bool {
        self.is_stopped() || self.max_urls_reached()
    }

    /// Counts a finished reference, returning how many were processed so far
    pub fn record_outcome(&self, status: ReferenceStatus) -> u64 {
        if status == ReferenceStatus::Ok {
            self.counters.ok.fetch_add(1, Ordering::SeqCst);
        }
        self.counters.processed.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn processed(&self) -> u64 {
        self.counters.processed.load(Ordering::SeqCst)
    }

    /// Sends a removal for a document that no longer exists
    ///
    /// A committer failure is logged; the reference is still considered
    /// deleted.
    pub fn commit_removal(&self, reference: &Reference) {
        let mut metadata = Metadata::new();
        metadata.set(keys::URL, reference.url.as_str());
        metadata.set(keys::DEPTH, reference.depth.to_string());

        match self.committer.queue_remove(&reference.url, &metadata) {
            Ok(()) => {
                tracing::debug!(url = %reference.url, "Queued document removal");
                self.events.fire(CrawlerEvent::DocumentCommittedRemove {
                    url: reference.url.clone(),
                });
            }
            Err(e) => {
                tracing::warn!(url = %reference.url, error = %e, "Committer rejected removal");
            }
        }
    }
}
