//! Crawler coordinator - main crawl orchestration logic
//!
//! This module owns a crawl run from start to finish:
//! - Choosing between a fresh and a resumed run and preparing the store
//! - Seeding the frontier with the start URLs
//! - Running the worker pool until the frontier is exhausted
//! - Handling orphans, the final commit and run bookkeeping

use crate::config::{Config, OrphansStrategy};
use crate::crawler::checksum::{
    ContentDocumentChecksummer, DocumentChecksummer, FieldsHeadersChecksummer, HeadersChecksummer,
};
use crate::crawler::collaborators::{Committer, ImportProcessor, Importer, PassthroughImporter};
use crate::crawler::context::{CrawlContext, RunCounters};
use crate::crawler::delay::DelayResolver;
use crate::crawler::document_processor::{prune_empty_dirs, DocumentProcessor};
use crate::crawler::event::{CrawlerEvent, CrawlerEventListener, EventDispatcher};
use crate::crawler::fetcher::{build_http_client, GenericHttpFetcher, HttpFetcher};
use crate::crawler::parser::HtmlLinkExtractor;
use crate::crawler::url_processor::{Admission, UrlProcessor};
use crate::filter::{build_document_filters, build_header_filters, build_url_filters};
use crate::output::{load_statistics, log_statistics, SqliteCommitter};
use crate::robots::{
    HttpRobotsTxtProvider, RobotsMetaProvider, RobotsTxtProvider, StandardRobotsMetaProvider,
};
use crate::sitemap::{HttpSitemapResolver, SitemapResolver};
use crate::state::{Reference, ReferenceStatus};
use crate::storage::{open_store, ReferenceStore, RunStatus};
use crate::url::{CrawlScopeStrategy, GenericUrlNormalizer};
use crate::{FrontierError, Result};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Pause between two polls of an empty frontier
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Consecutive empty observations needed before a worker exits
const IDLE_OBSERVATIONS: u32 = 2;

/// A progress line is logged every this many processed references
const PROGRESS_INTERVAL: u64 = 10;

/// How a run treats the state left by the previous one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Resume when the latest run did not complete, else start fresh
    #[default]
    Auto,
    /// Start over, keeping the previous results as the incremental cache
    Fresh,
    /// Continue the latest run
    Resume,
}

/// Requests a graceful stop of a running crawl
///
/// Workers finish the reference they are working on, then exit.
#[derive(Debug, Clone)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        tracing::info!("Stop requested, finishing in-flight documents");
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What a finished run did
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlSummary {
    pub run_id: i64,
    pub resumed: bool,
    /// The run was stopped before the frontier was exhausted
    pub stopped: bool,
    /// References finalized during this run, orphans included
    pub processed: u64,
    /// PROCESSED partition by outcome at the end of the run
    pub status_counts: BTreeMap<ReferenceStatus, u64>,
}

impl CrawlSummary {
    pub fn count(&self, status: ReferenceStatus) -> u64 {
        self.status_counts.get(&status).copied().unwrap_or(0)
    }
}

/// Assembles a [`Crawler`], filling in default components
pub struct CrawlerBuilder {
    config: Config,
    config_hash: String,
    store: Option<Arc<dyn ReferenceStore>>,
    fetcher: Option<Arc<dyn HttpFetcher>>,
    committer: Option<Arc<dyn Committer>>,
    importer: Option<Arc<dyn Importer>>,
    listeners: Vec<Arc<dyn CrawlerEventListener>>,
    pre_processors: Vec<Arc<dyn ImportProcessor>>,
    post_processors: Vec<Arc<dyn ImportProcessor>>,
}

impl CrawlerBuilder {
    /// Uses `store` instead of the SQLite store under `work-dir`
    pub fn store(mut self, store: Arc<dyn ReferenceStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn fetcher(mut self, fetcher: Arc<dyn HttpFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Uses `committer` instead of the SQLite committer under `work-dir`
    pub fn committer(mut self, committer: Arc<dyn Committer>) -> Self {
        self.committer = Some(committer);
        self
    }

    pub fn importer(mut self, importer: Arc<dyn Importer>) -> Self {
        self.importer = Some(importer);
        self
    }

    pub fn listener(mut self, listener: Arc<dyn CrawlerEventListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn pre_processor(mut self, processor: Arc<dyn ImportProcessor>) -> Self {
        self.pre_processors.push(processor);
        self
    }

    pub fn post_processor(mut self, processor: Arc<dyn ImportProcessor>) -> Self {
        self.post_processors.push(processor);
        self
    }

    /// Hash of the configuration file, recorded on the run
    pub fn config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = hash.into();
        self
    }

    pub fn build(self) -> Result<Crawler> {
        let config = Arc::new(self.config);
        let agent = config.user_agent.crawler_name.clone();
        let client = build_http_client(&config.user_agent, &config.fetcher)?;

        let store: Arc<dyn ReferenceStore> = match self.store {
            Some(store) => store,
            None => Arc::new(open_store(&config.crawler.store_path())?),
        };
        let committer: Arc<dyn Committer> = match self.committer {
            Some(committer) => committer,
            None => {
                std::fs::create_dir_all(&config.crawler.work_dir)?;
                let committer = SqliteCommitter::open(&config.crawler.committer_path())
                    .map_err(|e| FrontierError::Committer(format!("{:#}", e)))?;
                Arc::new(committer)
            }
        };
        let fetcher: Arc<dyn HttpFetcher> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(GenericHttpFetcher::new(client.clone(), &config.fetcher)),
        };

        let ctx = CrawlContext {
            store,
            fetcher,
            committer,
            delay: DelayResolver::new(&config.delay),
            scope: CrawlScopeStrategy::new(&config.scope),
            normalizer: Arc::new(GenericUrlNormalizer::new(config.normalizer.clone())),
            url_filters: build_url_filters(&config.url_filters)?,
            header_filters: build_header_filters(&config.header_filters)?,
            document_filters: build_document_filters(&config.document_filters)?,
            robots_txt: (!config.crawler.ignore_robots_txt).then(|| {
                Arc::new(HttpRobotsTxtProvider::new(client.clone(), agent.clone()))
                    as Arc<dyn RobotsTxtProvider>
            }),
            robots_meta: (!config.crawler.ignore_robots_meta).then(|| {
                Arc::new(StandardRobotsMetaProvider::new(agent.clone()))
                    as Arc<dyn RobotsMetaProvider>
            }),
            sitemaps: (!config.crawler.ignore_sitemap).then(|| {
                Arc::new(HttpSitemapResolver::new(client.clone())) as Arc<dyn SitemapResolver>
            }),
            link_extractor: Arc::new(HtmlLinkExtractor),
            headers_checksummer: Arc::new(FieldsHeadersChecksummer::new(
                config.checksum.header_fields.clone(),
            )) as Arc<dyn HeadersChecksummer>,
            document_checksummer: Arc::new(ContentDocumentChecksummer)
                as Arc<dyn DocumentChecksummer>,
            importer: self
                .importer
                .unwrap_or_else(|| Arc::new(PassthroughImporter)),
            pre_processors: self.pre_processors,
            post_processors: self.post_processors,
            events: EventDispatcher::new(self.listeners),
            stop: Arc::new(AtomicBool::new(false)),
            counters: RunCounters::default(),
            config,
        };

        Ok(Crawler {
            ctx: Arc::new(ctx),
            config_hash: self.config_hash,
        })
    }
}

/// Runs crawls for one configuration
///
/// A crawler is meant for a single [`Crawler::run`]; its counters and stop
/// flag are not reset between runs.
pub struct Crawler {
    ctx: Arc<CrawlContext>,
    config_hash: String,
}

impl Crawler {
    pub fn builder(config: Config) -> CrawlerBuilder {
        CrawlerBuilder {
            config,
            config_hash: String::new(),
            store: None,
            fetcher: None,
            committer: None,
            importer: None,
            listeners: Vec::new(),
            pre_processors: Vec::new(),
            post_processors: Vec::new(),
        }
    }

    /// Creates a crawler with every default component
    pub fn new(config: Config) -> Result<Self> {
        Self::builder(config).build()
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(Arc::clone(&self.ctx.stop))
    }

    pub fn store(&self) -> Arc<dyn ReferenceStore> {
        Arc::clone(&self.ctx.store)
    }

    fn crawler_id(&self) -> String {
        self.ctx.config.crawler.id.clone()
    }

    /// Runs one crawl to completion, stop or failure
    pub async fn run(&self, mode: RunMode) -> Result<CrawlSummary> {
        let store = &self.ctx.store;

        let latest = store.latest_run()?;
        if let Some(run) = &latest {
            if run.status == RunStatus::Running {
                tracing::warn!("Run {} did not finish, marking it interrupted", run.id);
                store.finish_run(run.id, RunStatus::Interrupted)?;
            }
        }
        let resume = match mode {
            RunMode::Fresh => false,
            RunMode::Resume => true,
            RunMode::Auto => latest
                .as_ref()
                .map(|run| run.status.is_resumable())
                .unwrap_or(false),
        };

        store.prepare_run(resume)?;
        let run_id = store.create_run(&self.config_hash)?;
        tracing::info!(
            crawler = %self.crawler_id(),
            run_id,
            resume,
            workers = self.ctx.config.crawler.num_threads,
            "Starting crawl run"
        );
        self.ctx.events.fire(CrawlerEvent::CrawlerStarted {
            crawler_id: self.crawler_id(),
            resumed: resume,
        });

        let outcome = self.execute(resume).await;
        let stopped = self.ctx.is_stopped();
        if stopped && outcome.is_ok() {
            self.ctx.events.fire(CrawlerEvent::CrawlerStopping {
                crawler_id: self.crawler_id(),
            });
        }

        // Flushed on every run, stopped ones included
        let committed = self.ctx.committer.commit();
        if let Err(e) = &committed {
            tracing::error!(error = %format!("{:#}", e), "Final commit failed");
        }

        let run_status = match (&outcome, &committed) {
            (Err(_), _) | (_, Err(_)) => RunStatus::Failed,
            _ if stopped => RunStatus::Interrupted,
            _ => RunStatus::Completed,
        };
        store.finish_run(run_id, run_status)?;
        outcome?;
        committed.map_err(|e| FrontierError::Committer(format!("{:#}", e)))?;

        if self.ctx.config.crawler.keep_downloads {
            match prune_empty_dirs(&self.ctx.config.crawler.downloads_dir()) {
                Ok(0) => {}
                Ok(removed) => tracing::debug!(removed, "Pruned empty download directories"),
                Err(e) => tracing::warn!(error = %e, "Could not prune download directories"),
            }
        }

        let stats = load_statistics(store.as_ref())?;
        log_statistics(&stats);

        let processed = self.ctx.processed();
        tracing::info!(run_id, status = run_status.to_db_string(), processed, "Crawl run finished");
        self.ctx.events.fire(CrawlerEvent::CrawlerFinished {
            crawler_id: self.crawler_id(),
            processed,
        });

        Ok(CrawlSummary {
            run_id,
            resumed: resume,
            stopped,
            processed,
            status_counts: stats.by_status,
        })
    }

    async fn execute(&self, resume: bool) -> Result<()> {
        if !resume || self.ctx.store.is_queue_empty()? {
            self.seed().await?;
        } else {
            tracing::info!(
                queued = self.ctx.store.queue_size()?,
                "Resuming with the existing frontier"
            );
        }

        self.drain().await?;

        if self.ctx.should_stop() {
            tracing::info!("Crawl ended early, skipping orphan handling");
            return Ok(());
        }
        self.handle_orphans().await
    }

    async fn seed(&self) -> Result<()> {
        let admission = UrlProcessor::new(&self.ctx);
        let mut queued = 0;
        for seed in &self.ctx.config.crawler.start_urls {
            match admission.process(Reference::new(seed.as_str(), 0), seed).await? {
                Admission::Queued => queued += 1,
                Admission::Known => {}
                Admission::Rejected(status) => {
                    tracing::warn!(url = %seed, %status, "Start URL was not admitted");
                }
            }
        }
        tracing::info!(queued, "Seeded frontier");
        Ok(())
    }

    /// Runs the worker pool until the frontier is exhausted or the crawl stops
    async fn drain(&self) -> Result<()> {
        let workers = self.ctx.config.crawler.num_threads.max(1);
        let mut handles = Vec::with_capacity(workers as usize);
        for worker_id in 0..workers {
            let ctx = Arc::clone(&self.ctx);
            handles.push(tokio::spawn(worker_loop(worker_id, ctx)));
        }

        let mut first_error = None;
        for handle in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    self.ctx.request_stop();
                    Err(FrontierError::Worker(e.to_string()))
                }
            };
            if let Err(e) = result {
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn handle_orphans(&self) -> Result<()> {
        let strategy = self.ctx.config.crawler.orphans_strategy;
        let orphans = self.ctx.store.cached_references()?;
        if orphans.is_empty() || strategy == OrphansStrategy::Ignore {
            return Ok(());
        }
        tracing::info!(count = orphans.len(), ?strategy, "Handling orphans");

        if strategy == OrphansStrategy::Process {
            let admission = UrlProcessor::new(&self.ctx);
            for orphan in &orphans {
                let mut candidate = Reference::new(orphan.url.as_str(), orphan.depth);
                candidate.sitemap_last_mod = orphan.sitemap_last_mod;
                candidate.sitemap_change_freq = orphan.sitemap_change_freq.clone();
                candidate.sitemap_priority = orphan.sitemap_priority;
                admission.process(candidate, &orphan.url).await?;
            }
            self.drain().await?;
            if self.ctx.should_stop() {
                return Ok(());
            }
        }

        self.delete_orphans()
    }

    /// Deletes every cached reference whose previous outcome was good
    fn delete_orphans(&self) -> Result<()> {
        let mut deleted = 0;
        for mut orphan in self.ctx.store.cached_references()? {
            if !orphan.has_good_status() {
                continue;
            }
            self.ctx.commit_removal(&orphan);
            orphan.status = Some(ReferenceStatus::Deleted);
            self.ctx.store.mark_processed(&orphan)?;
            self.ctx.record_outcome(ReferenceStatus::Deleted);
            self.ctx.events.fire(CrawlerEvent::Rejected {
                url: orphan.url,
                status: ReferenceStatus::Deleted,
                reason: "orphan",
            });
            deleted += 1;
        }
        if deleted > 0 {
            tracing::info!(deleted, "Deleted orphans");
        }
        Ok(())
    }
}

/// One worker: dequeue, process, repeat
///
/// Exits when the stop flag is set, `max-urls` is reached, or the frontier
/// stayed empty with no active work for consecutive polls. A store failure
/// stops every worker.
async fn worker_loop(worker_id: u32, ctx: Arc<CrawlContext>) -> Result<()> {
    let processor = DocumentProcessor::new(&ctx);
    let mut idle = 0;

    tracing::debug!(worker_id, "Worker started");
    let result = loop {
        if ctx.should_stop() {
            break Ok(());
        }

        let next = match ctx.store.next_queued() {
            Ok(next) => next,
            Err(e) => break Err(e),
        };

        match next {
            Some(reference) => {
                idle = 0;
                if let Err(e) = processor.process(reference).await {
                    break Err(e);
                }
                let processed = ctx.processed();
                if processed % PROGRESS_INTERVAL == 0 {
                    log_progress(&ctx, processed);
                }
            }
            None => {
                let drained = ctx
                    .store
                    .is_queue_empty()
                    .and_then(|empty| Ok(empty && !ctx.store.has_active_work()?));
                match drained {
                    Ok(true) => {
                        idle += 1;
                        if idle >= IDLE_OBSERVATIONS {
                            break Ok(());
                        }
                    }
                    Ok(false) => idle = 0,
                    Err(e) => break Err(e),
                }
                tokio::time::sleep(IDLE_POLL_INTERVAL).await;
            }
        }
    };

    match result {
        Ok(()) => {
            tracing::debug!(worker_id, "Worker finished");
            Ok(())
        }
        Err(e) => {
            tracing::error!(worker_id, error = %e, "Store failure, stopping crawl");
            ctx.request_stop();
            Err(e.into())
        }
    }
}

fn log_progress(ctx: &CrawlContext, processed: u64) {
    let remaining = ctx
        .store
        .queue_size()
        .and_then(|queued| Ok(queued + ctx.store.active_count()?));
    match remaining {
        Ok(remaining) => tracing::info!(
            "{} urls processed out of {}",
            processed,
            processed + remaining
        ),
        Err(e) => tracing::debug!(error = %e, "Could not read frontier size"),
    }
}

/// Runs a complete crawl with the default components
pub async fn run_crawl(config: Config, mode: RunMode) -> Result<CrawlSummary> {
    Crawler::new(config)?.run(mode).await
}
