//! Frontier admission pipeline
//!
//! Every candidate URL (seed, extracted link, redirect target or sitemap
//! entry) goes through the same ordered steps before it may be queued:
//!
//! 1. depth check
//! 2. scope check against the URL it was found from
//! 3. configured URL filters
//! 4. robots.txt rules of the candidate's site
//! 5. normalization
//! 6. sitemap expansion, once per site root and run
//! 7. de-duplication and enqueue
//!
//! The first step that rejects ends the pipeline. Rejections are expected
//! outcomes and are only logged at debug level.

use crate::crawler::context::CrawlContext;
use crate::crawler::event::CrawlerEvent;
use crate::filter::is_rejected;
use crate::state::{Partition, Reference, ReferenceStatus};
use crate::storage::{lookup_with_retry, StorageResult};

/// What happened to a candidate URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Newly added to the QUEUED partition
    Queued,
    /// Already queued, active or processed in this run
    Known,
    /// Turned away by a pipeline step
    Rejected(ReferenceStatus),
}

enum Screening {
    Passed,
    Rejected(ReferenceStatus, &'static str),
}

/// Runs candidates through the admission pipeline
///
/// Created per candidate batch and never shared between workers.
pub(crate) struct UrlProcessor<'a> {
    ctx: &'a CrawlContext,
}

impl<'a> UrlProcessor<'a> {
    pub fn new(ctx: &'a CrawlContext) -> Self {
        Self { ctx }
    }

    /// Admits `candidate`, judging its scope relative to `scope_url`
    ///
    /// Only a failing state-changing store call is returned as an error.
    pub async fn process(&self, mut candidate: Reference, scope_url: &str) -> StorageResult<Admission> {
        if let Screening::Rejected(status, reason) = self.screen(&mut candidate, scope_url).await {
            self.log_rejection(&candidate, status, reason);
            return Ok(Admission::Rejected(status));
        }

        if let Err(e) = self.expand_sitemap(&candidate).await {
            // The candidate is recorded as failed so it is not retried forever
            tracing::warn!(url = %candidate.url, error = %e, "Sitemap expansion failed");
            candidate.status = Some(ReferenceStatus::Error);
            self.ctx.store.mark_processed(&candidate)?;
            self.ctx.record_outcome(ReferenceStatus::Error);
            self.ctx.events.fire(CrawlerEvent::Error {
                url: candidate.url.clone(),
                message: e.to_string(),
            });
            return Ok(Admission::Rejected(ReferenceStatus::Error));
        }

        self.enqueue(&candidate)
    }

    /// Steps 1 to 5; normalizes `candidate` in place when it passes
    async fn screen(&self, candidate: &mut Reference, scope_url: &str) -> Screening {
        let ctx = self.ctx;

        if let Some(max_depth) = ctx.config.crawler.depth_limit() {
            if candidate.depth > max_depth {
                return Screening::Rejected(ReferenceStatus::TooDeep, "max-depth");
            }
        }

        if !ctx.scope.is_in_scope(scope_url, &candidate.url) {
            return Screening::Rejected(ReferenceStatus::Rejected, "out-of-scope");
        }

        if is_rejected(&ctx.url_filters, |f| f.accept_url(&candidate.url)) {
            return Screening::Rejected(ReferenceStatus::Rejected, "url-filter");
        }

        if let Some(robots) = ctx.robots_txt(&candidate.url_root).await {
            if is_rejected(robots.filters(), |f| f.accept_url(&candidate.url)) {
                return Screening::Rejected(ReferenceStatus::Rejected, "robots-txt");
            }
        }

        match ctx.normalizer.normalize(&candidate.url) {
            Some(normalized) => {
                if normalized != candidate.url {
                    tracing::trace!(from = %candidate.url, to = %normalized, "Normalized URL");
                    candidate.set_url(normalized);
                }
                Screening::Passed
            }
            None => Screening::Rejected(ReferenceStatus::Rejected, "invalid-url"),
        }
    }

    /// Resolves the sitemap of the candidate's site if no worker did yet
    ///
    /// Sitemap entries are screened and enqueued directly; they never
    /// trigger another expansion.
    async fn expand_sitemap(&self, candidate: &Reference) -> StorageResult<()> {
        let ctx = self.ctx;
        let Some(resolver) = &ctx.sitemaps else {
            return Ok(());
        };
        let root = candidate.url_root.as_str();
        if root.is_empty() {
            return Ok(());
        }

        if lookup_with_retry("is_sitemap_resolved", root, || {
            ctx.store.is_sitemap_resolved(root)
        }) {
            return Ok(());
        }
        // Claimed before resolving so a failed resolution is not retried
        if !ctx.store.mark_sitemap_resolved(root)? {
            return Ok(());
        }

        let hints = match ctx.robots_txt(root).await {
            Some(robots) => robots.sitemap_locations().to_vec(),
            None => Vec::new(),
        };
        let entries = resolver.resolve_sitemaps(root, &hints).await;
        let found = entries.len();

        let mut queued = 0;
        for entry in entries {
            let mut reference = Reference::new(entry.url, 0);
            reference.sitemap_last_mod = entry.last_mod;
            reference.sitemap_change_freq = entry.change_freq;
            reference.sitemap_priority = entry.priority;

            match self.screen(&mut reference, &candidate.url).await {
                Screening::Passed => {
                    if self.enqueue(&reference)? == Admission::Queued {
                        queued += 1;
                    }
                }
                Screening::Rejected(status, reason) => {
                    self.log_rejection(&reference, status, reason);
                }
            }
        }

        tracing::info!(url_root = root, found, queued, "Resolved sitemap");
        ctx.events.fire(CrawlerEvent::SitemapResolved {
            url_root: root.to_string(),
            urls: queued,
        });
        Ok(())
    }

    fn enqueue(&self, reference: &Reference) -> StorageResult<Admission> {
        let store = &self.ctx.store;
        let partition = lookup_with_retry("partition_of", &reference.url, || {
            store.partition_of(&reference.url)
        });
        if matches!(partition, Some(Partition::Active) | Some(Partition::Processed)) {
            return Ok(Admission::Known);
        }

        if store.queue(reference)? {
            tracing::debug!(url = %reference.url, depth = reference.depth, "Queued URL");
            self.ctx.events.fire(CrawlerEvent::DocumentQueued {
                url: reference.url.clone(),
                depth: reference.depth,
            });
            Ok(Admission::Queued)
        } else {
            Ok(Admission::Known)
        }
    }

    fn log_rejection(&self, reference: &Reference, status: ReferenceStatus, reason: &'static str) {
        tracing::debug!(url = %reference.url, depth = reference.depth, %status, reason, "URL not admitted");
        self.ctx.events.fire(CrawlerEvent::Rejected {
            url: reference.url.clone(),
            status,
            reason,
        });
    }
}
