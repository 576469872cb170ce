//! Fetch pipeline
//!
//! Runs one dequeued reference through delay, fetch, change detection,
//! link extraction, import and commit. Each step may end the pipeline with
//! a terminal status. Whatever the outcome, the reference is finalized:
//! a previously good document that is gone now is removed from the
//! committer, and the reference is moved to PROCESSED.

use crate::crawler::checksum::is_unmodified;
use crate::crawler::context::CrawlContext;
use crate::crawler::document::{keys, parse_content_type, CrawlDocument, Metadata};
use crate::crawler::event::CrawlerEvent;
use crate::crawler::fetcher::{FetchMethod, FetchResponse, FetchState};
use crate::crawler::url_processor::{Admission, UrlProcessor};
use crate::filter::is_rejected;
use crate::robots::RobotsMeta;
use crate::state::{Reference, ReferenceStatus};
use crate::storage::{lookup_with_retry, StorageError, StorageResult};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use url::Url;

/// Terminal status of a pipeline run and the step that decided it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Outcome {
    status: ReferenceStatus,
    reason: &'static str,
}

impl Outcome {
    fn new(status: ReferenceStatus, reason: &'static str) -> Self {
        Self { status, reason }
    }
}

enum StepError {
    /// The store failed; the run cannot continue
    Fatal(StorageError),
    /// Anything else; the reference ends as ERROR
    Failed(anyhow::Error),
}

impl From<StorageError> for StepError {
    fn from(e: StorageError) -> Self {
        Self::Fatal(e)
    }
}

impl From<anyhow::Error> for StepError {
    fn from(e: anyhow::Error) -> Self {
        Self::Failed(e)
    }
}

type StepResult<T> = Result<T, StepError>;

/// Processes dequeued references, one at a time
pub(crate) struct DocumentProcessor<'a> {
    ctx: &'a CrawlContext,
}

impl<'a> DocumentProcessor<'a> {
    pub fn new(ctx: &'a CrawlContext) -> Self {
        Self { ctx }
    }

    /// Runs the pipeline and finalizes the reference
    ///
    /// Returns the final status. An error means the store failed and the
    /// reference was left ACTIVE for the next resume.
    pub async fn process(&self, mut reference: Reference) -> StorageResult<ReferenceStatus> {
        let store = &self.ctx.store;
        let url = reference.url.clone();
        let cached = lookup_with_retry("get_cached", &url, || store.get_cached(&url));

        let steps = AssertUnwindSafe(self.run_steps(&mut reference, cached.as_ref()))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(StepError::Failed(anyhow::anyhow!(
                    "panicked: {}",
                    panic_message(panic.as_ref())
                )))
            });
        let outcome = match steps {
            Ok(outcome) => outcome,
            Err(StepError::Fatal(e)) => return Err(e),
            Err(StepError::Failed(e)) => {
                let message = format!("{:#}", e);
                tracing::warn!(url = %url, error = %message, "Document processing failed");
                self.ctx.events.fire(CrawlerEvent::Error {
                    url: url.clone(),
                    message,
                });
                Outcome::new(ReferenceStatus::Error, "error")
            }
        };

        if let Some(cached) = &cached {
            self.requeue_cached_links(&mut reference, cached, outcome.status)
                .await?;
        }

        self.finalize(reference, cached.as_ref(), outcome)
    }

    /// Re-admits the links a cached parent had when this run never got to
    /// extract them, so its children are not taken for orphans
    async fn requeue_cached_links(
        &self,
        reference: &mut Reference,
        cached: &Reference,
        status: ReferenceStatus,
    ) -> StorageResult<()> {
        if !reference.referenced_urls.is_empty() || cached.referenced_urls.is_empty() {
            return Ok(());
        }
        if !matches!(
            status,
            ReferenceStatus::Unmodified
                | ReferenceStatus::Rejected
                | ReferenceStatus::BadStatus
                | ReferenceStatus::Error
        ) {
            return Ok(());
        }

        let depth = reference.depth + 1;
        let admission = UrlProcessor::new(self.ctx);
        let mut queued = 0;
        for link in &cached.referenced_urls {
            if admission
                .process(Reference::new(link.as_str(), depth), &reference.url)
                .await?
                == Admission::Queued
            {
                queued += 1;
            }
        }
        tracing::debug!(
            url = %reference.url,
            %status,
            count = cached.referenced_urls.len(),
            queued,
            "Re-queued links from the previous run"
        );
        reference.referenced_urls = cached.referenced_urls.clone();
        Ok(())
    }

    async fn run_steps(
        &self,
        reference: &mut Reference,
        cached: Option<&Reference>,
    ) -> StepResult<Outcome> {
        let ctx = self.ctx;

        let robots = ctx.robots_txt(&reference.url_root).await;
        ctx.delay
            .wait_for_turn(&reference.url_root, robots.as_ref().and_then(|r| r.crawl_delay()))
            .await;

        let mut headers_checked = false;
        if ctx.config.fetcher.fetch_headers {
            let response = match ctx.fetcher.fetch(reference, FetchMethod::Head).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::debug!(url = %reference.url, error = %e, "Could not fetch headers");
                    return Ok(Outcome::new(ReferenceStatus::Rejected, "headers-fetch"));
                }
            };
            ctx.events.fire(CrawlerEvent::HeadersFetched {
                url: reference.url.clone(),
                status_code: response.status_code,
            });
            if let Some(outcome) = self.check_fetch_state(reference, &response, cached).await? {
                return Ok(outcome);
            }
            if let Some(outcome) = self.check_headers(reference, &response.headers, cached) {
                return Ok(outcome);
            }
            headers_checked = true;
        }

        let response = match ctx.fetcher.fetch(reference, FetchMethod::Get).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(url = %reference.url, error = %e, "Fetch failed");
                ctx.events.fire(CrawlerEvent::Error {
                    url: reference.url.clone(),
                    message: e.to_string(),
                });
                return Ok(Outcome::new(ReferenceStatus::Error, "fetch"));
            }
        };
        ctx.events.fire(CrawlerEvent::DocumentFetched {
            url: reference.url.clone(),
            status_code: response.status_code,
        });
        if let Some(outcome) = self.check_fetch_state(reference, &response, cached).await? {
            return Ok(outcome);
        }

        let headers = response.headers.clone();
        let mut document = build_document(reference, response);
        if ctx.config.crawler.keep_downloads {
            self.save_download(&document).await;
        }

        let robots_meta = match &ctx.robots_meta {
            Some(provider) => provider.get_robots_meta(&document),
            None => RobotsMeta::default(),
        };

        // Links are extracted before import, which may strip the markup
        if robots_meta.nofollow {
            tracing::debug!(url = %reference.url, "Links not followed, robots nofollow");
        } else {
            reference.referenced_urls = self.extract_links(&document).await?;
        }

        if robots_meta.noindex {
            return Ok(Outcome::new(ReferenceStatus::Rejected, "robots-meta-noindex"));
        }

        if !headers_checked {
            if let Some(outcome) = self.check_headers(reference, &headers, cached) {
                return Ok(outcome);
            }
        }

        if is_rejected(&ctx.document_filters, |f| f.accept_document(&document)) {
            return Ok(Outcome::new(ReferenceStatus::Rejected, "document-filter"));
        }

        for processor in &ctx.pre_processors {
            processor.process_document(&mut document)?;
        }

        let accepted = ctx.importer.import_document(
            &mut document.content,
            document.content_type.as_deref(),
            &mut document.metadata,
            &reference.url,
        )?;
        if !accepted {
            return Ok(Outcome::new(ReferenceStatus::Rejected, "importer"));
        }
        ctx.events.fire(CrawlerEvent::DocumentImported {
            url: reference.url.clone(),
        });

        let checksum = ctx.document_checksummer.create_checksum(&document);
        let unmodified = is_unmodified(
            checksum.as_deref(),
            cached.and_then(|c| c.doc_checksum.as_deref()),
        );
        reference.doc_checksum = checksum;
        if unmodified {
            return Ok(Outcome::new(ReferenceStatus::Unmodified, "document-checksum"));
        }

        for processor in &ctx.post_processors {
            processor.process_document(&mut document)?;
        }

        ctx.committer
            .queue_add(&reference.url, &document.content, &document.metadata)?;
        ctx.events.fire(CrawlerEvent::DocumentCommittedAdd {
            url: reference.url.clone(),
        });

        Ok(Outcome::new(ReferenceStatus::Ok, "committed"))
    }

    /// Maps a non-NEW fetch state to its terminal outcome
    async fn check_fetch_state(
        &self,
        reference: &mut Reference,
        response: &FetchResponse,
        cached: Option<&Reference>,
    ) -> StepResult<Option<Outcome>> {
        let outcome = match response.state {
            FetchState::New => return Ok(None),
            FetchState::Unmodified => {
                if let Some(cached) = cached {
                    reference.head_checksum = cached.head_checksum.clone();
                    reference.doc_checksum = cached.doc_checksum.clone();
                }
                Outcome::new(ReferenceStatus::Unmodified, "not-modified")
            }
            FetchState::NotFound => Outcome::new(ReferenceStatus::NotFound, "http-status"),
            FetchState::BadStatus => Outcome::new(ReferenceStatus::BadStatus, "http-status"),
            FetchState::Redirect => {
                if let Some(target) = &response.redirect_target {
                    self.follow_redirect(reference, target).await?;
                }
                Outcome::new(ReferenceStatus::Redirect, "redirect")
            }
        };

        tracing::debug!(
            url = %reference.url,
            status_code = response.status_code,
            reason = %response.reason_phrase,
            "Fetch ended the pipeline"
        );
        Ok(Some(outcome))
    }

    /// Sends a redirect target through admission at the source's depth
    async fn follow_redirect(&self, source: &Reference, target: &str) -> StorageResult<()> {
        tracing::debug!(url = %source.url, target, "Redirected");
        self.ctx.events.fire(CrawlerEvent::Redirected {
            url: source.url.clone(),
            target: target.to_string(),
        });

        let admission = UrlProcessor::new(self.ctx)
            .process(Reference::new(target, source.depth), &source.url)
            .await?;
        if admission == Admission::Known {
            tracing::debug!(target, "Redirect target already known");
        }
        Ok(())
    }

    /// Header filters and header checksum
    fn check_headers(
        &self,
        reference: &mut Reference,
        headers: &Metadata,
        cached: Option<&Reference>,
    ) -> Option<Outcome> {
        let ctx = self.ctx;
        if is_rejected(&ctx.header_filters, |f| f.accept_headers(&reference.url, headers)) {
            return Some(Outcome::new(ReferenceStatus::Rejected, "header-filter"));
        }

        let checksum = ctx.headers_checksummer.create_checksum(headers);
        let unmodified = is_unmodified(
            checksum.as_deref(),
            cached.and_then(|c| c.head_checksum.as_deref()),
        );
        reference.head_checksum = checksum;
        if unmodified {
            reference.doc_checksum = cached.and_then(|c| c.doc_checksum.clone());
            return Some(Outcome::new(ReferenceStatus::Unmodified, "headers-checksum"));
        }
        None
    }

    /// Admits every extracted link and returns them all
    async fn extract_links(&self, document: &CrawlDocument) -> StorageResult<Vec<String>> {
        let links = self.ctx.link_extractor.extract_links(document);
        let count = links.len();
        let depth = document.reference.depth + 1;
        let admission = UrlProcessor::new(self.ctx);

        let mut queued = 0;
        for link in &links {
            if admission
                .process(Reference::new(link.as_str(), depth), document.url())
                .await?
                == Admission::Queued
            {
                queued += 1;
            }
        }

        tracing::debug!(url = %document.url(), count, queued, "Extracted links");
        self.ctx.events.fire(CrawlerEvent::UrlsExtracted {
            url: document.url().to_string(),
            count,
        });
        Ok(links)
    }

    /// Writes the raw body under the downloads directory
    async fn save_download(&self, document: &CrawlDocument) {
        let Some(path) = download_path(&self.ctx.config.crawler.downloads_dir(), document.url())
        else {
            return;
        };
        let result = async {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&path, &document.content).await
        }
        .await;
        if let Err(e) = result {
            tracing::warn!(url = %document.url(), path = %path.display(), error = %e, "Could not save download");
        }
    }

    fn finalize(
        &self,
        mut reference: Reference,
        cached: Option<&Reference>,
        outcome: Outcome,
    ) -> StorageResult<ReferenceStatus> {
        let ctx = self.ctx;
        let mut status = outcome.status;

        if cached.map(Reference::has_good_status).unwrap_or(false) && !status.is_good() {
            tracing::info!(url = %reference.url, %status, "Document no longer available, deleting");
            status = ReferenceStatus::Deleted;
            ctx.commit_removal(&reference);
        }

        reference.status = Some(status);
        ctx.store.mark_processed(&reference)?;
        ctx.record_outcome(status);

        if status.is_good() {
            tracing::debug!(url = %reference.url, %status, "Processed");
        } else if status != ReferenceStatus::Error {
            tracing::debug!(url = %reference.url, %status, reason = outcome.reason, "Not committed");
            ctx.events.fire(CrawlerEvent::Rejected {
                url: reference.url,
                status,
                reason: outcome.reason,
            });
        }

        Ok(status)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

/// Builds the document from a successful GET
fn build_document(reference: &Reference, response: FetchResponse) -> CrawlDocument {
    let mut document = CrawlDocument::new(reference.clone());
    document.metadata = response.headers;

    if let Some(content_type) = document.metadata.get("Content-Type") {
        let (mime, charset) = parse_content_type(content_type);
        document.content_type = mime;
        document.content_encoding = charset;
    }

    let metadata = &mut document.metadata;
    metadata.set(keys::URL, reference.url.as_str());
    metadata.set(keys::DEPTH, reference.depth.to_string());
    if let Some(mime) = &document.content_type {
        metadata.set(keys::CONTENT_TYPE, mime.as_str());
    }
    if let Some(charset) = &document.content_encoding {
        metadata.set(keys::CONTENT_ENCODING, charset.as_str());
    }
    if let Some(last_mod) = reference.sitemap_last_mod {
        metadata.set(keys::SITEMAP_LAST_MOD, last_mod.to_rfc3339());
    }
    if let Some(change_freq) = &reference.sitemap_change_freq {
        metadata.set(keys::SITEMAP_CHANGE_FREQ, change_freq.as_str());
    }
    if let Some(priority) = reference.sitemap_priority {
        metadata.set(keys::SITEMAP_PRIORITY, priority.to_string());
    }

    document.content = response.body;
    document
}

/// `downloads/<host>/<path>`, with `index.html` for directory paths
fn download_path(downloads_dir: &std::path::Path, url: &str) -> Option<PathBuf> {
    let parsed = Url::parse(url).ok()?;
    let mut path = downloads_dir.join(parsed.host_str()?);
    let segments: Vec<&str> = parsed
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty() && *seg != "." && *seg != "..").collect())
        .unwrap_or_default();
    for segment in &segments {
        path.push(segment);
    }
    if segments.is_empty() || parsed.path().ends_with('/') {
        path.push("index.html");
    }
    Some(path)
}

/// Removes empty directories below `root`, returning how many were removed
pub(crate) fn prune_empty_dirs(root: &std::path::Path) -> std::io::Result<usize> {
    fn prune(dir: &std::path::Path, removed: &mut usize) -> std::io::Result<bool> {
        let mut empty = true;
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                if prune(&path, removed)? {
                    std::fs::remove_dir(&path)?;
                    *removed += 1;
                } else {
                    empty = false;
                }
            } else {
                empty = false;
            }
        }
        Ok(empty)
    }

    let mut removed = 0;
    if root.is_dir() {
        prune(root, &mut removed)?;
    }
    Ok(removed)
}
