//! Shared helpers for the integration tests

use ripple_frontier::config::{parse_config, Config};
use ripple_frontier::crawler::{Committer, Crawler, CrawlerEvent, CrawlerEventListener, Metadata};
use ripple_frontier::state::{Partition, Reference, ReferenceStatus};
use ripple_frontier::storage::ReferenceStore;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use wiremock::ResponseTemplate;

/// Builds a validated configuration for a crawl of `start_url`
///
/// `crawler_extra` is appended to the `[crawler]` table and `sections` after
/// the built-in tables. Delays are off so tests run fast.
pub fn config(work_dir: &Path, start_url: &str, crawler_extra: &str, sections: &str) -> Config {
    let toml = format!(
        r#"
[crawler]
id = "test-crawler"
start-urls = ["{start_url}"]
work-dir = '{work_dir}'
num-threads = 2
{crawler_extra}

[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0.0"
contact-url = "https://example.com/contact"
contact-email = "test@example.com"

[delay]
default = 0

{sections}
"#,
        work_dir = work_dir.display(),
    );
    parse_config(&toml).expect("test config should be valid")
}

/// Committer that remembers every call
#[derive(Default)]
pub struct RecordingCommitter {
    added: Mutex<Vec<(String, Metadata)>>,
    removed: Mutex<Vec<String>>,
    commits: AtomicUsize,
}

impl RecordingCommitter {
    /// URLs added since the last call, sorted
    pub fn take_added(&self) -> Vec<String> {
        let mut urls: Vec<String> = self
            .added
            .lock()
            .unwrap()
            .drain(..)
            .map(|(url, _)| url)
            .collect();
        urls.sort();
        urls
    }

    /// URLs removed since the last call, sorted
    pub fn take_removed(&self) -> Vec<String> {
        let mut urls: Vec<String> = self.removed.lock().unwrap().drain(..).collect();
        urls.sort();
        urls
    }

    pub fn metadata_of(&self, url: &str) -> Option<Metadata> {
        self.added
            .lock()
            .unwrap()
            .iter()
            .find(|(added, _)| added == url)
            .map(|(_, metadata)| metadata.clone())
    }

    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }
}

impl Committer for RecordingCommitter {
    fn queue_add(&self, reference: &str, _content: &[u8], metadata: &Metadata) -> anyhow::Result<()> {
        self.added
            .lock()
            .unwrap()
            .push((reference.to_string(), metadata.clone()));
        Ok(())
    }

    fn queue_remove(&self, reference: &str, _metadata: &Metadata) -> anyhow::Result<()> {
        self.removed.lock().unwrap().push(reference.to_string());
        Ok(())
    }

    fn commit(&self) -> anyhow::Result<()> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Listener that keeps every event
#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<CrawlerEvent>>,
}

impl RecordingListener {
    /// URLs rejected with `status`, with the step that rejected them
    pub fn rejected(&self, status: ReferenceStatus) -> Vec<(String, &'static str)> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                CrawlerEvent::Rejected {
                    url,
                    status: s,
                    reason,
                } if *s == status => Some((url.clone(), *reason)),
                _ => None,
            })
            .collect()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(|e| e.kind()).collect()
    }
}

impl CrawlerEventListener for RecordingListener {
    fn on_event(&self, event: &CrawlerEvent) -> anyhow::Result<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

pub fn crawler(config: Config, committer: &Arc<RecordingCommitter>) -> Crawler {
    Crawler::builder(config)
        .committer(committer.clone())
        .build()
        .expect("crawler should build")
}

pub fn crawler_with_listener(
    config: Config,
    committer: &Arc<RecordingCommitter>,
    listener: &Arc<RecordingListener>,
) -> Crawler {
    Crawler::builder(config)
        .committer(committer.clone())
        .listener(listener.clone())
        .build()
        .expect("crawler should build")
}

/// An HTML page linking to `links`
pub fn html_page(title: &str, links: &[&str]) -> ResponseTemplate {
    let anchors: String = links
        .iter()
        .map(|link| format!(r#"<a href="{}">{}</a>"#, link, link))
        .collect();
    html_response(format!(
        "<html><head><title>{}</title></head><body>{}</body></html>",
        title, anchors
    ))
}

/// A 200 response serving `body` as UTF-8 HTML
///
/// `set_body_string` would override the content type with `text/plain`.
pub fn html_response(body: impl Into<String>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.into(), "text/html; charset=utf-8")
}

/// Partition and status of a URL
pub fn state_of(store: &dyn ReferenceStore, url: &str) -> Option<(Partition, Option<ReferenceStatus>)> {
    store
        .get_reference(url)
        .unwrap()
        .map(|(partition, reference): (Partition, Reference)| (partition, reference.status))
}
