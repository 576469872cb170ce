//! Politeness delay between fetches.
//!
//! [`DelayResolver`] enforces a minimum delay between two fetches that share
//! a scope key: the site root, or a single global key for single-site crawls.
//! A robots.txt `Crawl-delay` replaces the configured delay for its site unless
//! it is configured to be ignored.
//!
//! The resolver is shared by all workers. Per-key state lives in a `DashMap`;
//! each entry holds a `tokio::sync::Mutex` around the last fetch instant, and
//! that mutex is held across the sleep so two workers can never both observe
//! a stale timestamp and fetch the same site at once.

use crate::config::{DelayConfig, DelayScope};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument};

/// Key shared by every site when the delay scope is the whole crawler
const CRAWLER_SCOPE_KEY: &str = "*";

/// Per-scope minimum delay enforcement
#[derive(Debug)]
pub struct DelayResolver {
    default_delay: Duration,
    scope: DelayScope,
    ignore_robots_crawl_delay: bool,

    /// Last fetch instant per scope key. `None` until the first fetch.
    /// The Arc lets the DashMap shard lock go before awaiting the Mutex.
    last_fetch: DashMap<String, Arc<Mutex<Option<Instant>>>>,
}

impl DelayResolver {
    pub fn new(config: &DelayConfig) -> Self {
        Self {
            default_delay: Duration::from_millis(config.default_delay),
            scope: config.scope,
            ignore_robots_crawl_delay: config.ignore_robots_crawl_delay,
            last_fetch: DashMap::new(),
        }
    }

    /// Returns the delay that applies given an optional robots.txt crawl-delay (seconds)
    pub fn effective_delay(&self, robots_crawl_delay: Option<f64>) -> Duration {
        match robots_crawl_delay {
            Some(secs) if !self.ignore_robots_crawl_delay && secs >= 0.0 && secs.is_finite() => {
                Duration::from_secs_f64(secs)
            }
            _ => self.default_delay,
        }
    }

    fn scope_key<'a>(&self, site_key: &'a str) -> &'a str {
        match self.scope {
            DelayScope::Crawler => CRAWLER_SCOPE_KEY,
            DelayScope::Site => site_key,
        }
    }

    /// Waits until a fetch to `site_key` is allowed, then records it
    ///
    /// The first call for a key returns immediately.
    #[instrument(skip(self), level = "debug")]
    pub async fn wait_for_turn(&self, site_key: &str, robots_crawl_delay: Option<f64>) {
        let key = self.scope_key(site_key);
        let delay = self.effective_delay(robots_crawl_delay);

        let slot = self
            .last_fetch
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone();

        let mut last_fetch = slot.lock().await;

        if let Some(last) = *last_fetch {
            let elapsed = last.elapsed();
            if elapsed < delay {
                let wait = delay - elapsed;
                debug!(key = %key, wait_ms = wait.as_millis() as u64, "Applying politeness delay");
                tokio::time::sleep(wait).await;
            }
        }

        *last_fetch = Some(Instant::now());
    }
}
