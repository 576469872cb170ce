//! Fetching robots.txt over HTTP

use crate::robots::{CachedRobots, RobotsTxt};
use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::{header::LOCATION, Client};
use std::sync::Arc;
use url::Url;

/// Redirect hops followed when fetching robots.txt
const MAX_REDIRECTS: usize = 5;

/// Supplies the robots.txt of a site root
///
/// Never fails: a site whose robots.txt cannot be obtained allows everything.
#[async_trait]
pub trait RobotsTxtProvider: Send + Sync {
    async fn get_robots_txt(&self, url_root: &str) -> Arc<RobotsTxt>;
}

/// Fetches `{root}/robots.txt` with the crawler's client and caches it per root
pub struct HttpRobotsTxtProvider {
    client: Client,
    user_agent: String,
    cache: DashMap<String, CachedRobots>,
}

impl HttpRobotsTxtProvider {
    /// `user_agent` is the agent token matched against robots.txt groups
    pub fn new(client: Client, user_agent: impl Into<String>) -> Self {
        Self {
            client,
            user_agent: user_agent.into(),
            cache: DashMap::new(),
        }
    }

    async fn fetch(&self, url_root: &str) -> RobotsTxt {
        let mut url = format!("{}/robots.txt", url_root.trim_end_matches('/'));

        for _ in 0..=MAX_REDIRECTS {
            let response = match self.client.get(&url).send().await {
                Ok(response) => response,
                Err(e) => {
                    tracing::debug!(url = %url, error = %e, "Could not fetch robots.txt, allowing all");
                    return RobotsTxt::allow_all();
                }
            };

            let status = response.status();
            if status.is_redirection() {
                let target = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|location| Url::parse(&url).ok()?.join(location).ok());
                match target {
                    Some(target) => {
                        url = target.to_string();
                        continue;
                    }
                    None => return RobotsTxt::allow_all(),
                }
            }

            if !status.is_success() {
                tracing::debug!(url = %url, status = status.as_u16(), "No robots.txt, allowing all");
                return RobotsTxt::allow_all();
            }

            return match response.text().await {
                Ok(body) => {
                    let robots = RobotsTxt::parse(&body, &self.user_agent);
                    tracing::debug!(
                        url = %url,
                        crawl_delay = ?robots.crawl_delay(),
                        sitemaps = robots.sitemap_locations().len(),
                        "Parsed robots.txt"
                    );
                    robots
                }
                Err(e) => {
                    tracing::debug!(url = %url, error = %e, "Could not read robots.txt, allowing all");
                    RobotsTxt::allow_all()
                }
            };
        }

        tracing::debug!(url = %url, "Too many robots.txt redirects, allowing all");
        RobotsTxt::allow_all()
    }
}

#[async_trait]
impl RobotsTxtProvider for HttpRobotsTxtProvider {
    async fn get_robots_txt(&self, url_root: &str) -> Arc<RobotsTxt> {
        if let Some(cached) = self.cache.get(url_root) {
            if !cached.is_stale() {
                return Arc::clone(&cached.robots);
            }
        }

        // Two workers may race to fetch the same root; the later insert wins
        let cached = CachedRobots::new(self.fetch(url_root).await);
        let robots = Arc::clone(&cached.robots);
        self.cache.insert(url_root.to_string(), cached);
        robots
    }
}
