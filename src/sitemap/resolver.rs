use crate::sitemap::{SitemapResolver, SitemapUrl};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use sitemap::reader::{SiteMapEntity, SiteMapReader};
use sitemap::structs::ChangeFreq;
use std::collections::{HashSet, VecDeque};
use std::io::Cursor;
use url::Url;

/// Locations probed when robots.txt names no sitemap
const DEFAULT_LOCATIONS: [&str; 2] = ["/sitemap.xml", "/sitemap_index.xml"];

/// Upper bound on sitemap files fetched for one site, nested indexes included
const MAX_SITEMAPS_PER_SITE: usize = 50;

/// Fetches sitemaps and sitemap indexes over HTTP
pub struct HttpSitemapResolver {
    client: Client,
    max_sitemaps: usize,
}

impl HttpSitemapResolver {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            max_sitemaps: MAX_SITEMAPS_PER_SITE,
        }
    }

    async fn fetch(&self, location: &str) -> Option<Vec<u8>> {
        match self.client.get(location).send().await {
            Ok(response) if response.status().is_success() => match response.bytes().await {
                Ok(body) => Some(body.to_vec()),
                Err(e) => {
                    tracing::debug!(sitemap = location, error = %e, "Could not read sitemap");
                    None
                }
            },
            Ok(response) => {
                tracing::debug!(
                    sitemap = location,
                    status = response.status().as_u16(),
                    "Sitemap not available"
                );
                None
            }
            Err(e) => {
                tracing::debug!(sitemap = location, error = %e, "Could not fetch sitemap");
                None
            }
        }
    }
}

#[async_trait]
impl SitemapResolver for HttpSitemapResolver {
    async fn resolve_sitemaps(&self, url_root: &str, hint_locations: &[String]) -> Vec<SitemapUrl> {
        let Ok(root) = Url::parse(url_root) else {
            return Vec::new();
        };

        let initial: Vec<String> = if hint_locations.is_empty() {
            DEFAULT_LOCATIONS
                .iter()
                .filter_map(|path| root.join(path).ok())
                .map(|u| u.to_string())
                .collect()
        } else {
            hint_locations
                .iter()
                .filter_map(|location| root.join(location.trim()).ok())
                .map(|u| u.to_string())
                .collect()
        };

        let mut pending: VecDeque<String> = initial.into_iter().collect();
        let mut visited = HashSet::new();
        let mut urls = Vec::new();

        while let Some(location) = pending.pop_front() {
            if !visited.insert(location.clone()) {
                continue;
            }
            if visited.len() > self.max_sitemaps {
                tracing::warn!(
                    url_root,
                    max = self.max_sitemaps,
                    "Too many sitemaps, ignoring the rest"
                );
                break;
            }

            let Some(body) = self.fetch(&location).await else {
                continue;
            };

            let (entries, nested) = parse_sitemap(&body);
            tracing::debug!(
                sitemap = %location,
                urls = entries.len(),
                nested = nested.len(),
                "Parsed sitemap"
            );
            urls.extend(entries);
            pending.extend(nested);
        }

        urls
    }
}

/// Parses a sitemap or sitemap index
///
/// Returns the listed URLs and the nested sitemap locations.
pub(crate) fn parse_sitemap(xml: &[u8]) -> (Vec<SitemapUrl>, Vec<String>) {
    let mut urls = Vec::new();
    let mut nested = Vec::new();

    for entity in SiteMapReader::new(Cursor::new(xml)) {
        match entity {
            SiteMapEntity::Url(entry) => {
                let Some(loc) = entry.loc.get_url() else {
                    continue;
                };
                urls.push(SitemapUrl {
                    url: loc.to_string(),
                    last_mod: entry.lastmod.get_time().map(|t| t.with_timezone(&Utc)),
                    change_freq: change_freq_name(&entry.changefreq).map(str::to_string),
                    priority: entry.priority.get_priority(),
                });
            }
            SiteMapEntity::SiteMap(entry) => {
                if let Some(loc) = entry.loc.get_url() {
                    nested.push(loc.to_string());
                }
            }
            _ => {}
        }
    }

    (urls, nested)
}

fn change_freq_name(change_freq: &ChangeFreq) -> Option<&'static str> {
    match change_freq {
        ChangeFreq::Always => Some("always"),
        ChangeFreq::Hourly => Some("hourly"),
        ChangeFreq::Daily => Some("daily"),
        ChangeFreq::Weekly => Some("weekly"),
        ChangeFreq::Monthly => Some("monthly"),
        ChangeFreq::Yearly => Some("yearly"),
        ChangeFreq::Never => Some("never"),
        _ => None,
    }
}
