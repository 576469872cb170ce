use crate::filter::OnMatch;
use serde::Deserialize;
use std::path::PathBuf;

/// Main configuration structure for Ripple-Frontier
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub delay: DelayConfig,
    #[serde(default)]
    pub scope: ScopeConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub normalizer: NormalizerConfig,
    #[serde(default)]
    pub checksum: ChecksumConfig,
    #[serde(default, rename = "url-filters")]
    pub url_filters: Vec<FilterEntry>,
    #[serde(default, rename = "header-filters")]
    pub header_filters: Vec<FilterEntry>,
    #[serde(default, rename = "document-filters")]
    pub document_filters: Vec<FilterEntry>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Unique crawler identifier, recorded in logs
    pub id: String,

    /// URLs the crawl starts from (depth 0)
    #[serde(rename = "start-urls")]
    pub start_urls: Vec<String>,

    /// Directory holding the reference store, committer output and downloads
    #[serde(rename = "work-dir", default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Number of parallel workers draining the frontier
    #[serde(rename = "num-threads", default = "default_num_threads")]
    pub num_threads: u32,

    /// Maximum hop distance from a start URL, -1 for unlimited
    #[serde(rename = "max-depth", default = "unlimited")]
    pub max_depth: i32,

    /// Maximum number of successfully processed URLs per run, -1 for unlimited
    #[serde(rename = "max-urls", default = "unlimited_urls")]
    pub max_urls: i64,

    #[serde(rename = "ignore-robots-txt", default)]
    pub ignore_robots_txt: bool,

    #[serde(rename = "ignore-robots-meta", default)]
    pub ignore_robots_meta: bool,

    #[serde(rename = "ignore-sitemap", default)]
    pub ignore_sitemap: bool,

    /// What to do with URLs from the previous run that were not seen again
    #[serde(rename = "orphans-strategy", default)]
    pub orphans_strategy: OrphansStrategy,

    /// Keep raw downloaded bodies under `work-dir/downloads`
    #[serde(rename = "keep-downloads", default)]
    pub keep_downloads: bool,
}

impl CrawlerConfig {
    /// Path of the SQLite reference store
    pub fn store_path(&self) -> PathBuf {
        self.work_dir.join("frontier.db")
    }

    /// Path of the SQLite committer output
    pub fn committer_path(&self) -> PathBuf {
        self.work_dir.join("committed.db")
    }

    /// Directory where raw bodies are saved when `keep-downloads` is on
    pub fn downloads_dir(&self) -> PathBuf {
        self.work_dir.join("downloads")
    }

    /// Returns the maximum depth, or `None` when unlimited
    pub fn depth_limit(&self) -> Option<u32> {
        u32::try_from(self.max_depth).ok()
    }

    /// Returns the maximum number of OK outcomes, or `None` when unlimited
    pub fn url_limit(&self) -> Option<u64> {
        u64::try_from(self.max_urls).ok()
    }
}

/// Handling of previously crawled URLs that were not encountered again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrphansStrategy {
    /// Flag them DELETED and send a removal to the committer
    #[default]
    Delete,
    /// Send them through the crawl again, then delete what is still orphaned
    Process,
    /// Leave them alone
    Ignore,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler, also used as the robots.txt agent token
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the User-Agent header value
    ///
    /// Format: `CrawlerName/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Granularity of the politeness delay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DelayScope {
    /// One timestamp shared by the whole crawler
    Crawler,
    /// One timestamp per site root
    #[default]
    Site,
}

/// Politeness delay configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DelayConfig {
    /// Delay between two fetches in the same scope (milliseconds)
    #[serde(rename = "default", default = "default_delay")]
    pub default_delay: u64,

    #[serde(default)]
    pub scope: DelayScope,

    /// Ignore `Crawl-delay` from robots.txt and always use the default
    #[serde(rename = "ignore-robots-crawl-delay", default)]
    pub ignore_robots_crawl_delay: bool,
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            default_delay: default_delay(),
            scope: DelayScope::default(),
            ignore_robots_crawl_delay: false,
        }
    }
}

/// Restrictions on which discovered URLs may be followed
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScopeConfig {
    #[serde(rename = "stay-on-domain", default)]
    pub stay_on_domain: bool,

    #[serde(rename = "include-subdomains", default)]
    pub include_subdomains: bool,

    #[serde(rename = "stay-on-port", default)]
    pub stay_on_port: bool,

    #[serde(rename = "stay-on-protocol", default)]
    pub stay_on_protocol: bool,
}

/// HTTP fetch configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FetcherConfig {
    /// Issue a HEAD request before the GET so headers can be filtered early
    #[serde(rename = "fetch-headers", default)]
    pub fetch_headers: bool,

    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(rename = "connect-timeout-secs", default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Status codes treated as success; empty means any 2xx
    #[serde(rename = "valid-status-codes", default)]
    pub valid_status_codes: Vec<u16>,

    /// Status codes reported as NOT_FOUND
    #[serde(rename = "not-found-status-codes", default = "default_not_found_codes")]
    pub not_found_status_codes: Vec<u16>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            fetch_headers: false,
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            valid_status_codes: Vec::new(),
            not_found_status_codes: default_not_found_codes(),
        }
    }
}

/// URL normalization rules
#[derive(Debug, Clone, Deserialize)]
pub struct NormalizerConfig {
    #[serde(rename = "remove-trailing-slash", default)]
    pub remove_trailing_slash: bool,

    #[serde(rename = "remove-tracking-params", default = "enabled")]
    pub remove_tracking_params: bool,

    #[serde(rename = "sort-query-params", default = "enabled")]
    pub sort_query_params: bool,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            remove_trailing_slash: false,
            remove_tracking_params: true,
            sort_query_params: true,
        }
    }
}

/// Change-detection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ChecksumConfig {
    /// Response headers fed into the header checksum, in order
    #[serde(rename = "header-fields", default = "default_header_fields")]
    pub header_fields: Vec<String>,
}

impl Default for ChecksumConfig {
    fn default() -> Self {
        Self {
            header_fields: default_header_fields(),
        }
    }
}

/// A single regex filter
///
/// For header filters `field` names the header whose values are matched.
/// For document filters a `field` matches a metadata value instead of the body.
#[derive(Debug, Clone, Deserialize)]
pub struct FilterEntry {
    pub pattern: String,

    #[serde(rename = "on-match", default)]
    pub on_match: OnMatch,

    #[serde(default)]
    pub field: Option<String>,

    #[serde(rename = "case-sensitive", default)]
    pub case_sensitive: bool,
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("./work")
}

fn default_num_threads() -> u32 {
    2
}

fn unlimited() -> i32 {
    -1
}

fn unlimited_urls() -> i64 {
    -1
}

fn default_delay() -> u64 {
    3000
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_not_found_codes() -> Vec<u16> {
    vec![404]
}

fn default_header_fields() -> Vec<String> {
    vec!["Last-Modified".to_string(), "ETag".to_string()]
}

fn enabled() -> bool {
    true
}
