//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests made for documents:
//! - Building the shared HTTP client with the crawler's user agent
//! - HEAD requests when headers are fetched ahead of the document
//! - GET requests for document content
//! - Classifying the response status into a fetch state
//!
//! Redirects are never followed by the client. A redirect comes back as a
//! response carrying `redirect_target`, and the fetch pipeline decides what
//! to do with it.

use crate::config::{FetcherConfig, UserAgentConfig};
use crate::crawler::document::Metadata;
use crate::state::Reference;
use async_trait::async_trait;
use reqwest::{header::LOCATION, redirect::Policy, Client, Method};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// HTTP method used for a fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMethod {
    Head,
    Get,
}

/// What the response status means for the crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    /// Valid status, content is new or modified
    New,
    /// 304 Not Modified
    Unmodified,
    /// One of the configured not-found codes
    NotFound,
    /// 3xx with a usable `Location`
    Redirect,
    /// Anything else
    BadStatus,
}

/// Response returned by a fetcher
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status_code: u16,
    pub reason_phrase: String,
    pub headers: Metadata,
    /// Empty for HEAD requests
    pub body: Vec<u8>,
    pub state: FetchState,
    /// Absolute redirect target, when the server redirected
    pub redirect_target: Option<String>,
}

/// Transport-level fetch failures
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Request to {url} timed out")]
    Timeout { url: String },
}

/// Retrieves documents and headers over HTTP
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    async fn fetch(
        &self,
        reference: &Reference,
        method: FetchMethod,
    ) -> Result<FetchResponse, FetchError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use ripple_frontier::config::{FetcherConfig, UserAgentConfig};
/// use ripple_frontier::crawler::build_http_client;
///
/// let user_agent = UserAgentConfig {
///     crawler_name: "RippleFrontier".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&user_agent, &FetcherConfig::default()).unwrap();
/// ```
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    fetcher: &FetcherConfig,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(Duration::from_secs(fetcher.timeout_secs))
        .connect_timeout(Duration::from_secs(fetcher.connect_timeout_secs))
        .redirect(Policy::none()) // Redirects surface as FetchState::Redirect
        .gzip(true)
        .brotli(true)
        .build()
}

/// Default fetcher backed by a shared reqwest client
#[derive(Debug, Clone)]
pub struct GenericHttpFetcher {
    client: Client,
    valid_status_codes: Vec<u16>,
    not_found_status_codes: Vec<u16>,
}

impl GenericHttpFetcher {
    pub fn new(client: Client, config: &FetcherConfig) -> Self {
        Self {
            client,
            valid_status_codes: config.valid_status_codes.clone(),
            not_found_status_codes: config.not_found_status_codes.clone(),
        }
    }

    /// Maps a status code to a fetch state
    ///
    /// | Condition | State |
    /// |-----------|-------|
    /// | configured valid code (any 2xx when none configured) | New |
    /// | 304 | Unmodified |
    /// | 3xx with Location | Redirect |
    /// | configured not-found code | NotFound |
    /// | anything else | BadStatus |
    pub fn classify(&self, status_code: u16, has_location: bool) -> FetchState {
        let valid = if self.valid_status_codes.is_empty() {
            (200..300).contains(&status_code)
        } else {
            self.valid_status_codes.contains(&status_code)
        };

        if valid {
            FetchState::New
        } else if status_code == 304 {
            FetchState::Unmodified
        } else if (300..400).contains(&status_code) && has_location {
            FetchState::Redirect
        } else if self.not_found_status_codes.contains(&status_code) {
            FetchState::NotFound
        } else {
            FetchState::BadStatus
        }
    }
}

#[async_trait]
impl HttpFetcher for GenericHttpFetcher {
    async fn fetch(
        &self,
        reference: &Reference,
        method: FetchMethod,
    ) -> Result<FetchResponse, FetchError> {
        let url = reference.url.as_str();
        let http_method = match method {
            FetchMethod::Head => Method::HEAD,
            FetchMethod::Get => Method::GET,
        };

        let map_err = |source: reqwest::Error| {
            if source.is_timeout() {
                FetchError::Timeout {
                    url: url.to_string(),
                }
            } else {
                FetchError::Request {
                    url: url.to_string(),
                    source,
                }
            }
        };

        let response = self
            .client
            .request(http_method, url)
            .send()
            .await
            .map_err(map_err)?;

        let status = response.status();
        let mut headers = Metadata::new();
        for (name, value) in response.headers() {
            headers.add(
                name.as_str(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            );
        }

        let redirect_target = if status.is_redirection() {
            response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|location| resolve_location(url, location))
        } else {
            None
        };

        let state = self.classify(status.as_u16(), redirect_target.is_some());

        let body = match method {
            FetchMethod::Get if state == FetchState::New => {
                response.bytes().await.map_err(map_err)?.to_vec()
            }
            _ => Vec::new(),
        };

        tracing::debug!(
            url = %url,
            status = status.as_u16(),
            bytes = body.len(),
            ?method,
            "Fetched"
        );

        Ok(FetchResponse {
            status_code: status.as_u16(),
            reason_phrase: status.canonical_reason().unwrap_or("").to_string(),
            headers,
            body,
            state,
            redirect_target,
        })
    }
}

/// Resolves a `Location` header against the request URL
fn resolve_location(request_url: &str, location: &str) -> Option<String> {
    let base = Url::parse(request_url).ok()?;
    base.join(location.trim()).ok().map(|u| u.to_string())
}
