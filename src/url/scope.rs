use crate::config::ScopeConfig;
use url::Url;

/// Decides whether a candidate URL may be followed from an in-scope URL
///
/// All enabled restrictions must pass. With none enabled every candidate is
/// in scope. A candidate that cannot be parsed is never in scope.
#[derive(Debug, Clone, Default)]
pub struct CrawlScopeStrategy {
    stay_on_domain: bool,
    include_subdomains: bool,
    stay_on_port: bool,
    stay_on_protocol: bool,
}

impl CrawlScopeStrategy {
    pub fn new(config: &ScopeConfig) -> Self {
        Self {
            stay_on_domain: config.stay_on_domain,
            include_subdomains: config.include_subdomains,
            stay_on_port: config.stay_on_port,
            stay_on_protocol: config.stay_on_protocol,
        }
    }

    /// Returns true when no restriction is enabled
    pub fn is_unrestricted(&self) -> bool {
        !self.stay_on_domain && !self.stay_on_port && !self.stay_on_protocol
    }

    /// Checks `candidate_url` against the restrictions, relative to `in_scope_url`
    ///
    /// Protocol-relative candidates (`//host/path`) take the protocol of
    /// `in_scope_url`.
    pub fn is_in_scope(&self, in_scope_url: &str, candidate_url: &str) -> bool {
        if self.is_unrestricted() {
            return true;
        }

        let in_scope = match Url::parse(in_scope_url) {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!(url = %in_scope_url, error = %e, "Unsupported in-scope URL");
                return false;
            }
        };

        let candidate = if candidate_url.starts_with("//") {
            Url::parse(&format!("{}:{}", in_scope.scheme(), candidate_url))
        } else {
            Url::parse(candidate_url)
        };
        let candidate = match candidate {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!(url = %candidate_url, error = %e, "Unsupported candidate URL");
                return false;
            }
        };

        if self.stay_on_protocol && !in_scope.scheme().eq_ignore_ascii_case(candidate.scheme()) {
            tracing::debug!(url = %candidate_url, "Rejected protocol");
            return false;
        }

        if self.stay_on_domain && !self.is_on_domain(in_scope.host_str(), candidate.host_str()) {
            tracing::debug!(url = %candidate_url, "Rejected domain");
            return false;
        }

        if self.stay_on_port
            && in_scope.port_or_known_default() != candidate.port_or_known_default()
        {
            tracing::debug!(url = %candidate_url, "Rejected port");
            return false;
        }

        true
    }

    fn is_on_domain(&self, in_scope_host: Option<&str>, candidate_host: Option<&str>) -> bool {
        let (Some(in_scope), Some(candidate)) = (in_scope_host, candidate_host) else {
            return false;
        };
        let in_scope = in_scope.to_lowercase();
        let candidate = candidate.to_lowercase();

        if self.include_subdomains {
            candidate == in_scope || candidate.ends_with(&format!(".{}", in_scope))
        } else {
            candidate == in_scope
        }
    }
}
