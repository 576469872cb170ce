//! Robots.txt parser implementation
//!
//! Rule matching is delegated to the robotstxt crate. Crawl-delay and
//! Sitemap lines, which the matcher does not expose, are read here.

use crate::filter::{OnMatch, OnMatchFilter, UrlFilter};
use robotstxt::DefaultMatcher;
use std::fmt;
use std::sync::Arc;

/// Parsed robots.txt of one site, as seen by one user agent
#[derive(Clone)]
pub struct RobotsTxt {
    crawl_delay: Option<f64>,
    sitemap_locations: Vec<String>,
    filters: Vec<Arc<dyn UrlFilter>>,
}

impl RobotsTxt {
    /// Parses robots.txt content for the given agent token
    pub fn parse(content: &str, user_agent: &str) -> Self {
        if content.trim().is_empty() {
            return Self::allow_all();
        }

        let rules = RobotsRulesFilter {
            content: content.to_string(),
            user_agent: user_agent.to_string(),
        };

        Self {
            crawl_delay: parse_crawl_delay(content, user_agent),
            sitemap_locations: parse_sitemap_locations(content),
            filters: vec![Arc::new(rules)],
        }
    }

    /// Creates a permissive RobotsTxt that allows everything
    ///
    /// This is used when robots.txt is missing or cannot be fetched.
    pub fn allow_all() -> Self {
        Self {
            crawl_delay: None,
            sitemap_locations: Vec::new(),
            filters: Vec::new(),
        }
    }

    /// The crawl delay in seconds, if specified for this agent
    pub fn crawl_delay(&self) -> Option<f64> {
        self.crawl_delay
    }

    /// Sitemap URLs listed with `Sitemap:` lines
    pub fn sitemap_locations(&self) -> &[String] {
        &self.sitemap_locations
    }

    /// URL filters derived from the Allow/Disallow rules
    pub fn filters(&self) -> &[Arc<dyn UrlFilter>] {
        &self.filters
    }

    /// Checks an absolute URL against the rules
    pub fn is_allowed(&self, url: &str) -> bool {
        !crate::filter::is_rejected(&self.filters, |f| f.accept_url(url))
    }
}

impl fmt::Debug for RobotsTxt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RobotsTxt")
            .field("crawl_delay", &self.crawl_delay)
            .field("sitemap_locations", &self.sitemap_locations)
            .field("filters", &self.filters.len())
            .finish()
    }
}

/// Exclude filter rejecting the URLs robots.txt disallows for an agent
#[derive(Debug, Clone)]
struct RobotsRulesFilter {
    content: String,
    user_agent: String,
}

impl OnMatchFilter for RobotsRulesFilter {
    fn on_match(&self) -> OnMatch {
        OnMatch::Exclude
    }
}

impl UrlFilter for RobotsRulesFilter {
    fn accept_url(&self, url: &str) -> bool {
        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, &self.user_agent, url)
    }
}

/// Finds the Crawl-delay that applies to `user_agent`
///
/// A group is a run of User-agent lines followed by rules. A delay in a group
/// naming the agent wins over one in the `*` group.
fn parse_crawl_delay(content: &str, user_agent: &str) -> Option<f64> {
    let normalized_agent = user_agent.to_lowercase();

    let mut group_agents: Vec<String> = Vec::new();
    let mut in_rules = false;
    let mut delay_for_wildcard = None;
    let mut delay_for_agent = None;

    for (key, value) in directives(content) {
        match key.as_str() {
            "user-agent" => {
                if in_rules {
                    group_agents.clear();
                    in_rules = false;
                }
                group_agents.push(value.to_lowercase());
            }
            "crawl-delay" => {
                in_rules = true;
                let Ok(delay) = value.parse::<f64>() else {
                    continue;
                };
                if group_agents
                    .iter()
                    .any(|ua| ua != "*" && normalized_agent.contains(ua.as_str()))
                {
                    delay_for_agent = Some(delay);
                } else if group_agents.iter().any(|ua| ua == "*") {
                    delay_for_wildcard = Some(delay);
                }
            }
            "sitemap" => {}
            _ => in_rules = true,
        }
    }

    delay_for_agent.or(delay_for_wildcard)
}

/// Collects `Sitemap:` values; they apply regardless of group
fn parse_sitemap_locations(content: &str) -> Vec<String> {
    directives(content)
        .filter(|(key, value)| key == "sitemap" && !value.is_empty())
        .map(|(_, value)| value.to_string())
        .collect()
}

/// Yields `(lowercased key, trimmed value)` for every directive line
fn directives(content: &str) -> impl Iterator<Item = (String, &str)> {
    content.lines().filter_map(|line| {
        let line = line.split('#').next().unwrap_or("").trim();
        let (key, value) = line.split_once(':')?;
        Some((key.trim().to_lowercase(), value.trim()))
    })
}
