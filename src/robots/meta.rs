//! In-document robots directives
//!
//! Directives come from `<meta name="robots">` (or a meta tag named after the
//! crawler) and from the `X-Robots-Tag` response header.

use crate::crawler::CrawlDocument;
use scraper::{Html, Selector};

/// Header carrying robots directives outside the document
const X_ROBOTS_TAG: &str = "X-Robots-Tag";

/// Robots directives that apply to one document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RobotsMeta {
    /// Do not index this document
    pub noindex: bool,
    /// Do not follow the links of this document
    pub nofollow: bool,
}

impl RobotsMeta {
    /// Applies a comma-separated directive list such as `noindex, follow`
    fn apply(&mut self, directives: &str) {
        for token in directives.split(',') {
            match token.trim().to_ascii_lowercase().as_str() {
                "noindex" => self.noindex = true,
                "nofollow" => self.nofollow = true,
                "none" => {
                    self.noindex = true;
                    self.nofollow = true;
                }
                _ => {}
            }
        }
    }
}

/// Reads robots directives for a fetched document
pub trait RobotsMetaProvider: Send + Sync {
    fn get_robots_meta(&self, document: &CrawlDocument) -> RobotsMeta;
}

/// Reads the `X-Robots-Tag` header and HTML meta tags
#[derive(Debug, Clone)]
pub struct StandardRobotsMetaProvider {
    user_agent: String,
}

impl StandardRobotsMetaProvider {
    /// `user_agent` is the agent token a crawler-specific meta tag may name
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into().to_ascii_lowercase(),
        }
    }

    fn applies_to_us(&self, name: &str) -> bool {
        let name = name.trim().to_ascii_lowercase();
        name == "robots" || name == self.user_agent
    }

    /// Header values may be prefixed with an agent, e.g. `otherbot: noindex`
    fn apply_header(&self, meta: &mut RobotsMeta, value: &str) {
        match value.split_once(':') {
            Some((agent, directives)) if !agent.contains(',') => {
                if agent.trim().eq_ignore_ascii_case(&self.user_agent) {
                    meta.apply(directives);
                }
            }
            _ => meta.apply(value),
        }
    }

    fn apply_html(&self, meta: &mut RobotsMeta, html: &str) {
        let Ok(selector) = Selector::parse("meta[name][content]") else {
            return;
        };
        let document = Html::parse_document(html);
        for element in document.select(&selector) {
            let element = element.value();
            if let (Some(name), Some(content)) = (element.attr("name"), element.attr("content")) {
                if self.applies_to_us(name) {
                    meta.apply(content);
                }
            }
        }
    }
}

impl RobotsMetaProvider for StandardRobotsMetaProvider {
    fn get_robots_meta(&self, document: &CrawlDocument) -> RobotsMeta {
        let mut meta = RobotsMeta::default();

        for value in document.metadata.get_all(X_ROBOTS_TAG) {
            self.apply_header(&mut meta, value);
        }

        if document.is_html() {
            self.apply_html(&mut meta, &document.text());
        }

        meta
    }
}
