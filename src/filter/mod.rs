//! Include/exclude filtering
//!
//! Filters are evaluated in three places: on candidate URLs before they are
//! queued, on HTTP headers, and on fetched documents. Each filter is tagged
//! [`OnMatch::Include`] or [`OnMatch::Exclude`] and all three kinds share the
//! same evaluation rule, implemented once in [`is_rejected`]:
//!
//! - any exclude filter that does not accept rejects immediately
//! - when include filters exist, at least one of them must accept
//! - no filters at all means accept

mod pattern;

pub use pattern::{
    build_document_filters, build_header_filters, build_url_filters, RegexDocumentFilter,
    RegexHeaderFilter, RegexUrlFilter,
};

use crate::crawler::{CrawlDocument, Metadata};
use serde::Deserialize;
use std::ops::Deref;

/// What a filter does with the inputs it matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnMatch {
    /// Matching inputs are accepted
    #[default]
    Include,
    /// Matching inputs are rejected
    Exclude,
}

/// Common part of every filter
pub trait OnMatchFilter {
    fn on_match(&self) -> OnMatch;
}

/// Filter applied to candidate URLs
pub trait UrlFilter: OnMatchFilter + Send + Sync {
    fn accept_url(&self, url: &str) -> bool;
}

/// Filter applied to HTTP response headers
pub trait HeadersFilter: OnMatchFilter + Send + Sync {
    fn accept_headers(&self, url: &str, headers: &Metadata) -> bool;
}

/// Filter applied to a fetched document
pub trait DocumentFilter: OnMatchFilter + Send + Sync {
    fn accept_document(&self, document: &CrawlDocument) -> bool;
}

/// Applies the include/exclude rule to a filter set
///
/// `accepts` runs one filter against the input. Returns true when the input
/// must be rejected.
pub fn is_rejected<F>(filters: &[F], mut accepts: impl FnMut(&F::Target) -> bool) -> bool
where
    F: Deref,
    F::Target: OnMatchFilter,
{
    let mut has_includes = false;
    let mut include_matched = false;

    for filter in filters {
        let filter = Deref::deref(filter);
        let accepted = accepts(filter);
        match filter.on_match() {
            OnMatch::Include => {
                has_includes = true;
                include_matched |= accepted;
            }
            OnMatch::Exclude if !accepted => return true,
            OnMatch::Exclude => {}
        }
    }

    has_includes && !include_matched
}
