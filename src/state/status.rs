/// Reference outcome definitions
///
/// This module defines the possible outcomes of processing a single URL.
use std::fmt;

/// Terminal outcome of the most recent processing attempt for a URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ReferenceStatus {
    // ===== Good Outcomes =====
    /// Document was fetched, imported and committed
    Ok,

    /// Document did not change since the previous run
    Unmodified,

    // ===== Policy Rejections =====
    /// Rejected by a filter, robots rule, the importer or a failed header fetch
    Rejected,

    /// Discovered beyond the configured maximum depth
    TooDeep,

    /// Server answered with a redirect; the target was queued instead
    Redirect,

    // ===== Fetch Outcomes =====
    /// Server reported one of the configured not-found codes
    NotFound,

    /// Server answered with any other unexpected status
    BadStatus,

    // ===== Failures / Removals =====
    /// Unexpected failure while processing
    Error,

    /// Previously good document that no longer exists
    Deleted,
}

impl ReferenceStatus {
    /// Returns true for outcomes that mean the document exists and is indexed
    pub fn is_good(&self) -> bool {
        matches!(self, Self::Ok | Self::Unmodified)
    }

    /// Converts the status to a database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Unmodified => "unmodified",
            Self::Rejected => "rejected",
            Self::TooDeep => "too_deep",
            Self::Redirect => "redirect",
            Self::NotFound => "not_found",
            Self::BadStatus => "bad_status",
            Self::Error => "error",
            Self::Deleted => "deleted",
        }
    }

    /// Parses a status from its database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "ok" => Some(Self::Ok),
            "unmodified" => Some(Self::Unmodified),
            "rejected" => Some(Self::Rejected),
            "too_deep" => Some(Self::TooDeep),
            "redirect" => Some(Self::Redirect),
            "not_found" => Some(Self::NotFound),
            "bad_status" => Some(Self::BadStatus),
            "error" => Some(Self::Error),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }

    /// Returns all statuses, in reporting order
    pub fn all() -> [Self; 9] {
        [
            Self::Ok,
            Self::Unmodified,
            Self::Rejected,
            Self::TooDeep,
            Self::Redirect,
            Self::NotFound,
            Self::BadStatus,
            Self::Error,
            Self::Deleted,
        ]
    }
}

impl fmt::Display for ReferenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_db_string().to_uppercase())
    }
}
