//! Robots.txt caching implementation
//!
//! Entries expire after 24 hours so long crawls pick up changes made by the
//! site owner.

use crate::robots::RobotsTxt;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Cached robots.txt data for a site root
#[derive(Debug, Clone)]
pub struct CachedRobots {
    pub robots: Arc<RobotsTxt>,

    /// When the robots.txt was fetched
    pub fetched_at: DateTime<Utc>,
}

impl CachedRobots {
    /// Creates a new CachedRobots stamped with the current time
    pub fn new(robots: RobotsTxt) -> Self {
        Self {
            robots: Arc::new(robots),
            fetched_at: Utc::now(),
        }
    }

    /// Checks if the cached robots.txt is older than 24 hours
    pub fn is_stale(&self) -> bool {
        self.age() > Duration::hours(24)
    }

    /// Returns how long ago the robots.txt was fetched
    pub fn age(&self) -> Duration {
        Utc::now() - self.fetched_at
    }
}
