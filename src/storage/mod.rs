//! Storage module for persisting crawl state
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - The QUEUED/ACTIVE/PROCESSED/CACHED reference partitions
//! - The per-run sitemap resolution memo
//! - Run tracking and resumption support

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteReferenceStore;
pub use traits::{ReferenceStore, StorageError, StorageResult};

use std::path::Path;

/// Attempts made by [`lookup_with_retry`] before giving up
pub const LOOKUP_ATTEMPTS: u32 = 3;

/// Opens the reference store at `path`, creating parent directories
pub fn open_store(path: &Path) -> Result<SqliteReferenceStore, crate::FrontierError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(SqliteReferenceStore::open(path)?)
}

/// Runs a read-only store lookup, retrying failures a bounded number of times
///
/// When every attempt fails the URL is treated as unknown: the default value
/// (`false`, `None`) is returned so the URL gets processed again rather than
/// silently dropped.
pub fn lookup_with_retry<T: Default>(
    operation: &str,
    url: &str,
    mut lookup: impl FnMut() -> StorageResult<T>,
) -> T {
    for attempt in 1..=LOOKUP_ATTEMPTS {
        match lookup() {
            Ok(value) => return value,
            Err(e) if attempt < LOOKUP_ATTEMPTS => {
                tracing::debug!(operation, url, attempt, error = %e, "Store lookup failed, retrying");
            }
            Err(e) => {
                tracing::warn!(
                    operation,
                    url,
                    error = %e,
                    "Store lookup failed {} times, treating URL as unknown",
                    LOOKUP_ATTEMPTS
                );
            }
        }
    }
    T::default()
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns true when a run with this status can be picked up again
    pub fn is_resumable(&self) -> bool {
        matches!(self, Self::Running | Self::Interrupted)
    }
}
