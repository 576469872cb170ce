//! Storage traits and error types
//!
//! This module defines the trait interface for reference store backends and
//! associated error types.

use crate::state::{Partition, Reference, ReferenceStatus};
use crate::storage::{RunRecord, RunStatus};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Store is corrupt: {0}")]
    Corrupt(String),

    #[error("Store lock poisoned by a panicked worker")]
    Lock,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Persistent store of every reference the crawler knows about
///
/// A reference is in exactly one of the QUEUED, ACTIVE and PROCESSED
/// partitions. The CACHED partition holds the previous run's processed
/// entries for incremental comparison.
///
/// Implementations synchronize internally and are shared by all workers.
/// Any error from a state-changing call is fatal to the run.
pub trait ReferenceStore: Send + Sync {
    // ===== Run Management =====

    /// Creates a new crawl run, returning its ID
    fn create_run(&self, config_hash: &str) -> StorageResult<i64>;

    /// Gets the most recent run
    fn latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Records the final status of a run with a finish timestamp
    fn finish_run(&self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    /// Prepares the partitions for a run
    ///
    /// On resume, ACTIVE entries from the interrupted run go back to QUEUED.
    /// On a fresh run, PROCESSED replaces CACHED and the live partitions and
    /// the sitemap memo are cleared.
    fn prepare_run(&self, resume: bool) -> StorageResult<()>;

    // ===== Partitions =====

    /// Queues a reference unless it is already queued, active or processed
    ///
    /// Re-queuing a URL that is still QUEUED keeps the smallest depth.
    /// Returns true when the reference was newly queued.
    fn queue(&self, reference: &Reference) -> StorageResult<bool>;

    /// Atomically moves one QUEUED reference to ACTIVE and returns it
    ///
    /// Shallower references are handed out first.
    fn next_queued(&self) -> StorageResult<Option<Reference>>;

    /// Moves a reference to PROCESSED and drops its CACHED entry
    ///
    /// Inserts the reference when it was never queued.
    fn mark_processed(&self, reference: &Reference) -> StorageResult<()>;

    /// Looks up the previous run's entry for a URL
    fn get_cached(&self, url: &str) -> StorageResult<Option<Reference>>;

    /// Looks up a reference in any live partition
    fn get_reference(&self, url: &str) -> StorageResult<Option<(Partition, Reference)>>;

    /// Returns the live partition a URL is in
    fn partition_of(&self, url: &str) -> StorageResult<Option<Partition>>;

    fn is_queued(&self, url: &str) -> StorageResult<bool> {
        Ok(self.partition_of(url)? == Some(Partition::Queued))
    }

    fn is_active(&self, url: &str) -> StorageResult<bool> {
        Ok(self.partition_of(url)? == Some(Partition::Active))
    }

    fn is_processed(&self, url: &str) -> StorageResult<bool> {
        Ok(self.partition_of(url)? == Some(Partition::Processed))
    }

    // ===== Counts =====

    /// Counts the references in a partition
    fn count(&self, partition: Partition) -> StorageResult<u64>;

    fn queue_size(&self) -> StorageResult<u64> {
        self.count(Partition::Queued)
    }

    fn active_count(&self) -> StorageResult<u64> {
        self.count(Partition::Active)
    }

    fn processed_count(&self) -> StorageResult<u64> {
        self.count(Partition::Processed)
    }

    fn cached_count(&self) -> StorageResult<u64> {
        self.count(Partition::Cached)
    }

    fn is_queue_empty(&self) -> StorageResult<bool> {
        Ok(self.queue_size()? == 0)
    }

    fn has_active_work(&self) -> StorageResult<bool> {
        Ok(self.active_count()? > 0)
    }

    /// Counts PROCESSED references per outcome
    fn processed_status_counts(&self) -> StorageResult<BTreeMap<ReferenceStatus, u64>>;

    /// Returns every CACHED reference, shallowest first
    fn cached_references(&self) -> StorageResult<Vec<Reference>>;

    // ===== Sitemap Memo =====

    fn is_sitemap_resolved(&self, url_root: &str) -> StorageResult<bool>;

    /// Marks a site root's sitemap as resolved for this run
    ///
    /// Returns true for the first caller only, so concurrent workers can
    /// use it to claim the resolution.
    fn mark_sitemap_resolved(&self, url_root: &str) -> StorageResult<bool>;
}
