//! Statistics generation from the reference store
//!
//! This module provides functionality for extracting and displaying
//! crawl statistics from the storage layer.

use crate::state::{Partition, ReferenceStatus};
use crate::storage::{ReferenceStore, RunRecord, StorageResult};
use std::collections::BTreeMap;

/// Crawl statistics summary
#[derive(Debug, Clone, Default)]
pub struct CrawlStatistics {
    pub queued: u64,
    pub active: u64,
    pub processed: u64,

    /// Entries from the previous run not superseded yet
    pub cached: u64,

    /// Count of processed references by outcome
    pub by_status: BTreeMap<ReferenceStatus, u64>,

    pub latest_run: Option<RunRecord>,
}

impl CrawlStatistics {
    /// URLs known to this run: processed plus still in the frontier
    pub fn total(&self) -> u64 {
        self.processed + self.queued + self.active
    }

    /// Processed references with a good outcome
    pub fn good(&self) -> u64 {
        self.by_status
            .iter()
            .filter(|(status, _)| status.is_good())
            .map(|(_, count)| count)
            .sum()
    }
}

/// Loads statistics from the store
pub fn load_statistics(store: &dyn ReferenceStore) -> StorageResult<CrawlStatistics> {
    Ok(CrawlStatistics {
        queued: store.count(Partition::Queued)?,
        active: store.count(Partition::Active)?,
        processed: store.count(Partition::Processed)?,
        cached: store.count(Partition::Cached)?,
        by_status: store.processed_status_counts()?,
        latest_run: store.latest_run()?,
    })
}

fn percentage(count: u64, total: u64) -> f64 {
    if total > 0 {
        (count as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    if let Some(run) = &stats.latest_run {
        println!("Latest run:");
        println!("  ID: {}", run.id);
        println!("  Status: {}", run.status.to_db_string());
        println!("  Started: {}", run.started_at);
        if let Some(finished) = &run.finished_at {
            println!("  Finished: {}", finished);
        }
        println!();
    }

    println!("Partitions:");
    println!("  {}: {}", Partition::Queued, stats.queued);
    println!("  {}: {}", Partition::Active, stats.active);
    println!("  {}: {}", Partition::Processed, stats.processed);
    println!("  {}: {}", Partition::Cached, stats.cached);
    println!();

    if !stats.by_status.is_empty() {
        println!("Processed by Status:");
        // Sort statuses by count (descending)
        let mut status_counts: Vec<_> = stats.by_status.iter().collect();
        status_counts.sort_by(|a, b| b.1.cmp(a.1));

        for (status, count) in status_counts {
            println!(
                "  {}: {} ({:.1}%)",
                status,
                count,
                percentage(*count, stats.processed)
            );
        }
        println!();
    }

    println!(
        "Success Rate: {:.1}% ({} / {} URLs OK or unmodified)",
        percentage(stats.good(), stats.processed),
        stats.good(),
        stats.processed
    );
}

/// Logs the same summary through tracing
pub fn log_statistics(stats: &CrawlStatistics) {
    tracing::info!(
        processed = stats.processed,
        queued = stats.queued,
        active = stats.active,
        cached = stats.cached,
        "{} urls processed out of {}",
        stats.processed,
        stats.total()
    );
    for (status, count) in &stats.by_status {
        tracing::info!(
            status = %status,
            count,
            "  {}: {} ({:.1}%)",
            status,
            count,
            percentage(*count, stats.processed)
        );
    }
}
