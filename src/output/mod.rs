//! Output module for crawl results
//!
//! This module handles:
//! - Storing committed documents in a SQLite database
//! - Reporting crawl statistics from the reference store

mod sqlite_output;
pub mod stats;

pub use sqlite_output::{CommittedDocument, SqliteCommitter};
pub use stats::{load_statistics, log_statistics, print_statistics, CrawlStatistics};
