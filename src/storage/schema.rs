//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the reference store.

/// SQL schema for the database
///
/// The live lifecycle partitions share the `refs` table and are told apart by
/// the `partition` column, so a URL can only ever be in one of them. The
/// previous run's processed entries live in `cached_refs`, which may overlap.
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL
);

-- QUEUED, ACTIVE and PROCESSED references of the current run
CREATE TABLE IF NOT EXISTS refs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    partition TEXT NOT NULL CHECK (partition IN ('queued', 'active', 'processed')),
    depth INTEGER NOT NULL,
    url_root TEXT NOT NULL,
    sitemap_last_mod TEXT,
    sitemap_change_freq TEXT,
    sitemap_priority REAL,
    status TEXT,
    head_checksum TEXT,
    doc_checksum TEXT,
    referenced_urls TEXT
);

CREATE INDEX IF NOT EXISTS idx_refs_partition ON refs(partition, depth, id);

-- Processed references of the previous run
CREATE TABLE IF NOT EXISTS cached_refs (
    url TEXT PRIMARY KEY,
    depth INTEGER NOT NULL,
    url_root TEXT NOT NULL,
    sitemap_last_mod TEXT,
    sitemap_change_freq TEXT,
    sitemap_priority REAL,
    status TEXT,
    head_checksum TEXT,
    doc_checksum TEXT,
    referenced_urls TEXT
);

-- Site roots whose sitemaps were resolved this run
CREATE TABLE IF NOT EXISTS resolved_sitemaps (
    url_root TEXT PRIMARY KEY,
    resolved_at TEXT NOT NULL
);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
