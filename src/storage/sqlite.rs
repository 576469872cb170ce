//! SQLite reference store implementation
//!
//! This module provides a SQLite-based implementation of the ReferenceStore
//! trait. One connection is shared behind a mutex; every partition move runs
//! in a transaction so a reference is never lost between two partitions.

use crate::state::{Partition, Reference, ReferenceStatus};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{ReferenceStore, StorageError, StorageResult};
use crate::storage::{RunRecord, RunStatus};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Columns read into a [`Reference`], in [`reference_from_row`] order
const REF_COLUMNS: &str = "url, depth, url_root, sitemap_last_mod, sitemap_change_freq, \
     sitemap_priority, status, head_checksum, doc_checksum, referenced_urls";

/// SQLite reference store backend
pub struct SqliteReferenceStore {
    conn: Mutex<Connection>,
}

impl SqliteReferenceStore {
    /// Opens or creates the store at `path`
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory store
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::Lock)
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    let status: String = row.get(4)?;
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&status).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                4,
                Type::Text,
                format!("unknown run status '{}'", status).into(),
            )
        })?,
    })
}

fn reference_from_row(row: &Row<'_>) -> rusqlite::Result<Reference> {
    let status = match row.get::<_, Option<String>>(6)? {
        Some(text) => Some(ReferenceStatus::from_db_string(&text).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                6,
                Type::Text,
                format!("unknown reference status '{}'", text).into(),
            )
        })?),
        None => None,
    };

    // Sitemap hints are advisory, an unreadable date is dropped
    let sitemap_last_mod = row
        .get::<_, Option<String>>(3)?
        .and_then(|text| DateTime::parse_from_rfc3339(&text).ok())
        .map(|date| date.with_timezone(&Utc));

    Ok(Reference {
        url: row.get(0)?,
        depth: row.get(1)?,
        url_root: row.get(2)?,
        sitemap_last_mod,
        sitemap_change_freq: row.get(4)?,
        sitemap_priority: row.get::<_, Option<f64>>(5)?.map(|p| p as f32),
        status,
        head_checksum: row.get(7)?,
        doc_checksum: row.get(8)?,
        referenced_urls: row
            .get::<_, Option<String>>(9)?
            .map(|text| text.lines().map(str::to_string).collect())
            .unwrap_or_default(),
    })
}

fn partition_from_text(text: &str) -> StorageResult<Partition> {
    Partition::from_db_string(text)
        .ok_or_else(|| StorageError::Corrupt(format!("unknown partition '{}'", text)))
}

impl ReferenceStore for SqliteReferenceStore {
    // ===== Run Management =====

    fn create_run(&self, config_hash: &str) -> StorageResult<i64> {
        let conn = self.conn()?;
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let conn = self.conn()?;
        let run = conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs ORDER BY id DESC LIMIT 1",
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    fn finish_run(&self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let conn = self.conn()?;
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, run_id],
        )?;
        Ok(())
    }

    fn prepare_run(&self, resume: bool) -> StorageResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if resume {
            let recovered = tx.execute(
                "UPDATE refs SET partition = 'queued' WHERE partition = 'active'",
                [],
            )?;
            if recovered > 0 {
                tracing::info!(recovered, "Moved interrupted references back to the queue");
            }
        } else {
            tx.execute("DELETE FROM cached_refs", [])?;
            let cached = tx.execute(
                &format!(
                    "INSERT INTO cached_refs ({cols}) SELECT {cols} FROM refs WHERE partition = 'processed'",
                    cols = REF_COLUMNS
                ),
                [],
            )?;
            tx.execute("DELETE FROM refs", [])?;
            tx.execute("DELETE FROM resolved_sitemaps", [])?;
            tracing::debug!(cached, "Cached previous run's processed references");
        }

        tx.commit()?;
        Ok(())
    }

    // ===== Partitions =====

    fn queue(&self, reference: &Reference) -> StorageResult<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing: Option<(String, u32)> = tx
            .query_row(
                "SELECT partition, depth FROM refs WHERE url = ?1",
                params![reference.url],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let queued = match existing {
            None => {
                tx.execute(
                    "INSERT INTO refs (url, partition, depth, url_root, sitemap_last_mod,
                     sitemap_change_freq, sitemap_priority)
                     VALUES (?1, 'queued', ?2, ?3, ?4, ?5, ?6)",
                    params![
                        reference.url,
                        reference.depth,
                        reference.url_root,
                        reference.sitemap_last_mod.map(|d| d.to_rfc3339()),
                        reference.sitemap_change_freq,
                        reference.sitemap_priority.map(f64::from),
                    ],
                )?;
                true
            }
            Some((partition, depth)) => {
                if partition_from_text(&partition)? == Partition::Queued && reference.depth < depth
                {
                    tx.execute(
                        "UPDATE refs SET depth = ?1 WHERE url = ?2",
                        params![reference.depth, reference.url],
                    )?;
                }
                false
            }
        };

        tx.commit()?;
        Ok(queued)
    }

    fn next_queued(&self) -> StorageResult<Option<Reference>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let next = tx
            .query_row(
                &format!(
                    "SELECT {}, id FROM refs WHERE partition = 'queued' ORDER BY depth, id LIMIT 1",
                    REF_COLUMNS
                ),
                [],
                |row| Ok((reference_from_row(row)?, row.get::<_, i64>(10)?)),
            )
            .optional()?;

        let reference = match next {
            Some((reference, id)) => {
                tx.execute(
                    "UPDATE refs SET partition = 'active' WHERE id = ?1",
                    params![id],
                )?;
                Some(reference)
            }
            None => None,
        };

        tx.commit()?;
        Ok(reference)
    }

    fn mark_processed(&self, reference: &Reference) -> StorageResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute(
            "INSERT INTO refs (url, partition, depth, url_root, sitemap_last_mod,
             sitemap_change_freq, sitemap_priority, status, head_checksum, doc_checksum,
             referenced_urls)
             VALUES (?1, 'processed', ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(url) DO UPDATE SET
                partition = 'processed',
                depth = excluded.depth,
                url_root = excluded.url_root,
                sitemap_last_mod = excluded.sitemap_last_mod,
                sitemap_change_freq = excluded.sitemap_change_freq,
                sitemap_priority = excluded.sitemap_priority,
                status = excluded.status,
                head_checksum = excluded.head_checksum,
                doc_checksum = excluded.doc_checksum,
                referenced_urls = excluded.referenced_urls",
            params![
                reference.url,
                reference.depth,
                reference.url_root,
                reference.sitemap_last_mod.map(|d| d.to_rfc3339()),
                reference.sitemap_change_freq,
                reference.sitemap_priority.map(f64::from),
                reference.status.map(|s| s.to_db_string()),
                reference.head_checksum,
                reference.doc_checksum,
                (!reference.referenced_urls.is_empty()).then(|| reference.referenced_urls.join("\n")),
            ],
        )?;
        tx.execute(
            "DELETE FROM cached_refs WHERE url = ?1",
            params![reference.url],
        )?;

        tx.commit()?;
        Ok(())
    }

    fn get_cached(&self, url: &str) -> StorageResult<Option<Reference>> {
        let conn = self.conn()?;
        let reference = conn
            .query_row(
                &format!("SELECT {} FROM cached_refs WHERE url = ?1", REF_COLUMNS),
                params![url],
                reference_from_row,
            )
            .optional()?;
        Ok(reference)
    }

    fn get_reference(&self, url: &str) -> StorageResult<Option<(Partition, Reference)>> {
        let conn = self.conn()?;
        let found = conn
            .query_row(
                &format!("SELECT {}, partition FROM refs WHERE url = ?1", REF_COLUMNS),
                params![url],
                |row| Ok((row.get::<_, String>(10)?, reference_from_row(row)?)),
            )
            .optional()?;

        match found {
            Some((partition, reference)) => Ok(Some((partition_from_text(&partition)?, reference))),
            None => Ok(None),
        }
    }

    fn partition_of(&self, url: &str) -> StorageResult<Option<Partition>> {
        let conn = self.conn()?;
        let partition: Option<String> = conn
            .query_row(
                "SELECT partition FROM refs WHERE url = ?1",
                params![url],
                |row| row.get(0),
            )
            .optional()?;
        partition.as_deref().map(partition_from_text).transpose()
    }

    // ===== Counts =====

    fn count(&self, partition: Partition) -> StorageResult<u64> {
        let conn = self.conn()?;
        let count: i64 = match partition {
            Partition::Cached => {
                conn.query_row("SELECT COUNT(*) FROM cached_refs", [], |row| row.get(0))?
            }
            live => conn.query_row(
                "SELECT COUNT(*) FROM refs WHERE partition = ?1",
                params![live.to_db_string()],
                |row| row.get(0),
            )?,
        };
        Ok(count as u64)
    }

    fn processed_status_counts(&self) -> StorageResult<BTreeMap<ReferenceStatus, u64>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT status, COUNT(*) FROM refs
             WHERE partition = 'processed' AND status IS NOT NULL
             GROUP BY status",
        )?;

        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut counts = BTreeMap::new();
        for (status, count) in rows {
            let status = ReferenceStatus::from_db_string(&status)
                .ok_or_else(|| StorageError::Corrupt(format!("unknown status '{}'", status)))?;
            counts.insert(status, count as u64);
        }
        Ok(counts)
    }

    fn cached_references(&self) -> StorageResult<Vec<Reference>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM cached_refs ORDER BY depth, url",
            REF_COLUMNS
        ))?;
        let references = stmt
            .query_map([], reference_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(references)
    }

    // ===== Sitemap Memo =====

    fn is_sitemap_resolved(&self, url_root: &str) -> StorageResult<bool> {
        let conn = self.conn()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM resolved_sitemaps WHERE url_root = ?1",
                params![url_root],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn mark_sitemap_resolved(&self, url_root: &str) -> StorageResult<bool> {
        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO resolved_sitemaps (url_root, resolved_at) VALUES (?1, ?2)",
            params![url_root, Utc::now().to_rfc3339()],
        )?;
        Ok(inserted == 1)
    }
}
