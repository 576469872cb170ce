//! SQLite-based committer implementation
//!
//! This module provides a committer that stores committed documents in a
//! SQLite database. Additions and removals are buffered and written in one
//! transaction when the buffer fills up or `commit` is called.

use crate::crawler::{Committer, Metadata};
use anyhow::Context;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

/// Buffered operations flushed automatically past this size
const DEFAULT_BATCH_SIZE: usize = 100;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    reference TEXT PRIMARY KEY,
    content BLOB NOT NULL,
    metadata TEXT NOT NULL,
    committed_at TEXT NOT NULL
);
"#;

#[derive(Debug, Clone)]
enum PendingOperation {
    Add {
        reference: String,
        content: Vec<u8>,
        metadata: String,
    },
    Remove {
        reference: String,
    },
}

/// A document stored by the committer
#[derive(Debug, Clone, PartialEq)]
pub struct CommittedDocument {
    pub reference: String,
    pub content: Vec<u8>,
    /// Metadata serialized as TOML
    pub metadata: String,
    pub committed_at: String,
}

/// Committer writing documents to a SQLite table
pub struct SqliteCommitter {
    conn: Mutex<Connection>,
    pending: Mutex<Vec<PendingOperation>>,
    batch_size: usize,
}

impl SqliteCommitter {
    /// Opens or creates the committer database at `path`
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open committer database {}", path.display()))?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")?;
        Self::with_connection(conn)
    }

    /// Creates an in-memory committer
    pub fn open_in_memory() -> anyhow::Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> anyhow::Result<Self> {
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
            pending: Mutex::new(Vec::new()),
            batch_size: DEFAULT_BATCH_SIZE,
        })
    }

    /// Sets how many operations are buffered before an automatic flush
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    fn push(&self, operation: PendingOperation) -> anyhow::Result<()> {
        let flush_now = {
            let mut pending = self
                .pending
                .lock()
                .map_err(|_| anyhow::anyhow!("Committer buffer lock poisoned"))?;
            pending.push(operation);
            pending.len() >= self.batch_size
        };
        if flush_now {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&self) -> anyhow::Result<()> {
        let operations = {
            let mut pending = self
                .pending
                .lock()
                .map_err(|_| anyhow::anyhow!("Committer buffer lock poisoned"))?;
            std::mem::take(&mut *pending)
        };
        if operations.is_empty() {
            return Ok(());
        }

        let mut conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("Committer connection lock poisoned"))?;
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();

        for operation in &operations {
            match operation {
                PendingOperation::Add {
                    reference,
                    content,
                    metadata,
                } => {
                    tx.execute(
                        "INSERT INTO documents (reference, content, metadata, committed_at)
                         VALUES (?1, ?2, ?3, ?4)
                         ON CONFLICT(reference) DO UPDATE SET
                            content = excluded.content,
                            metadata = excluded.metadata,
                            committed_at = excluded.committed_at",
                        params![reference, content, metadata, now],
                    )?;
                }
                PendingOperation::Remove { reference } => {
                    tx.execute(
                        "DELETE FROM documents WHERE reference = ?1",
                        params![reference],
                    )?;
                }
            }
        }

        tx.commit()?;
        tracing::debug!(operations = operations.len(), "Committer flushed");
        Ok(())
    }

    /// Number of operations waiting for the next flush
    pub fn pending_count(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or(0)
    }

    /// Reads a committed document
    pub fn get_document(&self, reference: &str) -> anyhow::Result<Option<CommittedDocument>> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("Committer connection lock poisoned"))?;
        let document = conn
            .query_row(
                "SELECT reference, content, metadata, committed_at FROM documents WHERE reference = ?1",
                params![reference],
                |row| {
                    Ok(CommittedDocument {
                        reference: row.get(0)?,
                        content: row.get(1)?,
                        metadata: row.get(2)?,
                        committed_at: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(document)
    }

    /// Counts committed documents
    pub fn document_count(&self) -> anyhow::Result<u64> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("Committer connection lock poisoned"))?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

impl Committer for SqliteCommitter {
    fn queue_add(&self, reference: &str, content: &[u8], metadata: &Metadata) -> anyhow::Result<()> {
        let metadata = toml::to_string(metadata).context("Failed to serialize metadata")?;
        self.push(PendingOperation::Add {
            reference: reference.to_string(),
            content: content.to_vec(),
            metadata,
        })
    }

    fn queue_remove(&self, reference: &str, _metadata: &Metadata) -> anyhow::Result<()> {
        self.push(PendingOperation::Remove {
            reference: reference.to_string(),
        })
    }

    fn commit(&self) -> anyhow::Result<()> {
        self.flush()
    }
}
