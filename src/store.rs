//! `SQLite`-backed contribution store.
//!
//! The persistent store is a single SQLite file. During a run it is opened
//! from the staged copy; the store, not the crawler, decides whether a proposed
//! record is inserted, overwrites an older one, or is skipped.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};

use crate::error::{AppError, Result};
use crate::models::{Category, ContributionRecord, UpsertOutcome};

/// Idempotent DDL for the contributions table.
const CREATE_TABLES: &str = r"
CREATE TABLE IF NOT EXISTS contributions (
    category TEXT NOT NULL,
    key TEXT NOT NULL,
    name TEXT NOT NULL,
    version TEXT NOT NULL DEFAULT '',
    title TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT '',
    author TEXT NOT NULL DEFAULT '',
    url TEXT NOT NULL,
    reference TEXT NOT NULL DEFAULT '',
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (category, key)
);
";

const SELECT_COLUMNS: &str = "category, key, name, version, title, description, author, url, \
     reference, updated_at";

/// Contribution store over one SQLite connection.
///
/// Create with [`ContributionStore::open`] for a file or
/// [`ContributionStore::in_memory`] for tests.
pub struct ContributionStore {
    conn: Connection,
}

impl ContributionStore {
    /// Open (or create) the store at `path` and ensure its schema.
    ///
    /// Fails if the file exists but is not a SQLite database.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(CREATE_TABLES)?;
        Ok(Self { conn })
    }

    /// Open an existing store for inspection only.
    ///
    /// Never creates the file or the schema; queries against a database
    /// without the contributions table fail instead.
    pub fn open_read_only(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self { conn })
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(CREATE_TABLES)?;
        Ok(Self { conn })
    }

    /// Insert `record` if its key is new, overwrite the stored record if the
    /// incoming one is strictly newer, skip otherwise.
    ///
    /// Runs in its own transaction, so a record is either fully written or not
    /// at all.
    pub fn upsert(&mut self, record: &ContributionRecord) -> Result<UpsertOutcome> {
        let tx = self.conn.transaction()?;

        let stored: Option<i64> = tx
            .query_row(
                "SELECT updated_at FROM contributions WHERE category = ?1 AND key = ?2",
                params![record.category.as_str(), record.key],
                |row| row.get(0),
            )
            .optional()?;

        let incoming = record.updated_at.timestamp_millis();
        let outcome = match stored {
            None => {
                tx.execute(
                    "INSERT INTO contributions (category, key, name, version, title, \
                     description, author, url, reference, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                    params![
                        record.category.as_str(),
                        record.key,
                        record.name,
                        record.version,
                        record.title,
                        record.description,
                        record.author,
                        record.url,
                        record.reference,
                        incoming,
                    ],
                )?;
                UpsertOutcome::Inserted
            }
            Some(current) if incoming > current => {
                tx.execute(
                    "UPDATE contributions SET name = ?3, version = ?4, title = ?5, \
                     description = ?6, author = ?7, url = ?8, reference = ?9, updated_at = ?10 \
                     WHERE category = ?1 AND key = ?2",
                    params![
                        record.category.as_str(),
                        record.key,
                        record.name,
                        record.version,
                        record.title,
                        record.description,
                        record.author,
                        record.url,
                        record.reference,
                        incoming,
                    ],
                )?;
                UpsertOutcome::Updated
            }
            Some(_) => UpsertOutcome::Skipped,
        };

        tx.commit()?;
        Ok(outcome)
    }

    /// Look up a single record.
    pub fn get(&self, category: Category, key: &str) -> Result<Option<ContributionRecord>> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM contributions WHERE category = ?1 AND key = ?2"
        );
        let row = self
            .conn
            .query_row(&sql, params![category.as_str(), key], RawRecord::from_row)
            .optional()?;
        row.map(RawRecord::into_record).transpose()
    }

    /// All records of one category, newest first.
    pub fn list(&self, category: Category) -> Result<Vec<ContributionRecord>> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM contributions WHERE category = ?1 \
             ORDER BY updated_at DESC, key"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![category.as_str()], RawRecord::from_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?.into_record()?);
        }
        Ok(records)
    }

    /// Total number of records.
    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM contributions", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Number of records in one category.
    pub fn count_category(&self, category: Category) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM contributions WHERE category = ?1",
            params![category.as_str()],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Most recent `updated_at` in the store, if any.
    pub fn latest_update(&self) -> Result<Option<DateTime<Utc>>> {
        let latest: Option<i64> =
            self.conn
                .query_row("SELECT MAX(updated_at) FROM contributions", [], |row| {
                    row.get(0)
                })?;
        Ok(latest.and_then(DateTime::from_timestamp_millis))
    }

    /// Run SQLite's own consistency check.
    pub fn integrity_check(&self) -> Result<()> {
        let result: String = self
            .conn
            .query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        if result == "ok" {
            Ok(())
        } else {
            Err(AppError::integrity(format!("sqlite integrity_check: {result}")))
        }
    }

    /// Close the connection, flushing everything to disk.
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| AppError::Sqlite(e))
    }
}

/// Row as read from SQLite, before domain conversion.
struct RawRecord {
    category: String,
    key: String,
    name: String,
    version: String,
    title: String,
    description: String,
    author: String,
    url: String,
    reference: String,
    updated_at: i64,
}

impl RawRecord {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            category: row.get(0)?,
            key: row.get(1)?,
            name: row.get(2)?,
            version: row.get(3)?,
            title: row.get(4)?,
            description: row.get(5)?,
            author: row.get(6)?,
            url: row.get(7)?,
            reference: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    fn into_record(self) -> Result<ContributionRecord> {
        let updated_at = DateTime::from_timestamp_millis(self.updated_at).ok_or_else(|| {
            AppError::integrity(format!(
                "record {} has invalid updated_at {}",
                self.key, self.updated_at
            ))
        })?;
        Ok(ContributionRecord {
            category: self.category.parse()?,
            key: self.key,
            name: self.name,
            version: self.version,
            title: self.title,
            description: self.description,
            author: self.author,
            url: self.url,
            reference: self.reference,
            updated_at,
        })
    }
}
