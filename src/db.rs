use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::models::{EmployerRecord, ListingRecord};

/// Persistence the scraper relies on. Inserts are idempotent: a duplicate
/// key is ignored and reported as `Ok(false)`.
pub trait RecordStore {
    fn is_new_job(&self, external_id: &str) -> Result<bool, StoreError>;
    fn is_new_employer(&self, company: &str) -> Result<bool, StoreError>;
    fn add_job(&self, record: &ListingRecord) -> Result<bool, StoreError>;
    fn add_employer(&self, record: &EmployerRecord) -> Result<bool, StoreError>;
    fn search_jobs(&self, term: &str) -> Result<Vec<ListingRecord>, StoreError>;
}

pub struct Database {
    conn: Connection,
    path: PathBuf,
}

impl Database {
    /// Open (creating if needed) the database at `path` and ensure the schema.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        let db = Self {
            conn,
            path: path.to_path_buf(),
        };
        db.init()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let db = Self {
            conn: Connection::open_in_memory()?,
            path: PathBuf::from(":memory:"),
        };
        db.init()?;
        Ok(db)
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn default_path() -> PathBuf {
        // Use XDG data directory or fallback
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "jobcrawl") {
            proj_dirs.data_dir().join("jobs.db")
        } else {
            PathBuf::from("jobs.db")
        }
    }

    pub fn init(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                external_id TEXT NOT NULL UNIQUE,
                title TEXT NOT NULL,
                company TEXT NOT NULL,
                location TEXT NOT NULL DEFAULT '',
                remote_status TEXT NOT NULL DEFAULT '',
                source_url TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS employers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                company TEXT NOT NULL UNIQUE,
                region TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX IF NOT EXISTS idx_jobs_company ON jobs(company);
            "#,
        )?;
        Ok(())
    }

    // --- Employer operations ---

    pub fn list_employers(&self) -> Result<Vec<EmployerRecord>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT company, region FROM employers ORDER BY company")?;
        let rows = stmt.query_map([], |row| {
            Ok(EmployerRecord {
                company: row.get(0)?,
                region: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<ListingRecord> {
        let location: String = row.get(3)?;
        let remote_status: String = row.get(4)?;
        // Rebuild the rendered form; only the split parts are stored.
        let location_raw = if remote_status.is_empty() {
            location.clone()
        } else {
            format!("{} ({})", location, remote_status)
        };
        Ok(ListingRecord {
            external_id: row.get(0)?,
            title: row.get(1)?,
            company: row.get(2)?,
            location_raw,
            location,
            remote_status,
            source_url: row.get(5)?,
        })
    }
}

impl RecordStore for Database {
    fn is_new_job(&self, external_id: &str) -> Result<bool, StoreError> {
        let existing: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM jobs WHERE external_id = ?1",
                [external_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(existing.is_none())
    }

    fn is_new_employer(&self, company: &str) -> Result<bool, StoreError> {
        let existing: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM employers WHERE company = ?1",
                [company],
                |row| row.get(0),
            )
            .optional()?;
        Ok(existing.is_none())
    }

    fn add_job(&self, record: &ListingRecord) -> Result<bool, StoreError> {
        record.validate()?;
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO jobs (external_id, title, company, location, remote_status, source_url)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.external_id,
                record.title,
                record.company,
                record.location,
                record.remote_status,
                record.source_url
            ],
        )?;
        Ok(inserted > 0)
    }

    fn add_employer(&self, record: &EmployerRecord) -> Result<bool, StoreError> {
        record.validate()?;
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO employers (company, region) VALUES (?1, ?2)",
            params![record.company, record.region],
        )?;
        Ok(inserted > 0)
    }

    fn search_jobs(&self, term: &str) -> Result<Vec<ListingRecord>, StoreError> {
        let pattern = format!("%{}%", term);
        let mut stmt = self.conn.prepare(
            "SELECT external_id, title, company, location, remote_status, source_url
             FROM jobs
             WHERE title LIKE ?1 OR company LIKE ?1 OR location LIKE ?1 OR remote_status LIKE ?1
             ORDER BY id",
        )?;
        let rows = stmt.query_map([&pattern], Self::row_to_job)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}
