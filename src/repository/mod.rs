//! Repository layer for job persistence.
//!
//! The scraper writes through the [`JobStore`] contract; [`SqliteJobStore`]
//! is the rusqlite implementation.

mod jobs;

pub use jobs::SqliteJobStore;

use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;
use thiserror::Error;

use crate::models::{JobRecord, JobUpdate, StoredJob};

/// Storage errors.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("bad stored value in {column}: {message}")]
    Decode { column: &'static str, message: String },
}

pub type Result<T> = std::result::Result<T, RepoError>;

/// Open a connection with the pragmas every store uses.
pub fn connect(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(Duration::from_secs(5))?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    Ok(conn)
}

/// Turn "no rows" into `None`.
pub fn to_option<T>(result: rusqlite::Result<T>) -> Result<Option<T>> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Write/read contract the scraper depends on.
pub trait JobStore: Send {
    /// Insert a job, resolving its company, query and crawl-time rows.
    /// Returns `false` if the job id was already stored.
    fn write_one(&mut self, record: &JobRecord) -> Result<bool>;

    fn get_one(&self, job_id: u64) -> Result<Option<StoredJob>>;

    /// Apply the set fields of `update`. Returns `false` if the job does not exist.
    fn update_one(&mut self, job_id: u64, update: &JobUpdate) -> Result<bool>;

    fn exists(&self, job_id: u64) -> Result<bool> {
        Ok(self.get_one(job_id)?.is_some())
    }
}
