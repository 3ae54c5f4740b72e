//! Scraper error types.

use thiserror::Error;

use crate::browser::DriverError;
use crate::repository::RepoError;

pub type ScrapeResult<T> = std::result::Result<T, ScrapeError>;

/// Errors raised by the crawl loop.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// The persisted attempt counter reached the configured ceiling.
    #[error("maximum crawl attempts reached for '{query}' (attempt {attempts}, max {max})")]
    MaxAttempts {
        query: String,
        attempts: u32,
        max: u32,
    },
    #[error("browser driver error: {0}")]
    Driver(#[from] DriverError),
    #[error("retries exhausted for {operation} ({attempts} attempts): {reason}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        reason: String,
    },
    #[error("sign-in required but LINKEDIN_USER / LINKEDIN_PASSWORD are not set")]
    MissingCredentials,
    #[error("unexpected page layout: {0}")]
    Layout(String),
    #[error("invalid crawl state: {0}")]
    InvalidState(String),
    #[error("storage error: {0}")]
    Storage(#[from] RepoError),
    #[error("backup error: {0}")]
    Backup(#[from] csv::Error),
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScrapeError {
    /// Errors that should stop a supervisor from restarting the crawl.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ScrapeError::MaxAttempts { .. } | ScrapeError::MissingCredentials
        )
    }

    /// Whether this error came from the browser side (driver or retry wrapper).
    pub fn is_driver(&self) -> bool {
        matches!(
            self,
            ScrapeError::Driver(_) | ScrapeError::RetriesExhausted { .. }
        )
    }
}
