//! On-disk crawl checkpoint.
//!
//! A single JSON document records which query is being processed, which stage
//! it is in, where in that stage the crawl got to and how many times the crawl
//! has been (re)started on it. It is rewritten after every unit of work so a
//! killed process can pick up where it stopped.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, error, trace};

use crate::error::{ScrapeError, ScrapeResult};

/// Stage of a query's crawl.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrawlStage {
    /// Walking search result pages and backing up job links.
    #[serde(rename = "crawling_links_list")]
    CrawlingLinks,
    /// Visiting each backed-up job link.
    #[serde(rename = "scraping_each_link", alias = "scrapping_each_link")]
    ScrapingLinks,
}

impl CrawlStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrawlStage::CrawlingLinks => "crawling_links_list",
            CrawlStage::ScrapingLinks => "scraping_each_link",
        }
    }
}

/// The persisted crawl record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlState {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<CrawlStage>,
    /// Search result offset while crawling links, job id while scraping.
    #[serde(
        default,
        alias = "data",
        deserialize_with = "deserialize_cursor",
        skip_serializing_if = "Option::is_none"
    )]
    pub cursor: Option<u64>,
    #[serde(default, alias = "attempt")]
    pub attempt_count: u32,
}

impl CrawlState {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            stage: None,
            cursor: None,
            attempt_count: 0,
        }
    }

    /// Move to `stage`. The cursor belongs to the previous stage and is dropped.
    pub fn enter_stage(&mut self, stage: CrawlStage) {
        if self.stage != Some(stage) {
            self.stage = Some(stage);
            self.cursor = None;
        }
    }
}

fn deserialize_cursor<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawCursor {
        Number(u64),
        Text(String),
    }

    match Option::<RawCursor>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawCursor::Number(n)) => Ok(Some(n)),
        Some(RawCursor::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(RawCursor::Text(s)) => s.trim().parse().map(Some).map_err(|_| {
            serde::de::Error::custom(format!("cursor must be a number, got '{}'", s))
        }),
    }
}

/// Reads and writes the checkpoint file.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Load the saved state, or `None` if no checkpoint exists.
    pub fn load(&self) -> ScrapeResult<Option<CrawlState>> {
        if !self.path.exists() {
            debug!("No state file existed at {}", self.path.display());
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path)?;
        debug!("State file exists at {}: {}", self.path.display(), contents.trim());

        let state = serde_json::from_str(&contents).map_err(|e| {
            ScrapeError::InvalidState(format!("{}: {}", self.path.display(), e))
        })?;
        Ok(Some(state))
    }

    /// Write the whole record, replacing the previous one atomically.
    pub fn save(&self, state: &CrawlState) -> ScrapeResult<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        serde_json::to_writer(&mut tmp, state)?;
        tmp.flush()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;

        trace!("State file is written at {}", self.path.display());
        Ok(())
    }

    /// Delete the checkpoint file only.
    pub fn remove(&self) -> ScrapeResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete the checkpoint and every file in `backup_dir`.
    ///
    /// Returns the number of files removed.
    pub fn clear_with_backups(&self, backup_dir: &Path) -> ScrapeResult<usize> {
        debug!("Deleting the state and backup files");
        self.remove()?;

        if !backup_dir.exists() {
            error!("The backup folder does not exist: {}", backup_dir.display());
            return Ok(0);
        }

        let mut removed = 0;
        for entry in fs::read_dir(backup_dir)? {
            let path = entry?.path();
            if path.is_file() {
                debug!("Removing {}", path.display());
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}
