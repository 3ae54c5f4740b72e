//! jobcrawl - resumable LinkedIn job-search crawler.
//!
//! Core library: the browser-driving scrape loop, its on-disk checkpoint,
//! CSV backups, skill matching and the SQLite job store.

pub mod browser;
pub mod config;
pub mod crawl;
pub mod error;
pub mod matcher;
pub mod models;
pub mod repository;
pub mod scraper;
pub mod supervisor;

pub use error::{ScrapeError, ScrapeResult};
