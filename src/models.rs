//! Job posting records passed between the scraper and the store.

use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Fields read from a single job page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedJob {
    pub job_id: u64,
    pub title: String,
    pub company_name: String,
    pub location: Option<String>,
    /// Absolute post time derived from `post_time_raw`.
    pub post_time: Option<NaiveDateTime>,
    pub post_time_raw: Option<String>,
    pub n_applicants: Option<u32>,
    pub skills: Vec<String>,
    pub is_repost: bool,
    /// External application URL, if the posting opens one.
    pub apply_link: Option<String>,
    /// LinkedIn job view URL the data was scraped from.
    pub li_job_link: String,
}

/// Skill-match columns stored next to each job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchColumns {
    pub match_score: Option<u8>,
    pub top_matches: Option<Vec<String>>,
    pub match_threshold: Option<u8>,
}

/// Everything `JobStore::write_one` needs to insert a row.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub job: ScrapedJob,
    pub matches: MatchColumns,
    pub original_query: String,
    pub crawl_time: DateTime<Local>,
}

/// A job as read back from the store, with its dimension rows joined in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredJob {
    pub job_id: u64,
    pub title: String,
    pub company_name: Option<String>,
    pub post_time: Option<String>,
    pub n_applicants: Option<u32>,
    pub location: Option<String>,
    pub skills: Vec<String>,
    pub is_repost: bool,
    pub apply_link: Option<String>,
    pub li_job_link: Option<String>,
    pub post_time_raw: Option<String>,
    pub crawl_time: Option<String>,
    pub original_query: Option<String>,
    pub match_score: Option<u8>,
    pub top_matches: Option<Vec<String>>,
    pub match_threshold: Option<u8>,
}

/// Partial update of a stored job. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct JobUpdate {
    pub title: Option<String>,
    pub location: Option<String>,
    pub n_applicants: Option<u32>,
    pub skills: Option<Vec<String>>,
    pub is_repost: Option<bool>,
    pub apply_link: Option<String>,
    pub match_score: Option<u8>,
    pub top_matches: Option<Vec<String>>,
    pub match_threshold: Option<u8>,
}

impl JobUpdate {
    pub fn is_empty(&self) -> bool {
        *self == JobUpdate::default()
    }
}
