//! Text parsing for scraped LinkedIn pages.

use std::sync::LazyLock;

use chrono::{NaiveDateTime, TimeDelta};
use regex::Regex;

use crate::error::{ScrapeError, ScrapeResult};

static JOB_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"view/(\d+)").unwrap());

static POST_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+)\s+(second|minute|hour|day|week|month|year)s?\s+ago").unwrap()
});

static SIGN_IN_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)log\s?-?in|sign\s?-?in|sign\s?-?up").unwrap());

/// Separator between the items of a job's primary description.
pub const DETAIL_SEPARATOR: &str = " · ";

/// Numeric job id from a `/jobs/view/<id>/` link.
pub fn job_id_from_link(link: &str) -> Option<u64> {
    JOB_ID
        .captures(link)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// First number in `text`, ignoring thousands separators.
pub fn extract_number(text: &str) -> Option<u32> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let digits: String = text[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == ',')
        .filter(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Absolute post time for text like "2 weeks ago" or "Reposted 3 days ago",
/// and whether the posting is a repost.
///
/// Months count as 30 days and years as 365. Text without a recognizable
/// "<n> <unit> ago", or with a count too large to subtract, yields no timestamp.
pub fn convert_post_time(raw: &str, now: NaiveDateTime) -> (Option<NaiveDateTime>, bool) {
    let is_repost = raw.to_lowercase().contains("reposted");

    let post_time = POST_TIME.captures(raw).and_then(|c| {
        let n: i64 = c[1].parse().ok()?;
        let delta = match c[2].to_lowercase().as_str() {
            "second" => TimeDelta::try_seconds(n)?,
            "minute" => TimeDelta::try_minutes(n)?,
            "hour" => TimeDelta::try_hours(n)?,
            "day" => TimeDelta::try_days(n)?,
            "week" => TimeDelta::try_weeks(n)?,
            "month" => TimeDelta::try_days(n.checked_mul(30)?)?,
            "year" => TimeDelta::try_days(n.checked_mul(365)?)?,
            _ => return None,
        };
        now.checked_sub_signed(delta)
    });

    (post_time, is_repost)
}

/// The four items of a job's primary description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDetails {
    pub company_name: String,
    pub location: String,
    pub post_time_raw: String,
    pub applicants_raw: String,
}

/// Split "Company · Location · 2 days ago · 40 applicants".
///
/// Postings without applicants show only three items; those get "0 applicants".
pub fn split_details(text: &str) -> ScrapeResult<JobDetails> {
    let mut items: Vec<String> = text
        .split(DETAIL_SEPARATOR)
        .map(|s| s.trim().to_string())
        .collect();
    if items.len() == 3 {
        items.push("0 applicants".to_string());
    }

    match <[String; 4]>::try_from(items) {
        Ok([company_name, location, post_time_raw, applicants_raw]) => Ok(JobDetails {
            company_name,
            location,
            post_time_raw,
            applicants_raw,
        }),
        Err(items) => Err(ScrapeError::Layout(format!(
            "expected 3 or 4 description items, found {}: {:?}",
            items.len(),
            text
        ))),
    }
}

/// Job search URL for `query` at result offset `start`.
pub fn search_url(query: &str, start: u64) -> String {
    format!(
        "https://www.linkedin.com/jobs/search/?distance=250&geoId=101174742&keywords={}&f_TPR=r604800&sortBy=DD&start={}",
        urlencoding::encode(query),
        start
    )
}

/// Link without its query string.
pub fn strip_query(href: &str) -> &str {
    href.split('?').next().unwrap_or(href)
}

/// First line of a multi-line element text.
pub fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("").trim()
}

/// Whether a page title is a login / sign-up page.
pub fn needs_sign_in(title: &str) -> bool {
    SIGN_IN_TITLE.is_match(title)
}
