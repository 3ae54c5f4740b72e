//! Resume rules applied to a saved checkpoint.

use tracing::{debug, info};

use super::checkpoint::{CrawlStage, CrawlState};
use crate::error::{ScrapeError, ScrapeResult};

/// Where a query's crawl (re)starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumePlan {
    /// Crawl search result pages starting at this offset.
    CrawlLinksFrom(u64),
    /// Skip link crawling; scrape backed-up links starting at this job id
    /// (or from the first link).
    ScrapeLinksFrom(Option<u64>),
}

/// The state to continue with and the plan derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resume {
    pub state: CrawlState,
    pub plan: ResumePlan,
    /// Whether a saved checkpoint was picked up.
    pub resumed: bool,
}

/// Decide how to run `query` given the saved checkpoint.
///
/// Each resume counts as an attempt. Once the count passes `max_attempts` the
/// crawl is abandoned with [`ScrapeError::MaxAttempts`].
pub fn plan(saved: Option<CrawlState>, query: &str, max_attempts: u32) -> ScrapeResult<Resume> {
    let Some(mut state) = saved else {
        return Ok(Resume {
            state: CrawlState::new(query),
            plan: ResumePlan::CrawlLinksFrom(0),
            resumed: false,
        });
    };

    if state.query != query {
        return Err(ScrapeError::InvalidState(format!(
            "checkpoint belongs to query '{}', not '{}'",
            state.query, query
        )));
    }

    state.attempt_count += 1;
    if state.attempt_count > max_attempts {
        return Err(ScrapeError::MaxAttempts {
            query: state.query,
            attempts: state.attempt_count,
            max: max_attempts,
        });
    }

    let plan = match state.stage {
        Some(CrawlStage::CrawlingLinks) => ResumePlan::CrawlLinksFrom(state.cursor.unwrap_or(0)),
        Some(CrawlStage::ScrapingLinks) => ResumePlan::ScrapeLinksFrom(state.cursor),
        None => ResumePlan::CrawlLinksFrom(0),
    };

    info!(
        "Resuming '{}' (attempt {}/{}): {:?}",
        query, state.attempt_count, max_attempts, plan
    );

    Ok(Resume {
        state,
        plan,
        resumed: true,
    })
}

/// Where to begin in the configured query list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStart {
    /// No checkpoint: run every query.
    Beginning,
    /// A checkpoint names the query at this index; earlier ones are done.
    At(usize),
    /// The checkpoint names a query that is not configured any more.
    Stale,
}

/// Match the saved checkpoint against the query list.
pub fn query_start(saved: Option<&CrawlState>, queries: &[String]) -> QueryStart {
    match saved {
        None => QueryStart::Beginning,
        Some(state) => match queries.iter().position(|q| *q == state.query) {
            Some(index) => {
                debug!(
                    "Checkpoint is on query {} of {}: '{}'",
                    index + 1,
                    queries.len(),
                    state.query
                );
                QueryStart::At(index)
            }
            None => QueryStart::Stale,
        },
    }
}
