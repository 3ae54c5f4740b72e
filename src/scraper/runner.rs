//! Runs the configured queries in order.

use tracing::{info, warn};

use super::{JobScraper, QueryOutcome};
use crate::browser::PageDriver;
use crate::crawl::resume::query_start;
use crate::crawl::QueryStart;
use crate::error::ScrapeResult;
use crate::repository::JobStore;

/// Totals across every query of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    /// Queries finished by an earlier run, per the checkpoint.
    pub skipped_queries: usize,
    pub outcomes: Vec<QueryOutcome>,
}

impl CrawlSummary {
    pub fn stored(&self) -> usize {
        self.outcomes.iter().map(|o| o.stored).sum()
    }
}

/// Sign in, then crawl every query not yet finished. Stops at the first error.
pub async fn crawl_all<D: PageDriver, S: JobStore>(
    scraper: &mut JobScraper<D, S>,
    queries: &[String],
) -> ScrapeResult<CrawlSummary> {
    scraper.sign_in().await?;

    let saved = scraper.checkpoint().load()?;
    let start = match query_start(saved.as_ref(), queries) {
        QueryStart::Beginning => 0,
        QueryStart::At(index) => {
            if index > 0 {
                info!("Skipping {} already crawled queries", index);
            }
            index
        }
        QueryStart::Stale => {
            if let Some(state) = saved {
                warn!(
                    "Discarding checkpoint for '{}', which is not among the configured queries",
                    state.query
                );
            }
            let backup_dir = scraper.options().backup_dir.clone();
            scraper.checkpoint().clear_with_backups(&backup_dir)?;
            0
        }
    };

    let mut summary = CrawlSummary {
        skipped_queries: start,
        outcomes: Vec::new(),
    };
    for query in &queries[start..] {
        info!("Crawling query '{}'", query);
        summary.outcomes.push(scraper.run_query(query).await?);
    }
    Ok(summary)
}
