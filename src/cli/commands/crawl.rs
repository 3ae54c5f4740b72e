//! Crawl command.

use std::time::Duration;

use anyhow::Context;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use jobcrawl::browser::{ChromeDriver, PageDriver};
use jobcrawl::config::Settings;
use jobcrawl::matcher::MatchMethod;
use jobcrawl::repository::SqliteJobStore;
use jobcrawl::scraper::{crawl_all, JobScraper, ScrapeEvent};

/// Command-line overrides for one crawl.
#[derive(Debug, Default)]
pub struct CrawlOverrides {
    pub queries: Vec<String>,
    pub max_jobs: Option<u64>,
    pub headless: bool,
    pub threshold: Option<u8>,
    pub method: Option<MatchMethod>,
}

impl CrawlOverrides {
    fn apply(self, settings: &mut Settings) {
        if !self.queries.is_empty() {
            settings.queries = self.queries;
        }
        if let Some(n) = self.max_jobs {
            settings.max_jobs = n;
        }
        if self.headless {
            settings.browser.headless = true;
        }
        if let Some(n) = self.threshold {
            settings.match_threshold = n;
        }
        if let Some(method) = self.method {
            settings.match_method = method;
        }
    }
}

fn progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░"),
    );
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

fn show_event(pb: &ProgressBar, event: &ScrapeEvent) {
    match event {
        ScrapeEvent::LinksPage { offset, found } => {
            pb.set_message(format!("search offset {}: {} links", offset, found));
        }
        ScrapeEvent::ScrapeStarted { total, from } => {
            pb.set_length(*total as u64);
            pb.set_position(*from as u64);
            pb.set_message("scraping job pages");
        }
        ScrapeEvent::LinkDone {
            index,
            job_id,
            stored,
        } => {
            pb.set_position(*index as u64 + 1);
            if let Some(id) = job_id {
                let verb = if *stored { "stored" } else { "skipped" };
                pb.set_message(format!("{} {}", verb, id));
            }
        }
    }
}

/// Crawl every configured query, resuming from the checkpoint.
pub async fn cmd_crawl(mut settings: Settings, overrides: CrawlOverrides) -> anyhow::Result<()> {
    overrides.apply(&mut settings);
    if settings.queries.is_empty() {
        anyhow::bail!("No queries to crawl. Pass them as arguments or set `queries` in the config file");
    }
    settings.ensure_directories()?;

    let store = SqliteJobStore::new(&settings.database_path())
        .with_context(|| format!("Failed to open {}", settings.database_path().display()))?;
    let driver = ChromeDriver::launch(settings.browser.clone())
        .await
        .context("Failed to start the browser")?;

    println!(
        "{} Crawling {} {}",
        style("→").cyan(),
        settings.queries.len(),
        if settings.queries.len() == 1 {
            "query"
        } else {
            "queries"
        }
    );

    let pb = progress_bar();
    let sink = pb.clone();
    let mut scraper = JobScraper::new(
        driver,
        store,
        settings.checkpoint(),
        settings.scraper_options(),
    )
    .on_event(move |event| show_event(&sink, event));

    let result = crawl_all(&mut scraper, &settings.queries).await;
    pb.finish_and_clear();

    let (mut driver, store) = scraper.into_parts();
    if let Err(e) = driver.close().await {
        tracing::warn!("Failed to close the browser: {}", e);
    }
    let summary = result?;

    if summary.skipped_queries > 0 {
        println!(
            "  {} {} queries already done by an earlier run",
            style("○").dim(),
            summary.skipped_queries
        );
    }
    for outcome in &summary.outcomes {
        println!(
            "  {} {}: {} links, {} stored, {} skipped{}",
            style("✓").green(),
            outcome.query,
            outcome.links,
            outcome.stored,
            outcome.skipped,
            if outcome.resumed { " (resumed)" } else { "" }
        );
    }
    println!(
        "{} Crawl complete: {} new jobs, {} in database",
        style("✓").green(),
        summary.stored(),
        store.count()?
    );
    Ok(())
}
