//! The browser-driving crawl loop.
//!
//! A query is crawled in two stages. First the search result pages are walked
//! and every job link is appended to the link backup. Then each backed-up link
//! is opened, scraped, matched against the configured skills and written to the
//! job store. The checkpoint is rewritten after every page and every link, so a
//! restarted process resumes where the last one stopped.

pub mod linkedin;
pub mod parse;
mod runner;

pub use runner::{crawl_all, CrawlSummary};

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use base64::Engine;
use chrono::{DateTime, Local};
use tracing::{debug, error, info, trace, warn};

use crate::browser::{DriverError, PageDriver};
use crate::crawl::backup::{self, backup_path, JOBS_STUB, LINKS_STUB};
use crate::crawl::resume::{self, Resume};
use crate::crawl::{CheckpointStore, CrawlStage, CrawlState, JobBackup, LinkBackup, ResumePlan, RetryPolicy};
use crate::error::{ScrapeError, ScrapeResult};
use crate::matcher::{match_columns, MatchMethod, DEFAULT_MATCH_THRESHOLD};
use crate::models::{JobRecord, ScrapedJob};
use crate::repository::JobStore;

use linkedin::*;
use parse::{
    convert_post_time, extract_number, first_line, job_id_from_link, needs_sign_in, search_url,
    split_details, strip_query,
};

/// LinkedIn account used when the browser session is signed out.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

/// Pauses that let LinkedIn's client-side rendering settle.
#[derive(Debug, Clone, PartialEq)]
pub struct Delays {
    /// After loading a search result page.
    pub search_page: Duration,
    /// After loading a job page.
    pub job_page: Duration,
    /// After opening the skills dialog.
    pub dialog: Duration,
    /// After clicking Apply, before collecting the new tab.
    pub new_tab: Duration,
    /// After submitting the sign-in form.
    pub sign_in: Duration,
}

impl Default for Delays {
    fn default() -> Self {
        Self {
            search_page: Duration::from_secs(5),
            job_page: Duration::from_secs(3),
            dialog: Duration::from_secs(3),
            new_tab: Duration::from_secs(2),
            sign_in: Duration::from_secs(5),
        }
    }
}

impl Delays {
    pub fn none() -> Self {
        Self {
            search_page: Duration::ZERO,
            job_page: Duration::ZERO,
            dialog: Duration::ZERO,
            new_tab: Duration::ZERO,
            sign_in: Duration::ZERO,
        }
    }
}

/// Screenshot encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenshotFormat {
    Png,
    /// Base64 text of the PNG.
    Base64,
}

impl ScreenshotFormat {
    fn extension(&self) -> &'static str {
        match self {
            ScreenshotFormat::Png => "png",
            ScreenshotFormat::Base64 => "b64",
        }
    }
}

/// Crawl settings.
#[derive(Debug, Clone)]
pub struct ScraperOptions {
    /// Upper bound on the search result offset.
    pub max_jobs: u64,
    pub my_skills: Vec<String>,
    pub match_threshold: u8,
    pub match_method: MatchMethod,
    pub credentials: Option<Credentials>,
    /// Holds the link backup; emptied when a query finishes.
    pub backup_dir: PathBuf,
    pub screenshot_dir: PathBuf,
    /// Append every scraped job to this CSV as well.
    pub jobs_csv: Option<PathBuf>,
    /// Ceiling for the checkpoint's attempt counter.
    pub max_attempts: u32,
    pub retry: RetryPolicy,
    pub delays: Delays,
}

impl ScraperOptions {
    pub fn new(backup_dir: impl Into<PathBuf>, screenshot_dir: impl Into<PathBuf>) -> Self {
        Self {
            max_jobs: 500,
            my_skills: Vec::new(),
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            match_method: MatchMethod::default(),
            credentials: None,
            backup_dir: backup_dir.into(),
            screenshot_dir: screenshot_dir.into(),
            jobs_csv: None,
            max_attempts: 5,
            retry: RetryPolicy::default(),
            delays: Delays::default(),
        }
    }

    pub fn links_backup(&self) -> PathBuf {
        backup_path(&self.backup_dir, LINKS_STUB)
    }
}

/// Progress notifications for the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum ScrapeEvent {
    /// A search result page was read.
    LinksPage { offset: u64, found: usize },
    /// Link scraping is starting; `from` links are already done.
    ScrapeStarted { total: usize, from: usize },
    /// One link was handled.
    LinkDone { index: usize, job_id: Option<u64>, stored: bool },
}

type EventSink = Box<dyn FnMut(&ScrapeEvent) + Send>;

/// Result of one query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOutcome {
    pub query: String,
    pub resumed: bool,
    pub links: usize,
    pub stored: usize,
    pub skipped: usize,
}

/// Drives a browser through LinkedIn job search for one query at a time.
pub struct JobScraper<D: PageDriver, S: JobStore> {
    driver: D,
    store: S,
    checkpoint: CheckpointStore,
    options: ScraperOptions,
    state: Option<CrawlState>,
    crawl_time: DateTime<Local>,
    events: Option<EventSink>,
}

impl<D: PageDriver, S: JobStore> JobScraper<D, S> {
    pub fn new(driver: D, store: S, checkpoint: CheckpointStore, options: ScraperOptions) -> Self {
        Self {
            driver,
            store,
            checkpoint,
            options,
            state: None,
            crawl_time: Local::now(),
            events: None,
        }
    }

    /// Receive [`ScrapeEvent`]s while crawling.
    pub fn on_event(mut self, sink: impl FnMut(&ScrapeEvent) + Send + 'static) -> Self {
        self.events = Some(Box::new(sink));
        self
    }

    pub fn checkpoint(&self) -> &CheckpointStore {
        &self.checkpoint
    }

    pub fn options(&self) -> &ScraperOptions {
        &self.options
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// The in-memory crawl state, if a query is in progress.
    pub fn state(&self) -> Option<&CrawlState> {
        self.state.as_ref()
    }

    pub fn into_parts(self) -> (D, S) {
        (self.driver, self.store)
    }

    fn emit(&mut self, event: ScrapeEvent) {
        if let Some(sink) = self.events.as_mut() {
            sink(&event);
        }
    }

    fn update_state(&mut self, change: impl FnOnce(&mut CrawlState)) -> ScrapeResult<()> {
        let state = self
            .state
            .as_mut()
            .ok_or_else(|| ScrapeError::InvalidState("no query in progress".into()))?;
        change(state);
        self.checkpoint.save(state)
    }

    /// Open `url`, waiting out lost connectivity.
    ///
    /// A page-load timeout is not an error: whatever has rendered is scraped.
    /// A browser that went away is restarted once before giving up.
    async fn open(&mut self, url: &str) -> ScrapeResult<()> {
        debug!("Get URL: {}", url);
        let mut retry = self.options.retry.start();
        let mut restarted = false;
        loop {
            match self.driver.navigate(url).await {
                Ok(()) => return Ok(()),
                Err(DriverError::Timeout) => {
                    warn!("Page load timed out: {}", url);
                    return Ok(());
                }
                Err(DriverError::Disconnected(reason)) => retry.wait("navigate", &reason).await?,
                Err(DriverError::Unavailable(reason)) if !restarted => {
                    warn!("Browser unavailable ({}), restarting it", reason);
                    self.driver.restart().await?;
                    restarted = true;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Sign in to LinkedIn unless the browser session already is.
    pub async fn sign_in(&mut self) -> ScrapeResult<()> {
        info!("Begin sign-in");
        self.open(HOME_URL).await?;
        let title = self.driver.title().await?;

        if !needs_sign_in(&title) {
            info!("Already signed in");
            return Ok(());
        }

        let creds = self
            .options
            .credentials
            .clone()
            .ok_or(ScrapeError::MissingCredentials)?;

        let filled = self.driver.fill(SESSION_KEY_INPUT, &creds.user).await?
            && self.driver.fill(SESSION_PASSWORD_INPUT, &creds.password).await?;
        if !filled || !self.driver.click(SIGN_IN_SUBMIT, 0).await? {
            error!("Error signing in: sign-in form not found (title: {})", title);
            return Err(ScrapeError::Layout("sign-in form not found".into()));
        }
        tokio::time::sleep(self.options.delays.sign_in).await;
        info!("Sign-in form submitted");
        Ok(())
    }

    /// Walk search result pages from offset `start`, backing up every job link.
    ///
    /// Returns the number of links found.
    pub async fn collect_job_links(&mut self, query: &str, start: u64) -> ScrapeResult<usize> {
        debug!(
            "Crawling job links for '{}' from offset {} (max {})",
            query, start, self.options.max_jobs
        );
        self.update_state(|s| s.enter_stage(CrawlStage::CrawlingLinks))?;

        let links_path = self.options.links_backup();
        let mut total = 0;
        let mut offset = start;
        while offset < self.options.max_jobs {
            self.update_state(|s| s.cursor = Some(offset))?;
            self.open(&search_url(query, offset)).await?;
            tokio::time::sleep(self.options.delays.search_page).await;

            if self.driver.exists(NO_MATCHING_JOBS).await? {
                debug!("No more jobs for '{}' at offset {}", query, offset);
                break;
            }

            let hrefs = self.driver.attributes(JOB_CARD_LINKS, "href").await?;
            for href in &hrefs {
                let row = LinkBackup {
                    href: strip_query(href).to_string(),
                    page: offset,
                };
                backup::append(&links_path, &row)?;
            }
            total += hrefs.len();
            self.emit(ScrapeEvent::LinksPage {
                offset,
                found: hrefs.len(),
            });

            offset += RESULTS_PER_PAGE;
        }
        Ok(total)
    }

    /// Read every field of the job page at `link`.
    pub async fn scrape_job_page(&mut self, link: &str, job_id: u64) -> ScrapeResult<ScrapedJob> {
        debug!("Scraping job page at {}", link);
        self.open(link).await?;
        tokio::time::sleep(self.options.delays.job_page).await;

        if self.driver.exists(EXPIRED_ALERT).await? {
            warn!("Job {} is expired", job_id);
        }

        let title = self
            .driver
            .texts(JOB_TITLE)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ScrapeError::Layout("job title not found".into()))?;
        let description = self
            .driver
            .texts(PRIMARY_DESCRIPTION)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ScrapeError::Layout("primary description not found".into()))?;
        let details = split_details(&description)?;

        let apply_link = self.get_apply_link().await?;
        let skills = self.get_skills().await?;
        let (post_time, is_repost) =
            convert_post_time(&details.post_time_raw, Local::now().naive_local());

        debug!("Scraped job {}", job_id);
        Ok(ScrapedJob {
            job_id,
            title,
            company_name: details.company_name,
            location: Some(details.location).filter(|l| !l.is_empty()),
            post_time,
            post_time_raw: Some(details.post_time_raw),
            n_applicants: extract_number(&details.applicants_raw),
            skills,
            is_repost,
            apply_link,
            li_job_link: link.to_string(),
        })
    }

    /// External application URL opened by the Apply button, if any.
    pub async fn get_apply_link(&mut self) -> ScrapeResult<Option<String>> {
        trace!("Getting apply link");
        let labels = self.driver.texts(APPLY_BUTTON).await?;
        let Some(index) = labels.iter().position(|t| t.trim() == APPLY_BUTTON_TEXT) else {
            return Ok(None);
        };
        if !self.driver.click(APPLY_BUTTON, index).await? {
            return Ok(None);
        }
        tokio::time::sleep(self.options.delays.new_tab).await;

        let urls = self.driver.drain_other_tabs().await?;
        Ok(urls
            .into_iter()
            .filter(|u| !u.is_empty() && u != "about:blank")
            .last())
    }

    /// Skill names listed in the job's skills dialog.
    pub async fn get_skills(&mut self) -> ScrapeResult<Vec<String>> {
        trace!("Getting required skills");
        if self.driver.count(SHOW_SKILLS).await? != 1 {
            return Ok(Vec::new());
        }
        self.driver.click(SHOW_SKILLS, 0).await?;
        tokio::time::sleep(self.options.delays.dialog).await;

        if self.driver.count(SKILL_LIST).await? != 1 {
            return Ok(Vec::new());
        }
        let skills: Vec<String> = self
            .driver
            .texts(SKILL_ITEMS)
            .await?
            .iter()
            .map(|t| first_line(t).to_string())
            .filter(|s| !s.is_empty())
            .collect();

        if !self.driver.click(SKILLS_DONE, 0).await? {
            warn!("Skills dialog is open but its close button was not found");
        }
        Ok(skills)
    }

    /// Save a screenshot of the main tab into the screenshot folder.
    pub async fn take_screenshot(&mut self, format: ScreenshotFormat) -> ScrapeResult<PathBuf> {
        let png = self.driver.screenshot().await?;
        fs::create_dir_all(&self.options.screenshot_dir)?;

        let name = format!(
            "{}.{}",
            Local::now().format("%Y-%m-%dT%H:%M:%S"),
            format.extension()
        );
        let path = self.options.screenshot_dir.join(name);
        match format {
            ScreenshotFormat::Png => fs::write(&path, &png)?,
            ScreenshotFormat::Base64 => {
                fs::write(&path, base64::engine::general_purpose::STANDARD.encode(&png))?
            }
        }
        debug!("Screenshot taken: {}", path.display());
        Ok(path)
    }

    /// Scrape one backed-up link unless its job is already stored.
    ///
    /// Page-level failures are logged with a screenshot and the link is
    /// skipped. Lost connectivity and a dead browser propagate.
    pub async fn scrape_link(&mut self, link: &str) -> ScrapeResult<Option<ScrapedJob>> {
        let Some(job_id) = job_id_from_link(link) else {
            warn!("Not a job link, skipping: {}", link);
            return Ok(None);
        };
        self.update_state(|s| s.cursor = Some(job_id))?;

        if self.store.exists(job_id)? {
            trace!("Job {} already exists", job_id);
            return Ok(None);
        }

        match self.scrape_job_page(link, job_id).await {
            Ok(job) => Ok(Some(job)),
            Err(e) if is_unrecoverable(&e) => Err(e),
            Err(e) => {
                error!("Error while scraping {}: {}", link, e);
                if let Err(shot) = self.take_screenshot(ScreenshotFormat::Png).await {
                    warn!("Could not take screenshot: {}", shot);
                }
                Ok(None)
            }
        }
    }

    /// Crawl one query to completion, resuming from the checkpoint if one exists.
    ///
    /// The in-memory state is written back to the checkpoint on every exit path.
    pub async fn run_query(&mut self, query: &str) -> ScrapeResult<QueryOutcome> {
        let result = self.run_sequence(query).await;

        if let Some(state) = self.state.as_ref() {
            if let Err(e) = self.checkpoint.save(state) {
                error!("Could not flush crawl state: {}", e);
            }
        }

        result.map_err(|e| {
            error!("Crawl of '{}' failed: {}", query, e);
            self.escalate(e)
        })
    }

    /// Driver failures on the last allowed attempt become fatal, since the
    /// next resume would be refused anyway.
    fn escalate(&self, e: ScrapeError) -> ScrapeError {
        match self.state.as_ref() {
            Some(state) if e.is_driver() && state.attempt_count >= self.options.max_attempts => {
                ScrapeError::MaxAttempts {
                    query: state.query.clone(),
                    attempts: state.attempt_count,
                    max: self.options.max_attempts,
                }
            }
            _ => e,
        }
    }

    async fn run_sequence(&mut self, query: &str) -> ScrapeResult<QueryOutcome> {
        self.crawl_time = Local::now();

        let saved = self.checkpoint.load()?;
        let Resume {
            state,
            plan,
            resumed,
        } = resume::plan(saved, query, self.options.max_attempts)?;
        self.state = Some(state);
        self.update_state(|_| {})?;

        let mut outcome = QueryOutcome {
            query: query.to_string(),
            resumed,
            ..Default::default()
        };

        let resume_at = match plan {
            ResumePlan::CrawlLinksFrom(start) => {
                self.collect_job_links(query, start).await?;
                None
            }
            ResumePlan::ScrapeLinksFrom(job_id) => {
                debug!("Link crawling already finished for '{}'", query);
                job_id
            }
        };

        let links = backup::read_links(&self.options.links_backup())?;
        outcome.links = links.len();
        self.update_state(|s| s.enter_stage(CrawlStage::ScrapingLinks))?;

        let from = match resume_at {
            Some(job_id) => links
                .iter()
                .position(|l| job_id_from_link(l) == Some(job_id))
                .unwrap_or_else(|| {
                    warn!("Saved job {} is not in the link backup; starting over", job_id);
                    0
                }),
            None => 0,
        };
        self.emit(ScrapeEvent::ScrapeStarted {
            total: links.len(),
            from,
        });

        for (index, link) in links.iter().enumerate().skip(from) {
            let Some(job) = self.scrape_link(link).await? else {
                outcome.skipped += 1;
                self.emit(ScrapeEvent::LinkDone {
                    index,
                    job_id: job_id_from_link(link),
                    stored: false,
                });
                continue;
            };

            if let Some(ref path) = self.options.jobs_csv {
                backup::append(path, &JobBackup::from(&job))?;
            }

            let matches = match_columns(
                &job.skills,
                &self.options.my_skills,
                self.options.match_method,
                self.options.match_threshold,
            );
            let job_id = job.job_id;
            let record = JobRecord {
                job,
                matches,
                original_query: query.to_string(),
                crawl_time: self.crawl_time,
            };
            let stored = self.store.write_one(&record)?;
            if stored {
                outcome.stored += 1;
            } else {
                outcome.skipped += 1;
            }
            self.emit(ScrapeEvent::LinkDone {
                index,
                job_id: Some(job_id),
                stored,
            });
        }

        info!(
            "Finished '{}': {} links, {} stored, {} skipped",
            query, outcome.links, outcome.stored, outcome.skipped
        );
        self.checkpoint.clear_with_backups(&self.options.backup_dir)?;
        self.state = None;
        Ok(outcome)
    }
}

/// Errors that abort the query instead of skipping one link.
fn is_unrecoverable(e: &ScrapeError) -> bool {
    match e {
        ScrapeError::RetriesExhausted { .. } => true,
        ScrapeError::Driver(d) => matches!(d, DriverError::Disconnected(_) | DriverError::Unavailable(_)),
        ScrapeError::Storage(_) | ScrapeError::Io(_) | ScrapeError::Backup(_) => true,
        _ => false,
    }
}

/// File name used for the jobs CSV export inside an output folder.
pub fn jobs_csv_path(output_dir: &std::path::Path) -> PathBuf {
    backup_path(output_dir, JOBS_STUB)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_level_errors_skip_the_link() {
        assert!(!is_unrecoverable(&ScrapeError::Layout("no title".into())));
        assert!(!is_unrecoverable(&DriverError::NoSuchElement("//h1".into()).into()));
        assert!(!is_unrecoverable(&DriverError::Protocol("bad frame".into()).into()));

        assert!(is_unrecoverable(&DriverError::Disconnected("net::ERR_INTERNET_DISCONNECTED".into()).into()));
        assert!(is_unrecoverable(&DriverError::Unavailable("browser is closed".into()).into()));
        assert!(is_unrecoverable(&ScrapeError::RetriesExhausted {
            operation: "navigate".into(),
            attempts: 3,
            reason: "offline".into(),
        }));
    }
}
