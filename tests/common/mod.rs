//! Scripted in-memory browser and crawl fixtures shared by integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use jobcrawl::browser::{DriverError, DriverResult, PageDriver};
use jobcrawl::crawl::{CheckpointStore, RetryPolicy};
use jobcrawl::repository::SqliteJobStore;
use jobcrawl::scraper::linkedin::*;
use jobcrawl::scraper::parse::search_url;
use jobcrawl::scraper::{Delays, JobScraper, ScraperOptions};

/// One scripted document: texts and `href`s per XPath.
#[derive(Debug, Clone, Default)]
pub struct FakePage {
    pub title: String,
    pub texts: HashMap<String, Vec<String>>,
    pub hrefs: HashMap<String, Vec<String>>,
    /// Tab opened by clicking the Apply button.
    pub apply_tab: Option<String>,
}

impl FakePage {
    pub fn with_texts(mut self, xpath: &str, texts: &[&str]) -> Self {
        self.texts
            .insert(xpath.to_string(), texts.iter().map(|t| t.to_string()).collect());
        self
    }

    pub fn with_hrefs(mut self, xpath: &str, hrefs: &[String]) -> Self {
        self.hrefs.insert(xpath.to_string(), hrefs.to_vec());
        self
    }

    fn count(&self, xpath: &str) -> usize {
        self.texts
            .get(xpath)
            .map(Vec::len)
            .max(self.hrefs.get(xpath).map(Vec::len))
            .unwrap_or(0)
    }
}

/// A [`PageDriver`] serving [`FakePage`]s by URL.
#[derive(Debug, Default)]
pub struct FakeDriver {
    pub pages: HashMap<String, FakePage>,
    /// URLs whose navigation fails with lost connectivity.
    pub offline: HashSet<String>,
    /// URLs whose navigation fails with the given error. A timed-out page
    /// still becomes the current one; `Unavailable` entries clear on restart.
    pub failing: HashMap<String, DriverError>,
    pub visited: Vec<String>,
    pub filled: Vec<(String, String)>,
    pub screenshots: usize,
    pub restarts: usize,
    pub closed: bool,
    current: Option<String>,
    new_tabs: Vec<String>,
}

impl FakeDriver {
    pub fn signed_in() -> Self {
        let mut driver = Self::default();
        driver.pages.insert(
            HOME_URL.to_string(),
            FakePage {
                title: "Feed | LinkedIn".into(),
                ..Default::default()
            },
        );
        driver
    }

    /// Search result pages for `query`, 25 results apart, followed by an empty page.
    pub fn with_search(mut self, query: &str, pages: &[&[u64]]) -> Self {
        let mut offset = 0;
        for ids in pages {
            let hrefs: Vec<String> = ids
                .iter()
                .map(|id| format!("{}?refId=abc&trk=search", job_link(*id)))
                .collect();
            self.pages.insert(
                search_url(query, offset),
                FakePage::default().with_hrefs(JOB_CARD_LINKS, &hrefs),
            );
            offset += RESULTS_PER_PAGE;
        }
        self.pages.insert(
            search_url(query, offset),
            FakePage::default().with_texts(NO_MATCHING_JOBS, &["No matching jobs found."]),
        );
        self
    }

    pub fn with_job(mut self, id: u64, title: &str, description: &str, skills: &[&str]) -> Self {
        let mut page = FakePage::default()
            .with_texts(JOB_TITLE, &[title])
            .with_texts(PRIMARY_DESCRIPTION, &[description])
            .with_texts(APPLY_BUTTON, &["Save", "Apply"]);
        page.apply_tab = Some(format!("https://careers.example.com/jobs/{}", id));
        if !skills.is_empty() {
            let items: Vec<String> = skills
                .iter()
                .map(|s| format!("{}\nAdd this skill to your profile", s))
                .collect();
            let items: Vec<&str> = items.iter().map(String::as_str).collect();
            page = page
                .with_texts(SHOW_SKILLS, &["Show all skills"])
                .with_texts(SKILL_LIST, &[""])
                .with_texts(SKILL_ITEMS, &items)
                .with_texts(SKILLS_DONE, &["Done"]);
        }
        self.pages.insert(job_link(id), page);
        self
    }

    /// A plain job with two skills.
    pub fn with_simple_job(self, id: u64) -> Self {
        self.with_job(
            id,
            &format!("Engineer {}", id),
            &format!("Company {} · Berlin, Germany · 2 days ago · {} applicants", id, id * 10),
            &["Python", "Docker"],
        )
    }

    pub fn visited_job(&self, id: u64) -> bool {
        self.visited.contains(&job_link(id))
    }

    pub fn visited_search(&self, query: &str, offset: u64) -> bool {
        self.visited.contains(&search_url(query, offset))
    }

    /// How many times `url` was navigated to.
    pub fn visits(&self, url: &str) -> usize {
        self.visited.iter().filter(|u| *u == url).count()
    }

    fn page(&self) -> Option<&FakePage> {
        self.current.as_ref().and_then(|url| self.pages.get(url))
    }
}

pub fn job_link(id: u64) -> String {
    format!("https://www.linkedin.com/jobs/view/{}/", id)
}

#[async_trait]
impl PageDriver for FakeDriver {
    async fn navigate(&mut self, url: &str) -> DriverResult<()> {
        self.visited.push(url.to_string());
        if self.offline.contains(url) {
            return Err(DriverError::classify(format!(
                "net::ERR_INTERNET_DISCONNECTED at {}",
                url
            )));
        }
        if let Some(err) = self.failing.get(url).cloned() {
            if err == DriverError::Timeout {
                self.current = Some(url.to_string());
            }
            return Err(err);
        }
        self.current = Some(url.to_string());
        Ok(())
    }

    async fn title(&mut self) -> DriverResult<String> {
        Ok(self.page().map(|p| p.title.clone()).unwrap_or_default())
    }

    async fn count(&mut self, xpath: &str) -> DriverResult<usize> {
        Ok(self.page().map(|p| p.count(xpath)).unwrap_or(0))
    }

    async fn texts(&mut self, xpath: &str) -> DriverResult<Vec<String>> {
        Ok(self
            .page()
            .and_then(|p| p.texts.get(xpath).cloned())
            .unwrap_or_default())
    }

    async fn attributes(&mut self, xpath: &str, name: &str) -> DriverResult<Vec<String>> {
        if name != "href" {
            return Ok(Vec::new());
        }
        Ok(self
            .page()
            .and_then(|p| p.hrefs.get(xpath).cloned())
            .unwrap_or_default())
    }

    async fn click(&mut self, xpath: &str, index: usize) -> DriverResult<bool> {
        let Some(page) = self.page() else {
            return Ok(false);
        };
        if index >= page.count(xpath) {
            return Ok(false);
        }
        if xpath == APPLY_BUTTON {
            if let Some(tab) = page.apply_tab.clone() {
                self.new_tabs.push(tab);
            }
        }
        Ok(true)
    }

    async fn fill(&mut self, xpath: &str, value: &str) -> DriverResult<bool> {
        let found = self.page().map(|p| p.count(xpath) > 0).unwrap_or(false);
        if found {
            self.filled.push((xpath.to_string(), value.to_string()));
        }
        Ok(found)
    }

    async fn current_url(&mut self) -> DriverResult<String> {
        Ok(self.current.clone().unwrap_or_default())
    }

    async fn drain_other_tabs(&mut self) -> DriverResult<Vec<String>> {
        Ok(std::mem::take(&mut self.new_tabs))
    }

    async fn screenshot(&mut self) -> DriverResult<Vec<u8>> {
        self.screenshots += 1;
        Ok(b"\x89PNG fake".to_vec())
    }

    async fn restart(&mut self) -> DriverResult<()> {
        self.restarts += 1;
        self.current = None;
        self.failing
            .retain(|_, err| !matches!(err, DriverError::Unavailable(_)));
        Ok(())
    }

    async fn close(&mut self) -> DriverResult<()> {
        self.closed = true;
        Ok(())
    }
}

/// Temporary folders, store and options for one crawl.
pub struct Fixture {
    pub dir: TempDir,
    pub options: ScraperOptions,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let mut options = ScraperOptions::new(dir.path().join("backup"), dir.path().join("screenshots"));
        options.delays = Delays::none();
        options.retry = RetryPolicy {
            timeout: Duration::ZERO,
            multiplier: 1.0,
            max_attempts: 2,
        };
        options.my_skills = vec!["python".into(), "kubernetes".into()];
        Self { dir, options }
    }

    pub fn db_path(&self) -> PathBuf {
        self.dir.path().join("output").join("jobs.db")
    }

    pub fn checkpoint(&self) -> CheckpointStore {
        CheckpointStore::new(self.options.backup_dir.join("state.json"))
    }

    pub fn store(&self) -> SqliteJobStore {
        SqliteJobStore::new(&self.db_path()).unwrap()
    }

    pub fn scraper(&self, driver: FakeDriver) -> JobScraper<FakeDriver, SqliteJobStore> {
        JobScraper::new(driver, self.store(), self.checkpoint(), self.options.clone())
    }
}
