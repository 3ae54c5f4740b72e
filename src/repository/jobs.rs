//! SQLite job store.
//!
//! Jobs live in `details`; company names, search queries and hour-bucketed
//! crawl times are normalized into their own tables and referenced by id.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::types::ToSql;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use tracing::{debug, warn};

use super::{to_option, JobStore, RepoError, Result};
use crate::models::{JobRecord, JobUpdate, StoredJob};

const POST_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const CRAWL_HOUR_FORMAT: &str = "%Y-%m-%d %H:00:00";

/// Dimension ids kept in memory before the cache is dropped and refilled.
const ID_CACHE_LIMIT: usize = 500;

/// Dimension tables resolved by lookup-or-insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Dimension {
    Company,
    OriginalQuery,
    CrawlTime,
}

impl Dimension {
    fn select_sql(&self) -> &'static str {
        match self {
            Dimension::Company => "SELECT id FROM company WHERE name = ?1",
            Dimension::OriginalQuery => "SELECT id FROM original_query WHERE query = ?1",
            Dimension::CrawlTime => "SELECT id FROM crawl_time WHERE time = ?1",
        }
    }

    fn insert_sql(&self) -> &'static str {
        match self {
            Dimension::Company => "INSERT INTO company (name) VALUES (?1)",
            Dimension::OriginalQuery => "INSERT INTO original_query (query) VALUES (?1)",
            Dimension::CrawlTime => "INSERT INTO crawl_time (time) VALUES (?1)",
        }
    }
}

/// SQLite-backed [`JobStore`].
pub struct SqliteJobStore {
    db_path: PathBuf,
    ids: HashMap<(Dimension, String), i64>,
    id_cache_limit: usize,
}

impl SqliteJobStore {
    /// Open (creating if needed) the database at `db_path`.
    pub fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let store = Self {
            db_path: db_path.to_path_buf(),
            ids: HashMap::new(),
            id_cache_limit: ID_CACHE_LIMIT,
        };
        store.init_schema()?;
        Ok(store)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> Result<Connection> {
        super::connect(&self.db_path)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS crawl_time (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                time TEXT NOT NULL UNIQUE
            );
            CREATE TABLE IF NOT EXISTS original_query (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                query TEXT NOT NULL UNIQUE
            );
            CREATE TABLE IF NOT EXISTS company (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            );
            CREATE TABLE IF NOT EXISTS details (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                job_id INTEGER NOT NULL UNIQUE,
                title TEXT NOT NULL,
                company_id INTEGER REFERENCES company(id),
                post_time TEXT,
                n_applicants INTEGER,
                location TEXT,
                skills TEXT,
                is_repost INTEGER NOT NULL DEFAULT 0,
                apply_link TEXT,
                li_job_link TEXT,
                post_time_raw TEXT,
                crawl_time_id INTEGER REFERENCES crawl_time(id),
                original_query_id INTEGER REFERENCES original_query(id),
                match_score INTEGER,
                top_matches TEXT,
                match_threshold INTEGER
            );
            CREATE INDEX IF NOT EXISTS idx_details_company ON details(company_id);
            CREATE INDEX IF NOT EXISTS idx_details_query ON details(original_query_id);
        "#,
        )?;
        Ok(())
    }

    /// Id of the dimension row holding `value`, inserting it if missing.
    fn resolve_id(&mut self, conn: &Connection, dim: Dimension, value: &str) -> Result<i64> {
        let key = (dim, value.to_string());
        if let Some(id) = self.ids.get(&key) {
            return Ok(*id);
        }

        let id = match to_option(conn.query_row(dim.select_sql(), params![value], |row| row.get(0)))? {
            Some(id) => id,
            None => {
                conn.execute(dim.insert_sql(), params![value])?;
                let id = conn.last_insert_rowid();
                debug!("Inserted {:?} row {} = {}", dim, id, value);
                id
            }
        };
        if self.ids.len() >= self.id_cache_limit {
            self.ids.clear();
        }
        self.ids.insert(key, id);
        Ok(id)
    }

    /// Number of stored jobs.
    pub fn count(&self) -> Result<u64> {
        let conn = self.connect()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM details", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    /// Most recently inserted jobs, newest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<StoredJob>> {
        let conn = self.connect()?;
        let sql = format!("{} ORDER BY d.id DESC LIMIT ?1", SELECT_JOINED);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![limit as i64], RawJob::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter().map(RawJob::into_stored).collect()
    }
}

const SELECT_JOINED: &str = r#"
    SELECT d.job_id, d.title, c.name AS company_name, d.post_time, d.n_applicants,
           d.location, d.skills, d.is_repost, d.apply_link, d.li_job_link,
           d.post_time_raw, t.time AS crawl_time, q.query AS original_query,
           d.match_score, d.top_matches, d.match_threshold
    FROM details d
    LEFT JOIN company c ON c.id = d.company_id
    LEFT JOIN crawl_time t ON t.id = d.crawl_time_id
    LEFT JOIN original_query q ON q.id = d.original_query_id
"#;

/// Row as stored, before decoding the packed columns.
struct RawJob {
    job_id: i64,
    title: String,
    company_name: Option<String>,
    post_time: Option<String>,
    n_applicants: Option<i64>,
    location: Option<String>,
    skills: Option<String>,
    is_repost: bool,
    apply_link: Option<String>,
    li_job_link: Option<String>,
    post_time_raw: Option<String>,
    crawl_time: Option<String>,
    original_query: Option<String>,
    match_score: Option<i64>,
    top_matches: Option<String>,
    match_threshold: Option<i64>,
}

impl RawJob {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            job_id: row.get("job_id")?,
            title: row.get("title")?,
            company_name: row.get("company_name")?,
            post_time: row.get("post_time")?,
            n_applicants: row.get("n_applicants")?,
            location: row.get("location")?,
            skills: row.get("skills")?,
            is_repost: row.get("is_repost")?,
            apply_link: row.get("apply_link")?,
            li_job_link: row.get("li_job_link")?,
            post_time_raw: row.get("post_time_raw")?,
            crawl_time: row.get("crawl_time")?,
            original_query: row.get("original_query")?,
            match_score: row.get("match_score")?,
            top_matches: row.get("top_matches")?,
            match_threshold: row.get("match_threshold")?,
        })
    }

    fn into_stored(self) -> Result<StoredJob> {
        let top_matches = match self.top_matches {
            Some(json) => Some(serde_json::from_str(&json).map_err(|e| RepoError::Decode {
                column: "top_matches",
                message: e.to_string(),
            })?),
            None => None,
        };
        Ok(StoredJob {
            job_id: self.job_id as u64,
            title: self.title,
            company_name: self.company_name,
            post_time: self.post_time,
            n_applicants: self.n_applicants.map(|n| n as u32),
            location: self.location,
            skills: split_skills(self.skills.as_deref()),
            is_repost: self.is_repost,
            apply_link: self.apply_link,
            li_job_link: self.li_job_link,
            post_time_raw: self.post_time_raw,
            crawl_time: self.crawl_time,
            original_query: self.original_query,
            match_score: self.match_score.map(|n| n as u8),
            top_matches,
            match_threshold: self.match_threshold.map(|n| n as u8),
        })
    }
}

fn join_skills(skills: &[String]) -> Option<String> {
    if skills.is_empty() {
        None
    } else {
        Some(skills.join(","))
    }
}

fn split_skills(packed: Option<&str>) -> Vec<String> {
    packed
        .map(|s| {
            s.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

fn encode_matches(matches: &Option<Vec<String>>) -> Option<String> {
    matches
        .as_ref()
        .map(|m| serde_json::Value::from(m.clone()).to_string())
}

impl JobStore for SqliteJobStore {
    fn write_one(&mut self, record: &JobRecord) -> Result<bool> {
        let conn = self.connect()?;
        let job = &record.job;

        let exists = conn
            .query_row(
                "SELECT 1 FROM details WHERE job_id = ?1",
                params![job.job_id as i64],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if exists {
            warn!("Job {} is already stored, not inserting", job.job_id);
            return Ok(false);
        }

        let company_id = if job.company_name.trim().is_empty() {
            None
        } else {
            Some(self.resolve_id(&conn, Dimension::Company, job.company_name.trim())?)
        };
        let query_id = self.resolve_id(&conn, Dimension::OriginalQuery, &record.original_query)?;
        let hour = record.crawl_time.format(CRAWL_HOUR_FORMAT).to_string();
        let crawl_time_id = self.resolve_id(&conn, Dimension::CrawlTime, &hour)?;

        conn.execute(
            r#"
            INSERT INTO details (
                job_id, title, company_id, post_time, n_applicants, location, skills,
                is_repost, apply_link, li_job_link, post_time_raw, crawl_time_id,
                original_query_id, match_score, top_matches, match_threshold
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            "#,
            params![
                job.job_id as i64,
                job.title,
                company_id,
                job.post_time.map(|t| t.format(POST_TIME_FORMAT).to_string()),
                job.n_applicants,
                job.location,
                join_skills(&job.skills),
                job.is_repost,
                job.apply_link,
                job.li_job_link,
                job.post_time_raw,
                crawl_time_id,
                query_id,
                record.matches.match_score,
                encode_matches(&record.matches.top_matches),
                record.matches.match_threshold,
            ],
        )?;
        debug!("Stored job {}", job.job_id);
        Ok(true)
    }

    fn get_one(&self, job_id: u64) -> Result<Option<StoredJob>> {
        let conn = self.connect()?;
        let sql = format!("{} WHERE d.job_id = ?1", SELECT_JOINED);
        to_option(conn.query_row(&sql, params![job_id as i64], RawJob::from_row))?
            .map(RawJob::into_stored)
            .transpose()
    }

    fn update_one(&mut self, job_id: u64, update: &JobUpdate) -> Result<bool> {
        if update.is_empty() {
            return self.exists(job_id);
        }

        let mut columns: Vec<&str> = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();
        let mut set = |column: &'static str, value: Box<dyn ToSql>| {
            columns.push(column);
            values.push(value);
        };

        if let Some(ref v) = update.title {
            set("title", Box::new(v.clone()));
        }
        if let Some(ref v) = update.location {
            set("location", Box::new(v.clone()));
        }
        if let Some(v) = update.n_applicants {
            set("n_applicants", Box::new(v));
        }
        if let Some(ref v) = update.skills {
            set("skills", Box::new(join_skills(v)));
        }
        if let Some(v) = update.is_repost {
            set("is_repost", Box::new(v));
        }
        if let Some(ref v) = update.apply_link {
            set("apply_link", Box::new(v.clone()));
        }
        if let Some(v) = update.match_score {
            set("match_score", Box::new(v));
        }
        if update.top_matches.is_some() {
            set("top_matches", Box::new(encode_matches(&update.top_matches)));
        }
        if let Some(v) = update.match_threshold {
            set("match_threshold", Box::new(v));
        }

        let assignments: Vec<String> = columns
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{} = ?{}", c, i + 1))
            .collect();
        let sql = format!(
            "UPDATE details SET {} WHERE job_id = ?{}",
            assignments.join(", "),
            columns.len() + 1
        );
        values.push(Box::new(job_id as i64));

        let conn = self.connect()?;
        let changed = conn.execute(&sql, params_from_iter(values.iter()))?;
        Ok(changed > 0)
    }

    fn exists(&self, job_id: u64) -> Result<bool> {
        let conn = self.connect()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM details WHERE job_id = ?1",
                params![job_id as i64],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MatchColumns, ScrapedJob};
    use chrono::{Local, NaiveDate, TimeZone};
    use tempfile::TempDir;

    fn job(job_id: u64, company: &str) -> ScrapedJob {
        ScrapedJob {
            job_id,
            title: "Backend Engineer".into(),
            company_name: company.into(),
            location: Some("Berlin, Germany".into()),
            post_time: NaiveDate::from_ymd_opt(2024, 3, 1).and_then(|d| d.and_hms_opt(9, 30, 0)),
            post_time_raw: Some("2 days ago".into()),
            n_applicants: Some(37),
            skills: vec!["Rust".into(), "PostgreSQL".into()],
            is_repost: false,
            apply_link: None,
            li_job_link: format!("https://www.linkedin.com/jobs/view/{}/", job_id),
        }
    }

    fn record(job: ScrapedJob, query: &str, minute: u32) -> JobRecord {
        JobRecord {
            job,
            matches: MatchColumns {
                match_score: Some(88),
                top_matches: Some(vec!["Rust".into()]),
                match_threshold: Some(70),
            },
            original_query: query.into(),
            crawl_time: Local.with_ymd_and_hms(2024, 3, 3, 14, minute, 5).unwrap(),
        }
    }

    fn store() -> (TempDir, SqliteJobStore) {
        let dir = TempDir::new().unwrap();
        let store = SqliteJobStore::new(&dir.path().join("out").join("jobs.db")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_write_and_get() {
        let (_dir, mut store) = store();
        assert!(store.write_one(&record(job(101, "Acme"), "rust developer", 1)).unwrap());

        let stored = store.get_one(101).unwrap().unwrap();
        assert_eq!(stored.title, "Backend Engineer");
        assert_eq!(stored.company_name.as_deref(), Some("Acme"));
        assert_eq!(stored.post_time.as_deref(), Some("2024-03-01 09:30:00"));
        assert_eq!(stored.crawl_time.as_deref(), Some("2024-03-03 14:00:00"));
        assert_eq!(stored.original_query.as_deref(), Some("rust developer"));
        assert_eq!(stored.skills, vec!["Rust", "PostgreSQL"]);
        assert_eq!(stored.top_matches, Some(vec!["Rust".to_string()]));
        assert_eq!(stored.match_score, Some(88));
        assert!(store.exists(101).unwrap());
        assert!(!store.exists(102).unwrap());
        assert!(store.get_one(102).unwrap().is_none());
    }

    #[test]
    fn test_dimensions_are_shared() {
        let (_dir, mut store) = store();
        store.write_one(&record(job(1, "Acme"), "rust", 1)).unwrap();
        store.write_one(&record(job(2, "Acme"), "rust", 59)).unwrap();
        store.write_one(&record(job(3, "Globex"), "rust", 30)).unwrap();

        let conn = store.connect().unwrap();
        let companies: i64 = conn.query_row("SELECT COUNT(*) FROM company", [], |r| r.get(0)).unwrap();
        let hours: i64 = conn.query_row("SELECT COUNT(*) FROM crawl_time", [], |r| r.get(0)).unwrap();
        let queries: i64 = conn
            .query_row("SELECT COUNT(*) FROM original_query", [], |r| r.get(0))
            .unwrap();
        assert_eq!((companies, hours, queries), (2, 1, 1));
        assert_eq!(store.count().unwrap(), 3);
    }

    #[test]
    fn test_dimension_ids_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("jobs.db");
        SqliteJobStore::new(&path)
            .unwrap()
            .write_one(&record(job(1, "Acme"), "rust", 0))
            .unwrap();

        let mut reopened = SqliteJobStore::new(&path).unwrap();
        reopened.write_one(&record(job(2, "Acme"), "rust", 0)).unwrap();
        let conn = reopened.connect().unwrap();
        let companies: i64 = conn.query_row("SELECT COUNT(*) FROM company", [], |r| r.get(0)).unwrap();
        assert_eq!(companies, 1);
    }

    #[test]
    fn test_id_cache_is_bounded() {
        let (_dir, mut store) = store();
        store.id_cache_limit = 4;
        for id in 1..=10 {
            let company = format!("Company {}", id);
            store.write_one(&record(job(id, &company), "rust", 0)).unwrap();
            assert!(store.ids.len() <= 4);
        }

        // Evicted ids are looked up again rather than duplicated.
        store.write_one(&record(job(11, "Company 1"), "rust", 0)).unwrap();
        let conn = store.connect().unwrap();
        let companies: i64 = conn.query_row("SELECT COUNT(*) FROM company", [], |r| r.get(0)).unwrap();
        assert_eq!(companies, 10);
    }

    #[test]
    fn test_duplicate_job_is_not_inserted() {
        let (_dir, mut store) = store();
        assert!(store.write_one(&record(job(5, "Acme"), "rust", 0)).unwrap());
        assert!(!store.write_one(&record(job(5, "Other"), "go", 0)).unwrap());
        assert_eq!(store.get_one(5).unwrap().unwrap().company_name.as_deref(), Some("Acme"));
    }

    #[test]
    fn test_empty_company_and_skills() {
        let (_dir, mut store) = store();
        let mut j = job(9, "  ");
        j.skills.clear();
        store.write_one(&record(j, "rust", 0)).unwrap();
        let stored = store.get_one(9).unwrap().unwrap();
        assert_eq!(stored.company_name, None);
        assert!(stored.skills.is_empty());
    }

    #[test]
    fn test_update_one() {
        let (_dir, mut store) = store();
        store.write_one(&record(job(7, "Acme"), "rust", 0)).unwrap();

        let update = JobUpdate {
            title: Some("Senior Backend Engineer".into()),
            apply_link: Some("https://careers.acme.test/7".into()),
            top_matches: Some(vec!["Rust".into(), "PostgreSQL".into()]),
            ..Default::default()
        };
        assert!(store.update_one(7, &update).unwrap());

        let stored = store.get_one(7).unwrap().unwrap();
        assert_eq!(stored.title, "Senior Backend Engineer");
        assert_eq!(stored.apply_link.as_deref(), Some("https://careers.acme.test/7"));
        assert_eq!(stored.top_matches.unwrap().len(), 2);
        assert_eq!(stored.location.as_deref(), Some("Berlin, Germany"));

        assert!(!store.update_one(8, &update).unwrap());
        assert!(store.update_one(7, &JobUpdate::default()).unwrap());
    }

    #[test]
    fn test_update_value_is_bound_not_interpolated() {
        let (_dir, mut store) = store();
        store.write_one(&record(job(11, "Acme"), "rust", 0)).unwrap();
        let update = JobUpdate {
            location: Some("x'; DROP TABLE details; --".into()),
            ..Default::default()
        };
        assert!(store.update_one(11, &update).unwrap());
        assert_eq!(
            store.get_one(11).unwrap().unwrap().location.as_deref(),
            Some("x'; DROP TABLE details; --")
        );
    }

    #[test]
    fn test_recent() {
        let (_dir, mut store) = store();
        for id in 1..=3 {
            store.write_one(&record(job(id, "Acme"), "rust", 0)).unwrap();
        }
        let ids: Vec<u64> = store.recent(2).unwrap().into_iter().map(|j| j.job_id).collect();
        assert_eq!(ids, vec![3, 2]);
    }
}
