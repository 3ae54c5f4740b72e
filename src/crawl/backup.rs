//! Append-only CSV backups.
//!
//! Job links found while crawling search pages are appended to
//! `crawl_links.csv`; the scraping stage reads them back from there, so the
//! file doubles as the work list for a resumed crawl.

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::models::ScrapedJob;

/// File stem for job link backups.
pub const LINKS_STUB: &str = "crawl_links";
/// File stem for scraped job backups.
pub const JOBS_STUB: &str = "crawl_data";

/// Backup file path for a stem.
pub fn backup_path(dir: &Path, stub: &str) -> PathBuf {
    dir.join(format!("{}.csv", stub))
}

/// One job link found on a search result page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkBackup {
    pub href: String,
    #[serde(default)]
    pub page: u64,
}

/// Flat CSV row for a scraped job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobBackup {
    pub job_id: u64,
    pub title: String,
    pub company_name: String,
    pub location: Option<String>,
    pub post_time: Option<String>,
    pub post_time_raw: Option<String>,
    pub n_applicants: Option<u32>,
    /// Semicolon-separated.
    pub skills: String,
    pub is_repost: bool,
    pub apply_link: Option<String>,
    pub li_job_link: String,
}

impl From<&ScrapedJob> for JobBackup {
    fn from(job: &ScrapedJob) -> Self {
        Self {
            job_id: job.job_id,
            title: job.title.clone(),
            company_name: job.company_name.clone(),
            location: job.location.clone(),
            post_time: job
                .post_time
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
            post_time_raw: job.post_time_raw.clone(),
            n_applicants: job.n_applicants,
            skills: job.skills.join(";"),
            is_repost: job.is_repost,
            apply_link: job.apply_link.clone(),
            li_job_link: job.li_job_link.clone(),
        }
    }
}

/// Append one row, writing the header only when the file is new.
pub fn append<T: Serialize>(path: &Path, row: &T) -> Result<(), csv::Error> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let is_new = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(is_new)
        .from_writer(file);
    writer.serialize(row)?;
    writer.flush()?;
    Ok(())
}

/// Read backed-up job links in file order, keeping the first of any duplicates.
pub fn read_links(path: &Path) -> Result<Vec<String>, csv::Error> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;
    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for row in reader.deserialize::<LinkBackup>() {
        let row = row?;
        if seen.insert(row.href.clone()) {
            links.push(row.href);
        }
    }
    Ok(links)
}

/// Read every scraped job row back.
pub fn read_jobs(path: &Path) -> Result<Vec<JobBackup>, csv::Error> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;
    reader.deserialize().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn link(href: &str, page: u64) -> LinkBackup {
        LinkBackup {
            href: href.to_string(),
            page,
        }
    }

    #[test]
    fn test_append_writes_header_once() {
        let dir = TempDir::new().unwrap();
        let path = backup_path(dir.path(), LINKS_STUB);

        append(&path, &link("https://www.linkedin.com/jobs/view/1/", 0)).unwrap();
        append(&path, &link("https://www.linkedin.com/jobs/view/2/", 25)).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents,
            "href,page\nhttps://www.linkedin.com/jobs/view/1/,0\nhttps://www.linkedin.com/jobs/view/2/,25\n"
        );
    }

    #[test]
    fn test_read_links_dedups_in_order() {
        let dir = TempDir::new().unwrap();
        let path = backup_path(dir.path(), LINKS_STUB);
        for (href, page) in [("a", 0), ("b", 0), ("a", 25), ("c", 25)] {
            append(&path, &link(href, page)).unwrap();
        }
        assert_eq!(read_links(&path).unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_read_links_href_only_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("old.csv");
        fs::write(&path, "href\nx\ny\n").unwrap();
        assert_eq!(read_links(&path).unwrap(), vec!["x", "y"]);
    }

    #[test]
    fn test_read_links_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(read_links(&dir.path().join("none.csv")).unwrap().is_empty());
    }

    #[test]
    fn test_job_backup_row() {
        let dir = TempDir::new().unwrap();
        let path = backup_path(dir.path(), JOBS_STUB);
        let job = ScrapedJob {
            job_id: 7,
            title: "Data Engineer".into(),
            company_name: "Acme".into(),
            location: None,
            post_time: None,
            post_time_raw: Some("2 days ago".into()),
            n_applicants: Some(12),
            skills: vec!["Python".into(), "SQL".into()],
            is_repost: false,
            apply_link: None,
            li_job_link: "https://www.linkedin.com/jobs/view/7/".into(),
        };
        append(&path, &JobBackup::from(&job)).unwrap();

        let rows = read_jobs(&path).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].skills, "Python;SQL");
        assert_eq!(rows[0].location, None);
        assert_eq!(rows[0].n_applicants, Some(12));
    }
}
