//! Configuration management for jobcrawl using the prefer crate.
//!
//! Precedence, lowest to highest: built-in defaults, the config file
//! (`jobcrawl.{toml,yaml,json}` discovered by prefer, or `--config`),
//! environment variables (a `.env` file is loaded first), then CLI flags.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::browser::BrowserEngineConfig;
use crate::crawl::{CheckpointStore, RetryPolicy};
use crate::matcher::{MatchMethod, DEFAULT_MATCH_THRESHOLD};
use crate::scraper::{jobs_csv_path, Credentials, ScraperOptions};

/// Default maximum search result offset per query.
pub const DEFAULT_MAX_JOBS: u64 = 500;

/// Default ceiling for the checkpoint's attempt counter.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

const DEFAULT_DATABASE_FILENAME: &str = "jobs.db";
const DEFAULT_STATE_FILENAME: &str = "state.json";

/// Resolved application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    /// Holds the database and the jobs CSV export.
    pub output_dir: PathBuf,
    pub database_filename: String,
    /// Link backups and, by default, the checkpoint file.
    pub backup_dir: PathBuf,
    pub state_file: PathBuf,
    pub log_dir: PathBuf,
    pub screenshot_dir: PathBuf,
    pub queries: Vec<String>,
    pub my_skills: Vec<String>,
    pub max_jobs: u64,
    pub match_threshold: u8,
    pub match_method: MatchMethod,
    pub max_attempts: u32,
    pub retry: RetryPolicy,
    pub backup_scraped_jobs: bool,
    pub credentials: Option<Credentials>,
    pub browser: BrowserEngineConfig,
}

impl Default for Settings {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("jobcrawl");
        Self::with_data_dir(data_dir)
    }
}

impl Settings {
    /// Settings with every folder placed under `data_dir`.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        let backup_dir = data_dir.join("backup");
        Self {
            output_dir: data_dir.join("output"),
            database_filename: DEFAULT_DATABASE_FILENAME.to_string(),
            state_file: backup_dir.join(DEFAULT_STATE_FILENAME),
            backup_dir,
            log_dir: data_dir.join("log"),
            screenshot_dir: data_dir.join("screenshots"),
            data_dir,
            queries: Vec::new(),
            my_skills: Vec::new(),
            max_jobs: DEFAULT_MAX_JOBS,
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            match_method: MatchMethod::default(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry: RetryPolicy::default(),
            backup_scraped_jobs: false,
            credentials: None,
            browser: BrowserEngineConfig::default(),
        }
    }

    /// Full path to the SQLite database.
    pub fn database_path(&self) -> PathBuf {
        self.output_dir.join(&self.database_filename)
    }

    pub fn checkpoint(&self) -> CheckpointStore {
        CheckpointStore::new(&self.state_file)
    }

    /// Options for [`crate::scraper::JobScraper`].
    pub fn scraper_options(&self) -> ScraperOptions {
        let mut options = ScraperOptions::new(&self.backup_dir, &self.screenshot_dir);
        options.max_jobs = self.max_jobs;
        options.my_skills = self.my_skills.clone();
        options.match_threshold = self.match_threshold;
        options.match_method = self.match_method;
        options.credentials = self.credentials.clone();
        options.max_attempts = self.max_attempts;
        options.retry = self.retry.clone();
        options.jobs_csv = self
            .backup_scraped_jobs
            .then(|| jobs_csv_path(&self.output_dir));
        options
    }

    /// Ensure all directories exist.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        for dir in [
            &self.output_dir,
            &self.backup_dir,
            &self.log_dir,
            &self.screenshot_dir,
        ] {
            fs::create_dir_all(dir).map_err(|e| {
                std::io::Error::new(
                    e.kind(),
                    format!("Failed to create directory {}: {}", dir.display(), e),
                )
            })?;
        }
        if let Some(parent) = self.state_file.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

/// Retry section of the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Base wait in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiplier: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Base directory for the default folder layout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_folder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "db_name")]
    pub database: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_folder: Option<String>,
    /// Checkpoint file name (inside the backup folder) or path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_folder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot_folder: Option<String>,
    /// Search queries, crawled in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub queries: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub my_skills: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_jobs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_threshold: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_method: Option<MatchMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_scraped_jobs: Option<bool>,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser: Option<BrowserEngineConfig>,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    /// Automatically discovers jobcrawl config files in standard locations.
    pub async fn load() -> Self {
        match prefer::load("jobcrawl").await {
            Ok(pref_config) => match pref_config.source_path() {
                Some(path) => Self::load_from_path(path).await.unwrap_or_else(|e| {
                    tracing::warn!("{}", e);
                    Self::default()
                }),
                None => Self::default(),
            },
            Err(_) => Self::default(),
        }
    }

    /// Load configuration from a specific file path.
    /// Supports JSON, TOML and YAML based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file {}: {}", path.display(), e))?;

        let mut config = Self::parse(&contents, path)?;
        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    fn parse(contents: &str, path: &Path) -> Result<Self, String> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        match ext {
            "toml" => toml::from_str(contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e)),
            "yaml" | "yml" => serde_yaml::from_str(contents)
                .map_err(|e| format!("Failed to parse YAML config: {}", e)),
            _ => serde_json::from_str(contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e)),
        }
    }

    /// Get the base directory for resolving relative paths.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Apply configuration to settings.
    /// `base_dir` is used to resolve relative paths (typically config file dir or CWD).
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref data_dir) = self.data_dir {
            *settings = Settings::with_data_dir(resolve_path(data_dir, base_dir));
        }
        if let Some(ref dir) = self.output_folder {
            settings.output_dir = resolve_path(dir, base_dir);
        }
        if let Some(ref database) = self.database {
            settings.database_filename = database.clone();
        }
        if let Some(ref dir) = self.backup_folder {
            settings.backup_dir = resolve_path(dir, base_dir);
            settings.state_file = settings.backup_dir.join(DEFAULT_STATE_FILENAME);
        }
        if let Some(ref state) = self.state_file {
            settings.state_file = resolve_state_file(state, &settings.backup_dir);
        }
        if let Some(ref dir) = self.log_folder {
            settings.log_dir = resolve_path(dir, base_dir);
        }
        if let Some(ref dir) = self.screenshot_folder {
            settings.screenshot_dir = resolve_path(dir, base_dir);
        }
        if !self.queries.is_empty() {
            settings.queries = self.queries.clone();
        }
        if !self.my_skills.is_empty() {
            settings.my_skills = self.my_skills.clone();
        }
        if let Some(n) = self.max_jobs {
            settings.max_jobs = n;
        }
        if let Some(n) = self.match_threshold {
            settings.match_threshold = n;
        }
        if let Some(method) = self.match_method {
            settings.match_method = method;
        }
        if let Some(n) = self.max_attempts {
            settings.max_attempts = n;
        }
        if let Some(b) = self.backup_scraped_jobs {
            settings.backup_scraped_jobs = b;
        }
        if let Some(secs) = self.retry.timeout {
            settings.retry.timeout = Duration::from_secs(secs);
        }
        if let Some(m) = self.retry.multiplier {
            settings.retry.multiplier = m;
        }
        if let Some(n) = self.retry.max_retries {
            settings.retry.max_attempts = n;
        }
        if let Some(ref browser) = self.browser {
            let mut browser = browser.clone();
            browser.user_data_dir = browser
                .user_data_dir
                .map(|p| resolve_path(&p.to_string_lossy(), base_dir));
            browser.cookies_file = browser
                .cookies_file
                .map(|p| resolve_path(&p.to_string_lossy(), base_dir));
            settings.browser = browser;
        }
    }
}

/// Resolve a path that may be relative to the config file.
/// - Absolute paths are returned as-is
/// - Paths starting with ~ are expanded
/// - Relative paths are resolved relative to `base_dir`
pub fn resolve_path(path_str: &str, base_dir: &Path) -> PathBuf {
    let expanded = shellexpand::tilde(path_str);
    let path = Path::new(expanded.as_ref());

    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

/// A bare file name lives in the backup folder; anything else is a path.
fn resolve_state_file(value: &str, backup_dir: &Path) -> PathBuf {
    let expanded = shellexpand::tilde(value);
    let path = Path::new(expanded.as_ref());
    if path.is_absolute() || path.components().count() > 1 {
        path.to_path_buf()
    } else {
        backup_dir.join(path)
    }
}

/// Parse a skill list written as a JSON array, a Python-style list literal
/// (`['python', 'sql']`) or a comma-separated string.
pub fn parse_skill_list(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Vec::new();
    }

    if raw.starts_with('[') {
        if let Ok(list) = serde_json::from_str::<Vec<String>>(raw) {
            return clean_skills(list);
        }
        if let Ok(list) = serde_json::from_str::<Vec<String>>(&raw.replace('\'', "\"")) {
            return clean_skills(list);
        }
    }

    let inner = raw.trim_start_matches('[').trim_end_matches(']');
    clean_skills(
        inner
            .split(',')
            .map(|s| s.trim().trim_matches(|c| c == '\'' || c == '"').to_string())
            .collect(),
    )
}

fn clean_skills(list: Vec<String>) -> Vec<String> {
    list.into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Option<T> {
    match value.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("Ignoring {}={:?}: not a valid value", name, value);
            None
        }
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Apply environment overrides using `lookup` to read variables.
pub fn apply_env_overrides<F>(settings: &mut Settings, base_dir: &Path, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &str| lookup(name).filter(|s| !s.trim().is_empty());

    if let Some(dir) = var("OUTPUT_FOLDER") {
        settings.output_dir = resolve_path(&dir, base_dir);
    }
    if let Some(name) = var("DB_NAME") {
        settings.database_filename = name;
    }
    if let Some(dir) = var("BACKUP_FOLDER") {
        let file_name = settings
            .state_file
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| DEFAULT_STATE_FILENAME.into());
        settings.backup_dir = resolve_path(&dir, base_dir);
        settings.state_file = settings.backup_dir.join(file_name);
    }
    if let Some(state) = var("SCRAP_STATE_FILE") {
        settings.state_file = resolve_state_file(&state, &settings.backup_dir);
    }
    if let Some(dir) = var("LOG_FOLDER") {
        settings.log_dir = resolve_path(&dir, base_dir);
    }
    if let Some(dir) = var("SCREENSHOT_FOLDER") {
        settings.screenshot_dir = resolve_path(&dir, base_dir);
    }
    if let Some(skills) = var("MY_SKILLS") {
        settings.my_skills = parse_skill_list(&skills);
    }
    if let (Some(user), Some(password)) = (var("LINKEDIN_USER"), var("LINKEDIN_PASSWORD")) {
        settings.credentials = Some(Credentials { user, password });
    }
    if let Some(v) = var("DISCONNECT_TIMEOUT").and_then(|v| parse_env::<u64>("DISCONNECT_TIMEOUT", &v)) {
        settings.retry.timeout = Duration::from_secs(v);
    }
    if let Some(v) = var("DISCONNECT_MULTIPLIER").and_then(|v| parse_env::<f64>("DISCONNECT_MULTIPLIER", &v)) {
        settings.retry.multiplier = v;
    }
    if let Some(v) = var("DISCONNECT_MAX_RETRIES").and_then(|v| parse_env::<u32>("DISCONNECT_MAX_RETRIES", &v)) {
        settings.retry.max_attempts = v;
    }
    if let Some(v) = var("MAX_SCRAPPER_PERSISTENCE").and_then(|v| parse_env("MAX_SCRAPPER_PERSISTENCE", &v)) {
        settings.max_attempts = v;
    }
    if let Some(dir) = var("CHROME_PROFILE") {
        settings.browser.user_data_dir = Some(resolve_path(&dir, base_dir));
    }
    if let Some(addr) = var("CHROME_DEBUG_ADDRESS") {
        settings.browser.remote_url = Some(addr);
    }
    if let Some(headless) = var("HEADLESS") {
        settings.browser.headless = parse_bool(&headless);
    }
}

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides auto-discovery).
    pub config_path: Option<PathBuf>,
    /// Use CWD for relative paths instead of config file directory.
    pub use_cwd: bool,
}

/// Load settings with explicit options.
/// Returns (Settings, Config) tuple.
pub async fn load_settings_with_options(options: LoadOptions) -> (Settings, Config) {
    let config = match options.config_path {
        Some(ref path) => Config::load_from_path(path).await.unwrap_or_else(|e| {
            tracing::warn!("{}", e);
            Config::default()
        }),
        None => Config::load().await,
    };

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let base_dir = if options.use_cwd {
        cwd
    } else {
        config.base_dir().unwrap_or(cwd)
    };

    let mut settings = Settings::default();
    config.apply_to_settings(&mut settings, &base_dir);
    apply_env_overrides(&mut settings, &base_dir, |name| std::env::var(name).ok());

    if let Some(ref path) = config.source_path {
        tracing::debug!("Loaded config from {}", path.display());
    }
    (settings, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_parse_skill_list_formats() {
        let expected = vec!["python".to_string(), "sql".to_string()];
        assert_eq!(parse_skill_list(r#"["python", "sql"]"#), expected);
        assert_eq!(parse_skill_list("['python', 'sql']"), expected);
        assert_eq!(parse_skill_list("python, sql,"), expected);
        assert!(parse_skill_list("  ").is_empty());
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::with_data_dir(PathBuf::from("/data"));
        assert_eq!(settings.database_path(), PathBuf::from("/data/output/jobs.db"));
        assert_eq!(settings.state_file, PathBuf::from("/data/backup/state.json"));
        assert_eq!(settings.max_jobs, 500);
        assert_eq!(settings.match_threshold, 70);
        assert!(!settings.browser.headless);
        assert_eq!(settings.browser.load_timeout, 12);
    }

    #[test]
    fn test_env_overrides() {
        let mut settings = Settings::with_data_dir(PathBuf::from("/data"));
        apply_env_overrides(
            &mut settings,
            Path::new("/work"),
            env(&[
                ("DB_NAME", "linkedin.db"),
                ("OUTPUT_FOLDER", "out"),
                ("BACKUP_FOLDER", "bk"),
                ("SCRAP_STATE_FILE", "scrap_state.json"),
                ("MY_SKILLS", "['Rust', 'Docker']"),
                ("LINKEDIN_USER", "me@example.com"),
                ("LINKEDIN_PASSWORD", "secret"),
                ("DISCONNECT_TIMEOUT", "20"),
                ("DISCONNECT_MULTIPLIER", "1.5"),
                ("DISCONNECT_MAX_RETRIES", "4"),
                ("MAX_SCRAPPER_PERSISTENCE", "3"),
                ("CHROME_PROFILE", "profile"),
            ]),
        );

        assert_eq!(settings.database_path(), PathBuf::from("/work/out/linkedin.db"));
        assert_eq!(settings.state_file, PathBuf::from("/work/bk/scrap_state.json"));
        assert_eq!(settings.my_skills, vec!["Rust", "Docker"]);
        assert_eq!(settings.credentials.as_ref().unwrap().user, "me@example.com");
        assert_eq!(settings.retry.timeout, Duration::from_secs(20));
        assert_eq!(settings.retry.multiplier, 1.5);
        assert_eq!(settings.retry.max_attempts, 4);
        assert_eq!(settings.max_attempts, 3);
        assert_eq!(settings.browser.user_data_dir, Some(PathBuf::from("/work/profile")));
    }

    #[test]
    fn test_env_invalid_number_is_ignored() {
        let mut settings = Settings::with_data_dir(PathBuf::from("/data"));
        apply_env_overrides(
            &mut settings,
            Path::new("/work"),
            env(&[("DISCONNECT_MAX_RETRIES", "many"), ("LINKEDIN_USER", "only-user")]),
        );
        assert_eq!(settings.retry.max_attempts, RetryPolicy::default().max_attempts);
        assert!(settings.credentials.is_none());
    }

    #[test]
    fn test_toml_config_applies_relative_to_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("jobcrawl.toml");
        let contents = r#"
            data_dir = "data"
            queries = ["python data engineer", "cloud engineer"]
            my_skills = ["python", "aws"]
            max_jobs = 100
            match_method = "weighted"
            backup_scraped_jobs = true

            [retry]
            timeout = 5

            [browser]
            headless = true
            cookies_file = "cookies.json"
        "#;
        let config = Config::parse(contents, &path).unwrap();
        let mut settings = Settings::default();
        config.apply_to_settings(&mut settings, dir.path());

        assert_eq!(settings.data_dir, dir.path().join("data"));
        assert_eq!(settings.queries.len(), 2);
        assert_eq!(settings.max_jobs, 100);
        assert_eq!(settings.match_method, MatchMethod::Weighted);
        assert_eq!(settings.retry.timeout, Duration::from_secs(5));
        assert!(settings.browser.headless);
        assert_eq!(settings.browser.cookies_file, Some(dir.path().join("cookies.json")));
        assert_eq!(
            settings.scraper_options().jobs_csv,
            Some(dir.path().join("data").join("output").join("crawl_data.csv"))
        );
    }

    #[test]
    fn test_yaml_and_json_configs() {
        let yaml = Config::parse("db_name: x.db\nmax_attempts: 2\n", Path::new("c.yaml")).unwrap();
        assert_eq!(yaml.database.as_deref(), Some("x.db"));
        assert_eq!(yaml.max_attempts, Some(2));

        let json = Config::parse(r#"{"match_threshold": 80}"#, Path::new("c.json")).unwrap();
        assert_eq!(json.match_threshold, Some(80));

        assert!(Config::parse("max_jobs = [", Path::new("c.toml")).is_err());
    }

    #[tokio::test]
    async fn test_load_from_path_records_source() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("jobcrawl.json");
        fs::write(&path, r#"{"queries": ["rust"]}"#).unwrap();

        let config = Config::load_from_path(&path).await.unwrap();
        assert_eq!(config.base_dir(), Some(dir.path().to_path_buf()));
        assert_eq!(config.queries, vec!["rust"]);
    }

    #[test]
    fn test_ensure_directories() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::with_data_dir(dir.path().join("root"));
        settings.ensure_directories().unwrap();
        assert!(settings.backup_dir.is_dir());
        assert!(settings.screenshot_dir.is_dir());
        assert!(settings.output_dir.is_dir());
    }
}
