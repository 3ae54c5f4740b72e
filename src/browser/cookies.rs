//! Cookie file persistence for browser sessions.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

/// Cookie as stored in the cookie file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedCookie {
    #[serde(alias = "key")]
    pub name: String,
    #[serde(default)]
    pub value: String,
    pub domain: String,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(default, alias = "httpOnly")]
    pub http_only: bool,
}

fn default_path() -> String {
    "/".to_string()
}

/// Read a cookie file. Entries missing a name or domain are dropped.
pub fn read_cookie_file(path: &Path) -> anyhow::Result<Vec<SavedCookie>> {
    let content = fs::read_to_string(path)?;
    let raw: Vec<serde_json::Value> = serde_json::from_str(&content)?;
    let cookies = raw
        .into_iter()
        .filter_map(|v| serde_json::from_value::<SavedCookie>(v).ok())
        .filter(|c| !c.name.is_empty() && !c.domain.is_empty())
        .collect();
    Ok(cookies)
}

/// Write cookies as pretty JSON, creating parent directories.
pub fn write_cookie_file(path: &Path, cookies: &[SavedCookie]) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(cookies)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, json)?;

    info!("Saved {} cookies to {:?}", cookies.len(), path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_round_trip_and_filtering() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session").join("cookies.json");
        let cookie = SavedCookie {
            name: "li_at".into(),
            value: "token".into(),
            domain: ".linkedin.com".into(),
            path: "/".into(),
            secure: true,
            http_only: true,
        };
        write_cookie_file(&path, &[cookie.clone()]).unwrap();
        assert_eq!(read_cookie_file(&path).unwrap(), vec![cookie]);
    }

    #[test]
    fn test_reads_browser_export_format() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cookies.json");
        fs::write(
            &path,
            r#"[{"key": "JSESSIONID", "value": "x", "domain": "www.linkedin.com", "httpOnly": false},
                {"name": "", "domain": "x"},
                {"value": "no name"}]"#,
        )
        .unwrap();

        let cookies = read_cookie_file(&path).unwrap();
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies[0].name, "JSESSIONID");
        assert_eq!(cookies[0].path, "/");
    }
}
