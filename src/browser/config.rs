//! Browser launch configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How to start (or attach to) Chrome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserEngineConfig {
    /// Run without a visible window.
    #[serde(default)]
    pub headless: bool,

    /// Page load timeout in seconds.
    #[serde(default = "default_load_timeout")]
    pub load_timeout: u64,

    /// DevTools address of an already running Chrome (e.g. "127.0.0.1:9222").
    /// If set, attaches to it instead of launching one.
    #[serde(default, alias = "debug_address")]
    pub remote_url: Option<String>,

    /// Persistent profile directory, so the LinkedIn session survives restarts.
    #[serde(default)]
    pub user_data_dir: Option<PathBuf>,

    #[serde(default = "default_true")]
    pub disable_extensions: bool,

    /// Proxy server URL (e.g., "socks5://127.0.0.1:1080").
    #[serde(default)]
    pub proxy: Option<String>,

    /// Cookies loaded before the first navigation and saved on close.
    #[serde(default)]
    pub cookies_file: Option<PathBuf>,

    /// Additional Chrome arguments.
    #[serde(default)]
    pub chrome_args: Vec<String>,
}

pub fn default_load_timeout() -> u64 {
    12
}

fn default_true() -> bool {
    true
}

impl Default for BrowserEngineConfig {
    fn default() -> Self {
        Self {
            headless: false,
            load_timeout: default_load_timeout(),
            remote_url: None,
            user_data_dir: None,
            disable_extensions: true,
            proxy: None,
            cookies_file: None,
            chrome_args: Vec::new(),
        }
    }
}

impl BrowserEngineConfig {
    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.load_timeout)
    }

    /// HTTP base URL of the remote DevTools endpoint, scheme added if missing.
    pub fn remote_http_url(&self) -> Option<String> {
        let raw = self.remote_url.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }
        let with_scheme = if raw.contains("://") {
            raw.to_string()
        } else {
            format!("http://{}", raw)
        };
        let parsed = url::Url::parse(&with_scheme).ok()?;
        let scheme = match parsed.scheme() {
            "ws" => "http",
            "wss" => "https",
            other => other,
        };
        let host = parsed.host_str()?;
        Some(match parsed.port() {
            Some(port) => format!("{}://{}:{}", scheme, host, port),
            None => format!("{}://{}", scheme, host),
        })
    }
}
