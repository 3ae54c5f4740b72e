//! Browser automation seam.
//!
//! The scraper talks to the browser only through [`PageDriver`], addressing
//! elements by XPath. [`ChromeDriver`] implements it over the Chrome DevTools
//! protocol; tests substitute a scripted in-memory driver.

mod chrome;
mod config;
mod cookies;
#[cfg_attr(not(feature = "browser"), allow(dead_code))]
mod script;

pub use chrome::ChromeDriver;
pub use config::BrowserEngineConfig;
pub use cookies::{read_cookie_file, write_cookie_file, SavedCookie};

use async_trait::async_trait;
use thiserror::Error;

/// Network error codes Chrome reports when connectivity is lost.
pub const DISCONNECT_CODES: &[&str] = &["ERR_INTERNET_DISCONNECTED", "ERR_PROXY_CONNECTION_FAILED"];

/// Errors raised by a [`PageDriver`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DriverError {
    #[error("page load timed out")]
    Timeout,
    #[error("connection lost: {0}")]
    Disconnected(String),
    /// For drivers that fail on a missing node instead of returning an
    /// empty result. The scraper skips the link, as for any layout problem.
    #[error("no element matches {0}")]
    NoSuchElement(String),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("browser unavailable: {0}")]
    Unavailable(String),
}

impl DriverError {
    /// Map a raw driver message, recognizing lost connectivity.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        if DISCONNECT_CODES.iter().any(|code| message.contains(code)) {
            DriverError::Disconnected(message)
        } else {
            DriverError::Protocol(message)
        }
    }

    /// Whether the call is worth retrying after a wait.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, DriverError::Disconnected(_))
    }
}

pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// Operations the scraper needs from a browser tab.
#[async_trait]
pub trait PageDriver: Send {
    /// Load `url` in the main tab.
    async fn navigate(&mut self, url: &str) -> DriverResult<()>;

    /// Title of the current document.
    async fn title(&mut self) -> DriverResult<String>;

    /// Number of nodes matching `xpath`.
    async fn count(&mut self, xpath: &str) -> DriverResult<usize>;

    /// Visible text of every node matching `xpath`, in document order.
    async fn texts(&mut self, xpath: &str) -> DriverResult<Vec<String>>;

    /// Value of attribute `name` for every node matching `xpath`.
    /// Nodes without the attribute are skipped.
    async fn attributes(&mut self, xpath: &str, name: &str) -> DriverResult<Vec<String>>;

    /// Click the `index`-th node matching `xpath`. `false` if there is none.
    async fn click(&mut self, xpath: &str, index: usize) -> DriverResult<bool>;

    /// Type `value` into the first node matching `xpath`. `false` if there is none.
    async fn fill(&mut self, xpath: &str, value: &str) -> DriverResult<bool>;

    async fn current_url(&mut self) -> DriverResult<String>;

    /// Close every tab except the main one, returning their URLs.
    async fn drain_other_tabs(&mut self) -> DriverResult<Vec<String>>;

    /// PNG screenshot of the main tab.
    async fn screenshot(&mut self) -> DriverResult<Vec<u8>>;

    /// Tear the browser down and start a fresh one. Called once when
    /// navigation reports the browser [`DriverError::Unavailable`].
    async fn restart(&mut self) -> DriverResult<()>;

    async fn close(&mut self) -> DriverResult<()>;

    /// Whether any node matches `xpath`.
    async fn exists(&mut self, xpath: &str) -> DriverResult<bool> {
        Ok(self.count(xpath).await? > 0)
    }
}
