//! Chrome implementation of [`PageDriver`] over the DevTools protocol.

#[cfg(feature = "browser")]
use std::path::PathBuf;
#[cfg(feature = "browser")]
use std::time::Duration;

use async_trait::async_trait;
#[cfg(feature = "browser")]
use serde::de::DeserializeOwned;
#[cfg(feature = "browser")]
use tracing::{debug, info, warn};

#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::network::CookieParam;
#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
#[cfg(feature = "browser")]
use chromiumoxide::error::CdpError;
#[cfg(feature = "browser")]
use chromiumoxide::handler::Handler;
#[cfg(feature = "browser")]
use chromiumoxide::page::ScreenshotParams;
#[cfg(feature = "browser")]
use chromiumoxide::{Browser, BrowserConfig, Page};
#[cfg(feature = "browser")]
use futures::StreamExt;
#[cfg(feature = "browser")]
use tokio::task::JoinHandle;

#[cfg(feature = "browser")]
use super::cookies::{read_cookie_file, write_cookie_file, SavedCookie};
#[cfg(feature = "browser")]
use super::script;
use super::{BrowserEngineConfig, DriverError, DriverResult, PageDriver};

#[cfg(feature = "browser")]
fn cdp(e: CdpError) -> DriverError {
    DriverError::classify(e.to_string())
}

/// One Chrome instance with a single main tab.
#[cfg(feature = "browser")]
pub struct ChromeDriver {
    config: BrowserEngineConfig,
    browser: Option<Browser>,
    handler: Option<JoinHandle<()>>,
    page: Option<Page>,
}

#[cfg(feature = "browser")]
impl ChromeDriver {
    /// Common Chrome executable paths to check.
    const CHROME_PATHS: &'static [&'static str] = &[
        // Linux
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        // macOS
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/opt/google/chrome/google-chrome",
    ];

    /// Launch Chrome (or attach to the configured remote one) and open the main tab.
    pub async fn launch(config: BrowserEngineConfig) -> DriverResult<Self> {
        let mut driver = Self {
            config,
            browser: None,
            handler: None,
            page: None,
        };
        driver.start().await?;
        Ok(driver)
    }

    fn find_chrome() -> DriverResult<PathBuf> {
        for path in Self::CHROME_PATHS {
            let p = std::path::Path::new(path);
            if p.exists() {
                debug!("Found Chrome at: {}", path);
                return Ok(p.to_path_buf());
            }
        }

        for cmd in &[
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
        ] {
            if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
                if output.status.success() {
                    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                    if !path.is_empty() {
                        debug!("Found Chrome in PATH: {}", path);
                        return Ok(PathBuf::from(path));
                    }
                }
            }
        }

        Err(DriverError::Unavailable(
            "Chrome/Chromium not found. Install it or set browser.remote_url".to_string(),
        ))
    }

    async fn launch_local(&self) -> DriverResult<(Browser, Handler)> {
        info!("Launching browser (headless={})", self.config.headless);

        let mut builder = BrowserConfig::builder()
            .chrome_executable(Self::find_chrome()?)
            .request_timeout(self.config.load_timeout() + Duration::from_secs(5));

        if !self.config.headless {
            builder = builder.with_head();
        }
        if let Some(ref dir) = self.config.user_data_dir {
            builder = builder.user_data_dir(dir);
        }
        if self.config.disable_extensions {
            builder = builder.arg("--disable-extensions");
        }
        if let Some(ref proxy) = self.config.proxy {
            builder = builder.arg(format!("--proxy-server={}", proxy));
        }

        builder = builder
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check");

        for arg in &self.config.chrome_args {
            builder = builder.arg(arg);
        }

        let config = builder
            .build()
            .map_err(|e| DriverError::Unavailable(format!("invalid browser config: {}", e)))?;

        Browser::launch(config)
            .await
            .map_err(|e| DriverError::Unavailable(format!("failed to launch browser: {}", e)))
    }

    async fn connect_remote(&self, http_url: &str) -> DriverResult<(Browser, Handler)> {
        info!("Connecting to remote browser at {}", http_url);

        let version_url = format!("{}/json/version", http_url);
        let resp: serde_json::Value = reqwest::Client::new()
            .get(&version_url)
            .timeout(self.config.load_timeout())
            .send()
            .await
            .map_err(|e| DriverError::Unavailable(format!("{}: {}", version_url, e)))?
            .json()
            .await
            .map_err(|e| DriverError::Protocol(format!("bad version info: {}", e)))?;

        let ws_url = resp
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| DriverError::Protocol("no webSocketDebuggerUrl in response".into()))?;

        debug!("Connecting to WebSocket: {}", ws_url);

        let handler_config = chromiumoxide::handler::HandlerConfig {
            request_timeout: self.config.load_timeout() + Duration::from_secs(5),
            ..Default::default()
        };

        Browser::connect_with_config(ws_url, handler_config)
            .await
            .map_err(|e| DriverError::Unavailable(format!("failed to attach to browser: {}", e)))
    }

    async fn start(&mut self) -> DriverResult<()> {
        let remote = self.config.remote_http_url();
        let (browser, mut handler) = match remote {
            Some(ref url) => self.connect_remote(url).await?,
            None => self.launch_local().await?,
        };

        let task = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        let page = match browser.pages().await {
            Ok(mut pages) if !pages.is_empty() => pages.remove(0),
            _ => browser.new_page("about:blank").await.map_err(cdp)?,
        };

        if let Some(ref path) = self.config.cookies_file {
            if path.exists() {
                Self::load_cookies(&page, path).await;
            }
        }

        self.browser = Some(browser);
        self.handler = Some(task);
        self.page = Some(page);
        Ok(())
    }

    async fn load_cookies(page: &Page, path: &std::path::Path) {
        let cookies = match read_cookie_file(path) {
            Ok(c) => c,
            Err(e) => {
                warn!("Could not read cookies from {:?}: {}", path, e);
                return;
            }
        };
        debug!("Loading {} cookies from {:?}", cookies.len(), path);

        for cookie in cookies {
            let param = CookieParam::builder()
                .name(cookie.name.clone())
                .value(cookie.value)
                .domain(cookie.domain)
                .path(cookie.path)
                .secure(cookie.secure)
                .http_only(cookie.http_only)
                .build();
            match param {
                Ok(param) => {
                    if let Err(e) = page.set_cookie(param).await {
                        warn!("Failed to set cookie {}: {}", cookie.name, e);
                    }
                }
                Err(e) => warn!("Failed to build cookie {}: {}", cookie.name, e),
            }
        }
    }

    async fn save_cookies(&self) {
        let (Some(path), Some(page)) = (self.config.cookies_file.as_ref(), self.page.as_ref()) else {
            return;
        };
        let cookies = match page.get_cookies().await {
            Ok(c) => c,
            Err(e) => {
                warn!("Could not read browser cookies: {}", e);
                return;
            }
        };
        let saved: Vec<SavedCookie> = cookies
            .into_iter()
            .map(|c| SavedCookie {
                name: c.name,
                value: c.value,
                domain: c.domain,
                path: c.path,
                secure: c.secure,
                http_only: c.http_only,
            })
            .collect();
        if let Err(e) = write_cookie_file(path, &saved) {
            warn!("Could not save cookies to {:?}: {}", path, e);
        }
    }

    fn page(&self) -> DriverResult<&Page> {
        self.page
            .as_ref()
            .ok_or_else(|| DriverError::Unavailable("browser is closed".into()))
    }

    async fn eval<T: DeserializeOwned>(&self, js: String) -> DriverResult<T> {
        self.page()?
            .evaluate(js)
            .await
            .map_err(cdp)?
            .into_value::<T>()
            .map_err(|e| DriverError::Protocol(format!("unexpected script result: {}", e)))
    }

    async fn shutdown(&mut self) {
        self.save_cookies().await;
        self.page = None;

        if let Some(mut browser) = self.browser.take() {
            // Leave a browser we attached to running.
            if self.config.remote_http_url().is_none() {
                if let Err(e) = browser.close().await {
                    debug!("Browser close: {}", e);
                }
                let _ = browser.wait().await;
            }
        }
        if let Some(task) = self.handler.take() {
            task.abort();
        }
    }
}

#[cfg(feature = "browser")]
#[async_trait]
impl PageDriver for ChromeDriver {
    async fn navigate(&mut self, url: &str) -> DriverResult<()> {
        let page = self.page()?;
        debug!("Navigating to {}", url);
        match tokio::time::timeout(self.config.load_timeout(), page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(cdp(e)),
            Err(_) => Err(DriverError::Timeout),
        }
    }

    async fn title(&mut self) -> DriverResult<String> {
        Ok(self.page()?.get_title().await.map_err(cdp)?.unwrap_or_default())
    }

    async fn count(&mut self, xpath: &str) -> DriverResult<usize> {
        self.eval(script::count(xpath)).await
    }

    async fn texts(&mut self, xpath: &str) -> DriverResult<Vec<String>> {
        self.eval(script::texts(xpath)).await
    }

    async fn attributes(&mut self, xpath: &str, name: &str) -> DriverResult<Vec<String>> {
        self.eval(script::attributes(xpath, name)).await
    }

    async fn click(&mut self, xpath: &str, index: usize) -> DriverResult<bool> {
        self.eval(script::click(xpath, index)).await
    }

    async fn fill(&mut self, xpath: &str, value: &str) -> DriverResult<bool> {
        self.eval(script::fill(xpath, value)).await
    }

    async fn current_url(&mut self) -> DriverResult<String> {
        Ok(self.page()?.url().await.map_err(cdp)?.unwrap_or_default())
    }

    async fn drain_other_tabs(&mut self) -> DriverResult<Vec<String>> {
        let main = self.page()?.target_id().clone();
        let browser = self
            .browser
            .as_ref()
            .ok_or_else(|| DriverError::Unavailable("browser is closed".into()))?;

        let mut urls = Vec::new();
        for tab in browser.pages().await.map_err(cdp)? {
            if *tab.target_id() == main {
                continue;
            }
            let url = tab.url().await.ok().flatten().unwrap_or_default();
            if let Err(e) = tab.close().await {
                debug!("Could not close tab {}: {}", url, e);
            }
            urls.push(url);
        }
        Ok(urls)
    }

    async fn screenshot(&mut self) -> DriverResult<Vec<u8>> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(true)
            .build();
        self.page()?.screenshot(params).await.map_err(cdp)
    }

    async fn restart(&mut self) -> DriverResult<()> {
        info!("Restarting browser");
        self.shutdown().await;
        self.start().await
    }

    async fn close(&mut self) -> DriverResult<()> {
        self.shutdown().await;
        Ok(())
    }
}

/// Stand-in used when the crate is built without the `browser` feature.
#[cfg(not(feature = "browser"))]
pub struct ChromeDriver {
    _config: BrowserEngineConfig,
}

#[cfg(not(feature = "browser"))]
fn not_compiled() -> DriverError {
    DriverError::Unavailable(
        "Browser support not compiled. Rebuild with: cargo build --features browser".into(),
    )
}

#[cfg(not(feature = "browser"))]
impl ChromeDriver {
    pub async fn launch(_config: BrowserEngineConfig) -> DriverResult<Self> {
        Err(not_compiled())
    }
}

#[cfg(not(feature = "browser"))]
#[async_trait]
impl PageDriver for ChromeDriver {
    async fn navigate(&mut self, _url: &str) -> DriverResult<()> {
        Err(not_compiled())
    }

    async fn title(&mut self) -> DriverResult<String> {
        Err(not_compiled())
    }

    async fn count(&mut self, _xpath: &str) -> DriverResult<usize> {
        Err(not_compiled())
    }

    async fn texts(&mut self, _xpath: &str) -> DriverResult<Vec<String>> {
        Err(not_compiled())
    }

    async fn attributes(&mut self, _xpath: &str, _name: &str) -> DriverResult<Vec<String>> {
        Err(not_compiled())
    }

    async fn click(&mut self, _xpath: &str, _index: usize) -> DriverResult<bool> {
        Err(not_compiled())
    }

    async fn fill(&mut self, _xpath: &str, _value: &str) -> DriverResult<bool> {
        Err(not_compiled())
    }

    async fn current_url(&mut self) -> DriverResult<String> {
        Err(not_compiled())
    }

    async fn drain_other_tabs(&mut self) -> DriverResult<Vec<String>> {
        Err(not_compiled())
    }

    async fn screenshot(&mut self) -> DriverResult<Vec<u8>> {
        Err(not_compiled())
    }

    async fn restart(&mut self) -> DriverResult<()> {
        Err(not_compiled())
    }

    async fn close(&mut self) -> DriverResult<()> {
        Ok(())
    }
}
