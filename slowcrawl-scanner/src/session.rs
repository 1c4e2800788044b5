use crate::browser::{ChromiumSession, WebDriverSession};
use crate::error::{Result, ScanError};
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Collects the resolved `href` of every anchor in the active document.
/// Anchors without a string target (missing attribute, SVG links) yield `null`.
pub const ANCHOR_HREFS_SCRIPT: &str = r#"
    (() => Array.from(document.getElementsByTagName('a')).map(a =>
        (typeof a.href === 'string' && a.href.length > 0) ? a.href : null
    ))()
"#;

/// A single controllable browser tab.
///
/// The crawler only ever holds one session and awaits each call before
/// issuing the next, so implementations need no internal locking.
#[async_trait]
pub trait RenderSession: Send {
    /// Load `url` in the active tab and wait for the navigation to finish.
    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// Address of the active document after redirects.
    async fn current_url(&mut self) -> Result<String>;

    /// Evaluate a script expression in the active document.
    async fn evaluate(&mut self, script: &str) -> Result<serde_json::Value>;

    async fn anchor_hrefs(&mut self) -> Result<Vec<Option<String>>> {
        let value = self.evaluate(ANCHOR_HREFS_SCRIPT).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Shut the browser down. Consumes the session.
    async fn close(self: Box<Self>) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserEngine {
    Chrome,
    Yandex,
    Firefox,
}

impl BrowserEngine {
    pub const ALL: [BrowserEngine; 3] = [
        BrowserEngine::Chrome,
        BrowserEngine::Yandex,
        BrowserEngine::Firefox,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BrowserEngine::Chrome => "chrome",
            BrowserEngine::Yandex => "yandex",
            BrowserEngine::Firefox => "firefox",
        }
    }
}

impl fmt::Display for BrowserEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BrowserEngine {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "chrome" => Ok(BrowserEngine::Chrome),
            "yandex" => Ok(BrowserEngine::Yandex),
            "firefox" => Ok(BrowserEngine::Firefox),
            other => Err(ScanError::UnsupportedBrowser(other.to_string())),
        }
    }
}

/// Browser launch settings shared by every backend.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub engine: BrowserEngine,
    pub headless: bool,
    /// Per-command timeout enforced by the driver layer.
    pub request_timeout: Duration,
    pub window_size: (u32, u32),
    /// Explicit browser binary; overrides environment and platform lookup.
    pub executable: Option<PathBuf>,
    /// Running WebDriver endpoint for Firefox. When unset a local
    /// geckodriver is started.
    pub webdriver_url: Option<String>,
}

impl SessionConfig {
    pub fn new(engine: BrowserEngine) -> Self {
        Self {
            engine,
            headless: true,
            request_timeout: Duration::from_secs(30),
            window_size: (1920, 1080),
            executable: None,
            webdriver_url: None,
        }
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_executable(mut self, path: PathBuf) -> Self {
        self.executable = Some(path);
        self
    }

    pub fn with_webdriver_url(mut self, url: String) -> Self {
        self.webdriver_url = Some(url);
        self
    }
}

/// Start the browser selected by `config.engine`.
pub async fn launch_session(config: &SessionConfig) -> Result<Box<dyn RenderSession>> {
    match config.engine {
        BrowserEngine::Chrome | BrowserEngine::Yandex => {
            Ok(Box::new(ChromiumSession::launch(config).await?))
        }
        BrowserEngine::Firefox => Ok(Box::new(WebDriverSession::launch(config).await?)),
    }
}
