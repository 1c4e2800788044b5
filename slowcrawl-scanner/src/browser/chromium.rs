use crate::browser::locate::chromium_executable;
use crate::error::{Result, ScanError};
use crate::session::{BrowserEngine, RenderSession, SessionConfig};
use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Chrome or Yandex Browser driven over the DevTools protocol.
pub struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    profile: ProfileDir,
}

/// Browser profile directory. Removed on drop.
struct ProfileDir {
    path: PathBuf,
}

impl ProfileDir {
    fn create(parent: &Path, engine: BrowserEngine) -> Result<Self> {
        let path = parent.join(format!("slowcrawl_{}_{}", engine, std::process::id()));
        std::fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ProfileDir {
    fn drop(&mut self) {
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => debug!("Removed browser profile {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove {}: {}", self.path.display(), e),
        }
    }
}

impl ChromiumSession {
    pub async fn launch(config: &SessionConfig) -> Result<Self> {
        Self::launch_in(config, &std::env::temp_dir()).await
    }

    /// Launch with the browser profile created under `profile_parent`.
    pub(crate) async fn launch_in(config: &SessionConfig, profile_parent: &Path) -> Result<Self> {
        let executable = chromium_executable(config)?;
        let profile = ProfileDir::create(profile_parent, config.engine)?;

        let (width, height) = config.window_size;
        let mut builder = BrowserConfig::builder()
            .request_timeout(config.request_timeout)
            .window_size(width, height)
            .user_data_dir(profile.path())
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu");

        if let Some(path) = executable {
            builder = builder.chrome_executable(path);
        }
        if !config.headless {
            builder = builder.with_head();
        }

        let browser_config = builder.build().map_err(ScanError::Startup)?;

        info!("Launching {} (headless={})", config.engine, config.headless);
        let (mut browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| ScanError::Startup(format!("failed to launch {}: {}", config.engine, e)))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    // Unknown CDP events fail to deserialize; they are not fatal.
                    trace!("CDP handler error: {}", e);
                }
            }
            debug!("CDP handler finished");
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                let _ = browser.close().await;
                let _ = browser.wait().await;
                handler_task.abort();
                return Err(ScanError::Startup(format!("failed to open a tab: {}", e)));
            }
        };

        Ok(Self {
            browser,
            page,
            handler_task,
            profile,
        })
    }
}

#[async_trait]
impl RenderSession for ChromiumSession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        let navigation_error = |e: chromiumoxide::error::CdpError| ScanError::Navigation {
            url: url.to_string(),
            reason: e.to_string(),
        };

        self.page.goto(url).await.map_err(navigation_error)?;
        self.page.wait_for_navigation().await.map_err(navigation_error)?;
        Ok(())
    }

    async fn current_url(&mut self) -> Result<String> {
        self.page
            .url()
            .await?
            .ok_or_else(|| ScanError::Browser("active tab has no URL".to_string()))
    }

    async fn evaluate(&mut self, script: &str) -> Result<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| ScanError::Script(e.to_string()))?;
        result
            .into_value::<serde_json::Value>()
            .map_err(|e| ScanError::Script(e.to_string()))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let ChromiumSession {
            mut browser,
            page,
            handler_task,
            profile,
        } = *self;

        if let Err(e) = page.close().await {
            debug!("Failed to close tab: {}", e);
        }

        let closed = browser.close().await;
        if let Err(e) = browser.wait().await {
            warn!("Failed to wait for browser exit: {}", e);
        }
        if tokio::time::timeout(Duration::from_secs(5), handler_task)
            .await
            .is_err()
        {
            debug!("CDP handler still running after browser exit");
        }
        // The profile is only removable once the browser has exited.
        drop(profile);

        closed.map(|_| ()).map_err(|e| ScanError::Browser(format!("failed to close browser: {}", e)))
    }
}
