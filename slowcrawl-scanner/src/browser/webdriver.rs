//! Firefox over the W3C WebDriver HTTP protocol (geckodriver).
//!
//! Only the handful of endpoints the crawler needs are spoken:
//!
//! | command         | request                                  |
//! |-----------------|------------------------------------------|
//! | new session     | `POST   /session`                        |
//! | navigate        | `POST   /session/{id}/url`               |
//! | current URL     | `GET    /session/{id}/url`               |
//! | execute script  | `POST   /session/{id}/execute/sync`      |
//! | delete session  | `DELETE /session/{id}`                   |

use crate::browser::locate::find_geckodriver;
use crate::error::{Result, ScanError};
use crate::session::{RenderSession, SessionConfig};
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::{Value, json};
use std::future::Future;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);
const READY_POLL_ATTEMPTS: usize = 100;
const DRIVER_START_ATTEMPTS: usize = 3;

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    value: Value,
}

#[derive(Debug, Deserialize)]
struct WireError {
    error: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewSession {
    session_id: String,
}

pub struct WebDriverSession {
    client: Client,
    endpoint: String,
    session_id: String,
    driver: Option<Child>,
}

impl WebDriverSession {
    /// Open a Firefox session on `config.webdriver_url`, or on a geckodriver
    /// started for the occasion when no endpoint is configured.
    pub async fn launch(config: &SessionConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ScanError::Startup(format!("failed to build HTTP client: {}", e)))?;

        let (endpoint, driver) = match config.webdriver_url {
            Some(ref url) => (url.trim_end_matches('/').to_string(), None),
            None => {
                let (endpoint, child) = start_local_driver(&client).await?;
                (endpoint, Some(child))
            }
        };

        let capabilities = firefox_capabilities(config);
        debug!("Requesting WebDriver session at {}", endpoint);
        let value = send(&client, Method::POST, &format!("{}/session", endpoint), Some(capabilities))
            .await
            .map_err(|e| ScanError::Startup(format!("could not start Firefox: {}", e)))?;
        let NewSession { session_id } = serde_json::from_value(value)?;
        info!("WebDriver session {} started at {}", session_id, endpoint);

        Ok(Self {
            client,
            endpoint,
            session_id,
            driver,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    fn session_url(&self, path: &str) -> String {
        format!("{}/session/{}{}", self.endpoint, self.session_id, path)
    }

    async fn command(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        send(&self.client, method, &self.session_url(path), body).await
    }
}

#[async_trait]
impl RenderSession for WebDriverSession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.command(Method::POST, "/url", Some(json!({ "url": url })))
            .await
            .map(|_| ())
            .map_err(|e| ScanError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }

    async fn current_url(&mut self) -> Result<String> {
        let value = self.command(Method::GET, "/url", None).await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ScanError::Browser(format!("unexpected URL value: {}", value)))
    }

    async fn evaluate(&mut self, script: &str) -> Result<Value> {
        let body = json!({
            "script": format!("return {};", script.trim()),
            "args": [],
        });
        self.command(Method::POST, "/execute/sync", Some(body))
            .await
            .map_err(|e| ScanError::Script(e.to_string()))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let mut this = *self;
        let deleted = this.command(Method::DELETE, "", None).await;
        if let Err(ref e) = deleted {
            warn!("Failed to end WebDriver session {}: {}", this.session_id, e);
        }

        if let Some(mut child) = this.driver.take() {
            if let Err(e) = child.kill().await {
                warn!("Failed to stop geckodriver: {}", e);
            }
        }

        deleted.map(|_| ())
    }
}

fn firefox_capabilities(config: &SessionConfig) -> Value {
    let (width, height) = config.window_size;
    let mut args = vec![format!("--width={}", width), format!("--height={}", height)];
    if config.headless {
        args.insert(0, "-headless".to_string());
    }

    let mut firefox_options = json!({ "args": args });
    if let Some(ref binary) = config.executable {
        firefox_options["binary"] = json!(binary.display().to_string());
    }

    json!({
        "capabilities": {
            "alwaysMatch": {
                "browserName": "firefox",
                "pageLoadStrategy": "normal",
                "moz:firefoxOptions": firefox_options,
            }
        }
    })
}

/// Send one WebDriver command and unwrap the `value` envelope.
async fn send(client: &Client, method: Method, url: &str, body: Option<Value>) -> Result<Value> {
    let mut request = client.request(method, url);
    if let Some(body) = body {
        request = request.json(&body);
    }

    let response = request.send().await?;
    let status = response.status();
    let WireResponse { value } = response.json().await?;

    if status.is_success() {
        return Ok(value);
    }

    match serde_json::from_value::<WireError>(value) {
        Ok(WireError { error, message }) => Err(ScanError::WebDriver { error, message }),
        Err(_) => Err(ScanError::WebDriver {
            error: status.to_string(),
            message: String::new(),
        }),
    }
}

/// Start geckodriver and wait for it to accept sessions. The port is picked
/// before the driver binds it, so another process can take it in between;
/// a driver that dies or never gets ready is restarted on a fresh port.
async fn start_local_driver(client: &Client) -> Result<(String, Child)> {
    let binary = find_geckodriver()?;
    let binary = binary.as_path();
    retry_startup(DRIVER_START_ATTEMPTS, move || async move {
        let (endpoint, mut child) = spawn_geckodriver(binary)?;
        if let Err(e) = wait_until_ready(client, &endpoint, &mut child).await {
            if let Err(kill_error) = child.kill().await {
                debug!("geckodriver already gone: {}", kill_error);
            }
            return Err(e);
        }
        Ok((endpoint, child))
    })
    .await
}

async fn retry_startup<T, F, Fut>(attempts: usize, mut start: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error = None;
    for attempt in 1..=attempts {
        match start().await {
            Ok(started) => return Ok(started),
            Err(e) => {
                warn!("WebDriver start attempt {}/{} failed: {}", attempt, attempts, e);
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| ScanError::Startup("WebDriver was never started".to_string())))
}

fn spawn_geckodriver(binary: &Path) -> Result<(String, Child)> {
    let port = free_port()?;

    info!("Starting {} on port {}", binary.display(), port);
    let child = Command::new(binary)
        .arg("--port")
        .arg(port.to_string())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| ScanError::Startup(format!("failed to start geckodriver: {}", e)))?;

    Ok((format!("http://127.0.0.1:{}", port), child))
}

fn free_port() -> Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

/// Poll `GET /status` until the driver reports it can create sessions. Fails
/// as soon as the driver process exits.
async fn wait_until_ready(client: &Client, endpoint: &str, driver: &mut Child) -> Result<()> {
    let status_url = format!("{}/status", endpoint);

    for _ in 0..READY_POLL_ATTEMPTS {
        if let Some(status) = driver.try_wait()? {
            return Err(ScanError::Startup(format!(
                "WebDriver at {} exited before becoming ready ({})",
                endpoint, status
            )));
        }

        match send(client, Method::GET, &status_url, None).await {
            Ok(value) if value.get("ready").and_then(Value::as_bool).unwrap_or(false) => {
                return Ok(());
            }
            Ok(_) => debug!("WebDriver at {} not ready yet", endpoint),
            Err(e) => debug!("WebDriver status check failed: {}", e),
        }
        tokio::time::sleep(READY_POLL_INTERVAL).await;
    }

    Err(ScanError::Startup(format!(
        "WebDriver at {} did not become ready",
        endpoint
    )))
}
