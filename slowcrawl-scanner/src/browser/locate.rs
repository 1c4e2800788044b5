use crate::error::{Result, ScanError};
use crate::session::{BrowserEngine, SessionConfig};
use std::path::PathBuf;
use tracing::{info, warn};

pub const CHROMIUM_PATH_ENV: &str = "CHROMIUM_PATH";
pub const YANDEX_BROWSER_PATH_ENV: &str = "YANDEX_BROWSER_PATH";

/// Binary to launch for a Chromium-family engine. `None` lets the CDP client
/// auto-detect an installed Chrome.
pub fn chromium_executable(config: &SessionConfig) -> Result<Option<PathBuf>> {
    if let Some(ref path) = config.executable {
        return Ok(Some(path.clone()));
    }

    match config.engine {
        BrowserEngine::Chrome => Ok(env_path(CHROMIUM_PATH_ENV)),
        BrowserEngine::Yandex => find_yandex_browser().map(Some).ok_or_else(|| {
            ScanError::Startup(format!(
                "Yandex Browser not found. Install it or set {} to its executable.",
                YANDEX_BROWSER_PATH_ENV
            ))
        }),
        BrowserEngine::Firefox => Err(ScanError::Startup(
            "firefox is driven through WebDriver, not CDP".to_string(),
        )),
    }
}

/// Locate an installed Yandex Browser.
pub fn find_yandex_browser() -> Option<PathBuf> {
    if let Some(path) = env_path(YANDEX_BROWSER_PATH_ENV) {
        return Some(path);
    }

    for path in yandex_candidates() {
        if path.is_file() {
            info!("Found Yandex Browser at: {}", path.display());
            return Some(path);
        }
    }

    ["yandex-browser", "yandex-browser-stable"]
        .iter()
        .find_map(|name| which::which(name).ok())
}

fn yandex_candidates() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if cfg!(target_os = "windows") {
        if let Ok(user) = std::env::var("USERPROFILE") {
            paths.push(
                PathBuf::from(user)
                    .join(r"AppData\Local\Yandex\YandexBrowser\Application\browser.exe"),
            );
        }
        for var in ["PROGRAMFILES", "PROGRAMFILES(X86)"] {
            if let Ok(root) = std::env::var(var) {
                paths.push(PathBuf::from(root).join(r"Yandex\YandexBrowser\Application\browser.exe"));
            }
        }
    } else if cfg!(target_os = "macos") {
        paths.push(PathBuf::from("/Applications/Yandex.app/Contents/MacOS/Yandex"));
    } else {
        paths.push(PathBuf::from("/usr/bin/yandex-browser"));
        paths.push(PathBuf::from("/usr/bin/yandex-browser-stable"));
        paths.push(PathBuf::from("/opt/yandex/browser/yandex-browser"));
    }

    paths
}

/// Path from an environment variable, if it points at an existing file.
fn env_path(var: &str) -> Option<PathBuf> {
    let path = PathBuf::from(std::env::var_os(var)?);
    if path.is_file() {
        info!("Using browser from {}: {}", var, path.display());
        Some(path)
    } else {
        warn!("{} points to a missing file: {}", var, path.display());
        None
    }
}

/// Locate `geckodriver` on the PATH.
pub fn find_geckodriver() -> Result<PathBuf> {
    which::which("geckodriver").map_err(|e| {
        ScanError::Startup(format!(
            "geckodriver not found in PATH ({}). Install it or pass --webdriver-url.",
            e
        ))
    })
}
