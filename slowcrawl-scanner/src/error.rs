use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Browser startup failed: {0}")]
    Startup(String),

    #[error("Unsupported browser: {0} (expected one of: chrome, yandex, firefox)")]
    UnsupportedBrowser(String),

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Script evaluation failed: {0}")]
    Script(String),

    #[error("WebDriver error: {error}: {message}")]
    WebDriver { error: String, message: String },

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(String),
}

impl From<chromiumoxide::error::CdpError> for ScanError {
    fn from(e: chromiumoxide::error::CdpError) -> Self {
        ScanError::Browser(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
