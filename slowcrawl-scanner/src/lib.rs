pub mod browser;
pub mod crawler;
pub mod error;
pub mod links;
pub mod probe;
pub mod result;
pub mod session;

#[cfg(test)]
mod fake;

pub use crawler::{CrawlConfig, Crawler, ProgressCallback};
pub use error::{Result, ScanError};
pub use links::{extract_links, host_of, is_same_domain};
pub use probe::measure;
pub use result::{CrawlResults, PageRecord, PageTiming};
pub use session::{BrowserEngine, RenderSession, SessionConfig, launch_session};
