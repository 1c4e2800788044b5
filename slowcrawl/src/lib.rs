// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

pub use handlers::{normalize_seed_url, parse_browser, parse_top_n};

// Re-export crawl functionality from slowcrawl-core
pub use slowcrawl_core::crawl::{CrawlOptions, execute_crawl, run_crawl};
pub use slowcrawl_core::report::TopN;
