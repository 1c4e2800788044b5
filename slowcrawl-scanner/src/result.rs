use serde::Serialize;

/// Outcome of visiting a single page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum PageTiming {
    /// Load time in seconds, never negative.
    Measured(f64),
    /// The page loaded but the browser exposed no usable navigation timing.
    Unavailable,
    /// Navigation raised an error.
    Failed(String),
}

impl PageTiming {
    pub fn seconds(&self) -> Option<f64> {
        match self {
            PageTiming::Measured(secs) => Some(*secs),
            _ => None,
        }
    }

    pub fn is_measured(&self) -> bool {
        matches!(self, PageTiming::Measured(_))
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, PageTiming::Unavailable)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, PageTiming::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageRecord {
    pub url: String,
    pub timing: PageTiming,
}

impl PageRecord {
    pub fn new(url: String, timing: PageTiming) -> Self {
        Self { url, timing }
    }
}

/// Everything a crawl produced, in the order it was recorded.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CrawlResults {
    /// Landing address of the seed after redirects.
    pub effective_url: String,
    /// Host every followed link was matched against.
    pub domain: String,
    /// Same-domain links found on the seed page.
    pub seed_links: Vec<String>,
    /// One record per visited URL.
    pub pages: Vec<PageRecord>,
    /// Measured links of the start page, `None` when that pass was skipped.
    pub first_page: Option<Vec<PageRecord>>,
    /// Size of the visited set when traversal stopped.
    pub visited: usize,
}

impl CrawlResults {
    pub fn get(&self, url: &str) -> Option<&PageTiming> {
        self.pages.iter().find(|p| p.url == url).map(|p| &p.timing)
    }

    pub fn measured_count(&self) -> usize {
        self.pages.iter().filter(|p| p.timing.is_measured()).count()
    }

    pub fn unavailable_count(&self) -> usize {
        self.pages.iter().filter(|p| p.timing.is_unavailable()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.pages.iter().filter(|p| p.timing.is_failed()).count()
    }
}
