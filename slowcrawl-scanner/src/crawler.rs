use crate::error::{Result, ScanError};
use crate::links::{extract_links, host_of};
use crate::probe;
use crate::result::{CrawlResults, PageRecord, PageTiming};
use crate::session::RenderSession;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Called after every recorded page with the number of pages recorded so far
/// and the URL that was just processed.
pub type ProgressCallback = Arc<dyn Fn(usize, &str) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Measure every link of the start page before the general traversal.
    pub first_page_pass: bool,
    /// Pause after each traversal navigation so late scripts can finish.
    pub settle_delay: Duration,
    /// Pause after loading the seed.
    pub seed_settle_delay: Duration,
    /// Stop after this many pages have been recorded.
    pub max_pages: Option<usize>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            first_page_pass: true,
            settle_delay: Duration::from_secs(1),
            seed_settle_delay: Duration::from_secs(2),
            max_pages: None,
        }
    }
}

/// Breadth-first, single-domain crawler that times every page it visits.
///
/// Pages are loaded one at a time through a [`RenderSession`]. A page that
/// fails to load is recorded as [`PageTiming::Failed`] and the crawl moves on;
/// only failing to reach the seed aborts it.
pub struct Crawler {
    config: CrawlConfig,
    progress_callback: Option<ProgressCallback>,
}

struct CrawlState {
    frontier: VecDeque<String>,
    visited: HashSet<String>,
    pages: Vec<PageRecord>,
}

impl CrawlState {
    fn budget_reached(&self, max_pages: Option<usize>) -> bool {
        max_pages.is_some_and(|max| self.pages.len() >= max)
    }
}

impl Crawler {
    pub fn new() -> Self {
        Self::with_config(CrawlConfig::default())
    }

    pub fn with_config(config: CrawlConfig) -> Self {
        Self {
            config,
            progress_callback: None,
        }
    }

    pub fn with_first_page_pass(mut self, enabled: bool) -> Self {
        self.config.first_page_pass = enabled;
        self
    }

    /// Sets the per-page pause; the seed waits twice as long.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.config.settle_delay = delay;
        self.config.seed_settle_delay = delay * 2;
        self
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.config.max_pages = Some(max_pages);
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    pub async fn crawl<S: RenderSession + ?Sized>(
        &self,
        session: &mut S,
        seed_url: &str,
    ) -> Result<CrawlResults> {
        Url::parse(seed_url).map_err(|e| ScanError::InvalidUrl(format!("{}: {}", seed_url, e)))?;

        info!("Loading seed {}", seed_url);
        session.navigate(seed_url).await?;
        pause(self.config.seed_settle_delay).await;

        // Redirects decide the domain, not what the user typed.
        let effective_url = session.current_url().await?;
        let domain = host_of(&effective_url).ok_or_else(|| {
            ScanError::InvalidUrl(format!("landing address has no host: {}", effective_url))
        })?;
        info!("Effective domain: {} (landed on {})", domain, effective_url);

        let seed_links = extract_links(session, &effective_url).await;
        info!("Links on the start page: {}", seed_links.len());

        let mut state = CrawlState {
            frontier: VecDeque::new(),
            visited: HashSet::new(),
            pages: Vec::new(),
        };

        let first_page = if self.config.first_page_pass {
            Some(self.measure_seed_links(session, &seed_links, &mut state).await)
        } else {
            None
        };

        state.visited.extend(state.pages.iter().map(|p| p.url.clone()));
        state.frontier.extend(seed_links.iter().cloned());

        self.traverse(session, &effective_url, &mut state).await;

        info!(
            "Crawl complete. Visited {} pages on {}",
            state.visited.len(),
            domain
        );

        Ok(CrawlResults {
            effective_url,
            domain,
            seed_links,
            pages: state.pages,
            first_page,
            visited: state.visited.len(),
        })
    }

    /// Time each start-page link without following anything further.
    async fn measure_seed_links<S: RenderSession + ?Sized>(
        &self,
        session: &mut S,
        seed_links: &[String],
        state: &mut CrawlState,
    ) -> Vec<PageRecord> {
        info!("Measuring {} links from the start page", seed_links.len());
        let mut first_page = Vec::new();

        for link in seed_links {
            if state.budget_reached(self.config.max_pages) {
                info!("Page budget reached during the start page pass");
                break;
            }

            let timing = self.visit(session, link, Duration::ZERO).await;
            if timing.is_measured() {
                first_page.push(PageRecord::new(link.clone(), timing.clone()));
            }
            self.record(state, link, timing);
        }

        first_page
    }

    async fn traverse<S: RenderSession + ?Sized>(
        &self,
        session: &mut S,
        effective_url: &str,
        state: &mut CrawlState,
    ) {
        info!("Traversing the site from {} queued links", state.frontier.len());

        while let Some(url) = state.frontier.pop_front() {
            // The same URL may sit in the queue more than once.
            if state.visited.contains(&url) {
                continue;
            }
            if state.budget_reached(self.config.max_pages) {
                info!("Page budget reached with {} URLs still queued", state.frontier.len() + 1);
                break;
            }

            let timing = self.visit(session, &url, self.config.settle_delay).await;
            let loaded = !timing.is_failed();
            self.record(state, &url, timing);
            state.visited.insert(url.clone());

            if !loaded {
                continue;
            }

            for link in extract_links(session, effective_url).await {
                if !state.visited.contains(&link) {
                    debug!("Queueing {}", link);
                    state.frontier.push_back(link);
                }
            }
        }
    }

    /// Load `url` and read its timing. Errors are folded into the result.
    async fn visit<S: RenderSession + ?Sized>(
        &self,
        session: &mut S,
        url: &str,
        settle: Duration,
    ) -> PageTiming {
        if let Err(e) = session.navigate(url).await {
            warn!("Failed to load {}: {}", url, e);
            return PageTiming::Failed(e.to_string());
        }
        pause(settle).await;

        let timing = probe::measure(session).await;
        match &timing {
            PageTiming::Measured(secs) => debug!("{} -> {:.3}s", url, secs),
            _ => debug!("{} -> load time unavailable", url),
        }
        timing
    }

    fn record(&self, state: &mut CrawlState, url: &str, timing: PageTiming) {
        state.pages.push(PageRecord::new(url.to_string(), timing));
        if let Some(ref callback) = self.progress_callback {
            callback(state.pages.len(), url);
        }
    }
}

impl Default for Crawler {
    fn default() -> Self {
        Self::new()
    }
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeSession;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const ROOT: &str = "https://site.test/";
    const A: &str = "https://site.test/a";
    const B: &str = "https://site.test/b";
    const C: &str = "https://site.test/c";
    const EXTERNAL: &str = "https://elsewhere.test/";

    fn crawler() -> Crawler {
        Crawler::new().with_settle_delay(Duration::ZERO)
    }

    fn assert_visited_once(results: &CrawlResults) {
        let unique: HashSet<&str> = results.pages.iter().map(|p| p.url.as_str()).collect();
        assert_eq!(unique.len(), results.pages.len(), "a URL was recorded twice");
        assert_eq!(results.visited, results.pages.len());
    }

    #[tokio::test]
    async fn test_seed_links_measured_and_external_ignored() {
        let mut session = FakeSession::new()
            .page(ROOT, 300.0, &[A, B, EXTERNAL])
            .page(A, 500.0, &[])
            .page(B, 1200.0, &[]);

        let results = crawler().crawl(&mut session, ROOT).await.unwrap();

        assert_eq!(results.domain, "site.test");
        assert_eq!(results.seed_links, vec![A, B]);
        assert_eq!(results.get(A), Some(&PageTiming::Measured(0.5)));
        assert_eq!(results.get(B), Some(&PageTiming::Measured(1.2)));
        assert!(results.get(EXTERNAL).is_none());
        assert_eq!(session.navigation_count(EXTERNAL), 0);
        assert_visited_once(&results);
    }

    #[tokio::test]
    async fn test_first_page_pass_records_both_maps_and_is_not_revisited() {
        let mut session = FakeSession::new()
            .page(ROOT, 300.0, &[A, B])
            .page(A, 500.0, &[B, C])
            .page(B, 1200.0, &[A])
            .page(C, 50.0, &[]);

        let results = crawler().crawl(&mut session, ROOT).await.unwrap();

        let first_page = results.first_page.as_ref().unwrap();
        let first_urls: Vec<&str> = first_page.iter().map(|p| p.url.as_str()).collect();
        assert_eq!(first_urls, vec![A, B]);

        // The queue starts with A and B already visited, so neither is loaded
        // twice and nothing behind them is reached.
        assert_eq!(session.navigation_count(A), 1);
        assert_eq!(session.navigation_count(B), 1);
        assert_eq!(results.get(A), Some(&PageTiming::Measured(0.5)));
        assert!(results.get(C).is_none());
        assert_visited_once(&results);
    }

    #[tokio::test]
    async fn test_first_page_pass_never_enqueues() {
        // D is only linked from A. The first pass marks A visited, so the
        // traversal never reads A's links.
        let d = "https://site.test/d";
        let mut session = FakeSession::new()
            .page(ROOT, 300.0, &[A])
            .page(A, 500.0, &[d])
            .page(d, 10.0, &[]);

        let results = crawler().crawl(&mut session, ROOT).await.unwrap();

        assert_eq!(results.pages.len(), 1);
        assert!(results.get(d).is_none());
    }

    #[tokio::test]
    async fn test_without_first_page_pass_traverses_everything() {
        let d = "https://site.test/d";
        let mut session = FakeSession::new()
            .page(ROOT, 300.0, &[A])
            .page(A, 500.0, &[d])
            .page(d, 10.0, &[A]);

        let results = crawler()
            .with_first_page_pass(false)
            .crawl(&mut session, ROOT)
            .await
            .unwrap();

        assert!(results.first_page.is_none());
        assert_eq!(results.get(A), Some(&PageTiming::Measured(0.5)));
        assert_eq!(results.get(d), Some(&PageTiming::Measured(0.01)));
        assert_visited_once(&results);
    }

    #[tokio::test]
    async fn test_cycle_terminates_with_each_page_once() {
        let mut session = FakeSession::new()
            .page(ROOT, 300.0, &[A])
            .page(A, 100.0, &[B])
            .page(B, 200.0, &[A]);

        let results = crawler()
            .with_first_page_pass(false)
            .crawl(&mut session, ROOT)
            .await
            .unwrap();

        assert_eq!(results.pages.len(), 2);
        assert_eq!(session.navigation_count(A), 1);
        assert_eq!(session.navigation_count(B), 1);
        assert_visited_once(&results);
    }

    #[tokio::test]
    async fn test_every_reachable_page_is_visited() {
        // Binary-tree-ish site: page i links to 2i+1 and 2i+2, plus back to root.
        let urls: Vec<String> = (0..15).map(|i| format!("https://site.test/p{}", i)).collect();
        let mut session = FakeSession::new().page(ROOT, 1.0, &[urls[0].as_str()]);
        for (i, url) in urls.iter().enumerate() {
            let mut links: Vec<&str> = vec![ROOT];
            for child in [2 * i + 1, 2 * i + 2] {
                if child < urls.len() {
                    links.push(urls[child].as_str());
                }
            }
            session = session.page(url, (i * 10) as f64, &links);
        }

        let results = crawler()
            .with_first_page_pass(false)
            .crawl(&mut session, ROOT)
            .await
            .unwrap();

        for url in &urls {
            assert!(results.get(url).is_some(), "{} was never visited", url);
        }
        // The seed links back to itself through every page.
        assert!(results.get(ROOT).is_some());
        assert_eq!(results.pages.len(), urls.len() + 1);
        assert_visited_once(&results);
    }

    #[tokio::test]
    async fn test_breadth_first_order() {
        let a1 = "https://site.test/a1";
        let b1 = "https://site.test/b1";
        let mut session = FakeSession::new()
            .page(ROOT, 1.0, &[A, B])
            .page(A, 1.0, &[a1])
            .page(B, 1.0, &[b1])
            .page(a1, 1.0, &[])
            .page(b1, 1.0, &[]);

        let results = crawler()
            .with_first_page_pass(false)
            .crawl(&mut session, ROOT)
            .await
            .unwrap();

        let order: Vec<&str> = results.pages.iter().map(|p| p.url.as_str()).collect();
        assert_eq!(order, vec![A, B, a1, b1]);
    }

    #[tokio::test]
    async fn test_navigation_failure_is_recorded_and_crawl_continues() {
        let mut session = FakeSession::new()
            .page(ROOT, 300.0, &[A, B, C])
            .failing(B)
            .page(A, 100.0, &[])
            .page(C, 200.0, &[]);

        let results = crawler()
            .with_first_page_pass(false)
            .crawl(&mut session, ROOT)
            .await
            .unwrap();

        assert!(results.get(B).unwrap().is_failed());
        assert_eq!(results.get(C), Some(&PageTiming::Measured(0.2)));
        assert_eq!(results.failed_count(), 1);
        assert_eq!(session.navigation_count(B), 1);
        assert_visited_once(&results);
    }

    #[tokio::test]
    async fn test_failure_in_first_page_pass_is_not_retried() {
        let mut session = FakeSession::new()
            .page(ROOT, 300.0, &[A, B])
            .failing(A)
            .page(B, 100.0, &[A]);

        let results = crawler().crawl(&mut session, ROOT).await.unwrap();

        assert!(results.get(A).unwrap().is_failed());
        let first_page = results.first_page.unwrap();
        assert_eq!(first_page.len(), 1);
        assert_eq!(first_page[0].url, B);
        assert_eq!(session.navigation_count(A), 1);
    }

    #[tokio::test]
    async fn test_unavailable_in_first_page_pass_is_recorded_but_not_listed() {
        let mut session = FakeSession::new()
            .page(ROOT, 300.0, &[A])
            .page(A, 100.0, &[B])
            .timing_error(A)
            .page(B, 700.0, &[]);

        let results = crawler().crawl(&mut session, ROOT).await.unwrap();

        assert_eq!(results.get(A), Some(&PageTiming::Unavailable));
        assert_eq!(results.first_page, Some(vec![]));
        assert_eq!(session.navigation_count(A), 1);
        assert!(results.get(B).is_none());
        assert_eq!(results.visited, 1);
    }

    #[tokio::test]
    async fn test_unavailable_timing_is_distinct_from_failure() {
        let mut session = FakeSession::new()
            .page(ROOT, 300.0, &[A])
            .page(A, 100.0, &[B])
            .timing_error(A)
            .page(B, 700.0, &[]);

        let results = crawler()
            .with_first_page_pass(false)
            .crawl(&mut session, ROOT)
            .await
            .unwrap();

        assert_eq!(results.get(A), Some(&PageTiming::Unavailable));
        assert_eq!(results.unavailable_count(), 1);
        assert_eq!(results.failed_count(), 0);
        // Links are still followed from a page whose timing was unreadable.
        assert_eq!(results.get(B), Some(&PageTiming::Measured(0.7)));
    }

    #[tokio::test]
    async fn test_link_enumeration_failure_keeps_page_measurement() {
        let mut session = FakeSession::new()
            .page(ROOT, 300.0, &[A])
            .page(A, 100.0, &[B])
            .links_error(A)
            .page(B, 700.0, &[]);

        let results = crawler()
            .with_first_page_pass(false)
            .crawl(&mut session, ROOT)
            .await
            .unwrap();

        assert_eq!(results.get(A), Some(&PageTiming::Measured(0.1)));
        assert!(results.get(B).is_none());
    }

    #[tokio::test]
    async fn test_redirected_seed_sets_domain() {
        let www_a = "https://www.site.test/a";
        let mut session = FakeSession::new()
            .redirect("https://site.test/", "https://www.site.test/")
            .page("https://www.site.test/", 300.0, &[www_a, A])
            .page(www_a, 100.0, &[])
            .page(A, 100.0, &[]);

        let results = crawler().crawl(&mut session, "https://site.test/").await.unwrap();

        assert_eq!(results.effective_url, "https://www.site.test/");
        assert_eq!(results.domain, "www.site.test");
        assert_eq!(results.seed_links, vec![www_a]);
        assert!(results.get(A).is_none());
    }

    #[tokio::test]
    async fn test_unreachable_seed_is_an_error() {
        let mut session = FakeSession::new().failing(ROOT);

        let err = crawler().crawl(&mut session, ROOT).await.unwrap_err();
        assert!(matches!(err, ScanError::Navigation { .. }));
    }

    #[tokio::test]
    async fn test_invalid_seed_is_rejected_before_navigation() {
        let mut session = FakeSession::new();

        let err = crawler().crawl(&mut session, "site.test").await.unwrap_err();
        assert!(matches!(err, ScanError::InvalidUrl(_)));
        assert!(session.navigations.is_empty());
    }

    #[tokio::test]
    async fn test_anchor_without_target_is_skipped() {
        let mut session = FakeSession::new()
            .page(ROOT, 300.0, &[A])
            .anchor_without_target(ROOT)
            .page(A, 100.0, &[]);

        let results = crawler().crawl(&mut session, ROOT).await.unwrap();
        assert_eq!(results.seed_links, vec![A]);
    }

    #[tokio::test]
    async fn test_max_pages_limits_the_crawl() {
        let mut session = FakeSession::new()
            .page(ROOT, 300.0, &[A, B, C])
            .page(A, 100.0, &[])
            .page(B, 100.0, &[])
            .page(C, 100.0, &[]);

        let results = crawler()
            .with_max_pages(2)
            .crawl(&mut session, ROOT)
            .await
            .unwrap();

        assert_eq!(results.pages.len(), 2);
        assert_eq!(session.navigation_count(C), 0);
        assert_visited_once(&results);
    }

    #[tokio::test]
    async fn test_progress_callback_sees_every_page() {
        let seen: Arc<Mutex<HashMap<String, usize>>> = Arc::new(Mutex::new(HashMap::new()));
        let seen_clone = seen.clone();

        let mut session = FakeSession::new()
            .page(ROOT, 300.0, &[A, B])
            .page(A, 100.0, &[C])
            .page(B, 100.0, &[])
            .page(C, 100.0, &[]);

        let results = crawler()
            .with_first_page_pass(false)
            .with_progress_callback(Arc::new(move |count, url| {
                seen_clone.lock().unwrap().insert(url.to_string(), count);
            }))
            .crawl(&mut session, ROOT)
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), results.pages.len());
        assert_eq!(seen.get(C), Some(&3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_delay_is_applied() {
        let mut session = FakeSession::new()
            .page(ROOT, 300.0, &[A])
            .page(A, 100.0, &[]);

        let started = tokio::time::Instant::now();
        Crawler::new()
            .with_first_page_pass(false)
            .with_settle_delay(Duration::from_millis(500))
            .crawl(&mut session, ROOT)
            .await
            .unwrap();

        // Seed waits 2x, the one traversed page 1x.
        assert!(started.elapsed() >= Duration::from_millis(1500));
    }
}
