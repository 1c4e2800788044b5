use indicatif::{ProgressBar, ProgressStyle};
use slowcrawl_scanner::{
    CrawlResults, Crawler, ProgressCallback, RenderSession, SessionConfig, launch_session,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Options for configuring a crawl operation
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub seed_url: String,
    /// Measure the start page's links before the general traversal.
    pub first_page_pass: bool,
    /// Pause after each page load; the seed waits twice as long.
    pub settle_delay: Duration,
    pub max_pages: Option<usize>,
    pub session: SessionConfig,
    pub show_progress: bool,
}

impl CrawlOptions {
    pub fn new(seed_url: impl Into<String>, session: SessionConfig) -> Self {
        Self {
            seed_url: seed_url.into(),
            first_page_pass: true,
            settle_delay: Duration::from_secs(1),
            max_pages: None,
            session,
            show_progress: false,
        }
    }

    fn crawler(&self) -> Crawler {
        let crawler = Crawler::new()
            .with_first_page_pass(self.first_page_pass)
            .with_settle_delay(self.settle_delay);

        match self.max_pages {
            Some(max) => crawler.with_max_pages(max),
            None => crawler,
        }
    }
}

/// Launch the configured browser and crawl `options.seed_url` with it.
pub async fn execute_crawl(options: &CrawlOptions) -> slowcrawl_scanner::Result<CrawlResults> {
    info!("Starting {} session", options.session.engine);
    let session = launch_session(&options.session).await?;
    run_crawl(session, options).await
}

/// Crawl with an already running session. The session is closed on every
/// path out of here, including a failed crawl.
pub async fn run_crawl(
    mut session: Box<dyn RenderSession>,
    options: &CrawlOptions,
) -> slowcrawl_scanner::Result<CrawlResults> {
    let progress_bar = options.show_progress.then(|| {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message(format!("Loading {}...", options.seed_url));
        Arc::new(pb)
    });

    let mut crawler = options.crawler();
    if let Some(ref pb) = progress_bar {
        let pb_clone = pb.clone();
        let callback: ProgressCallback = Arc::new(move |count: usize, url: &str| {
            pb_clone.set_message(format!("Crawling... {} pages processed ({})", count, url));
        });
        crawler = crawler.with_progress_callback(callback);
    }

    let outcome = crawler.crawl(&mut *session, &options.seed_url).await;

    if let Some(ref pb) = progress_bar {
        match &outcome {
            Ok(results) => pb.finish_with_message(format!(
                "Crawl complete! {} pages processed",
                results.pages.len()
            )),
            Err(_) => pb.finish_and_clear(),
        }
    }

    if let Err(e) = session.close().await {
        warn!("Failed to shut the browser down cleanly: {}", e);
    }

    outcome
}
