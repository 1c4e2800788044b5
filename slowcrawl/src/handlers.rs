use anyhow::Context;
use clap::ArgMatches;
use colored::Colorize;
use slowcrawl_core::crawl::{CrawlOptions, execute_crawl};
use slowcrawl_core::report::{
    ReportFormat, TopN, generate_json_report, generate_text_report, rank, rank_first_page,
    save_report, write_csv_report,
};
use slowcrawl_scanner::{BrowserEngine, SessionConfig};
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;
use url::Url;

/// Add `https://` when the input carries no http(s) scheme, then check that
/// the result is a usable web address.
pub fn normalize_seed_url(input: &str) -> Result<String, String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err("URL must not be empty".to_string());
    }

    let lower = trimmed.to_ascii_lowercase();
    let candidate = if lower.starts_with("http://") || lower.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let url = Url::parse(&candidate).map_err(|e| format!("Invalid URL '{}': {}", input, e))?;
    if url.host_str().is_none_or(str::is_empty) {
        return Err(format!("Invalid URL '{}': no host", input));
    }

    Ok(url.to_string())
}

pub fn parse_top_n(input: &str) -> Result<TopN, String> {
    input.parse::<TopN>().map_err(|e| e.to_string())
}

pub fn parse_browser(input: &str) -> Result<BrowserEngine, String> {
    input.parse::<BrowserEngine>().map_err(|e| e.to_string())
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Collect the crawl settings from the command line.
pub fn build_crawl_options(matches: &ArgMatches) -> Result<CrawlOptions, String> {
    let url = matches.get_one::<String>("URL").ok_or("URL is required")?;
    let seed_url = normalize_seed_url(url)?;

    let browser = matches
        .get_one::<String>("browser")
        .map(String::as_str)
        .unwrap_or("chrome");
    let engine = parse_browser(browser)?;

    let timeout = *matches.get_one::<u64>("timeout").unwrap_or(&30);
    let mut session = SessionConfig::new(engine)
        .with_headless(!matches.get_flag("headed"))
        .with_request_timeout(Duration::from_secs(timeout));
    if let Some(path) = matches.get_one::<PathBuf>("browser-path") {
        session = session.with_executable(path.clone());
    }
    if let Some(endpoint) = matches.get_one::<String>("webdriver-url") {
        session = session.with_webdriver_url(endpoint.clone());
    }

    let settle_ms = *matches.get_one::<u64>("settle-ms").unwrap_or(&1000);
    let max_pages = matches
        .get_one::<u64>("max-pages")
        .map(|n| usize::try_from(*n).unwrap_or(usize::MAX));

    Ok(CrawlOptions {
        seed_url,
        first_page_pass: !matches.get_flag("no-first-page"),
        settle_delay: Duration::from_millis(settle_ms),
        max_pages,
        session,
        show_progress: !matches.get_flag("quiet"),
    })
}

fn print_divider() {
    println!("{}", "=".repeat(60).bright_blue().bold());
}

fn print_crawl_config(options: &CrawlOptions, top_n: TopN) {
    println!(
        "{} Start page: {}",
        "→".blue(),
        options.seed_url.bright_white()
    );
    println!("{} Browser: {}", "→".blue(), options.session.engine);
    println!("{} Showing: {}", "→".blue(), top_n);
    println!(
        "{} Start page pass: {}",
        "→".blue(),
        if options.first_page_pass { "on" } else { "off" }
    );
    if let Some(max) = options.max_pages {
        println!("{} Page budget: {}", "→".blue(), max);
    }
    println!();
}

async fn run(matches: &ArgMatches, options: CrawlOptions, top_n: TopN) -> anyhow::Result<()> {
    let format = matches
        .get_one::<String>("format")
        .and_then(|f| ReportFormat::from_str(f))
        .unwrap_or(ReportFormat::Text);
    // Nothing but the document on stdout in JSON mode.
    let quiet = matches.get_flag("quiet") || format == ReportFormat::Json;
    if !quiet {
        print_crawl_config(&options, top_n);
    }

    let results = execute_crawl(&options)
        .await
        .with_context(|| format!("crawl of {} failed", options.seed_url))?;

    let ranked = rank(&results, top_n);
    let first_page = rank_first_page(&results);
    let report = match format {
        ReportFormat::Text => generate_text_report(&results, &ranked, &first_page, top_n),
        ReportFormat::Json => {
            let mut json =
                generate_json_report(&results, &ranked, &first_page, options.session.engine)
                    .context("could not serialize the report")?;
            json.push('\n');
            json
        }
    };

    if !quiet {
        println!();
        print_divider();
        println!("{}", "  RESULTS".bright_white().bold());
        print_divider();
    }
    print!("{}", report);

    if let Some(path) = matches.get_one::<String>("save-csv") {
        let written = write_csv_report(path, &ranked)
            .with_context(|| format!("could not write CSV to {}", path))?;
        eprintln!(
            "{} Results saved to {}",
            "✓".green().bold(),
            written.display()
        );
    }

    if let Some(path) = matches.get_one::<PathBuf>("output") {
        save_report(&report, path)
            .with_context(|| format!("could not write report to {}", path.display()))?;
        eprintln!("{} Report saved to {}", "✓".green().bold(), path.display());
    }

    Ok(())
}

pub async fn handle_crawl(matches: &ArgMatches) {
    init_logging(matches.get_flag("verbose"));

    let top_n_arg = matches
        .get_one::<String>("TOP_N")
        .map(String::as_str)
        .unwrap_or_default();
    let top_n = match parse_top_n(top_n_arg) {
        Ok(top_n) => top_n,
        Err(e) => {
            eprintln!("{} {}", "✗".red().bold(), e);
            std::process::exit(1);
        }
    };

    let options = match build_crawl_options(matches) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("{} {}", "✗".red().bold(), e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(matches, options, top_n).await {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}
