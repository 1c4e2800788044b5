use serde::Serialize;
use slowcrawl_scanner::{BrowserEngine, CrawlResults, PageRecord};
use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("TOP_N must be a positive number or 'all', got '{0}'")]
    InvalidTopN(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// How many of the slowest pages to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopN {
    Count(usize),
    All,
}

impl TopN {
    pub fn limit(&self) -> Option<usize> {
        match self {
            TopN::Count(n) => Some(*n),
            TopN::All => None,
        }
    }
}

impl FromStr for TopN {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "all" {
            return Ok(TopN::All);
        }
        match s.trim().parse::<usize>() {
            Ok(n) if n > 0 => Ok(TopN::Count(n)),
            _ => Err(ReportError::InvalidTopN(s.to_string())),
        }
    }
}

impl fmt::Display for TopN {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TopN::Count(n) => write!(f, "{}", n),
            TopN::All => f.write_str("all"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Json,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedPage {
    pub url: String,
    pub seconds: f64,
}

/// Measured pages, slowest first, cut to `top_n`. Ties keep visit order.
pub fn rank(results: &CrawlResults, top_n: TopN) -> Vec<RankedPage> {
    rank_records(&results.pages, top_n)
}

/// Every measured link of the start page, slowest first. Empty when the
/// start page pass did not run.
pub fn rank_first_page(results: &CrawlResults) -> Vec<RankedPage> {
    results
        .first_page
        .as_deref()
        .map(|records| rank_records(records, TopN::All))
        .unwrap_or_default()
}

fn rank_records(records: &[PageRecord], top_n: TopN) -> Vec<RankedPage> {
    let mut ranked: Vec<RankedPage> = records
        .iter()
        .filter_map(|record| {
            record.timing.seconds().map(|seconds| RankedPage {
                url: record.url.clone(),
                seconds,
            })
        })
        .collect();

    ranked.sort_by(|a, b| b.seconds.total_cmp(&a.seconds));

    if let Some(n) = top_n.limit() {
        ranked.truncate(n);
    }
    ranked
}

pub fn generate_text_report(
    results: &CrawlResults,
    ranked: &[RankedPage],
    first_page: &[RankedPage],
    top_n: TopN,
) -> String {
    let mut report = String::new();

    report.push_str(RULE);
    report.push('\n');
    match top_n {
        TopN::All => report.push_str("ALL PAGES BY LOAD TIME\n"),
        TopN::Count(n) => report.push_str(&format!("TOP {} SLOWEST PAGES\n", n)),
    }
    report.push_str(RULE);
    report.push_str("\n\n");

    report.push_str(&format!("Start page:   {}\n", results.effective_url));
    report.push_str(&format!("Domain:       {}\n", results.domain));
    report.push_str(&format!(
        "Generated:    {}\n\n",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    ));

    if ranked.is_empty() {
        report.push_str("  No page load times were measured.\n\n");
    } else {
        report.push_str(&format_table(ranked));
        report.push('\n');
    }

    if !first_page.is_empty() {
        report.push_str(RULE);
        report.push_str("\nLINKS FROM THE START PAGE\n");
        report.push_str(RULE);
        report.push_str("\n\n");
        report.push_str(&format_table(first_page));
        report.push('\n');
    }

    report.push_str(RULE);
    report.push_str("\n# Summary:\n");
    report.push_str(&format!("  Pages visited:      {}\n", results.pages.len()));
    report.push_str(&format!("  Measured:           {}\n", results.measured_count()));
    report.push_str(&format!("  Timing unavailable: {}\n", results.unavailable_count()));
    report.push_str(&format!("  Failed to load:     {}\n", results.failed_count()));
    report.push_str(RULE);
    report.push('\n');

    report
}

pub fn generate_json_report(
    results: &CrawlResults,
    ranked: &[RankedPage],
    first_page: &[RankedPage],
    engine: BrowserEngine,
) -> Result<String, serde_json::Error> {
    let json_report = serde_json::json!({
        "generated_at": chrono::Local::now().to_rfc3339(),
        "browser": engine,
        "slowest": ranked,
        "start_page_links": first_page,
        "summary": {
            "visited": results.visited,
            "measured": results.measured_count(),
            "unavailable": results.unavailable_count(),
            "failed": results.failed_count(),
        },
        "crawl": results,
    });

    serde_json::to_string_pretty(&json_report)
}

fn format_table(pages: &[RankedPage]) -> String {
    let mut table = format!("{:>4}  {:>10}  {}\n", "#", "Time (s)", "URL");
    table.push_str(&format!("{:>4}  {:>10}  {}\n", "-", "--------", "---"));
    for (idx, page) in pages.iter().enumerate() {
        table.push_str(&format!(
            "{:>4}  {:>10.3}  {}\n",
            idx + 1,
            page.seconds,
            page.url
        ));
    }
    table
}

/// Write `ranked` as CSV to `path` (`~` is expanded). Returns the path
/// actually written.
pub fn write_csv_report(path: &str, ranked: &[RankedPage]) -> Result<PathBuf, ReportError> {
    let expanded = PathBuf::from(shellexpand::tilde(path).as_ref());
    let mut writer = csv::Writer::from_path(&expanded)?;

    writer.write_record(["URL", "Load Time (s)"])?;
    for page in ranked {
        let seconds = format!("{:.3}", page.seconds);
        writer.write_record([page.url.as_str(), seconds.as_str()])?;
    }
    writer.flush()?;

    Ok(expanded)
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}
