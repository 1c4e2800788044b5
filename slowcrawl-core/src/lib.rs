use colored::Colorize;

pub mod crawl;
pub mod report;

pub use crawl::{CrawlOptions, execute_crawl, run_crawl};
pub use report::{RankedPage, ReportError, TopN, rank, rank_first_page};

pub fn print_banner() {
    println!("{}", "═".repeat(60).bright_blue().bold());
    println!(
        "  {} {}",
        "slowcrawl".bright_white().bold(),
        env!("CARGO_PKG_VERSION").bright_black()
    );
    println!("  {}", "find the slowest pages of a website".bright_black());
    println!("{}", "═".repeat(60).bright_blue().bold());
}
