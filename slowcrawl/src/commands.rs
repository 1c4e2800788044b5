use crate::CLAP_STYLING;
use clap::arg;
use std::path::PathBuf;

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("slowcrawl")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("slowcrawl")
        .about("Crawls a website in a real browser and reports its slowest pages")
        .styles(CLAP_STYLING)
        .arg(
            arg!(<URL>)
                .help("The start page. https:// is assumed when no scheme is given"),
        )
        .arg(
            arg!(<TOP_N>)
                .help("How many of the slowest pages to show, or 'all'")
                .allow_negative_numbers(true),
        )
        .arg(
            arg!(--"no-first-page")
                .help("Skip measuring the start page's links before the crawl")
                .required(false),
        )
        .arg(
            arg!(--"save-csv" <FILE>)
                .required(false)
                .help("Also write the ranked pages to a CSV file"),
        )
        .arg(
            arg!(-o --"output" <FILE>)
                .required(false)
                .help("Save the text report to a file")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            arg!(-f --"format" <FORMAT>)
                .required(false)
                .help("Report format")
                .value_parser(["text", "json"])
                .default_value("text"),
        )
        .arg(
            arg!(-b --"browser" <BROWSER>)
                .required(false)
                .help("Browser to drive: chrome, yandex or firefox")
                .default_value("chrome"),
        )
        .arg(
            arg!(--"webdriver-url" <URL>)
                .required(false)
                .env("SLOWCRAWL_WEBDRIVER_URL")
                .help(
                    "Running WebDriver endpoint for firefox. Without it a local geckodriver is \
                started.",
                ),
        )
        .arg(
            arg!(--"browser-path" <PATH>)
                .required(false)
                .help("Browser executable to launch instead of the detected one")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            arg!(-t --"timeout" <SECONDS>)
                .required(false)
                .help("Timeout for each browser command")
                .value_parser(clap::value_parser!(u64).range(1..))
                .default_value("30"),
        )
        .arg(
            arg!(--"settle-ms" <MS>)
                .required(false)
                .help("Pause after each page load; the start page waits twice as long")
                .value_parser(clap::value_parser!(u64))
                .default_value("1000"),
        )
        .arg(
            arg!(--"max-pages" <N>)
                .required(false)
                .help("Stop after this many pages have been visited")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            arg!(--"headed")
                .help("Show the browser window instead of running headless")
                .required(false),
        )
        .arg(arg!(-q --"quiet" "Suppress banner and progress output").required(false))
        .arg(arg!(-v --"verbose" "Log every page and link decision to stderr").required(false))
}
