mod aggregate;
mod config;
mod error;
mod fetch;
mod input;
mod normalize;
mod pipeline;
mod record;
mod sink;
mod sites;

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::Settings;
use crate::fetch::{RetryPolicy, Style, WebSource};
use crate::record::{CanonicalRecord, InputDescriptor};
use crate::sites::Registry;

#[derive(Parser)]
#[command(name = "pharma_scraper", about = "Pharmacy product price scraper")]
struct Cli {
    /// Settings file (default: ./pharma_scraper.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// spider.cloud key for pages that need a rendered browser session
    #[arg(long, env = "SPIDER_API_KEY", hide_env_values = true, global = true)]
    spider_api_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape every URL in the input file and append the results
    Run {
        /// Input CSV (url, product_name, pharmacy)
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Output CSV, appended to
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Only the first N input rows
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Scrape a single URL and print the record as JSON
    Probe { url: String },
    /// List supported pharmacies in dispatch order
    Sites,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let t0 = Instant::now();
    let cli = Cli::parse();

    let settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;
    init_tracing(&settings).context("Failed to set up logging")?;

    let registry = Registry::default();
    let retry = RetryPolicy {
        max_retries: settings.scraper.max_retries,
        base_backoff: settings.scraper.retry_backoff(),
    };

    let result = match cli.command {
        Commands::Run {
            input,
            output,
            limit,
        } => {
            let input = input.unwrap_or_else(|| settings.paths.input_file.clone());
            let output = output.unwrap_or_else(|| settings.paths.output_file.clone());

            let mut descriptors = input::read_descriptors(&input)
                .with_context(|| format!("Failed to read input {}", input.display()))?;
            if let Some(n) = limit {
                descriptors.truncate(n);
            }
            if descriptors.is_empty() {
                println!("No URLs to scrape in {}.", input.display());
                return Ok(());
            }

            let source = WebSource::new(&settings.scraper, cli.spider_api_key)
                .context("Failed to build HTTP client")?;
            let date = today();

            let t_scrape = Instant::now();
            println!("Scraping {} URLs...", descriptors.len());
            let report = pipeline::run(&registry, &source, &descriptors, &date, retry).await;
            println!(
                "Scraped {} URLs ({} ok, {} skipped) in {:.1}s",
                report.total,
                report.scraped(),
                report.failures.len(),
                t_scrape.elapsed().as_secs_f64()
            );
            for (kind, n) in report.failure_kinds() {
                println!("  {:<20} {}", kind, n);
            }
            for failure in &report.failures {
                println!("  skipped {} ({})", failure.url, failure.error.kind());
            }
            if report.table.is_empty() {
                println!("Nothing to append to {}.", output.display());
                return Ok(());
            }

            let outcome = pipeline::finalize(report.table, &output)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!(
                "Appended {} rows to {} ({} dropped during normalization).",
                outcome.written,
                output.display(),
                outcome.dropped.len()
            );
            Ok(())
        }
        Commands::Probe { url } => {
            let source = WebSource::new(&settings.scraper, cli.spider_api_key)
                .context("Failed to build HTTP client")?;
            let descriptor = InputDescriptor {
                url: url.clone(),
                declared_product_name: String::new(),
                declared_source_name: String::new(),
            };
            let record: CanonicalRecord =
                pipeline::scrape_one(&registry, &source, &descriptor, &today(), retry)
                    .await
                    .with_context(|| format!("Failed to scrape {}", url))?;
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        Commands::Sites => {
            println!(
                "{:>3} | {:<15} | {:<22} | {:<28} | {}",
                "#", "Site", "Host fragment", "Acquisition", "Required"
            );
            println!("{}", "-".repeat(110));
            for (i, (fragment, site)) in registry.routes().iter().enumerate() {
                let style = match site.style() {
                    Style::Static => "static".to_string(),
                    Style::Rendered(wait) => {
                        format!("rendered ({}s)", wait.timeout.as_secs())
                    }
                };
                let required: Vec<&str> = site.required().iter().map(|f| f.as_str()).collect();
                println!(
                    "{:>3} | {:<15} | {:<22} | {:<28} | {}",
                    i + 1,
                    site,
                    fragment,
                    style,
                    required.join(", ")
                );
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

/// Human-readable events on stderr plus a plain copy appended to the log file.
/// `RUST_LOG` overrides the configured level.
fn init_tracing(settings: &Settings) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.logging.level))
        .context("Invalid log level")?;

    let log_file = open_log_file(&settings.paths.log_file)?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(log_file)),
        )
        .try_init()
        .context("Tracing already initialised")?;
    Ok(())
}

fn open_log_file(path: &Path) -> anyhow::Result<fs::File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}

fn today() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
