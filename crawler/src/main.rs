use anyhow::{bail, Context, Result};
use clap::Parser;
use crawler::{crawl, load_seeds, CrawlOptions};
use fandex_core::corpus::write_corpus;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "crawler")]
#[command(about = "Crawl fan-wiki pages breadth-first into a JSONL corpus")]
struct Cli {
    /// File with seed URLs (one per line)
    #[arg(long)]
    seeds: Option<PathBuf>,
    /// Seed URL; may be repeated
    #[arg(long = "seed")]
    seed: Vec<String>,
    /// Maximum link distance from a seed
    #[arg(long, default_value_t = 2)]
    max_depth: u32,
    /// Wall-clock budget in seconds
    #[arg(long, default_value_t = 1800)]
    time_limit: u64,
    /// Output JSONL corpus path
    #[arg(long, default_value = "./corpus.jsonl")]
    output: PathBuf,
    /// Concurrency (number of workers)
    #[arg(long, default_value_t = 16)]
    concurrency: usize,
    /// Request timeout seconds
    #[arg(long, default_value_t = 10)]
    request_timeout_secs: u64,
    /// Seconds in-flight fetches may run past the time limit
    #[arg(long, default_value_t = 5)]
    grace_secs: u64,
    /// Minimum delay between requests to one host, in milliseconds
    #[arg(long, default_value_t = 250)]
    domain_delay_ms: u64,
    /// Largest response body accepted
    #[arg(long, default_value_t = 2 * 1024 * 1024)]
    max_body_bytes: usize,
    /// User-Agent string to use for robots.txt and crawling
    #[arg(long, default_value = "fandex-crawler/0.1 (+https://example.com/bot)")]
    user_agent: String,
    /// Also follow links into this domain; may be repeated
    #[arg(long = "allow-domain")]
    allow_domain: Vec<String>,
    /// Follow links to any host
    #[arg(long, default_value_t = false)]
    any_host: bool,
    /// Do not fetch or honor robots.txt
    #[arg(long, default_value_t = false)]
    ignore_robots: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let args = Cli::parse();

    let mut seeds = args.seed.clone();
    if let Some(path) = &args.seeds {
        seeds.extend(load_seeds(path).with_context(|| format!("reading seeds {}", path.display()))?);
    }
    if seeds.is_empty() {
        bail!("no seeds given; use --seeds FILE or --seed URL");
    }

    let mut opts = CrawlOptions::new(args.max_depth, Duration::from_secs(args.time_limit));
    opts.concurrency = args.concurrency;
    opts.request_timeout = Duration::from_secs(args.request_timeout_secs);
    opts.grace_period = Duration::from_secs(args.grace_secs);
    opts.domain_delay = Duration::from_millis(args.domain_delay_ms);
    opts.max_body_bytes = args.max_body_bytes;
    opts.user_agent = args.user_agent.clone();
    opts.same_host_only = !args.any_host;
    opts.allowed_domains = args.allow_domain.clone();
    opts.respect_robots = !args.ignore_robots;

    let outcome = crawl(&seeds, &opts).await?;
    write_corpus(&args.output, &outcome.corpus)
        .with_context(|| format!("writing corpus {}", args.output.display()))?;
    tracing::info!(
        documents = outcome.corpus.len(),
        failed = outcome.stats.failed,
        deadline_reached = outcome.stats.deadline_reached,
        output = %args.output.display(),
        "corpus written"
    );
    Ok(())
}
