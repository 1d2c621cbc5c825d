//! Bounded breadth-first crawler producing a deduplicated corpus.
//!
//! A fixed number of async workers share one FIFO [`frontier::Frontier`] and
//! one [`frontier::SeenSet`]. Every URL is fetched at most once, never deeper
//! than `max_depth`, and no fetch starts after the time limit. Fetches still
//! running at the deadline get `grace_period` to finish; whatever has been
//! emitted by then is the result.

pub mod coordinator;
pub mod fetch;
pub mod frontier;
pub mod politeness;
pub mod robots;
pub mod url_norm;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub use coordinator::{crawl, CrawlOutcome, CrawlStats};
pub use url_norm::normalize_url;

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("no valid seed URLs")]
    NoSeeds,

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("reading seeds: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub max_depth: u32,
    pub time_limit: Duration,
    /// Number of concurrent fetch workers.
    pub concurrency: usize,
    /// Per-request timeout; keep it well under `time_limit`.
    pub request_timeout: Duration,
    /// How long in-flight fetches may run past the deadline.
    pub grace_period: Duration,
    /// Minimum spacing between request starts on one host.
    pub domain_delay: Duration,
    pub max_body_bytes: usize,
    pub user_agent: String,
    /// Follow only links on the hosts of the seed URLs.
    pub same_host_only: bool,
    /// Extra domains (suffix match) whose links are followed.
    pub allowed_domains: Vec<String>,
    pub respect_robots: bool,
}

impl CrawlOptions {
    pub fn new(max_depth: u32, time_limit: Duration) -> Self {
        Self {
            max_depth,
            time_limit,
            concurrency: 16,
            request_timeout: Duration::from_secs(10),
            grace_period: Duration::from_secs(5),
            domain_delay: Duration::from_millis(250),
            max_body_bytes: 2 * 1024 * 1024,
            user_agent: "fandex-crawler/0.1 (+https://example.com/bot)".to_string(),
            same_host_only: true,
            allowed_domains: Vec::new(),
            respect_robots: true,
        }
    }
}

/// Read seed URLs, one per line. Blank lines and `#` comments are skipped and
/// bare hosts get an `https://` scheme.
pub fn load_seeds(path: &Path) -> Result<Vec<String>, CrawlError> {
    let mut seeds = Vec::new();
    for line in BufReader::new(File::open(path)?).lines() {
        let s = line?.trim().to_string();
        if s.is_empty() || s.starts_with('#') { continue; }
        if s.contains("://") { seeds.push(s); } else { seeds.push(format!("https://{s}")); }
    }
    Ok(seeds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn seeds_file_skips_comments_and_adds_scheme() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "# Marvel seeds\nhttps://marvel.fandom.com/wiki/Howard_the_Duck\n\nmarvel.fandom.com/wiki/Thor").unwrap();
        let seeds = load_seeds(f.path()).unwrap();
        assert_eq!(seeds, vec!["https://marvel.fandom.com/wiki/Howard_the_Duck", "https://marvel.fandom.com/wiki/Thor"]);
    }
}
