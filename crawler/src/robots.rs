use crate::url_norm::host_key;
use parking_lot::Mutex;
use reqwest::{Client, StatusCode};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::time::{timeout_at, Instant};
use url::Url;

/// Longest Crawl-delay honored; larger values are clamped.
pub const MAX_CRAWL_DELAY: Duration = Duration::from_secs(60);

/// Rules of the `*` group of a robots.txt file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Robots {
    allows: Vec<String>,
    disallows: Vec<String>,
    crawl_delay: Option<Duration>,
}

impl Robots {
    pub fn parse(txt: &str) -> Self {
        let mut active = false;
        let mut in_agent_lines = false;
        let mut rules = Robots::default();
        for line in txt.lines() {
            let l = line.split('#').next().unwrap_or("").trim();
            if l.is_empty() { continue; }
            let Some((k, v)) = l.split_once(':') else { continue };
            let key = k.trim().to_lowercase();
            let val = v.trim();
            if key == "user-agent" {
                // consecutive user-agent lines share one group
                if !in_agent_lines { active = false; }
                in_agent_lines = true;
                active |= val == "*";
                continue;
            }
            in_agent_lines = false;
            if !active { continue; }
            match key.as_str() {
                "allow" if !val.is_empty() => rules.allows.push(val.to_string()),
                // an empty Disallow allows everything
                "disallow" if !val.is_empty() => rules.disallows.push(val.to_string()),
                "crawl-delay" => {
                    let parsed = val.parse::<f64>().ok().filter(|s| !s.is_nan() && *s >= 0.0);
                    if let Some(secs) = parsed {
                        let delay = Duration::try_from_secs_f64(secs).unwrap_or(MAX_CRAWL_DELAY);
                        rules.crawl_delay = Some(delay.min(MAX_CRAWL_DELAY));
                    }
                }
                _ => {}
            }
        }
        rules
    }

    /// Longest matching rule wins; Allow wins ties.
    pub fn allows(&self, path: &str) -> bool {
        let longest = |rules: &[String]| rules.iter().filter(|r| path.starts_with(r.as_str())).map(String::len).max();
        match (longest(self.allows.as_slice()), longest(self.disallows.as_slice())) {
            (Some(a), Some(d)) => a >= d,
            (_, None) => true,
            (None, Some(_)) => false,
        }
    }

    pub fn crawl_delay(&self) -> Option<Duration> { self.crawl_delay }
}

/// robots.txt rules per host, fetched once on first use. Workers arriving at
/// a host while its robots.txt is loading wait for that one request.
#[derive(Default)]
pub struct RobotsCache {
    hosts: Mutex<HashMap<String, Arc<OnceCell<Robots>>>>,
}

impl RobotsCache {
    pub fn new() -> Self { Self::default() }

    /// Rules for the host of `url`. A missing, unreachable or slow robots.txt
    /// (past `give_up_at`) is treated as allowing everything.
    pub async fn rules_for(&self, client: &Client, url: &Url, give_up_at: Instant) -> Robots {
        let host = host_key(url);
        let cell = self.hosts.lock().entry(host.clone()).or_default().clone();
        let rules = cell
            .get_or_init(|| async {
                let robots_url = format!("{}://{}/robots.txt", url.scheme(), host);
                let fetch = async {
                    let resp = client.get(&robots_url).send().await.ok()?;
                    if resp.status() != StatusCode::OK { return None; }
                    resp.text().await.ok()
                };
                let txt = timeout_at(give_up_at, fetch).await.ok().flatten().unwrap_or_default();
                let parsed = Robots::parse(&txt);
                tracing::debug!(%host, disallows = parsed.disallows.len(), delay = ?parsed.crawl_delay, "robots.txt loaded");
                parsed
            })
            .await;
        rules.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longest_match_wins() {
        let r = Robots::parse("User-agent: *\nDisallow: /wiki/Special:\nAllow: /wiki/Special:Random\nCrawl-delay: 1.5\n");
        assert!(r.allows("/wiki/Thor"));
        assert!(!r.allows("/wiki/Special:Search"));
        assert!(r.allows("/wiki/Special:Random"));
        assert_eq!(r.crawl_delay(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn only_star_group_applies() {
        let txt = "User-agent: Googlebot\nDisallow: /\n\nUser-agent: other\nUser-agent: *\nDisallow: /private # staff only\n";
        let r = Robots::parse(txt);
        assert!(r.allows("/wiki/Hulk"));
        assert!(!r.allows("/private/notes"));
    }

    #[test]
    fn oversized_crawl_delay_is_clamped() {
        for v in ["1e30", "1e19", "100000", "inf"] {
            let r = Robots::parse(&format!("User-agent: *\nCrawl-delay: {v}\n"));
            assert_eq!(r.crawl_delay(), Some(MAX_CRAWL_DELAY), "Crawl-delay: {v}");
        }
        assert_eq!(Robots::parse("User-agent: *\nCrawl-delay: -3\n").crawl_delay(), None);
        assert_eq!(Robots::parse("User-agent: *\nCrawl-delay: NaN\n").crawl_delay(), None);
    }

    #[test]
    fn empty_disallow_allows_all() {
        let r = Robots::parse("User-agent: *\nDisallow:\n");
        assert!(r.allows("/anything"));
        assert!(Robots::parse("").allows("/"));
    }
}
