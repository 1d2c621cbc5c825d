use crate::fetch::{build_client, fetch_html, parse_page, FetchFailure};
use crate::frontier::{Frontier, FrontierEntry, SeenSet};
use crate::politeness::DomainThrottle;
use crate::robots::RobotsCache;
use crate::url_norm::{host_key, normalize_url};
use crate::{CrawlError, CrawlOptions};
use fandex_core::{Corpus, Document};
use parking_lot::Mutex;
use reqwest::Client;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio::task::JoinSet;
use tokio::time::{sleep_until, timeout_at, Instant};
use url::Url;

const IDLE_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlStats {
    pub emitted: usize,
    /// Fetches started.
    pub fetched: usize,
    pub failed: usize,
    pub disallowed: usize,
    /// Distinct normalized URLs ever enqueued.
    pub discovered: usize,
    /// Entries still in the frontier when the crawl ended.
    pub unvisited: usize,
    /// The time limit cut the crawl short.
    pub deadline_reached: bool,
    pub elapsed: Duration,
}

#[derive(Debug)]
pub struct CrawlOutcome {
    pub corpus: Corpus,
    pub stats: CrawlStats,
}

struct LinkScope {
    seed_hosts: HashSet<String>,
    allowed_domains: Vec<String>,
    same_host_only: bool,
}

impl LinkScope {
    fn permits(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else { return false };
        if self.seed_hosts.contains(&host_key(url)) { return true; }
        if self.allowed_domains.iter().any(|d| host == d.as_str() || host.ends_with(&format!(".{d}"))) { return true; }
        !self.same_host_only && self.allowed_domains.is_empty()
    }
}

#[derive(Default)]
struct Counters {
    fetched: AtomicUsize,
    failed: AtomicUsize,
    disallowed: AtomicUsize,
    deadline_hit: AtomicBool,
}

struct CrawlContext {
    opts: CrawlOptions,
    client: Client,
    frontier: Frontier,
    seen: SeenSet,
    throttle: DomainThrottle,
    robots: RobotsCache,
    scope: LinkScope,
    deadline: Instant,
    hard_stop: Instant,
    counters: Counters,
    documents: Mutex<Vec<Document>>,
}

/// Crawl breadth-first from `seeds` within `opts.max_depth` and
/// `opts.time_limit`.
///
/// Fetch failures are counted, never returned; the only errors are an
/// unusable seed list or an HTTP client that cannot be built. Reaching the
/// time limit yields the documents emitted so far.
pub async fn crawl(seeds: &[String], opts: &CrawlOptions) -> Result<CrawlOutcome, CrawlError> {
    let started = Instant::now();
    let deadline = started + opts.time_limit;
    let hard_stop = deadline + opts.grace_period;
    let client = build_client(opts)?;

    let frontier = Frontier::new();
    let seen = SeenSet::new();
    let mut seed_hosts = HashSet::new();
    for raw in seeds {
        match normalize_url(raw) {
            Ok(url) => {
                seed_hosts.insert(host_key(&url));
                if seen.insert(url.as_str()) {
                    frontier.push(url, 0);
                }
            }
            Err(e) => tracing::warn!(error = %e, "ignoring seed"),
        }
    }
    if frontier.is_empty() {
        return Err(CrawlError::NoSeeds);
    }
    tracing::info!(
        seeds = frontier.len(),
        max_depth = opts.max_depth,
        time_limit_s = opts.time_limit.as_secs_f64(),
        concurrency = opts.concurrency,
        "crawl started"
    );

    let scope = LinkScope {
        seed_hosts,
        allowed_domains: opts.allowed_domains.iter().map(|d| d.trim_start_matches('.').to_ascii_lowercase()).collect(),
        same_host_only: opts.same_host_only,
    };
    let ctx = Arc::new(CrawlContext {
        opts: opts.clone(),
        client,
        frontier,
        seen,
        throttle: DomainThrottle::new(),
        robots: RobotsCache::new(),
        scope,
        deadline,
        hard_stop,
        counters: Counters::default(),
        documents: Mutex::new(Vec::new()),
    });

    let mut workers = JoinSet::new();
    for id in 0..opts.concurrency.max(1) {
        workers.spawn(worker(id, ctx.clone()));
    }

    let mut aborted = false;
    loop {
        match timeout_at(hard_stop, workers.join_next()).await {
            Ok(Some(Err(e))) if e.is_panic() => tracing::error!(error = %e, "crawl worker panicked"),
            Ok(Some(_)) => {}
            Ok(None) => break,
            Err(_) => {
                tracing::warn!(workers = workers.len(), "grace period over, abandoning in-flight fetches");
                workers.abort_all();
                while workers.join_next().await.is_some() {}
                aborted = true;
                break;
            }
        }
    }

    let corpus = std::mem::take(&mut *ctx.documents.lock());
    let unvisited = ctx.frontier.len();
    let stats = CrawlStats {
        emitted: corpus.len(),
        fetched: ctx.counters.fetched.load(Ordering::Relaxed),
        failed: ctx.counters.failed.load(Ordering::Relaxed),
        disallowed: ctx.counters.disallowed.load(Ordering::Relaxed),
        discovered: ctx.seen.len(),
        unvisited,
        deadline_reached: aborted || ctx.counters.deadline_hit.load(Ordering::Relaxed),
        elapsed: started.elapsed(),
    };
    tracing::info!(
        emitted = stats.emitted,
        failed = stats.failed,
        discovered = stats.discovered,
        unvisited = stats.unvisited,
        deadline_reached = stats.deadline_reached,
        elapsed_s = stats.elapsed.as_secs_f64(),
        "crawl finished"
    );
    Ok(CrawlOutcome { corpus, stats })
}

async fn worker(id: usize, ctx: Arc<CrawlContext>) {
    loop {
        if Instant::now() >= ctx.deadline {
            if !ctx.frontier.is_drained() {
                ctx.counters.deadline_hit.store(true, Ordering::Relaxed);
            }
            break;
        }
        let Some((entry, _claim)) = ctx.frontier.pop() else {
            if ctx.frontier.is_drained() {
                ctx.frontier.wake_all();
                break;
            }
            ctx.frontier.wait(IDLE_POLL).await;
            continue;
        };
        ctx.visit(entry).await;
    }
    tracing::trace!(worker = id, "worker done");
}

impl CrawlContext {
    /// Frontier → Fetching → Parsed → Emitted, or Failed.
    async fn visit(&self, entry: FrontierEntry) {
        let FrontierEntry { url, depth } = entry;
        if depth > self.opts.max_depth { return; }

        let mut delay = self.opts.domain_delay;
        if self.opts.respect_robots {
            let rules = self.robots.rules_for(&self.client, &url, self.hard_stop).await;
            if !rules.allows(url.path()) {
                self.counters.disallowed.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(%url, "disallowed by robots.txt");
                return;
            }
            if let Some(d) = rules.crawl_delay() { delay = delay.max(d); }
        }

        let start_at = self.throttle.reserve(&host_key(&url), delay);
        if start_at >= self.deadline {
            self.counters.deadline_hit.store(true, Ordering::Relaxed);
            return;
        }
        sleep_until(start_at).await;
        if Instant::now() >= self.deadline {
            self.counters.deadline_hit.store(true, Ordering::Relaxed);
            return;
        }

        self.counters.fetched.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(%url, depth, "fetching");
        let page = match timeout_at(self.hard_stop, fetch_html(&self.client, &url, self.opts.max_body_bytes)).await {
            Ok(Ok(page)) => page,
            Ok(Err(failure)) => return self.fail(&url, failure),
            Err(_) => {
                self.counters.deadline_hit.store(true, Ordering::Relaxed);
                return self.fail(&url, FetchFailure::Timeout);
            }
        };
        let parsed = parse_page(&page.body, &page.final_url);
        if parsed.title.is_empty() && parsed.text.is_empty() {
            return self.fail(&url, FetchFailure::Empty);
        }

        if depth < self.opts.max_depth {
            for link in parsed.links.iter().filter(|l| self.scope.permits(l)) {
                if self.seen.insert(link.as_str()) {
                    self.frontier.push(link.clone(), depth + 1);
                }
            }
        }

        let links = parsed.links.iter().map(Url::to_string).collect();
        let mut doc = Document::new(url.as_str(), parsed.title, parsed.text, links, depth);
        doc.fetched_at = OffsetDateTime::now_utc().format(&Rfc3339).ok();
        let emitted = {
            let mut docs = self.documents.lock();
            docs.push(doc);
            docs.len()
        };
        if emitted % 100 == 0 {
            tracing::info!(emitted, frontier = self.frontier.len(), discovered = self.seen.len(), "progress");
        }
    }

    fn fail(&self, url: &Url, failure: FetchFailure) {
        self.counters.failed.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(%url, reason = %failure, "fetch failed");
    }
}
