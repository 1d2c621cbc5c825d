//! Shared crawl state: the FIFO frontier and the seen-set. Each has its own
//! lock, and neither lock is ever held across an `.await`.

use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    pub url: Url,
    pub depth: u32,
}

/// FIFO of URLs waiting to be fetched plus a count of entries currently being
/// processed, so idle workers can tell "empty for now" from "finished".
#[derive(Default)]
pub struct Frontier {
    queue: Mutex<VecDeque<FrontierEntry>>,
    in_flight: AtomicUsize,
    notify: Notify,
}

impl Frontier {
    pub fn new() -> Self { Self::default() }

    pub fn push(&self, url: Url, depth: u32) {
        self.queue.lock().push_back(FrontierEntry { url, depth });
        self.notify.notify_waiters();
    }

    /// Take the next entry. It counts as in flight until the returned
    /// [`InFlight`] is dropped, which the holder does after pushing any links
    /// it found. Dropping also happens on panic or task abort.
    pub fn pop(&self) -> Option<(FrontierEntry, InFlight<'_>)> {
        let mut q = self.queue.lock();
        let entry = q.pop_front()?;
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        Some((entry, InFlight { frontier: self }))
    }

    /// Nothing queued and nothing in progress that could still add work.
    pub fn is_drained(&self) -> bool {
        let q = self.queue.lock();
        q.is_empty() && self.in_flight.load(Ordering::SeqCst) == 0
    }

    pub fn len(&self) -> usize { self.queue.lock().len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Park until the frontier changes or `max` elapses.
    pub async fn wait(&self, max: Duration) {
        let _ = tokio::time::timeout(max, self.notify.notified()).await;
    }

    pub fn wake_all(&self) { self.notify.notify_waiters(); }
}

/// Claim on one popped frontier entry.
pub struct InFlight<'a> {
    frontier: &'a Frontier,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.frontier.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.frontier.notify.notify_waiters();
    }
}

/// Normalized URLs that have been enqueued at least once.
#[derive(Default)]
pub struct SeenSet {
    urls: Mutex<HashSet<String>>,
}

impl SeenSet {
    pub fn new() -> Self { Self::default() }

    /// Returns `true` if the URL was not seen before.
    pub fn insert(&self, normalized: &str) -> bool {
        let mut urls = self.urls.lock();
        if urls.contains(normalized) { return false; }
        urls.insert(normalized.to_string())
    }

    pub fn contains(&self, normalized: &str) -> bool { self.urls.lock().contains(normalized) }

    pub fn len(&self) -> usize { self.urls.lock().len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}
