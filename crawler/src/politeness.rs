use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Per-host request spacing. Each call reserves the next free start slot for
/// the host, so concurrent workers hitting one site are serialized at
/// `delay` intervals while different hosts proceed independently.
#[derive(Default)]
pub struct DomainThrottle {
    next_slot: Mutex<HashMap<String, Instant>>,
}

impl DomainThrottle {
    pub fn new() -> Self { Self::default() }

    /// Instant at which a request to `host` may start.
    pub fn reserve(&self, host: &str, delay: Duration) -> Instant {
        let now = Instant::now();
        let mut slots = self.next_slot.lock();
        let slot = slots.get(host).copied().filter(|t| *t > now).unwrap_or(now);
        // an absurd delay saturates instead of overflowing the clock
        let next = slot.checked_add(delay).unwrap_or(slot + Duration::from_secs(86_400 * 365));
        slots.insert(host.to_string(), next);
        slot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn spaces_requests_per_host() {
        let t = DomainThrottle::new();
        let delay = Duration::from_millis(200);
        let a1 = t.reserve("a.test", delay);
        let a2 = t.reserve("a.test", delay);
        let a3 = t.reserve("a.test", delay);
        let b1 = t.reserve("b.test", delay);
        assert_eq!(a2 - a1, delay);
        assert_eq!(a3 - a2, delay);
        assert!(b1 <= a1 + Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn huge_delay_does_not_overflow() {
        let t = DomainThrottle::new();
        let first = t.reserve("a.test", Duration::MAX);
        let second = t.reserve("a.test", Duration::MAX);
        assert!(second > first);
    }

    #[tokio::test(start_paused = true)]
    async fn free_slot_after_idle() {
        let t = DomainThrottle::new();
        let delay = Duration::from_millis(100);
        t.reserve("a.test", delay);
        tokio::time::advance(Duration::from_secs(1)).await;
        let later = t.reserve("a.test", delay);
        assert!(later >= Instant::now() - Duration::from_millis(1));
    }
}
