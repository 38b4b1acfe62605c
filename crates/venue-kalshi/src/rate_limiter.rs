//! Two independent token buckets gating read and write traffic to the venue (§4.2).
//!
//! Each bucket refills continuously at `rate` tokens/sec using monotonic time
//! deltas rather than a fixed tick, so bursts after an idle period see a full
//! bucket instead of being starved by tick granularity.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

struct Bucket {
    rate: f64,
    capacity: f64,
    tokens: f64,
    last_refill: Instant,
}

impl Bucket {
    fn new(rate: f64) -> Self {
        Self {
            rate,
            capacity: rate,
            tokens: rate,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate).min(self.capacity);
        self.last_refill = now;
    }

    /// Returns the wait needed before `n` tokens are available, or `None` if
    /// they're available now. Deducts eagerly either way so concurrent
    /// callers serialize against the same bucket instead of over-draining it.
    fn reserve(&mut self, n: f64) -> Option<Duration> {
        let now = Instant::now();
        self.refill(now);
        if self.tokens >= n {
            self.tokens -= n;
            return None;
        }
        let deficit = n - self.tokens;
        let wait = Duration::from_secs_f64(deficit / self.rate);
        self.tokens = 0.0;
        Some(wait)
    }
}

/// Which bucket a request draws from. `{GET, HEAD, OPTIONS}` are reads;
/// everything else (POST, DELETE, ...) is a write (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketKind {
    Read,
    Write,
}

impl BucketKind {
    #[must_use]
    pub fn for_method(method: &str) -> Self {
        match method.to_ascii_uppercase().as_str() {
            "GET" | "HEAD" | "OPTIONS" => Self::Read,
            _ => Self::Write,
        }
    }
}

pub struct RateLimiter {
    read: Mutex<Bucket>,
    write: Mutex<Bucket>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(read_rate: f64, write_rate: f64) -> Self {
        Self {
            read: Mutex::new(Bucket::new(read_rate)),
            write: Mutex::new(Bucket::new(write_rate)),
        }
    }

    /// Waits, if necessary, for `n` tokens to be available on the bucket
    /// selected by `kind`, then deducts them.
    pub async fn acquire(&self, kind: BucketKind, n: u32) {
        let wait = {
            let mut bucket = match kind {
                BucketKind::Read => self.read.lock(),
                BucketKind::Write => self.write.lock(),
            };
            bucket.reserve(f64::from(n))
        };
        if let Some(wait) = wait {
            tokio::time::sleep(wait).await;
        }
    }
}
