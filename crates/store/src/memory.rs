use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use fomo_core::{CounterWindow, ExpiryPolicy};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::{CounterStore, StoreError};

const PURGE_THRESHOLD: usize = 4_096;

#[derive(Clone, Copy, Debug)]
struct Counter {
    value: u64,
    expires_at: Instant,
}

/// Process-local counter store.
///
/// The mutex linearises increments, which gives the same per-key guarantees as
/// the Redis transaction. Expiry uses the tokio clock so tests can pause and
/// advance time.
pub struct InMemoryCounterStore {
    window: CounterWindow,
    counters: Mutex<Counters>,
}

struct Counters {
    entries: HashMap<String, Counter>,
    next_purge_at: Instant,
}

impl Counters {
    /// Drops expired entries at most once per window, and only once the map
    /// has grown past `PURGE_THRESHOLD`.
    fn purge_expired(&mut self, now: Instant, ttl: Duration) {
        if self.entries.len() <= PURGE_THRESHOLD || now < self.next_purge_at {
            return;
        }
        self.entries.retain(|_, counter| counter.expires_at > now);
        self.next_purge_at = now + ttl;
    }
}

impl InMemoryCounterStore {
    pub fn new(window: CounterWindow) -> Self {
        let counters = Counters { entries: HashMap::new(), next_purge_at: Instant::now() };
        Self { window, counters: Mutex::new(counters) }
    }

    pub async fn value(&self, key: &str) -> Option<u64> {
        let now = Instant::now();
        let counters = self.counters.lock().await;
        counters
            .entries
            .get(key)
            .filter(|counter| counter.expires_at > now)
            .map(|counter| counter.value)
    }

    /// Residual time-to-live, `None` once the counter has expired.
    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let counters = self.counters.lock().await;
        counters
            .entries
            .get(key)
            .filter(|counter| counter.expires_at > now)
            .map(|counter| counter.expires_at - now)
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn incr(&self, key: &str) -> Result<u64, StoreError> {
        let now = Instant::now();
        let ttl = self.window.ttl;
        let mut counters = self.counters.lock().await;

        counters.purge_expired(now, ttl);

        let counter = counters
            .entries
            .entry(key.to_owned())
            .and_modify(|counter| {
                if counter.expires_at <= now {
                    *counter = Counter { value: 0, expires_at: now + ttl };
                }
            })
            .or_insert(Counter { value: 0, expires_at: now + ttl });

        counter.value += 1;
        if self.window.policy == ExpiryPolicy::Sliding {
            counter.expires_at = now + ttl;
        }

        Ok(counter.value)
    }

    async fn healthy(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
