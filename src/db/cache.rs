use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::db::params::QueryRequest;
use crate::models::QueryResult;

/// Source of "now" for cache expiry.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl ManualClock {
    pub fn new() -> Self {
        ManualClock {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap()
    }
}

struct CacheEntry {
    result: Arc<QueryResult>,
    stored_at: Instant,
}

/// Short-lived query result cache keyed by `(sql, params)`.
///
/// The connection that produced a result is not part of the key.
pub struct QueryCache<C: Clock = SystemClock> {
    entries: HashMap<QueryRequest, CacheEntry>,
    ttl: Duration,
    clock: C,
}

impl QueryCache<SystemClock> {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, SystemClock)
    }
}

impl<C: Clock> QueryCache<C> {
    pub fn with_clock(ttl: Duration, clock: C) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn is_fresh(&self, entry: &CacheEntry, now: Instant) -> bool {
        now.saturating_duration_since(entry.stored_at) < self.ttl
    }

    /// Fresh result for the request, if any. A stale entry is evicted.
    pub fn get(&mut self, request: &QueryRequest) -> Option<Arc<QueryResult>> {
        let now = self.clock.now();
        let fresh = self.entries.get(request).map(|e| self.is_fresh(e, now))?;
        if fresh {
            self.entries.get(request).map(|e| e.result.clone())
        } else {
            self.entries.remove(request);
            None
        }
    }

    pub fn put(&mut self, request: QueryRequest, result: Arc<QueryResult>) {
        let stored_at = self.clock.now();
        self.entries.insert(request, CacheEntry { result, stored_at });
    }

    /// Drop every stale entry; returns how many were removed.
    pub fn expire(&mut self) -> usize {
        let now = self.clock.now();
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries
            .retain(|_, e| now.saturating_duration_since(e.stored_at) < ttl);
        before - self.entries.len()
    }

    pub fn invalidate_all(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
