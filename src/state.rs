use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::db::{Clock, QueryCache, QueryRequest, SystemClock};
use crate::models::{ConnectionDescriptor, QueryResult, Settings};

/// Everything one user's session owns. Passed explicitly into every command.
pub struct Session<C: Clock = SystemClock> {
    pub settings: Settings,

    /// Connection pools, one per distinct descriptor
    connections: Mutex<HashMap<ConnectionDescriptor, PgPool>>,

    /// Descriptor of the connection queries currently run against
    current: Mutex<Option<ConnectionDescriptor>>,

    /// Results keyed by (sql, params)
    cache: Mutex<QueryCache<C>>,
}

impl Session<SystemClock> {
    pub fn new(settings: Settings) -> Self {
        Self::with_clock(settings, SystemClock)
    }
}

impl<C: Clock> Session<C> {
    pub fn with_clock(settings: Settings, clock: C) -> Self {
        let cache = QueryCache::with_clock(settings.cache_ttl(), clock);
        Self {
            settings,
            connections: Mutex::new(HashMap::new()),
            current: Mutex::new(None),
            cache: Mutex::new(cache),
        }
    }

    /// Get the pool for a descriptor, if one was created earlier
    pub fn get_pool(&self, descriptor: &ConnectionDescriptor) -> Option<PgPool> {
        let connections = self.connections.lock().unwrap();
        connections.get(descriptor).cloned()
    }

    pub fn add_pool(&self, descriptor: ConnectionDescriptor, pool: PgPool) {
        let mut connections = self.connections.lock().unwrap();
        connections.insert(descriptor, pool);
    }

    pub fn remove_pool(&self, descriptor: &ConnectionDescriptor) -> Option<PgPool> {
        let mut connections = self.connections.lock().unwrap();
        connections.remove(descriptor)
    }

    pub fn pool_count(&self) -> usize {
        self.connections.lock().unwrap().len()
    }

    pub fn current_descriptor(&self) -> Option<ConnectionDescriptor> {
        self.current.lock().unwrap().clone()
    }

    /// Pool behind the current connection
    pub fn current_pool(&self) -> Option<PgPool> {
        let descriptor = self.current_descriptor()?;
        self.get_pool(&descriptor)
    }

    pub fn is_connected(&self) -> bool {
        self.current_pool().is_some()
    }

    /// Make `descriptor` the connection every later query uses.
    pub fn replace_current(&self, descriptor: ConnectionDescriptor) {
        let mut current = self.current.lock().unwrap();
        *current = Some(descriptor);
    }

    /// Back to "disconnected". Pools stay registered for reuse.
    pub fn reset_current(&self) {
        let mut current = self.current.lock().unwrap();
        *current = None;
    }

    pub fn cached(&self, request: &QueryRequest) -> Option<Arc<QueryResult>> {
        self.cache.lock().unwrap().get(request)
    }

    pub fn store(&self, request: QueryRequest, result: Arc<QueryResult>) {
        let mut cache = self.cache.lock().unwrap();
        cache.expire();
        cache.put(request, result);
    }

    pub fn invalidate_cache(&self) {
        self.cache.lock().unwrap().invalidate_all();
    }

    pub fn cache_len(&self) -> usize {
        self.cache.lock().unwrap().len()
    }

    /// Close every pool and forget the current connection
    pub async fn close_all(&self) {
        self.reset_current();
        let pools: Vec<PgPool> = {
            let mut connections = self.connections.lock().unwrap();
            connections.drain().map(|(_, pool)| pool).collect()
        };
        for pool in pools {
            pool.close().await;
        }
    }
}
