use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::cache::ProductCache;

// ---------------------------------------------------------------------------
// SessionStateStore
// ---------------------------------------------------------------------------

/// Read/write slot for each session's product cache.
///
/// The store owns the cache for the lifetime of the session; cache operations
/// only ever see the value handed to them. Implementations do not serialize
/// concurrent writers for the same session: callers hold one in-flight
/// load → merge → store sequence per session at a time.
pub trait SessionStateStore: Send + Sync {
    /// The session's cache, or an empty one if nothing was stored yet.
    fn load(&self, session_id: &str) -> ProductCache;

    fn store(&self, session_id: &str, cache: ProductCache);

    /// Drop the session's cache. No-op for unknown sessions.
    fn discard(&self, session_id: &str);
}

// ---------------------------------------------------------------------------
// InMemorySessionStore
// ---------------------------------------------------------------------------

/// How long an untouched session keeps its cache by default.
pub const DEFAULT_SESSION_IDLE: Duration = Duration::from_secs(60 * 60);

#[derive(Debug)]
struct Slot {
    cache: ProductCache,
    touched: Instant,
}

/// Process-local [`SessionStateStore`].
///
/// Sessions are rarely ended explicitly, so a cache nobody has loaded or
/// stored for `idle_ttl` is dropped. Expired entries are swept on every
/// store and an expired session loads as empty.
#[derive(Debug)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, Slot>>,
    idle_ttl: Duration,
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::with_idle_ttl(DEFAULT_SESSION_IDLE)
    }
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_idle_ttl(idle_ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            idle_ttl,
        }
    }

    /// Number of sessions currently holding a cache.
    pub fn session_count(&self) -> usize {
        self.lock().len()
    }

    /// Drop every session idle for longer than the TTL; returns how many.
    pub fn evict_idle(&self) -> usize {
        let mut sessions = self.lock();
        let before = sessions.len();
        sessions.retain(|_, slot| slot.touched.elapsed() <= self.idle_ttl);
        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::debug!(evicted, "evicted idle session caches");
        }
        evicted
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Slot>> {
        // A panic while holding the lock cannot leave a half-written cache
        // behind (values are swapped whole), so poisoning is ignored.
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SessionStateStore for InMemorySessionStore {
    fn load(&self, session_id: &str) -> ProductCache {
        let mut sessions = self.lock();
        match sessions.get_mut(session_id) {
            Some(slot) if slot.touched.elapsed() <= self.idle_ttl => {
                slot.touched = Instant::now();
                slot.cache.clone()
            }
            Some(_) => {
                sessions.remove(session_id);
                ProductCache::default()
            }
            None => ProductCache::default(),
        }
    }

    fn store(&self, session_id: &str, cache: ProductCache) {
        self.evict_idle();
        self.lock().insert(
            session_id.to_string(),
            Slot {
                cache,
                touched: Instant::now(),
            },
        );
    }

    fn discard(&self, session_id: &str) {
        self.lock().remove(session_id);
    }
}
