// In-memory TTL cache store.
// Handles per-entry expiry, substring invalidation, and the periodic sweep.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Default TTL when a `set` call does not specify one: 5 minutes.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Interval of the passive expiry sweep.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// A cached value with its insertion and expiry times.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub data: T,
    pub timestamp: Instant,
    pub expires_at: Instant,
}

impl<T> CacheEntry<T> {
    pub fn new(data: T, ttl: Duration) -> Self {
        let timestamp = Instant::now();
        Self {
            data,
            timestamp,
            expires_at: timestamp + ttl,
        }
    }

    /// An entry is valid up to and including its expiry instant.
    pub fn is_valid_at(&self, now: Instant) -> bool {
        now <= self.expires_at
    }

    pub fn is_expired_at(&self, now: Instant) -> bool {
        !self.is_valid_at(now)
    }
}

/// Process-local key-value store with expiry.
///
/// Clones share the same entries, so one instance can be handed to the API
/// client and to a sweeper task.
pub struct TtlCache<T> {
    entries: Arc<RwLock<HashMap<String, CacheEntry<T>>>>,
    /// Bumped under the write lock by every removal other than expiry.
    generation: Arc<AtomicU64>,
    default_ttl: Duration,
}

impl<T> Clone for TtlCache<T> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            generation: Arc::clone(&self.generation),
            default_ttl: self.default_ttl,
        }
    }
}

impl<T> Default for TtlCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for TtlCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("entries", &self.read().len())
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

impl<T> TtlCache<T> {
    pub fn new() -> Self {
        Self::with_default_ttl(DEFAULT_TTL)
    }

    pub fn with_default_ttl(default_ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            generation: Arc::new(AtomicU64::new(0)),
            default_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    // A panic while holding the lock cannot leave a half-written entry, so
    // poisoning is ignored.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, CacheEntry<T>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, CacheEntry<T>>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a value with the default TTL, replacing any existing entry.
    pub fn set(&self, key: impl Into<String>, value: T) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    /// Store a value that expires `ttl` from now, replacing any existing entry.
    pub fn set_with_ttl(&self, key: impl Into<String>, value: T, ttl: Duration) {
        let key = key.into();
        tracing::trace!(key = %key, ttl_ms = ttl.as_millis() as u64, "cache set");
        self.write().insert(key, CacheEntry::new(value, ttl));
    }

    /// Invalidation counter. Take it before fetching a value that will be
    /// stored with [`TtlCache::set_if_generation`].
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn bump_generation(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Store a value only if nothing was invalidated since `generation` was read.
    ///
    /// Returns false, storing nothing, when a delete or invalidation happened in
    /// between; the value may predate that write.
    pub fn set_if_generation(
        &self,
        key: impl Into<String>,
        value: T,
        ttl: Duration,
        generation: u64,
    ) -> bool {
        let key = key.into();
        let mut entries = self.write();
        if self.generation() != generation {
            tracing::debug!(key = %key, "cache invalidated during fetch, not storing");
            return false;
        }
        entries.insert(key, CacheEntry::new(value, ttl));
        true
    }

    /// Remove a key. Absent keys are ignored.
    pub fn delete(&self, key: &str) {
        let mut entries = self.write();
        entries.remove(key);
        self.bump_generation();
    }

    /// Remove every entry whose key contains `pattern`. Returns how many were removed.
    pub fn invalidate_pattern(&self, pattern: &str) -> usize {
        let mut entries = self.write();
        self.bump_generation();

        let matching: Vec<String> = entries
            .keys()
            .filter(|key| key.contains(pattern))
            .cloned()
            .collect();

        for key in &matching {
            entries.remove(key);
        }

        if !matching.is_empty() {
            tracing::debug!(pattern, removed = matching.len(), "cache invalidated");
        }
        matching.len()
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn clear_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.write();

        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            entries.remove(key);
        }

        if !expired.is_empty() {
            tracing::debug!(removed = expired.len(), "expired cache entries swept");
        }
        expired.len()
    }

    /// Whether a valid (unexpired) entry exists for `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.read()
            .get(key)
            .is_some_and(|entry| entry.is_valid_at(Instant::now()))
    }

    /// Number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn clear(&self) {
        let mut entries = self.write();
        entries.clear();
        self.bump_generation();
    }
}

impl<T: Clone> TtlCache<T> {
    /// Return the value for `key` if it has not expired.
    ///
    /// Expired entries are removed on access.
    pub fn get(&self, key: &str) -> Option<T> {
        let now = Instant::now();
        {
            let entries = self.read();
            match entries.get(key) {
                None => return None,
                Some(entry) if entry.is_valid_at(now) => return Some(entry.data.clone()),
                Some(_) => {}
            }
        }

        // Re-check under the write lock; another caller may have refreshed it.
        let mut entries = self.write();
        match entries.get(key) {
            Some(entry) if entry.is_valid_at(now) => Some(entry.data.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }
}

impl<T: Send + Sync + 'static> TtlCache<T> {
    /// Run [`TtlCache::clear_expired`] every `interval` on the tokio runtime.
    pub fn spawn_sweeper(&self, interval: Duration) -> SweeperHandle {
        let cache = self.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                cache.clear_expired();
            }
        });
        SweeperHandle { task }
    }
}

/// Owns the background sweep task; stopping or dropping it ends the sweep.
#[derive(Debug)]
pub struct SweeperHandle {
    task: JoinHandle<()>,
}

impl SweeperHandle {
    pub fn stop(self) {
        // Drop aborts the task
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
