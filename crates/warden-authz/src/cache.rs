//! Principal permission caching.
//!
//! Caches each principal's resolved permissions so repeated checks skip the
//! directory. Entries remember the catalog generation they were built from
//! and never answer for a different one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::principal::PrincipalPermissions;

/// Configuration for the permission cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of principals cached. Zero disables caching.
    pub max_entries: usize,
    /// Time-to-live for cached permissions.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            ttl: Duration::from_secs(300), // 5 minutes
        }
    }
}

impl CacheConfig {
    /// Create a production cache configuration.
    pub fn production() -> Self {
        Self {
            max_entries: 50_000,
            ttl: Duration::from_secs(60),
        }
    }

    /// Create a development cache configuration.
    pub fn development() -> Self {
        Self {
            max_entries: 1_000,
            ttl: Duration::from_secs(30),
        }
    }

    /// Disable caching.
    pub fn disabled() -> Self {
        Self {
            max_entries: 0,
            ttl: Duration::ZERO,
        }
    }

    /// Whether caching is enabled.
    pub fn is_enabled(&self) -> bool {
        self.max_entries > 0 && !self.ttl.is_zero()
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    permissions: Arc<PrincipalPermissions>,
    generation: u64,
    created_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() > ttl
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of entries currently in cache.
    pub size: usize,
    /// Number of evictions due to capacity or expiry.
    pub evictions: u64,
}

/// TTL cache of principal permissions.
#[derive(Debug)]
pub struct PermissionCache {
    config: CacheConfig,
    entries: RwLock<HashMap<String, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl PermissionCache {
    /// Create a new cache.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// The cache configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Cached permissions for a principal built from catalog `generation`.
    pub fn get(&self, principal: &str, generation: u64) -> Option<Arc<PrincipalPermissions>> {
        if !self.config.is_enabled() {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        let entries = self.entries.read();
        if let Some(entry) = entries.get(principal) {
            if entry.generation == generation && !entry.is_expired(self.config.ttl) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(Arc::clone(&entry.permissions));
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Cache permissions for a principal.
    pub fn insert(&self, principal: &str, generation: u64, permissions: Arc<PrincipalPermissions>) {
        if !self.config.is_enabled() {
            return;
        }

        let entry = CacheEntry {
            permissions,
            generation,
            created_at: Instant::now(),
        };

        let mut entries = self.entries.write();

        if entries.len() >= self.config.max_entries && !entries.contains_key(principal) {
            self.evict_expired(&mut entries, generation);
        }

        while entries.len() >= self.config.max_entries && !entries.contains_key(principal) {
            if let Some(oldest) = Self::find_oldest(&entries) {
                entries.remove(&oldest);
                self.evictions.fetch_add(1, Ordering::Relaxed);
            } else {
                break;
            }
        }

        entries.insert(principal.to_string(), entry);
    }

    /// Drop one principal's entry.
    pub fn invalidate(&self, principal: &str) -> bool {
        self.entries.write().remove(principal).is_some()
    }

    /// Clear all cached entries.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            size: self.entries.read().len(),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    fn evict_expired(&self, entries: &mut HashMap<String, CacheEntry>, generation: u64) {
        let ttl = self.config.ttl;
        let before = entries.len();
        entries.retain(|_, entry| entry.generation == generation && !entry.is_expired(ttl));
        let evicted = before - entries.len();
        if evicted > 0 {
            self.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
        }
    }

    fn find_oldest(entries: &HashMap<String, CacheEntry>) -> Option<String> {
        entries
            .iter()
            .min_by_key(|(_, entry)| entry.created_at)
            .map(|(key, _)| key.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perms() -> Arc<PrincipalPermissions> {
        Arc::new(PrincipalPermissions::new())
    }

    #[test]
    fn test_cache_hit_miss() {
        let cache = PermissionCache::new(CacheConfig::default());
        assert!(cache.get("alice", 0).is_none());

        cache.insert("alice", 0, perms());
        assert!(cache.get("alice", 0).is_some());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.size, 1);
    }

    #[test]
    fn test_generation_mismatch_is_a_miss() {
        let cache = PermissionCache::new(CacheConfig::default());
        cache.insert("alice", 0, perms());
        assert!(cache.get("alice", 1).is_none());
    }

    #[test]
    fn test_cache_disabled() {
        let cache = PermissionCache::new(CacheConfig::disabled());
        cache.insert("alice", 0, perms());
        assert!(cache.get("alice", 0).is_none());
        assert_eq!(cache.stats().size, 0);
    }

    #[test]
    fn test_expired_entry_is_a_miss() {
        let cache = PermissionCache::new(CacheConfig {
            max_entries: 10,
            ttl: Duration::from_millis(1),
        });
        cache.insert("alice", 0, perms());
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("alice", 0).is_none());
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let cache = PermissionCache::new(CacheConfig {
            max_entries: 2,
            ttl: Duration::from_secs(60),
        });
        cache.insert("alice", 0, perms());
        std::thread::sleep(Duration::from_millis(2));
        cache.insert("bob", 0, perms());
        cache.insert("carol", 0, perms());

        assert!(cache.get("alice", 0).is_none());
        assert!(cache.get("carol", 0).is_some());
        let stats = cache.stats();
        assert_eq!(stats.size, 2);
        assert_eq!(stats.evictions, 1);
    }

    #[test]
    fn test_invalidate_and_clear() {
        let cache = PermissionCache::new(CacheConfig::default());
        cache.insert("alice", 0, perms());
        cache.insert("bob", 0, perms());

        assert!(cache.invalidate("alice"));
        assert!(!cache.invalidate("alice"));
        assert!(cache.get("bob", 0).is_some());

        cache.clear();
        assert!(cache.get("bob", 0).is_none());
    }
}
