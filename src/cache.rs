//! Short-lived cache of signed fetch results
//!
//! Identical signed requests made in quick succession (upstream retries,
//! several gadgets on one page) are answered from memory instead of being
//! signed and sent again. Keys are the SHA-256 digest of the request plus the
//! signing identity, so two principals never share an entry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::transport::{HttpRequest, HttpResponse};

/// What makes two signed fetches interchangeable
#[derive(Debug, Clone, Copy)]
pub struct CacheIdentity<'a> {
    /// Gadget spec URL
    pub app_url: &'a str,
    /// Service name (empty for signed fetch)
    pub service_name: &'a str,
    /// Token name
    pub token_name: &'a str,
    /// Owner id, when it was signed
    pub owner: Option<&'a str>,
    /// Viewer id, when it was signed or an access token was used
    pub viewer: Option<&'a str>,
}

/// Thread-safe result cache with TTL expiry
pub struct SignedResultCache {
    entries: DashMap<String, CachedResponse>,
    ttl: Duration,
    max_entries: usize,
    stats: CacheStats,
}

struct CachedResponse {
    response: HttpResponse,
    cached_at: Instant,
}

/// Cache statistics tracked atomically
#[derive(Debug, Default)]
struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

/// Snapshot of cache statistics
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatsSnapshot {
    /// Entries served from cache
    pub hits: u64,
    /// Lookups that found nothing usable
    pub misses: u64,
    /// Expired entries removed
    pub evictions: u64,
    /// Current number of entries
    pub size: usize,
}

impl SignedResultCache {
    /// Create a cache; a zero TTL disables it
    #[must_use]
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            max_entries,
            stats: CacheStats::default(),
        }
    }

    /// Whether entries are ever stored
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero() && self.max_entries > 0
    }

    /// Look up a result. Expired entries are evicted.
    pub fn get(&self, key: &str) -> Option<HttpResponse> {
        let Some(entry) = self.entries.get(key) else {
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        };

        if entry.cached_at.elapsed() > self.ttl {
            drop(entry);
            self.entries.remove(key);
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        self.stats.hits.fetch_add(1, Ordering::Relaxed);
        Some(entry.response.clone())
    }

    /// Store a successful result. Full caches drop the insert after evicting
    /// whatever has expired.
    pub fn set(&self, key: &str, response: &HttpResponse) {
        if !self.is_enabled() || !response.is_success() {
            return;
        }
        if self.entries.len() >= self.max_entries {
            self.evict_expired();
            if self.entries.len() >= self.max_entries {
                return;
            }
        }
        self.entries.insert(
            key.to_string(),
            CachedResponse {
                response: response.clone(),
                cached_at: Instant::now(),
            },
        );
    }

    /// Remove expired entries
    pub fn evict_expired(&self) {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.cached_at.elapsed() <= self.ttl);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            self.stats.evictions.fetch_add(removed as u64, Ordering::Relaxed);
        }
    }

    /// Current statistics
    pub fn stats(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            evictions: self.stats.evictions.load(Ordering::Relaxed),
            size: self.entries.len(),
        }
    }

    /// Key for an unsigned request and the identity it will be signed as
    #[must_use]
    pub fn build_key(request: &HttpRequest, identity: &CacheIdentity<'_>) -> String {
        let mut hasher = Sha256::new();
        for part in [
            request.method.as_str().as_bytes(),
            request.url.as_str().as_bytes(),
            request.body.as_slice(),
            identity.app_url.as_bytes(),
            identity.service_name.as_bytes(),
            identity.token_name.as_bytes(),
            identity.owner.unwrap_or_default().as_bytes(),
            identity.viewer.unwrap_or_default().as_bytes(),
        ] {
            // length prefix keeps field boundaries unambiguous
            hasher.update((part.len() as u64).to_be_bytes());
            hasher.update(part);
        }
        format!("{:x}", hasher.finalize())
    }
}
