use lru::LruCache;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::time::{Duration, Instant};

use crate::logging::log_cache_event;

/// Identity of a completion request for caching purposes.
///
/// Two keys are equal only when model, temperature, token budget and the
/// full prompt text all match. The prompt is held as its SHA-256 digest so
/// long prompts do not inflate the key.
#[derive(Debug, Clone)]
pub struct CacheKey {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub prompt_digest: String,
}

impl CacheKey {
    pub fn build(prompt: &str, model: &str, temperature: f32, max_tokens: u32) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(prompt.as_bytes());
        let prompt_digest = hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect();

        Self {
            model: model.to_string(),
            temperature,
            max_tokens,
            prompt_digest,
        }
    }
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.model == other.model
            && self.temperature.to_bits() == other.temperature.to_bits()
            && self.max_tokens == other.max_tokens
            && self.prompt_digest == other.prompt_digest
    }
}

impl Eq for CacheKey {}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.model.hash(state);
        self.temperature.to_bits().hash(state);
        self.max_tokens.hash(state);
        self.prompt_digest.hash(state);
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.model, self.temperature, self.max_tokens, self.prompt_digest
        )
    }
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: String,
    pub size_bytes: usize,
    pub inserted_at: Instant,
    /// `None` when the TTL reaches past what `Instant` can represent.
    pub expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired_at(&self, now: Instant) -> bool {
        self.expires_at.map_or(false, |expires_at| now >= expires_at)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub max_entries: usize,
    pub max_bytes: usize,
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
    /// Store responses under the configured model even when a fallback served them.
    pub key_by_requested_model: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 100,
            max_bytes: 5 * 1024 * 1024,
            ttl: Duration::from_secs(24 * 60 * 60),
            key_by_requested_model: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub insertions: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub total_entries: usize,
    pub total_bytes: usize,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Process-local LRU cache of completions, bounded by entry count and by
/// total value bytes, with a fixed TTL measured from insertion.
pub struct ResponseCache {
    entries: LruCache<CacheKey, CacheEntry>,
    config: CacheConfig,
    total_bytes: usize,
    stats: CacheStats,
}

impl ResponseCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: LruCache::unbounded(),
            config,
            total_bytes: 0,
            stats: CacheStats::default(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn get(&mut self, key: &CacheKey) -> Option<String> {
        self.get_at(key, Instant::now())
    }

    fn get_at(&mut self, key: &CacheKey, now: Instant) -> Option<String> {
        let expired = match self.entries.peek(key) {
            Some(entry) => entry.is_expired_at(now),
            None => {
                self.stats.misses += 1;
                log_cache_event("miss", key, false);
                return None;
            }
        };

        if expired {
            self.remove(key);
            self.stats.expirations += 1;
            self.stats.misses += 1;
            self.update_stats();
            log_cache_event("expired", key, false);
            return None;
        }

        // `get` (not `peek`) promotes the entry to most recently used.
        let value = self.entries.get(key).map(|entry| entry.value.clone());
        self.stats.hits += 1;
        log_cache_event("hit", key, true);
        value
    }

    /// Insert or overwrite. Returns false when the value was not stored: it
    /// alone exceeds the byte budget, or the cache holds no entries at all.
    pub fn insert(&mut self, key: CacheKey, value: String) -> bool {
        self.insert_at(key, value, Instant::now())
    }

    fn insert_at(&mut self, key: CacheKey, value: String, now: Instant) -> bool {
        let size_bytes = value.len();

        // The previous value for this key is stale either way.
        self.remove(&key);

        if size_bytes > self.config.max_bytes {
            tracing::debug!(
                key = %key,
                size_bytes,
                max_bytes = self.config.max_bytes,
                "Value exceeds cache byte budget; not cached"
            );
            self.update_stats();
            return false;
        }

        if self.config.max_entries == 0 {
            tracing::debug!(key = %key, "Cache entry budget is zero; not cached");
            self.update_stats();
            return false;
        }

        self.purge_expired_at(now);

        while !self.entries.is_empty()
            && (self.entries.len() >= self.config.max_entries
                || self.total_bytes + size_bytes > self.config.max_bytes)
        {
            match self.entries.pop_lru() {
                Some((evicted_key, evicted)) => {
                    self.total_bytes -= evicted.size_bytes;
                    self.stats.evictions += 1;
                    log_cache_event("evict", &evicted_key, false);
                }
                None => break,
            }
        }

        log_cache_event("store", &key, false);
        self.entries.put(
            key,
            CacheEntry {
                value,
                size_bytes,
                inserted_at: now,
                expires_at: now.checked_add(self.config.ttl),
            },
        );
        self.total_bytes += size_bytes;
        self.stats.insertions += 1;
        self.update_stats();
        true
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.total_bytes = 0;
        self.update_stats();
        tracing::info!("AI response cache cleared");
    }

    pub fn purge_expired(&mut self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    fn purge_expired_at(&mut self, now: Instant) -> usize {
        let expired: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.remove(key);
        }
        self.stats.expirations += expired.len() as u64;
        self.update_stats();
        expired.len()
    }

    pub fn invalidate_model(&mut self, model: &str) -> usize {
        let keys: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|(key, _)| key.model == model)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &keys {
            self.remove(key);
        }
        self.update_stats();
        keys.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    fn remove(&mut self, key: &CacheKey) {
        if let Some(entry) = self.entries.pop(key) {
            self.total_bytes -= entry.size_bytes;
        }
    }

    fn update_stats(&mut self) {
        self.stats.total_entries = self.entries.len();
        self.stats.total_bytes = self.total_bytes;
    }
}
