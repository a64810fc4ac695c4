//! In-process record cache
//!
//! Entries are keyed by the hashed user agent and expire a fixed time after
//! they were written; reads do not extend their life. Purging bumps a
//! generation token instead of walking the table, so it is immediate no
//! matter how many entries are live.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use mini_moka::sync::Cache;

use super::{CacheStats, CacheStore, MAX_CACHE_TTL, hash_user_agent};
use crate::device::DeviceRecord;
use crate::host::RequestContext;

/// Default entry lifetime (20 minutes)
pub const DEFAULT_MEMORY_TTL: Duration = Duration::from_secs(1200);

const MAX_ENTRIES: u64 = 10_000;

#[derive(Clone)]
struct Entry {
    generation: u64,
    record: DeviceRecord,
}

/// Ephemeral, time-boxed cache held in process memory
pub struct MemoryCache {
    entries: Cache<String, Entry>,
    generation: AtomicU64,
    ttl: Duration,
    stats: CacheStats,
}

impl MemoryCache {
    /// Cache with the default 20 minute lifetime
    #[must_use]
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_MEMORY_TTL)
    }

    /// Cache whose entries live for `ttl` after being written
    ///
    /// `ttl` is capped at [`MAX_CACHE_TTL`].
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        let ttl = ttl.min(MAX_CACHE_TTL);
        Self {
            entries: Cache::builder()
                .max_capacity(MAX_ENTRIES)
                .time_to_live(ttl)
                .build(),
            generation: AtomicU64::new(0),
            ttl,
            stats: CacheStats::default(),
        }
    }

    /// Entry lifetime
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    fn read(&self, user_agent: &str) -> DeviceRecord {
        let key = hash_user_agent(user_agent);
        let generation = self.generation.load(Ordering::Acquire);

        match self.entries.get(&key) {
            Some(entry) if entry.generation == generation => {
                self.stats.record_hit();
                tracing::debug!(key = %key, "memory cache hit");
                entry.record
            }
            _ => {
                self.stats.record_miss();
                tracing::debug!(key = %key, "memory cache miss");
                DeviceRecord::empty()
            }
        }
    }

    fn write(&self, user_agent: &str, record: &DeviceRecord) {
        let entry = Entry {
            generation: self.generation.load(Ordering::Acquire),
            record: record.clone(),
        };
        self.entries.insert(hash_user_agent(user_agent), entry);
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("ttl", &self.ttl)
            .field("generation", &self.generation.load(Ordering::Relaxed))
            .field("entries", &self.entries.entry_count())
            .finish_non_exhaustive()
    }
}

impl CacheStore for MemoryCache {
    fn name(&self) -> &'static str {
        "MemoryCache"
    }

    fn get_by_context(&self, context: &RequestContext<'_>) -> DeviceRecord {
        self.read(&context.user_agent())
    }

    fn get_by_user_agent(&self, user_agent: &str) -> DeviceRecord {
        if user_agent.is_empty() {
            return DeviceRecord::empty();
        }
        self.read(user_agent)
    }

    fn set_by_context(&self, context: &RequestContext<'_>, record: &DeviceRecord) -> bool {
        self.write(&context.user_agent(), record);
        true
    }

    fn set_by_user_agent(&self, user_agent: &str, record: &DeviceRecord) -> bool {
        if user_agent.is_empty() {
            return false;
        }
        self.write(user_agent, record);
        true
    }

    fn purge(&self) -> bool {
        let previous = self.generation.fetch_add(1, Ordering::AcqRel);
        tracing::info!(generation = previous + 1, "memory cache purged");
        true
    }

    fn close(&self) {
        self.entries.invalidate_all();
    }

    fn stats(&self) -> &CacheStats {
        &self.stats
    }
}
