//! Pluggable device record caches
//!
//! Every store implements [`CacheStore`]. Stores are independent of each
//! other; the shared bookkeeping (hit/miss/error counters, dataset mtime and
//! report age) lives in [`CacheStats`], which each store owns and exposes.
//!
//! Lookups never fail: anything that prevents a record from being found or
//! decoded is a miss and yields [`DeviceRecord::empty`].

pub mod cookie;
pub mod memory;
pub mod payload;

use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};

use crate::device::DeviceRecord;
use crate::host::RequestContext;

pub use cookie::CookieCache;
pub use memory::MemoryCache;
pub use payload::CachePayload;

/// Longest entry lifetime a store accepts (100 years)
pub const MAX_CACHE_TTL: Duration = Duration::from_secs(100 * 365 * 86_400);

/// Point-in-time copy of a store's counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CounterSnapshot {
    pub hit: u64,
    pub miss: u64,
    pub error: u64,
    /// Seconds since the report age was last reset
    pub age: u64,
}

impl std::fmt::Display for CounterSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "hit:{},miss:{},error:{},age:{}",
            self.hit, self.miss, self.error, self.age
        )
    }
}

/// Counters, dataset mtime and report clock shared by all stores
#[derive(Debug)]
pub struct CacheStats {
    hit: AtomicU64,
    miss: AtomicU64,
    error: AtomicU64,
    mtime: AtomicI64,
    report_started: Mutex<Instant>,
}

impl Default for CacheStats {
    fn default() -> Self {
        Self {
            hit: AtomicU64::new(0),
            miss: AtomicU64::new(0),
            error: AtomicU64::new(0),
            mtime: AtomicI64::new(0),
            report_started: Mutex::new(Instant::now()),
        }
    }
}

impl CacheStats {
    pub fn record_hit(&self) {
        self.hit.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.miss.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.error.fetch_add(1, Ordering::Relaxed);
    }

    /// Current counters, with `age` filled in from the report clock
    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            hit: self.hit.load(Ordering::Relaxed),
            miss: self.miss.load(Ordering::Relaxed),
            error: self.error.load(Ordering::Relaxed),
            age: self.report_age(),
        }
    }

    /// Zero the hit, miss and error counters
    pub fn reset(&self) {
        self.hit.store(0, Ordering::Relaxed);
        self.miss.store(0, Ordering::Relaxed);
        self.error.store(0, Ordering::Relaxed);
    }

    #[must_use]
    pub fn mtime(&self) -> i64 {
        self.mtime.load(Ordering::Relaxed)
    }

    pub fn set_mtime(&self, mtime: i64) {
        self.mtime.store(mtime, Ordering::Relaxed);
    }

    /// Whole seconds since the report clock was last reset
    #[must_use]
    pub fn report_age(&self) -> u64 {
        self.report_started
            .lock()
            .map(|started| started.elapsed().as_secs())
            .unwrap_or_default()
    }

    pub fn reset_report_age(&self) {
        if let Ok(mut started) = self.report_started.lock() {
            *started = Instant::now();
        }
    }
}

/// Storage strategy for device records
///
/// Context-keyed and user-agent-keyed variants exist because some stores
/// (client-held cookies) can only be reached through the request.
pub trait CacheStore: Send + Sync {
    /// Human-readable name of the store
    fn name(&self) -> &'static str;

    /// Whether lookups must go through the request context even when an
    /// explicit user agent is available
    fn prefers_context(&self) -> bool {
        false
    }

    /// Look up the record for the requesting device
    fn get_by_context(&self, context: &RequestContext<'_>) -> DeviceRecord;

    /// Look up the record for a user agent
    fn get_by_user_agent(&self, user_agent: &str) -> DeviceRecord;

    /// Store a record for the requesting device; false if no key can be derived
    fn set_by_context(&self, context: &RequestContext<'_>, record: &DeviceRecord) -> bool;

    /// Store a record for a user agent; false if no key can be derived
    fn set_by_user_agent(&self, user_agent: &str, record: &DeviceRecord) -> bool;

    /// Invalidate every entry
    fn purge(&self) -> bool;

    /// Release held resources. Counters are left untouched; call
    /// [`CacheStore::reset_counters`] separately if that is wanted.
    fn close(&self);

    /// Counters and report clock of this store
    fn stats(&self) -> &CacheStats;

    fn counters(&self) -> CounterSnapshot {
        self.stats().snapshot()
    }

    fn reset_counters(&self) {
        self.stats().reset();
    }

    /// Last known refresh time of the remote dataset (epoch seconds)
    fn mtime(&self) -> i64 {
        self.stats().mtime()
    }

    fn set_mtime(&self, mtime: i64) -> bool {
        self.stats().set_mtime(mtime);
        true
    }

    fn report_age(&self) -> u64 {
        self.stats().report_age()
    }

    fn reset_report_age(&self) {
        self.stats().reset_report_age();
    }
}

/// Store key for a user agent: lowercase hex SHA-256 of the string
#[must_use]
pub fn hash_user_agent(user_agent: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_agent.as_bytes());
    hex::encode(hasher.finalize())
}

/// Store that never holds anything
#[derive(Debug, Default)]
pub struct NullCache {
    stats: CacheStats,
}

impl NullCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for NullCache {
    fn name(&self) -> &'static str {
        "NullCache"
    }

    fn get_by_context(&self, _context: &RequestContext<'_>) -> DeviceRecord {
        DeviceRecord::empty()
    }

    fn get_by_user_agent(&self, _user_agent: &str) -> DeviceRecord {
        DeviceRecord::empty()
    }

    fn set_by_context(&self, _context: &RequestContext<'_>, _record: &DeviceRecord) -> bool {
        true
    }

    fn set_by_user_agent(&self, _user_agent: &str, _record: &DeviceRecord) -> bool {
        true
    }

    fn purge(&self) -> bool {
        true
    }

    fn close(&self) {}

    fn stats(&self) -> &CacheStats {
        &self.stats
    }
}
