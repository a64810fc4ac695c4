//! Client-held record cache
//!
//! The record travels with the client in a cookie. It can only be addressed
//! through a request context: reads come from the request's cookie, writes go
//! to the response. At most one cookie is emitted per response, however many
//! lookups run while it is being built.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use super::{CacheStats, CacheStore, payload::CachePayload};
use crate::device::DeviceRecord;
use crate::host::{RequestContext, ResponseCookie};

/// Name of the cookie holding the payload
pub const COOKIE_NAME: &str = "DevCap_Client";

/// Default payload lifetime (1 day)
pub const DEFAULT_COOKIE_TTL: Duration = Duration::seconds(86_400);

/// Cache stored on the client through a cookie
#[derive(Debug)]
pub struct CookieCache {
    ttl: Duration,
    purged_at: Mutex<Option<DateTime<Utc>>>,
    stats: CacheStats,
}

impl CookieCache {
    /// Cache with the default one-day lifetime
    #[must_use]
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_COOKIE_TTL)
    }

    /// Cache whose payloads are honoured for `ttl` after creation
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            purged_at: Mutex::new(None),
            stats: CacheStats::default(),
        }
    }

    /// Payload lifetime
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    fn purge_boundary(&self) -> Option<DateTime<Utc>> {
        self.purged_at.lock().ok().and_then(|boundary| *boundary)
    }

    fn decode(&self, text: &str, now: DateTime<Utc>) -> Option<DeviceRecord> {
        let payload = match CachePayload::decode(text) {
            Ok(payload) => payload,
            Err(e) => {
                self.stats.record_error();
                tracing::debug!(error = %e, "discarding undecodable cache cookie");
                return None;
            }
        };

        if payload.is_expired(now, self.ttl) {
            tracing::debug!(created_at = %payload.created_at, "cache cookie expired");
            return None;
        }

        if self
            .purge_boundary()
            .is_some_and(|boundary| payload.created_at < boundary)
        {
            tracing::debug!(created_at = %payload.created_at, "cache cookie predates purge");
            return None;
        }

        Some(payload.into_record())
    }
}

impl Default for CookieCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStore for CookieCache {
    fn name(&self) -> &'static str {
        "CookieCache"
    }

    fn prefers_context(&self) -> bool {
        true
    }

    fn get_by_context(&self, context: &RequestContext<'_>) -> DeviceRecord {
        let record = context
            .request()
            .cookie(COOKIE_NAME)
            .filter(|value| !value.is_empty())
            .and_then(|value| self.decode(&value, Utc::now()));

        if let Some(record) = record {
            self.stats.record_hit();
            record
        } else {
            self.stats.record_miss();
            DeviceRecord::empty()
        }
    }

    fn get_by_user_agent(&self, _user_agent: &str) -> DeviceRecord {
        DeviceRecord::empty()
    }

    fn set_by_context(&self, context: &RequestContext<'_>, record: &DeviceRecord) -> bool {
        let Some(response) = context.response() else {
            return false;
        };

        if response.has_cookie(COOKIE_NAME) {
            return true;
        }

        let now = Utc::now();
        match CachePayload::from_record(record, now).encode() {
            Ok(value) => {
                let added = response.set_cookie_once(ResponseCookie {
                    name: COOKIE_NAME.to_string(),
                    value,
                    expires: now
                        .checked_add_signed(self.ttl)
                        .unwrap_or(DateTime::<Utc>::MAX_UTC),
                });
                if !added {
                    tracing::debug!("cache cookie already set on this response");
                }
                true
            }
            Err(e) => {
                self.stats.record_error();
                tracing::warn!(error = %e, "failed to encode cache cookie");
                false
            }
        }
    }

    fn set_by_user_agent(&self, _user_agent: &str, _record: &DeviceRecord) -> bool {
        false
    }

    fn purge(&self) -> bool {
        match self.purged_at.lock() {
            Ok(mut boundary) => {
                *boundary = Some(Utc::now());
                true
            }
            Err(_) => false,
        }
    }

    fn close(&self) {}

    fn stats(&self) -> &CacheStats {
        &self.stats
    }
}
