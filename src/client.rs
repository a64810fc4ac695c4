//! Lookup orchestration
//!
//! [`CloudClient::resolve`] probes the cache, falls back to one remote round
//! trip on a miss, and writes successful answers back so the next lookup for
//! the same identity is served locally.
//!
//! ```text
//! START -> CACHE_PROBE -> HIT  -> RETURN
//!                      -> MISS -> REMOTE_CALL -> OK   -> STORE_AND_RETURN
//!                                             -> FAIL -> RETURN_DEGRADED
//! ```

use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::cache::CacheStore;
use crate::config::ClientConfig;
use crate::credential::Credential;
use crate::device::{DeviceRecord, Origin};
use crate::endpoint::{EndpointPool, EndpointSelector};
use crate::host::RequestContext;
use crate::protocol::{InboundFacts, RequestOptions, build_request};
use crate::transport::HttpTransport;
use crate::Result;

/// Signature sent in `X-Cloud-Client`
pub const CLIENT_VERSION: &str = concat!("DevCapClient/Rust_", env!("CARGO_PKG_VERSION"));

/// Reported before any lookup has returned a record
pub const UNKNOWN_API_VERSION: &str = "Unknown";

/// Who a lookup is for
#[derive(Debug, Clone, Copy)]
pub enum Identity<'a> {
    /// The requesting device; the user agent comes from the request itself
    Context(RequestContext<'a>),

    /// A request whose device is described by a caller-supplied user agent
    /// that may differ from the request's own header
    Override {
        context: RequestContext<'a>,
        user_agent: &'a str,
    },

    /// A bare user agent with no host request behind it
    UserAgent(&'a str),
}

impl<'a> Identity<'a> {
    /// The host request, if there is one
    #[must_use]
    pub const fn context(&self) -> Option<&RequestContext<'a>> {
        match self {
            Self::Context(context) | Self::Override { context, .. } => Some(context),
            Self::UserAgent(_) => None,
        }
    }

    /// Explicitly supplied user agent, trimmed, when non-blank
    fn explicit_user_agent(&self) -> Option<&'a str> {
        match self {
            Self::Context(_) => None,
            Self::Override { user_agent, .. } | Self::UserAgent(user_agent) => {
                Some(user_agent.trim()).filter(|ua| !ua.is_empty())
            }
        }
    }
}

/// Device capability client
pub struct CloudClient {
    credential: Credential,
    selector: EndpointSelector,
    transport: HttpTransport,
    cache: Arc<dyn CacheStore>,
    compression: bool,
    report_interval: Option<Duration>,
    remote_api_version: RwLock<String>,
}

impl CloudClient {
    /// Build a client with the cache store named in `config`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if the API key is
    /// malformed, the endpoint pool is invalid, or the HTTP client cannot be built
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Self::with_cache(config, config.cache.build())
    }

    /// Build a client around an existing cache store
    ///
    /// # Errors
    ///
    /// Same as [`CloudClient::new`]
    pub fn with_cache(config: &ClientConfig, cache: Arc<dyn CacheStore>) -> Result<Self> {
        let credential = Credential::parse(config.api_key())?;
        let pool = EndpointPool::new(config.servers.clone())?;
        let transport = HttpTransport::new(&config.transport_options())?;

        tracing::info!(
            endpoints = pool.len(),
            cache = cache.name(),
            compression = config.compression,
            "device capability client ready"
        );

        Ok(Self {
            credential,
            selector: EndpointSelector::new(pool),
            transport,
            cache,
            compression: config.compression,
            report_interval: config.report_interval,
            remote_api_version: RwLock::new(UNKNOWN_API_VERSION.to_string()),
        })
    }

    /// Resolve the requested capabilities for an identity
    ///
    /// Never fails: remote and decoding failures come back as a record with
    /// an empty capability map and a populated `errors` map.
    pub async fn resolve<S: AsRef<str>>(
        &self,
        identity: Identity<'_>,
        capabilities: &[S],
    ) -> DeviceRecord {
        let capabilities: Vec<String> = capabilities
            .iter()
            .map(|c| c.as_ref().trim())
            .filter(|c| !c.is_empty())
            .map(ToString::to_string)
            .collect();

        let cached = self.probe_cache(&identity);
        if cached.has_capabilities() {
            tracing::debug!(device_id = %cached.device_id, "served from cache");
            self.note_api_version(&cached.server_version);
            return cached;
        }

        let endpoint = self.selector.select();
        let inbound = identity
            .context()
            .map(InboundFacts::from_context)
            .unwrap_or_default();
        let options = RequestOptions {
            compression: self.compression,
            client_signature: CLIENT_VERSION.to_string(),
            counters: self.due_counters(),
        };
        let request = build_request(
            &endpoint,
            &self.credential,
            identity.explicit_user_agent(),
            &inbound,
            &capabilities,
            &options,
        );

        match self.transport.send(&request).await {
            Ok(response) => {
                let mtime = response.mtime;
                let record = DeviceRecord::from(response);
                self.store(&identity, &request.user_agent, &record);
                self.cache.set_mtime(mtime);
                self.note_api_version(&record.server_version);
                tracing::info!(
                    device_id = %record.device_id,
                    endpoint = %endpoint.nickname,
                    "resolved remotely"
                );
                record
            }
            Err(e) => {
                tracing::warn!(endpoint = %endpoint.nickname, error = %e, "remote lookup failed");
                let (tag, message) = e.to_error_entry();
                DeviceRecord::degraded(tag, message)
            }
        }
    }

    fn probe_cache(&self, identity: &Identity<'_>) -> DeviceRecord {
        match identity {
            Identity::Context(context) => self.cache.get_by_context(context),
            Identity::Override { context, .. } if self.cache.prefers_context() => {
                self.cache.get_by_context(context)
            }
            Identity::Override { context, .. } => match identity.explicit_user_agent() {
                Some(ua) => self.cache.get_by_user_agent(ua),
                None => self.cache.get_by_context(context),
            },
            Identity::UserAgent(ua) => self.cache.get_by_user_agent(ua.trim()),
        }
    }

    /// Write a cache-tagged copy, keyed the way the next probe will look for it
    fn store(&self, identity: &Identity<'_>, effective_user_agent: &str, record: &DeviceRecord) {
        let cached = record.recache(Origin::Cache);
        let stored = match identity {
            Identity::Context(context) => self.cache.set_by_context(context, &cached),
            Identity::Override { context, .. }
                if self.cache.prefers_context() || identity.explicit_user_agent().is_none() =>
            {
                self.cache.set_by_context(context, &cached)
            }
            Identity::Override { .. } | Identity::UserAgent(_) => {
                self.cache.set_by_user_agent(effective_user_agent, &cached)
            }
        };

        if !stored {
            tracing::debug!(cache = self.cache.name(), "record not cached");
        }
    }

    /// Render and reset the counters when a report is due
    fn due_counters(&self) -> Option<String> {
        let interval = self.report_interval?;
        if self.cache.report_age() < interval.as_secs() {
            return None;
        }

        let report = self.cache.counters().to_string();
        self.cache.reset_counters();
        self.cache.reset_report_age();
        tracing::debug!(counters = %report, "reporting cache counters");
        Some(report)
    }

    fn note_api_version(&self, version: &str) {
        if version.is_empty() {
            return;
        }
        if let Ok(mut current) = self.remote_api_version.write() {
            version.clone_into(&mut *current);
        }
    }

    /// Replace the cache store
    pub fn set_cache_store(&mut self, cache: Arc<dyn CacheStore>) {
        tracing::info!(cache = cache.name(), "cache store replaced");
        self.cache = cache;
    }

    /// The active cache store
    #[must_use]
    pub fn cache(&self) -> &dyn CacheStore {
        self.cache.as_ref()
    }

    /// Name of the active cache store
    #[must_use]
    pub fn caching_module_name(&self) -> &'static str {
        self.cache.name()
    }

    /// Version string of this client
    #[must_use]
    pub const fn client_version() -> &'static str {
        CLIENT_VERSION
    }

    /// API version carried by the most recent record, or `"Unknown"`
    #[must_use]
    pub fn remote_api_version(&self) -> String {
        self.remote_api_version
            .read()
            .map_or_else(|_| UNKNOWN_API_VERSION.to_string(), |v| v.clone())
    }

    /// Endpoint selector shared by all lookups
    #[must_use]
    pub const fn selector(&self) -> &EndpointSelector {
        &self.selector
    }
}

impl std::fmt::Debug for CloudClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudClient")
            .field("credential", &self.credential)
            .field("selector", &self.selector)
            .field("cache", &self.cache.name())
            .field("compression", &self.compression)
            .field("report_interval", &self.report_interval)
            .finish_non_exhaustive()
    }
}
