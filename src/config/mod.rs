//! Client configuration
//!
//! Values resolve env > TOML file > built-in default. Library users that do
//! not want file or environment lookups start from [`ClientConfig::default`]
//! and apply the `with_*` setters.

pub mod file;

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::cache::{CacheStore, CookieCache, MAX_CACHE_TTL, MemoryCache, NullCache};
use crate::endpoint::{DEFAULT_ENDPOINT_WEIGHT, Endpoint};
use crate::transport::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT, TransportOptions};
use crate::{Error, Result};

/// Demonstration key accepted by the public service for trial lookups
pub const DEMO_API_KEY: &str = "100000:xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx";

/// Cache store selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheKind {
    /// In-process, time-boxed table
    #[default]
    Memory,

    /// Client-held cookie
    Cookie,

    /// No caching
    None,
}

impl FromStr for CacheKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "cookie" => Ok(Self::Cookie),
            "none" | "off" => Ok(Self::None),
            other => Err(Error::Config(format!("unknown cache store `{other}`"))),
        }
    }
}

impl std::fmt::Display for CacheKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Memory => "memory",
            Self::Cookie => "cookie",
            Self::None => "none",
        })
    }
}

/// Cache store and entry lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheConfig {
    pub kind: CacheKind,

    /// Entry lifetime; `None` uses the store's own default
    pub ttl: Option<Duration>,
}

impl CacheConfig {
    /// Instantiate the configured store
    #[must_use]
    pub fn build(&self) -> Arc<dyn CacheStore> {
        match self.kind {
            CacheKind::Memory => Arc::new(
                self.ttl
                    .map_or_else(MemoryCache::new, MemoryCache::with_ttl),
            ),
            CacheKind::Cookie => Arc::new(self.ttl.map_or_else(CookieCache::new, |ttl| {
                CookieCache::with_ttl(
                    chrono::Duration::from_std(ttl)
                        .unwrap_or(crate::cache::cookie::DEFAULT_COOKIE_TTL),
                )
            })),
            CacheKind::None => Arc::new(NullCache::new()),
        }
    }
}

/// Everything a [`CloudClient`](crate::CloudClient) needs
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// `user:password` API key
    pub api_key: SecretString,

    /// Remote endpoints with their weights
    pub servers: Vec<Endpoint>,

    /// Ask for gzip-compressed responses
    pub compression: bool,

    pub connection_timeout: Duration,

    pub read_timeout: Duration,

    /// HTTP proxy URL
    pub proxy: Option<String>,

    /// Report cache counters this often; `None` disables reporting
    pub report_interval: Option<Duration>,

    pub cache: CacheConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: SecretString::new(DEMO_API_KEY.into()),
            servers: vec![Endpoint::default()],
            compression: true,
            connection_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            proxy: None,
            report_interval: None,
            cache: CacheConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Load from the standard config file and the environment
    ///
    /// # Errors
    ///
    /// Returns error if an environment variable holds an unparsable value
    pub fn load() -> Result<Self> {
        Self::from_sources(file::load_config_file(), |key| std::env::var(key).ok())
    }

    /// Load from an explicit config file and the environment
    ///
    /// # Errors
    ///
    /// Returns error if an environment variable holds an unparsable value
    pub fn load_from(path: &Path) -> Result<Self> {
        Self::from_sources(file::load_config_file_from(path), |key| {
            std::env::var(key).ok()
        })
    }

    /// Merge a parsed file with an environment lookup (env > toml > default)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if an environment variable holds an
    /// unparsable value or the cache ttl exceeds [`MAX_CACHE_TTL`]
    pub fn from_sources(
        fc: file::ConfigFile,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let default = Self::default();

        let api_key = env("DEVCAP_API_KEY")
            .or(fc.api_key)
            .map_or(default.api_key, |key| SecretString::new(key.into()));

        let servers = match env("DEVCAP_SERVERS") {
            Some(list) => parse_servers(&list)?,
            None => fc.servers.unwrap_or(default.servers),
        };

        let compression = env("DEVCAP_COMPRESSION")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .or(fc.compression)
            .unwrap_or(default.compression);

        let connection_timeout = parse_env_u64(&env, "DEVCAP_CONNECTION_TIMEOUT_MS")?
            .or(fc.connection_timeout_ms)
            .map_or(default.connection_timeout, Duration::from_millis);

        let read_timeout = parse_env_u64(&env, "DEVCAP_READ_TIMEOUT_MS")?
            .or(fc.read_timeout_ms)
            .map_or(default.read_timeout, Duration::from_millis);

        let proxy = env("DEVCAP_PROXY")
            .or(fc.proxy)
            .filter(|p| !p.trim().is_empty());

        let report_interval = parse_env_u64(&env, "DEVCAP_REPORT_INTERVAL_SECS")?
            .or(fc.report_interval_secs)
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        let ttl = parse_env_u64(&env, "DEVCAP_CACHE_TTL_SECS")?
            .or(fc.cache.ttl_secs)
            .map(Duration::from_secs);
        if let Some(ttl) = ttl.filter(|ttl| *ttl > MAX_CACHE_TTL) {
            return Err(Error::Config(format!(
                "cache ttl of {} s exceeds the {} s limit",
                ttl.as_secs(),
                MAX_CACHE_TTL.as_secs()
            )));
        }

        let cache = CacheConfig {
            kind: env("DEVCAP_CACHE")
                .map(|v| v.parse::<CacheKind>())
                .transpose()?
                .or(fc.cache.store)
                .unwrap_or_default(),
            ttl,
        };

        Ok(Self {
            api_key,
            servers,
            compression,
            connection_timeout,
            read_timeout,
            proxy,
            report_interval,
            cache,
        })
    }

    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        let api_key: String = api_key.into();
        self.api_key = SecretString::new(api_key.into());
        self
    }

    #[must_use]
    pub fn with_servers(mut self, servers: Vec<Endpoint>) -> Self {
        self.servers = servers;
        self
    }

    #[must_use]
    pub const fn with_compression(mut self, compression: bool) -> Self {
        self.compression = compression;
        self
    }

    #[must_use]
    pub const fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    #[must_use]
    pub const fn with_report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = Some(interval);
        self
    }

    #[must_use]
    pub const fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Drop every configured endpoint, including the default one
    pub fn clear_servers(&mut self) {
        self.servers.clear();
    }

    /// Append an endpoint to the pool
    pub fn add_server(&mut self, nickname: impl Into<String>, host: impl Into<String>, weight: u32) {
        self.servers.push(Endpoint::new(nickname, host, weight));
    }

    /// The API key in clear text
    #[must_use]
    pub fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }

    /// Network settings for the HTTP transport
    #[must_use]
    pub fn transport_options(&self) -> TransportOptions {
        TransportOptions {
            connect_timeout: self.connection_timeout,
            read_timeout: self.read_timeout,
            proxy: self.proxy.clone(),
        }
    }
}

fn parse_env_u64(env: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<u64>> {
    env(key)
        .map(|v| {
            v.trim()
                .parse()
                .map_err(|e| Error::Config(format!("{key}: invalid number `{v}`: {e}")))
        })
        .transpose()
}

/// Parse `nick=host:weight,...`
///
/// The nickname defaults to the host and the weight to 100. A trailing
/// numeric `:N` is always the weight, so a host with a port is written
/// `host:port:weight`.
///
/// # Errors
///
/// Returns [`Error::Config`] for an entry without a host
pub fn parse_servers(list: &str) -> Result<Vec<Endpoint>> {
    list.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (nickname, target) = entry
                .split_once('=')
                .map_or((None, entry), |(nick, target)| (Some(nick.trim()), target.trim()));

            let (host, weight) = match target.rsplit_once(':') {
                Some((host, weight)) if !host.is_empty() => match weight.parse::<u32>() {
                    Ok(weight) => (host, weight),
                    Err(_) => (target, DEFAULT_ENDPOINT_WEIGHT),
                },
                _ => (target, DEFAULT_ENDPOINT_WEIGHT),
            };

            if host.is_empty() {
                return Err(Error::Config(format!("server entry `{entry}` has no host")));
            }

            let nickname = nickname.filter(|n| !n.is_empty()).unwrap_or(host);
            Ok(Endpoint::new(nickname, host, weight))
        })
        .collect()
}
