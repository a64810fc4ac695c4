//! DevCap - Device capability lookup client
//!
//! Resolves device capabilities (screen size, form factor, browser traits,
//! ...) for a user agent by asking a remote capability service, caching the
//! answers locally so repeated lookups stay off the network.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    Host adapter                      │
//! │      HostRequest  │  HostResponse  │  axum parts     │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                   CloudClient                        │
//! │   Credential  │  EndpointSelector  │  CacheStore     │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │        Protocol codec  │  HTTP transport             │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod credential;
pub mod device;
pub mod endpoint;
pub mod error;
pub mod host;
pub mod protocol;
pub mod transport;

pub use cache::{CacheStore, CookieCache, CounterSnapshot, MemoryCache, NullCache};
pub use client::{CLIENT_VERSION, CloudClient, Identity};
pub use config::{CacheConfig, CacheKind, ClientConfig};
pub use credential::Credential;
pub use device::{DeviceRecord, Origin};
pub use endpoint::{Endpoint, EndpointPool, EndpointSelector};
pub use error::{Error, Result};
pub use host::{HostRequest, HostResponse, MemoryRequest, MemoryResponse, RequestContext};
