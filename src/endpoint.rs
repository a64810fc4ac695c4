//! Remote endpoint pool and weighted selection

use std::sync::OnceLock;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Nickname of the default remote endpoint
pub const DEFAULT_ENDPOINT_NICKNAME: &str = "wurfl_cloud";

/// Host of the default remote endpoint
pub const DEFAULT_ENDPOINT_HOST: &str = "api.wurflcloud.com";

/// Weight assigned when none is given
pub const DEFAULT_ENDPOINT_WEIGHT: u32 = 100;

/// One remote capability server
///
/// Weights are relative to the other endpoints in the pool, not percentages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Familiar name of the server
    pub nickname: String,

    /// Host (optionally `host:port`) the requests are sent to
    pub host: String,

    /// Relative selection weight, at least 1
    #[serde(default = "default_weight")]
    pub weight: u32,
}

const fn default_weight() -> u32 {
    DEFAULT_ENDPOINT_WEIGHT
}

impl Endpoint {
    /// Create an endpoint
    #[must_use]
    pub fn new(nickname: impl Into<String>, host: impl Into<String>, weight: u32) -> Self {
        Self {
            nickname: nickname.into(),
            host: host.into(),
            weight,
        }
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new(
            DEFAULT_ENDPOINT_NICKNAME,
            DEFAULT_ENDPOINT_HOST,
            DEFAULT_ENDPOINT_WEIGHT,
        )
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {}, weight: {}", self.nickname, self.host, self.weight)
    }
}

/// Non-empty set of endpoints with positive weights
#[derive(Debug, Clone)]
pub struct EndpointPool {
    endpoints: Vec<Endpoint>,
}

impl EndpointPool {
    /// Build a pool
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the list is empty, an endpoint has an
    /// empty host, or a weight is zero
    pub fn new(endpoints: Vec<Endpoint>) -> Result<Self> {
        if endpoints.is_empty() {
            return Err(Error::Config(
                "at least one remote endpoint is required".to_string(),
            ));
        }

        for endpoint in &endpoints {
            if endpoint.host.trim().is_empty() {
                return Err(Error::Config(format!(
                    "endpoint {} has an empty host",
                    endpoint.nickname
                )));
            }
            if endpoint.weight == 0 {
                return Err(Error::Config(format!(
                    "endpoint {} must have a weight of at least 1",
                    endpoint.nickname
                )));
            }
        }

        Ok(Self { endpoints })
    }

    /// Endpoints in configuration order
    #[must_use]
    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    /// Number of endpoints (always at least one)
    #[must_use]
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Always false; kept for API symmetry with `len`
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

impl Default for EndpointPool {
    fn default() -> Self {
        Self {
            endpoints: vec![Endpoint::default()],
        }
    }
}

/// Pick one endpoint by weighted random draw
///
/// A single-endpoint pool returns that endpoint without touching `rng`.
/// Otherwise a sample is drawn uniformly from `[0, total]` and the first
/// endpoint whose cumulative weight is not less than the sample wins.
///
/// # Panics
///
/// Panics if `pool` is empty; [`EndpointPool`] rules that out.
pub fn pick_endpoint<'a, R: Rng + ?Sized>(pool: &'a [Endpoint], rng: &mut R) -> &'a Endpoint {
    if let [only] = pool {
        return only;
    }

    let total: u64 = pool.iter().map(|e| u64::from(e.weight)).sum();
    let sample = rng.gen_range(0..=total);

    let mut running = 0u64;
    for endpoint in pool {
        running += u64::from(endpoint.weight);
        if running >= sample {
            return endpoint;
        }
    }

    // Unreachable: the last cumulative weight equals `total`
    &pool[pool.len() - 1]
}

/// Chooses the endpoint each lookup talks to
///
/// Single-endpoint pools are resolved once and the choice is kept for the
/// selector's lifetime. Larger pools are drawn per lookup with a thread-local
/// RNG, so concurrent callers never share a cursor.
#[derive(Debug)]
pub struct EndpointSelector {
    pool: EndpointPool,
    sticky: OnceLock<Endpoint>,
}

impl EndpointSelector {
    /// Create a selector over a pool
    #[must_use]
    pub const fn new(pool: EndpointPool) -> Self {
        Self {
            pool,
            sticky: OnceLock::new(),
        }
    }

    /// Endpoint to use for the current lookup
    #[must_use]
    pub fn select(&self) -> Endpoint {
        if let Some(endpoint) = self.sticky.get() {
            return endpoint.clone();
        }

        if self.pool.len() == 1 {
            return self
                .sticky
                .get_or_init(|| self.pool.endpoints()[0].clone())
                .clone();
        }

        let endpoint = pick_endpoint(self.pool.endpoints(), &mut rand::thread_rng()).clone();
        tracing::debug!(endpoint = %endpoint, "selected remote endpoint");
        endpoint
    }

    /// The sticky choice, if one has been made
    #[must_use]
    pub fn current(&self) -> Option<&Endpoint> {
        self.sticky.get()
    }

    /// Underlying pool
    #[must_use]
    pub const fn pool(&self) -> &EndpointPool {
        &self.pool
    }
}
