//! HTTP transport to the remote capability service
//!
//! One `GET` per lookup, no retries. Bodies are fetched raw; decompression is
//! left to the protocol layer so that `Content-Encoding` is handled the same
//! way whether or not the HTTP stack would have done it.

use std::time::Duration;

use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::protocol::{CloudResponse, OutboundRequest, headers, parse_response};
use crate::{Error, Result};

/// Default connect timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Default read timeout
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Network knobs for [`HttpTransport`]
#[derive(Debug, Clone)]
pub struct TransportOptions {
    /// Time allowed to establish the connection
    pub connect_timeout: Duration,

    /// Time allowed between reads once connected
    pub read_timeout: Duration,

    /// Optional HTTP proxy URL
    pub proxy: Option<String>,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            proxy: None,
        }
    }
}

/// Sends prepared requests and decodes the answers
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Build the underlying HTTP client
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the proxy URL is invalid or the client
    /// cannot be built
    pub fn new(options: &TransportOptions) -> Result<Self> {
        let mut builder = Client::builder()
            .connect_timeout(options.connect_timeout)
            .read_timeout(options.read_timeout)
            .timeout(options.connect_timeout + options.read_timeout)
            .redirect(reqwest::redirect::Policy::none());

        if let Some(proxy) = options.proxy.as_deref().filter(|p| !p.trim().is_empty()) {
            let proxy = reqwest::Proxy::http(proxy)
                .map_err(|e| Error::Config(format!("invalid proxy `{proxy}`: {e}")))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client })
    }

    /// Perform one lookup round trip
    ///
    /// # Errors
    ///
    /// Returns [`Error::RemoteRejection`] for a non-2xx status, a transport
    /// error when no response arrived in time, or [`Error::Protocol`] when the
    /// body cannot be decoded
    pub async fn send(&self, request: &OutboundRequest) -> Result<CloudResponse> {
        tracing::debug!(url = %request.url, "querying remote capability service");

        let response = self
            .client
            .get(&request.url)
            .headers(header_map(&request.headers))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::RemoteRejection {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        let content_encoding = response
            .headers()
            .get(headers::CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string);

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Transport(format!("failed to read response body: {e}")))?;
        parse_response(&body, content_encoding.as_deref())
    }
}

/// Convert header pairs, dropping the ones HTTP cannot carry
fn header_map(pairs: &[(String, String)]) -> HeaderMap {
    let mut map = HeaderMap::with_capacity(pairs.len());
    for (name, value) in pairs {
        let parsed = HeaderName::from_bytes(name.as_bytes())
            .ok()
            .zip(HeaderValue::from_str(value).ok());
        match parsed {
            Some((name, value)) => {
                map.insert(name, value);
            }
            None => tracing::debug!(header = %name, "skipping unrepresentable header"),
        }
    }
    map
}
