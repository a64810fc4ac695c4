//! Outbound request construction

use super::{REQUEST_PATH_PREFIX, REQUEST_PATH_SUFFIX, headers};
use crate::credential::Credential;
use crate::endpoint::Endpoint;
use crate::host::{RequestContext, ServerVariable};

/// Facts taken from the inbound request that shape the outbound one
#[derive(Debug, Clone, Default)]
pub struct InboundFacts {
    /// Inbound headers, forwarded verbatim apart from transport-owned ones
    pub headers: Vec<(String, String)>,

    /// Peer address of the inbound connection
    pub remote_addr: Option<String>,

    /// Inbound `X-Forwarded-For` chain
    pub forwarded_for: Option<String>,
}

impl InboundFacts {
    /// Capture the facts from a host request
    #[must_use]
    pub fn from_context(context: &RequestContext<'_>) -> Self {
        let request = context.request();
        Self {
            headers: request.headers(),
            remote_addr: request.server_variable(ServerVariable::RemoteAddr),
            forwarded_for: request.server_variable(ServerVariable::ForwardedFor),
        }
    }

    /// The inbound `User-Agent` header, if present
    fn user_agent(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(headers::USER_AGENT))
            .map(|(_, value)| value.as_str())
    }

    /// `remote_addr,forwarded_for`, with empty parts and stray commas trimmed
    fn forwarded_chain(&self) -> String {
        let joined = [
            self.remote_addr.as_deref().unwrap_or_default(),
            self.forwarded_for.as_deref().unwrap_or_default(),
        ]
        .join(",");
        joined.trim_matches(',').trim().to_string()
    }
}

/// Per-client knobs applied to every request
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// Ask for gzip-compressed responses
    pub compression: bool,

    /// Value of the `X-Cloud-Client` header
    pub client_signature: String,

    /// Pre-rendered `X-Cloud-Counters` value, when a report is due
    pub counters: Option<String>,
}

/// A fully prepared request to the remote service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRequest {
    /// Absolute URL (`http://<host><path>`)
    pub url: String,

    /// Search path
    pub path: String,

    /// Effective user agent the lookup is keyed on (may be empty)
    pub user_agent: String,

    /// Headers to send, unique by case-insensitive name
    pub headers: Vec<(String, String)>,
}

impl OutboundRequest {
    /// Value of a header, compared case-insensitively
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    fn set_header(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        if let Some(slot) = self
            .headers
            .iter_mut()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
        {
            slot.1 = value;
        } else {
            self.headers.push((name.to_string(), value));
        }
    }
}

/// Search path for a capability list
///
/// Names are percent-encoded so that `?`, `#` or `,` inside a name cannot
/// end the path or split the list.
#[must_use]
pub fn build_path(capabilities: &[String]) -> String {
    let names: Vec<_> = capabilities
        .iter()
        .map(|name| urlencoding::encode(name))
        .collect();
    format!(
        "{REQUEST_PATH_PREFIX}{}{REQUEST_PATH_SUFFIX}",
        names.join(",")
    )
}

/// Build the request for one lookup
///
/// `user_agent` overrides the inbound `User-Agent` when it is non-blank.
#[must_use]
pub fn build_request(
    endpoint: &Endpoint,
    credential: &Credential,
    user_agent: Option<&str>,
    inbound: &InboundFacts,
    capabilities: &[String],
    options: &RequestOptions,
) -> OutboundRequest {
    let path = build_path(capabilities);
    let effective_ua = user_agent
        .map(str::trim)
        .filter(|ua| !ua.is_empty())
        .or_else(|| inbound.user_agent().map(str::trim))
        .unwrap_or_default()
        .to_string();

    let mut request = OutboundRequest {
        url: format!("http://{}{path}", endpoint.host),
        path,
        user_agent: effective_ua,
        headers: Vec::with_capacity(inbound.headers.len() + 8),
    };

    for (name, value) in &inbound.headers {
        if headers::TRANSPORT_OWNED
            .iter()
            .any(|owned| owned.eq_ignore_ascii_case(name))
        {
            continue;
        }
        if name.eq_ignore_ascii_case(headers::ACCEPT_ENCODING) {
            request.set_header(headers::X_ACCEPT_ENCODING, value.clone());
            continue;
        }
        request.set_header(name, value.clone());
    }

    if !request.user_agent.is_empty() {
        let ua = request.user_agent.clone();
        request.set_header(headers::USER_AGENT, ua);
    }

    request.set_header(headers::ACCEPT, "*/*");
    if options.compression {
        request.set_header(headers::ACCEPT_ENCODING, "gzip");
    }
    request.set_header(headers::X_CLOUD_CLIENT, options.client_signature.clone());
    request.set_header(headers::CONNECTION, "close");
    request.set_header(headers::AUTHORIZATION, credential.basic_auth());

    let chain = inbound.forwarded_chain();
    if !chain.is_empty() {
        request.set_header(headers::X_FORWARDED_FOR, chain);
    }

    if let Some(counters) = &options.counters {
        request.set_header(headers::X_CLOUD_COUNTERS, counters.clone());
    }

    request
}
