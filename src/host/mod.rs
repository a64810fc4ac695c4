//! Host framework adapter boundary
//!
//! The client never touches a web framework directly. A host integration
//! implements [`HostRequest`] (read access to headers, user agent, a couple of
//! server variables and request cookies) and, for client-held caching,
//! [`HostResponse`] (append a cookie to the outgoing response).

pub mod http;

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::protocol::headers;

/// Server variables the client forwards to the remote service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerVariable {
    /// Address of the peer that opened the connection
    RemoteAddr,

    /// Inbound `X-Forwarded-For` chain
    ForwardedFor,
}

/// Read-only view of the inbound HTTP request
pub trait HostRequest: Send + Sync {
    /// All request headers as name/value pairs, in arrival order
    fn headers(&self) -> Vec<(String, String)>;

    /// The request's own `User-Agent`, if any
    fn user_agent(&self) -> Option<String> {
        self.headers()
            .into_iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(headers::USER_AGENT))
            .map(|(_, value)| value)
    }

    /// A server variable, if the host knows it
    fn server_variable(&self, variable: ServerVariable) -> Option<String>;

    /// Value of a request cookie
    fn cookie(&self, name: &str) -> Option<String>;
}

/// Write access to the outgoing response
pub trait HostResponse: Send + Sync {
    /// Append a cookie to the response
    fn set_cookie(&self, cookie: ResponseCookie);

    /// Whether a cookie with this name was already set on this response
    fn has_cookie(&self, name: &str) -> bool;

    /// Append the cookie unless one with the same name is already set
    ///
    /// Returns whether the cookie was added. The check and the append happen
    /// under one lock.
    fn set_cookie_once(&self, cookie: ResponseCookie) -> bool;
}

/// Cookie to be sent back to the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseCookie {
    /// Cookie name
    pub name: String,

    /// Already URL-safe value
    pub value: String,

    /// Absolute expiry
    pub expires: DateTime<Utc>,
}

impl ResponseCookie {
    /// Render as a `Set-Cookie` header value
    #[must_use]
    pub fn to_header_value(&self) -> String {
        format!(
            "{}={}; Expires={}; Path=/; HttpOnly",
            self.name,
            self.value,
            self.expires.format("%a, %d %b %Y %H:%M:%S GMT")
        )
    }
}

/// A request together with the response being built for it
#[derive(Clone, Copy)]
pub struct RequestContext<'a> {
    request: &'a dyn HostRequest,
    response: Option<&'a dyn HostResponse>,
}

impl<'a> RequestContext<'a> {
    /// Context with read-only access to the request
    #[must_use]
    pub fn new(request: &'a dyn HostRequest) -> Self {
        Self {
            request,
            response: None,
        }
    }

    /// Context that can also set cookies on the response
    #[must_use]
    pub fn with_response(request: &'a dyn HostRequest, response: &'a dyn HostResponse) -> Self {
        Self {
            request,
            response: Some(response),
        }
    }

    /// The inbound request
    #[must_use]
    pub fn request(&self) -> &'a dyn HostRequest {
        self.request
    }

    /// The outgoing response, when the host exposed one
    #[must_use]
    pub fn response(&self) -> Option<&'a dyn HostResponse> {
        self.response
    }

    /// The request's `User-Agent`, or the empty string
    #[must_use]
    pub fn user_agent(&self) -> String {
        self.request.user_agent().unwrap_or_default()
    }
}

impl std::fmt::Debug for RequestContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("user_agent", &self.request.user_agent())
            .field("has_response", &self.response.is_some())
            .finish()
    }
}

/// In-memory request, for hosts that already extracted the facts themselves
#[derive(Debug, Clone, Default)]
pub struct MemoryRequest {
    headers: Vec<(String, String)>,
    server_variables: HashMap<ServerVariable, String>,
    cookies: HashMap<String, String>,
}

impl MemoryRequest {
    /// Empty request
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a header
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the `User-Agent` header
    #[must_use]
    pub fn with_user_agent(self, user_agent: impl Into<String>) -> Self {
        self.with_header(headers::USER_AGENT, user_agent)
    }

    /// Set a server variable
    #[must_use]
    pub fn with_server_variable(mut self, variable: ServerVariable, value: impl Into<String>) -> Self {
        self.server_variables.insert(variable, value.into());
        self
    }

    /// Set a request cookie
    #[must_use]
    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }
}

impl HostRequest for MemoryRequest {
    fn headers(&self) -> Vec<(String, String)> {
        self.headers.clone()
    }

    fn server_variable(&self, variable: ServerVariable) -> Option<String> {
        self.server_variables.get(&variable).cloned()
    }

    fn cookie(&self, name: &str) -> Option<String> {
        self.cookies.get(name).cloned()
    }
}

/// In-memory response that records every cookie it is given
#[derive(Debug, Default)]
pub struct MemoryResponse {
    cookies: Mutex<Vec<ResponseCookie>>,
}

impl MemoryResponse {
    /// Empty response
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cookies set so far
    #[must_use]
    pub fn cookies(&self) -> Vec<ResponseCookie> {
        self.cookies
            .lock()
            .map(|cookies| cookies.clone())
            .unwrap_or_default()
    }
}

impl HostResponse for MemoryResponse {
    fn set_cookie(&self, cookie: ResponseCookie) {
        if let Ok(mut cookies) = self.cookies.lock() {
            cookies.push(cookie);
        }
    }

    fn has_cookie(&self, name: &str) -> bool {
        self.cookies
            .lock()
            .is_ok_and(|cookies| cookies.iter().any(|c| c.name == name))
    }

    fn set_cookie_once(&self, cookie: ResponseCookie) -> bool {
        let Ok(mut cookies) = self.cookies.lock() else {
            return false;
        };
        if cookies.iter().any(|c| c.name == cookie.name) {
            return false;
        }
        cookies.push(cookie);
        true
    }
}
