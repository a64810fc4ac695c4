//! Adapter for hosts built on the `http` crate types (axum, hyper, tower)

use std::net::SocketAddr;
use std::sync::Mutex;

use axum::extract::ConnectInfo;
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue};

use super::{HostRequest, HostResponse, ResponseCookie, ServerVariable};
use crate::protocol::headers;

impl HostRequest for Parts {
    fn headers(&self) -> Vec<(String, String)> {
        self.headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect()
    }

    fn user_agent(&self) -> Option<String> {
        self.headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
    }

    fn server_variable(&self, variable: ServerVariable) -> Option<String> {
        match variable {
            ServerVariable::RemoteAddr => self
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string()),
            ServerVariable::ForwardedFor => self
                .headers
                .get(headers::X_FORWARDED_FOR)
                .and_then(|v| v.to_str().ok())
                .map(ToString::to_string),
        }
    }

    fn cookie(&self, name: &str) -> Option<String> {
        self.headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(|header| find_cookie(header, name))
    }
}

/// Find one cookie in a `Cookie` header value (`a=1; b=2`)
fn find_cookie(header: &str, name: &str) -> Option<String> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

/// Collects cookies during a lookup and writes them as `Set-Cookie` headers
#[derive(Debug, Default)]
pub struct SetCookieJar {
    cookies: Mutex<Vec<ResponseCookie>>,
}

impl SetCookieJar {
    /// Empty jar
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one `Set-Cookie` header per collected cookie
    pub fn apply(&self, headers: &mut HeaderMap) {
        let Ok(cookies) = self.cookies.lock() else {
            return;
        };

        for cookie in cookies.iter() {
            match HeaderValue::from_str(&cookie.to_header_value()) {
                Ok(value) => {
                    headers.append(SET_COOKIE, value);
                }
                Err(e) => {
                    tracing::warn!(cookie = %cookie.name, error = %e, "skipping unrepresentable cookie");
                }
            }
        }
    }
}

impl HostResponse for SetCookieJar {
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
