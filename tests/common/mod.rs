//! Shared test utilities
//!
//! [`MockService`] stands in for the remote capability service: an axum
//! router on an ephemeral localhost port that answers search requests from a
//! small fixed device table and records what it was sent.

#![allow(dead_code)]

use std::io::Write;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use devcap::{ClientConfig, Endpoint};
use flate2::Compression;
use flate2::write::GzEncoder;
use serde_json::{Map, Value, json};
use tokio::net::TcpListener;

pub const API_KEY: &str = "100000:s3cr3t";
pub const API_VERSION: &str = "1.0.0";
pub const PIXEL_UA: &str = "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36";
pub const DESKTOP_UA: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

/// How the mock answers every request
#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    /// Plain JSON
    Json,
    /// Gzip body whenever the client accepts it
    Gzip,
    /// Bare status code with an empty body
    Status(u16),
    /// JSON after a delay
    Slow(Duration),
    /// Body that is not JSON
    Garbage,
}

/// One request as the mock saw it
#[derive(Debug, Clone)]
pub struct Recorded {
    /// Percent-decoded path
    pub path: String,
    pub headers: HeaderMap,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

#[derive(Clone)]
struct Shared {
    behavior: Behavior,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

/// Running mock of the remote service
pub struct MockService {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl MockService {
    /// Bind to `127.0.0.1:0` and serve until the test runtime shuts down
    pub async fn start(behavior: Behavior) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = Shared {
            behavior,
            requests: requests.clone(),
        };
        let app = Router::new().fallback(search).with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind mock service");
        let addr = listener.local_addr().expect("mock service has no address");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self { addr, requests }
    }

    /// `host:port` to put in an [`Endpoint`]
    pub fn host(&self) -> String {
        self.addr.to_string()
    }

    /// Client config pointing at this mock only
    pub fn config(&self) -> ClientConfig {
        ClientConfig::default()
            .with_api_key(API_KEY)
            .with_servers(vec![Endpoint::new("mock", self.host(), 100)])
            .with_connection_timeout(Duration::from_millis(500))
            .with_read_timeout(Duration::from_millis(1000))
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().expect("poisoned").clone()
    }

    pub fn hits(&self) -> usize {
        self.requests.lock().expect("poisoned").len()
    }

    pub fn last(&self) -> Recorded {
        self.requests().pop().expect("no request reached the mock")
    }
}

async fn search(State(state): State<Shared>, uri: Uri, headers: HeaderMap) -> Response {
    let path = urlencoding::decode(uri.path())
        .map(|p| p.into_owned())
        .unwrap_or_else(|_| uri.path().to_string());

    let accepts_gzip = headers
        .get(header::ACCEPT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("gzip"));
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    state
        .requests
        .lock()
        .expect("poisoned")
        .push(Recorded {
            path: path.clone(),
            headers,
        });

    match state.behavior {
        Behavior::Status(code) => {
            StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR).into_response()
        }
        Behavior::Garbage => (StatusCode::OK, "<html>not json</html>").into_response(),
        Behavior::Slow(delay) => {
            tokio::time::sleep(delay).await;
            json_response(&path, &user_agent)
        }
        Behavior::Json => json_response(&path, &user_agent),
        Behavior::Gzip if accepts_gzip => {
            let body = answer(&path, &user_agent).to_string();
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(body.as_bytes()).expect("gzip write");
            let compressed = encoder.finish().expect("gzip finish");
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "application/json"),
                    (header::CONTENT_ENCODING, "gzip"),
                ],
                compressed,
            )
                .into_response()
        }
        Behavior::Gzip => json_response(&path, &user_agent),
    }
}

fn json_response(path: &str, user_agent: &str) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        answer(path, user_agent).to_string(),
    )
        .into_response()
}

/// Capabilities named in `/v1/json/search:('a,b')`
fn requested(path: &str) -> Vec<String> {
    path.strip_prefix("/v1/json/search:('")
        .and_then(|rest| rest.strip_suffix("')"))
        .map(|list| {
            list.split(',')
                .filter(|c| !c.is_empty())
                .map(ToString::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn answer(path: &str, user_agent: &str) -> Value {
    let mobile = user_agent.contains("Pixel");
    let mut capabilities = Map::new();
    let mut errors = Map::new();

    for name in requested(path) {
        let value = match name.as_str() {
            "is_wireless_device" | "is_smartphone" => Some(mobile.to_string()),
            "is_tablet" => Some("false".to_string()),
            "model_name" => Some(if mobile { "Pixel 8" } else { "" }.to_string()),
            "form_factor" => Some(if mobile { "Smartphone" } else { "Desktop" }.to_string()),
            _ => None,
        };
        match value {
            Some(value) => {
                capabilities.insert(name, Value::String(value));
            }
            None => {
                errors.insert(
                    name.clone(),
                    Value::String(format!("The {name} capability is not currently available")),
                );
            }
        }
    }

    json!({
        "apiVersion": API_VERSION,
        "id": if mobile { "google_pixel_8_ver1" } else { "generic_web_browser" },
        "mtime": "1700000000",
        "capabilities": capabilities,
        "errors": errors,
    })
}
