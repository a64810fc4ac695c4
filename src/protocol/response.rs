//! Inbound payload decoding

use std::collections::HashMap;
use std::io::Read;

use chrono::DateTime;
use flate2::read::GzDecoder;
use serde_json::{Map, Value};

use super::{ERROR_TAG_CAPABILITIES, ERROR_TAG_ERRORS};
use crate::device::{DeviceRecord, Origin};
use crate::{Error, Result};

/// Decoded response of the remote service
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloudResponse {
    /// Remote API build
    pub api_version: String,

    /// Device identifier
    pub id: String,

    /// Dataset refresh time, epoch seconds (0 when unparsable)
    pub mtime: i64,

    /// Capability name to value
    pub capabilities: HashMap<String, String>,

    /// Error tag to message, including synthetic partial-parse errors
    pub errors: HashMap<String, String>,
}

impl From<CloudResponse> for DeviceRecord {
    fn from(response: CloudResponse) -> Self {
        Self {
            capabilities: response.capabilities,
            errors: response.errors,
            origin: Origin::Remote,
            server_version: response.api_version,
            last_dataset_update: DateTime::from_timestamp(response.mtime, 0).unwrap_or_default(),
            device_id: response.id,
        }
    }
}

/// Turn a raw body into text, gunzipping when the transport says so
///
/// # Errors
///
/// Returns [`Error::Protocol`] for an unsupported encoding, a corrupt gzip
/// stream, or a body that is not UTF-8
pub fn decode_body(raw: &[u8], content_encoding: Option<&str>) -> Result<String> {
    let encoding = content_encoding
        .map(|e| e.trim().to_ascii_lowercase())
        .unwrap_or_default();

    let bytes = match encoding.as_str() {
        "" | "identity" => raw.to_vec(),
        "gzip" | "x-gzip" => {
            let mut out = Vec::with_capacity(raw.len() * 4);
            GzDecoder::new(raw)
                .read_to_end(&mut out)
                .map_err(|e| Error::Protocol(format!("invalid gzip body: {e}")))?;
            out
        }
        other => {
            return Err(Error::Protocol(format!(
                "unsupported content encoding: {other}"
            )));
        }
    };

    String::from_utf8(bytes).map_err(|e| Error::Protocol(format!("body is not UTF-8: {e}")))
}

/// Parse a response body
///
/// Only an undecodable body, a non-object top level, or a missing
/// `apiVersion`/`id` fails the whole parse. A bad `errors` or `capabilities`
/// member becomes a synthetic error entry, and a bad or missing `mtime` reads as 0.
///
/// # Errors
///
/// Returns [`Error::Protocol`] when the response is malformed
pub fn parse_response(raw: &[u8], content_encoding: Option<&str>) -> Result<CloudResponse> {
    let text = decode_body(raw, content_encoding)?;

    let json: Value =
        serde_json::from_str(&text).map_err(|e| Error::Protocol(format!("invalid JSON: {e}")))?;
    let Value::Object(json) = json else {
        return Err(Error::Protocol("top level is not an object".to_string()));
    };

    let mut response = CloudResponse {
        api_version: required_string(&json, "apiVersion")?,
        id: required_string(&json, "id")?,
        mtime: json.get("mtime").and_then(parse_mtime).unwrap_or_default(),
        ..CloudResponse::default()
    };

    match flat_map(&json, "errors") {
        Ok(errors) => response.errors.extend(errors),
        Err(()) => {
            response.errors.insert(
                ERROR_TAG_ERRORS.to_string(),
                "Unable to retrieve errors".to_string(),
            );
        }
    }

    match flat_map(&json, "capabilities") {
        Ok(capabilities) => response.capabilities = capabilities,
        Err(()) => {
            response.errors.insert(
                ERROR_TAG_CAPABILITIES.to_string(),
                "Unable to retrieve capabilities".to_string(),
            );
        }
    }

    Ok(response)
}

fn required_string(json: &Map<String, Value>, key: &str) -> Result<String> {
    match json.get(key) {
        Some(Value::Null) | None => Err(Error::Protocol(format!("missing `{key}`"))),
        Some(value) => Ok(scalar_to_string(value)),
    }
}

fn parse_mtime(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Read a flat string map; `null` is an empty map, anything else non-object fails
fn flat_map(
    json: &Map<String, Value>,
    key: &str,
) -> std::result::Result<HashMap<String, String>, ()> {
    match json.get(key) {
        Some(Value::Object(members)) => Ok(members
            .iter()
            .map(|(name, value)| (name.clone(), scalar_to_string(value)))
            .collect()),
        Some(Value::Null) => Ok(HashMap::new()),
        _ => Err(()),
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
