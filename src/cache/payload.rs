//! Client-held cache payload codec
//!
//! A record is projected to [`CachePayload`], serialized as JSON and then
//! URL-encoded so it fits in a cookie. The payload carries its own creation
//! time, so expiry does not depend on the cookie's own `Expires`.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::device::{DeviceRecord, Origin};
use crate::{Error, Result};

/// Externalizable projection of a [`DeviceRecord`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachePayload {
    pub server_version: String,
    pub server_timestamp: DateTime<Utc>,
    pub device_id: String,
    pub created_at: DateTime<Utc>,
    pub capabilities: HashMap<String, String>,
}

impl CachePayload {
    /// Project a record, stamping it with `now`
    #[must_use]
    pub fn from_record(record: &DeviceRecord, now: DateTime<Utc>) -> Self {
        Self {
            server_version: record.server_version.clone(),
            server_timestamp: record.last_dataset_update,
            device_id: record.device_id.clone(),
            created_at: now,
            capabilities: record.capabilities.clone(),
        }
    }

    /// Rebuild a cache-tagged record
    #[must_use]
    pub fn into_record(self) -> DeviceRecord {
        DeviceRecord {
            capabilities: self.capabilities,
            errors: HashMap::new(),
            origin: Origin::Cache,
            server_version: self.server_version,
            last_dataset_update: self.server_timestamp,
            device_id: self.device_id,
        }
    }

    /// Whether the payload is older than `ttl` at `now`
    ///
    /// A deadline past the representable range counts as expired.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.created_at
            .checked_add_signed(ttl)
            .is_none_or(|deadline| now > deadline)
    }

    /// Serialize to URL-safe text
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails
    pub fn encode(&self) -> Result<String> {
        let json = serde_json::to_string(self)?;
        Ok(urlencoding::encode(&json).into_owned())
    }

    /// Parse URL-safe text produced by [`CachePayload::encode`]
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the text is not valid percent-encoding,
    /// or a serialization error if the JSON does not match
    pub fn decode(text: &str) -> Result<Self> {
        let json = urlencoding::decode(text)
            .map_err(|e| Error::Protocol(format!("cache payload is not URL-encoded: {e}")))?;
        Ok(serde_json::from_str(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn sample_record() -> DeviceRecord {
        let mut record = DeviceRecord::empty();
        record
            .capabilities
            .insert("is_wireless_device".into(), "true".into());
        record
            .capabilities
            .insert("model_name".into(), "Pixel 8; \"Pro\" & more".into());
        record.device_id = "google_pixel_8_ver1".into();
        record.server_version = "1.4.2".into();
        record.last_dataset_update = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        record.origin = Origin::Remote;
        record
    }

    #[test]
    fn survives_encoding_within_ttl() {
        let now = Utc::now();
        let record = sample_record();
        let text = CachePayload::from_record(&record, now).encode().unwrap();

        assert!(!text.contains('"'));
        assert!(!text.contains(';'));

        let payload = CachePayload::decode(&text).unwrap();
        assert!(!payload.is_expired(now + Duration::seconds(60), Duration::seconds(86_400)));

        let restored = payload.into_record();
        assert_eq!(restored.capabilities, record.capabilities);
        assert_eq!(restored.device_id, record.device_id);
        assert_eq!(restored.server_version, record.server_version);
        assert_eq!(restored.last_dataset_update, record.last_dataset_update);
        assert_eq!(restored.origin, Origin::Cache);
    }

    #[test]
    fn old_payload_is_expired() {
        let created = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let payload = CachePayload::from_record(&sample_record(), created);
        let ttl = Duration::seconds(86_400);

        assert!(!payload.is_expired(created + ttl, ttl));
        assert!(payload.is_expired(created + ttl + Duration::seconds(1), ttl));
    }

    #[test]
    fn unrepresentable_deadline_is_expired() {
        let payload = CachePayload::from_record(&sample_record(), DateTime::<Utc>::MAX_UTC);
        assert!(payload.is_expired(Utc::now(), Duration::seconds(86_400)));
    }

    #[test]
    fn garbage_fails_to_decode() {
        assert!(CachePayload::decode("not-json").is_err());
        assert!(CachePayload::decode("%7B%22serverVersion%22").is_err());
        assert!(CachePayload::decode("%FF%FE").is_err());
    }
}
