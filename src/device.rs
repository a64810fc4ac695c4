//! Device lookup results

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where the data in a [`DeviceRecord`] came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Nothing was found; the record is empty or degraded
    #[default]
    None,

    /// Fresh answer from the remote service
    Remote,

    /// Served from a cache store
    Cache,

    /// Served from an offline recovery source
    Recovery,
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Remote => write!(f, "remote"),
            Self::Cache => write!(f, "cache"),
            Self::Recovery => write!(f, "recovery"),
        }
    }
}

/// Result of a capability lookup
///
/// A non-empty `errors` map marks the record as degraded. Records are not
/// mutated after construction; [`DeviceRecord::recache`] produces a re-tagged
/// copy instead.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Capability name to value
    pub capabilities: HashMap<String, String>,

    /// Error tag to human-readable message
    pub errors: HashMap<String, String>,

    /// Provenance of the data
    pub origin: Origin,

    /// Build identifier of the remote service
    pub server_version: String,

    /// When the remote dataset was last refreshed
    pub last_dataset_update: DateTime<Utc>,

    /// Opaque device identifier assigned by the remote service
    pub device_id: String,
}

impl DeviceRecord {
    /// Empty record with `origin = none`, used for every cache miss
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Record carrying a single error and no capabilities
    #[must_use]
    pub fn degraded(tag: impl Into<String>, message: impl Into<String>) -> Self {
        let mut record = Self::empty();
        record.errors.insert(tag.into(), message.into());
        record
    }

    /// Copy of this record with a different origin tag
    #[must_use]
    pub fn recache(&self, origin: Origin) -> Self {
        Self {
            origin,
            ..self.clone()
        }
    }

    /// Value of a capability, or the empty string when it was not returned
    #[must_use]
    pub fn get(&self, capability: &str) -> &str {
        self.capabilities
            .get(capability)
            .map_or("", String::as_str)
    }

    /// Whether the record carries any capability values
    #[must_use]
    pub fn has_capabilities(&self) -> bool {
        !self.capabilities.is_empty()
    }

    /// Whether any error was recorded
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        !self.errors.is_empty()
    }
}
