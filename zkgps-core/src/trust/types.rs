//! Core types for trust circles.
//!
//! A trust circle groups contacts who may see the owner's location at the
//! same precision. A contact's effective precision is the finest precision
//! among the enabled circles containing them, unless overridden.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::error::{Result, TrustError};
use crate::location::GeohashPrecision;

/// How close a circle is to the owner.
///
/// | Level    | Precision | Cell size      | Update interval | Mutual |
/// |----------|-----------|----------------|-----------------|--------|
/// | Intimate | 10        | ~1.2 m         | 30 s            | yes    |
/// | Close    | 8         | ~38 m          | 1 min           | yes    |
/// | Friends  | 6         | ~1.2 km        | 5 min           | no     |
/// | Network  | 4         | ~39 km         | 15 min          | no     |
/// | Public   | 2         | ~1,250 km      | 1 h             | no     |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustLevel {
    /// Partners and immediate family.
    Intimate,
    /// Close friends and family.
    Close,
    /// Friends.
    Friends,
    /// Acquaintances and colleagues.
    Network,
    /// Anyone.
    Public,
}

impl TrustLevel {
    /// Every level, most trusted first.
    pub const ALL: [Self; 5] = [
        Self::Intimate,
        Self::Close,
        Self::Friends,
        Self::Network,
        Self::Public,
    ];

    /// Converts to string representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Intimate => "intimate",
            Self::Close => "close",
            Self::Friends => "friends",
            Self::Network => "network",
            Self::Public => "public",
        }
    }

    /// Parses from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "intimate" => Some(Self::Intimate),
            "close" => Some(Self::Close),
            "friends" => Some(Self::Friends),
            "network" => Some(Self::Network),
            "public" => Some(Self::Public),
            _ => None,
        }
    }

    /// Default precision revealed to this level.
    #[must_use]
    pub const fn default_precision(&self) -> GeohashPrecision {
        let value = match self {
            Self::Intimate => 10,
            Self::Close => 8,
            Self::Friends => 6,
            Self::Network => 4,
            Self::Public => 2,
        };
        GeohashPrecision::from_const(value)
    }

    /// Default update interval in milliseconds.
    #[must_use]
    pub const fn default_update_interval_ms(&self) -> u64 {
        match self {
            Self::Intimate => 30_000,
            Self::Close => 60_000,
            Self::Friends => 300_000,
            Self::Network => 900_000,
            Self::Public => 3_600_000,
        }
    }

    /// Whether circles at this level require mutual membership by default.
    #[must_use]
    pub const fn requires_mutual_by_default(&self) -> bool {
        matches!(self, Self::Intimate | Self::Close)
    }

    /// Display name used for seeded default circles.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Intimate => "Intimate",
            Self::Close => "Close",
            Self::Friends => "Friends",
            Self::Network => "Network",
            Self::Public => "Public",
        }
    }
}

impl std::fmt::Display for TrustLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A group of contacts sharing one precision level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustCircle {
    /// Circle identifier.
    pub id: String,
    /// User-facing name.
    pub name: String,
    /// Trust level.
    pub level: TrustLevel,
    /// Precision overriding the level default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_precision: Option<GeohashPrecision>,
    /// Contact ids in this circle.
    #[serde(default)]
    pub members: BTreeSet<String>,
    /// Update interval in milliseconds.
    pub update_interval: u64,
    /// Whether members must reciprocate before receiving updates.
    pub require_mutual: bool,
    /// Disabled circles do not contribute to precision resolution.
    pub enabled: bool,
}

impl TrustCircle {
    /// `custom_precision`, or the level default.
    #[must_use]
    pub fn effective_precision(&self) -> GeohashPrecision {
        self.custom_precision
            .unwrap_or_else(|| self.level.default_precision())
    }

    /// Whether `contact_id` is a member.
    #[must_use]
    pub fn contains(&self, contact_id: &str) -> bool {
        self.members.contains(contact_id)
    }
}

/// Per-contact trust state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactTrust {
    /// Contact identifier.
    pub contact_id: String,
    /// Circle ids containing the contact.
    #[serde(default)]
    pub circles: BTreeSet<String>,
    /// Precision overriding circle resolution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision_override: Option<GeohashPrecision>,
    /// Paused contacts receive no location.
    #[serde(default)]
    pub paused: bool,
}

impl ContactTrust {
    /// A contact in no circle, unpaused, without override.
    #[must_use]
    pub fn new(contact_id: impl Into<String>) -> Self {
        Self {
            contact_id: contact_id.into(),
            circles: BTreeSet::new(),
            precision_override: None,
            paused: false,
        }
    }
}

/// Export/import format for the whole trust configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustSnapshot {
    /// All circles.
    pub circles: Vec<TrustCircle>,
    /// All contacts.
    pub contacts: Vec<ContactTrust>,
}

impl TrustSnapshot {
    /// Converts this snapshot to a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses a snapshot from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is invalid.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Configuration for creating a new circle.
#[derive(Debug, Clone)]
pub struct TrustCircleConfig {
    /// Explicit id; a random one is generated when absent.
    pub id: Option<String>,
    /// Circle name.
    pub name: String,
    /// Trust level.
    pub level: TrustLevel,
    /// Precision overriding the level default.
    pub custom_precision: Option<GeohashPrecision>,
    /// Update interval in milliseconds; the level default when absent.
    pub update_interval: Option<u64>,
    /// Mutual requirement; the level default when absent.
    pub require_mutual: Option<bool>,
    /// Whether the circle starts enabled.
    pub enabled: bool,
}

impl TrustCircleConfig {
    /// Creates a circle configuration with level defaults.
    #[must_use]
    pub fn new(name: impl Into<String>, level: TrustLevel) -> Self {
        Self {
            id: None,
            name: name.into(),
            level,
            custom_precision: None,
            update_interval: None,
            require_mutual: None,
            enabled: true,
        }
    }

    /// Sets an explicit id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets a custom precision.
    #[must_use]
    pub const fn with_custom_precision(mut self, precision: GeohashPrecision) -> Self {
        self.custom_precision = Some(precision);
        self
    }

    /// Sets the update interval in milliseconds.
    #[must_use]
    pub const fn with_update_interval(mut self, interval_ms: u64) -> Self {
        self.update_interval = Some(interval_ms);
        self
    }

    /// Sets the mutual membership requirement.
    #[must_use]
    pub const fn with_require_mutual(mut self, require_mutual: bool) -> Self {
        self.require_mutual = Some(require_mutual);
        self
    }

    /// Sets whether the circle starts enabled.
    #[must_use]
    pub const fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::InvalidData`] for an empty name or id, or a
    /// zero update interval.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(TrustError::InvalidData(
                "circle name must not be empty".to_string(),
            ));
        }
        if self.id.as_deref().is_some_and(str::is_empty) {
            return Err(TrustError::InvalidData(
                "circle id must not be empty".to_string(),
            ));
        }
        if self.update_interval == Some(0) {
            return Err(TrustError::InvalidData(
                "update interval must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Partial update of a circle; `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct TrustCircleUpdate {
    /// New name.
    pub name: Option<String>,
    /// New level.
    pub level: Option<TrustLevel>,
    /// New custom precision; `Some(None)` clears it.
    pub custom_precision: Option<Option<GeohashPrecision>>,
    /// New update interval in milliseconds.
    pub update_interval: Option<u64>,
    /// New mutual requirement.
    pub require_mutual: Option<bool>,
    /// New enabled flag.
    pub enabled: Option<bool>,
}

impl TrustCircleUpdate {
    /// An empty update.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Renames the circle.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Changes the level.
    #[must_use]
    pub const fn level(mut self, level: TrustLevel) -> Self {
        self.level = Some(level);
        self
    }

    /// Sets or clears the custom precision.
    #[must_use]
    pub const fn custom_precision(mut self, precision: Option<GeohashPrecision>) -> Self {
        self.custom_precision = Some(precision);
        self
    }

    /// Changes the update interval.
    #[must_use]
    pub const fn update_interval(mut self, interval_ms: u64) -> Self {
        self.update_interval = Some(interval_ms);
        self
    }

    /// Changes the mutual requirement.
    #[must_use]
    pub const fn require_mutual(mut self, require_mutual: bool) -> Self {
        self.require_mutual = Some(require_mutual);
        self
    }

    /// Enables or disables the circle.
    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub(crate) fn apply(self, circle: &mut TrustCircle) -> Result<()> {
        if self.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(TrustError::InvalidData(
                "circle name must not be empty".to_string(),
            ));
        }
        if self.update_interval == Some(0) {
            return Err(TrustError::InvalidData(
                "update interval must be positive".to_string(),
            ));
        }
        if let Some(name) = self.name {
            circle.name = name;
        }
        if let Some(level) = self.level {
            circle.level = level;
        }
        if let Some(precision) = self.custom_precision {
            circle.custom_precision = precision;
        }
        if let Some(interval) = self.update_interval {
            circle.update_interval = interval;
        }
        if let Some(require_mutual) = self.require_mutual {
            circle.require_mutual = require_mutual;
        }
        if let Some(enabled) = self.enabled {
            circle.enabled = enabled;
        }
        Ok(())
    }
}
