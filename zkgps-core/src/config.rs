//! Protocol configuration.
//!
//! Configuration is plain data loaded from and saved to JSON. Every load
//! runs [`ProtocolConfig::validate`], so a `ProtocolConfig` obtained through
//! [`ProtocolConfig::from_json`] is always usable.
//!
//! ```json
//! {
//!   "trustLevels": {
//!     "intimate": { "precision": 10, "updateInterval": 30000 },
//!     "close":    { "precision": 8,  "updateInterval": 60000 },
//!     "friends":  { "precision": 6,  "updateInterval": 300000 },
//!     "network":  { "precision": 4,  "updateInterval": 900000 },
//!     "public":   { "precision": 2,  "updateInterval": 3600000 }
//!   },
//!   "location": {
//!     "minUpdateInterval": 30000,
//!     "maxCommitmentAge": 300000,
//!     "enableHistory": true,
//!     "historyRetention": 86400000,
//!     "useZkProofs": true,
//!     "minProofPrecision": 5,
//!     "queryRateLimit": 60
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::location::GeohashPrecision;
use crate::trust::TrustLevel;

/// Error type for configuration loading and validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A value is outside its valid range.
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// JSON (de)serialization failed.
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Precision and update interval for one trust level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelDefaults {
    /// Precision revealed to circles at this level.
    pub precision: GeohashPrecision,
    /// Update interval in milliseconds.
    pub update_interval: u64,
}

impl LevelDefaults {
    /// The built-in defaults for `level`.
    #[must_use]
    pub const fn for_level(level: TrustLevel) -> Self {
        Self {
            precision: level.default_precision(),
            update_interval: level.default_update_interval_ms(),
        }
    }
}

/// Per-level defaults for all five trust levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustLevelDefaults {
    /// Intimate circle defaults.
    pub intimate: LevelDefaults,
    /// Close circle defaults.
    pub close: LevelDefaults,
    /// Friends circle defaults.
    pub friends: LevelDefaults,
    /// Network circle defaults.
    pub network: LevelDefaults,
    /// Public circle defaults.
    pub public: LevelDefaults,
}

impl TrustLevelDefaults {
    /// Defaults for `level`.
    #[must_use]
    pub const fn get(&self, level: TrustLevel) -> LevelDefaults {
        match level {
            TrustLevel::Intimate => self.intimate,
            TrustLevel::Close => self.close,
            TrustLevel::Friends => self.friends,
            TrustLevel::Network => self.network,
            TrustLevel::Public => self.public,
        }
    }
}

impl Default for TrustLevelDefaults {
    fn default() -> Self {
        Self {
            intimate: LevelDefaults::for_level(TrustLevel::Intimate),
            close: LevelDefaults::for_level(TrustLevel::Close),
            friends: LevelDefaults::for_level(TrustLevel::Friends),
            network: LevelDefaults::for_level(TrustLevel::Network),
            public: LevelDefaults::for_level(TrustLevel::Public),
        }
    }
}

/// Location sharing behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LocationSettings {
    /// Minimum time between commitments, in milliseconds.
    pub min_update_interval: u64,
    /// Lifetime of a commitment, in milliseconds.
    pub max_commitment_age: u64,
    /// Whether commitments are recorded for temporal proofs.
    pub enable_history: bool,
    /// How long history entries are kept, in milliseconds.
    pub history_retention: u64,
    /// Whether proof generation is enabled.
    pub use_zk_proofs: bool,
    /// Coarsest precision a proof may be generated at.
    pub min_proof_precision: GeohashPrecision,
    /// Maximum proofs generated per minute.
    pub query_rate_limit: u32,
}

impl Default for LocationSettings {
    fn default() -> Self {
        Self {
            min_update_interval: 30_000,
            max_commitment_age: 300_000,
            enable_history: true,
            history_retention: 86_400_000,
            use_zk_proofs: true,
            min_proof_precision: GeohashPrecision::from_const(5),
            query_rate_limit: 60,
        }
    }
}

/// Complete protocol configuration.
///
/// # Example
///
/// ```
/// use zkgps_core::config::ProtocolConfig;
///
/// let config = ProtocolConfig::from_json(r#"{"location": {"queryRateLimit": 10}}"#).unwrap();
/// assert_eq!(config.location.query_rate_limit, 10);
/// assert_eq!(config.location.max_commitment_age, 300_000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProtocolConfig {
    /// Per-level trust defaults.
    pub trust_levels: TrustLevelDefaults,
    /// Location sharing settings.
    pub location: LocationSettings,
}

impl ProtocolConfig {
    /// Parses and validates a configuration. Missing fields take defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Serialization`] for malformed JSON and
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes the configuration as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        for level in TrustLevel::ALL {
            if self.trust_levels.get(level).update_interval == 0 {
                return Err(ConfigError::Invalid(format!(
                    "trustLevels.{level}.updateInterval must be positive"
                )));
            }
        }

        let location = &self.location;
        let positive = [
            ("minUpdateInterval", location.min_update_interval),
            ("maxCommitmentAge", location.max_commitment_age),
            ("historyRetention", location.history_retention),
            ("queryRateLimit", u64::from(location.query_rate_limit)),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::Invalid(format!(
                    "location.{field} must be positive"
                )));
            }
        }
        if i64::try_from(location.max_commitment_age).is_err()
            || i64::try_from(location.history_retention).is_err()
        {
            return Err(ConfigError::Invalid(
                "location durations must fit in a signed 64-bit millisecond count".to_string(),
            ));
        }
        if location.enable_history && location.history_retention < location.max_commitment_age {
            return Err(ConfigError::Invalid(
                "location.historyRetention must be at least location.maxCommitmentAge".to_string(),
            ));
        }
        Ok(())
    }

    /// Commitment lifetime as a duration.
    #[must_use]
    pub fn commitment_ttl(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(i64::try_from(self.location.max_commitment_age).unwrap_or(i64::MAX))
    }

    /// History retention as a duration.
    #[must_use]
    pub fn history_retention(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(i64::try_from(self.location.history_retention).unwrap_or(i64::MAX))
    }
}
