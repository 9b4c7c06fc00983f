//! Variant - one arm of an experiment and the behaviour it selects

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A typed configuration value handed back to the caller.
///
/// The set of tunable behaviours differs per experiment, so variant
/// configuration is a key/value bag, but values are restricted to this
/// closed set instead of arbitrary JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    /// Boolean switch
    Bool(bool),
    /// Numeric parameter (integers are stored as `f64`)
    Number(f64),
    /// Free-form string (strategy names, model ids, ...)
    String(String),
}

impl ConfigValue {
    /// Get the string payload, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the boolean payload, if this is a boolean.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get the numeric payload, if this is a number.
    #[must_use]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for ConfigValue {
    #[allow(clippy::cast_precision_loss)]
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

/// Variant represents one arm of an experiment.
///
/// The first variant of an experiment is the control. `traffic_percent`
/// values across an experiment must sum to exactly 100; this is checked
/// when the experiment is created, not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    id: String,
    name: String,
    traffic_percent: u32,
    #[serde(default)]
    configuration: BTreeMap<String, ConfigValue>,
    #[serde(default)]
    feature_flags: BTreeMap<String, bool>,
}

impl Variant {
    /// Create a new variant with no configuration.
    ///
    /// # Arguments
    ///
    /// * `id` - Identifier, unique within the experiment
    /// * `name` - Display name
    /// * `traffic_percent` - Share of traffic in whole percent (0-100)
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, traffic_percent: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            traffic_percent,
            configuration: BTreeMap::new(),
            feature_flags: BTreeMap::new(),
        }
    }

    /// Add a configuration entry.
    #[must_use]
    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.configuration.insert(key.into(), value.into());
        self
    }

    /// Add a feature flag.
    #[must_use]
    pub fn with_flag(mut self, flag: impl Into<String>, enabled: bool) -> Self {
        self.feature_flags.insert(flag.into(), enabled);
        self
    }

    /// Get the variant ID.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the traffic share in percent.
    #[must_use]
    pub const fn traffic_percent(&self) -> u32 {
        self.traffic_percent
    }

    /// Get the full configuration map.
    #[must_use]
    pub const fn configuration(&self) -> &BTreeMap<String, ConfigValue> {
        &self.configuration
    }

    /// Get the full feature flag map.
    #[must_use]
    pub const fn feature_flags(&self) -> &BTreeMap<String, bool> {
        &self.feature_flags
    }

    /// Look up a single configuration value.
    #[must_use]
    pub fn config_value(&self, key: &str) -> Option<&ConfigValue> {
        self.configuration.get(key)
    }

    /// Whether a feature flag is on. Unknown flags are off.
    #[must_use]
    pub fn feature_enabled(&self, flag: &str) -> bool {
        self.feature_flags.get(flag).copied().unwrap_or(false)
    }
}
