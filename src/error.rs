//! Error types for Trueno-AB
//!
//! Toyota Way: Clear error messages with actionable guidance (Respect for People)

use std::fmt;

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Kind of entity an operation referenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    /// An experiment, by id
    Experiment,
    /// A variant within an experiment, by id
    Variant,
    /// A metric definition within an experiment, by name
    Metric,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Experiment => "experiment",
            Self::Variant => "variant",
            Self::Metric => "metric",
        };
        f.write_str(name)
    }
}

/// Trueno-AB error types
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed input, rejected before any state mutation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Operation referenced an unknown experiment, variant or metric
    #[error("{kind} not found: {id}")]
    NotFound {
        /// What kind of entity was looked up
        kind: Entity,
        /// The id or name that did not resolve
        id: String,
    },

    /// Lifecycle operation attempted from the wrong state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Distribution construction failed during analysis
    #[error("Statistics error: {0}")]
    Statistics(String),

    /// Rollout configuration could not be interpreted
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML (de)serialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Unknown experiment id.
    pub fn experiment_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: Entity::Experiment,
            id: id.into(),
        }
    }

    /// Unknown variant id within an experiment.
    pub fn variant_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: Entity::Variant,
            id: id.into(),
        }
    }

    /// Unknown metric name within an experiment.
    pub fn metric_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: Entity::Metric,
            id: id.into(),
        }
    }

    /// True for errors the caller caused with bad input or bad timing,
    /// as opposed to configuration or IO failures.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::NotFound { .. } | Self::InvalidState(_)
        )
    }
}
