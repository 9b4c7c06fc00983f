//! Rollout configuration files
//!
//! Experiment definitions usually live next to the deployment's canary and
//! blue-green configs as YAML; JSON is accepted as well.
//!
//! ```yaml
//! experiments:
//!   - id: chunking_strategy_test
//!     name: Chunking strategy
//!     duration_secs: 604800
//!     max_duration_secs: 1209600
//!     variants:
//!       - { id: control, name: Fixed chunks, traffic_percent: 50 }
//!       - id: treatment
//!         name: Semantic chunks
//!         traffic_percent: 50
//!         configuration: { strategy: semantic, chunk_size: 512 }
//!         feature_flags: { rerank: true }
//!     metrics:
//!       - { name: chunk_quality_score, target: higher_is_better, minimum_improvement: 5.0 }
//!     config: { minimum_sample_size: 1000, confidence_level: 0.95 }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::experiment::Experiment;
use crate::{Error, Result};

/// A set of experiment definitions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RolloutConfig {
    /// Definitions in creation order
    #[serde(default)]
    pub experiments: Vec<Experiment>,
}

impl RolloutConfig {
    /// Parse a YAML document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Yaml`] for malformed input.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Parse a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] for malformed input.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a file, choosing the format by extension (`.yaml`, `.yml`,
    /// `.json`).
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] for an unsupported extension
    /// - [`Error::Io`] if the file cannot be read
    /// - [`Error::Yaml`] / [`Error::Json`] for malformed content
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("yaml" | "yml") => Self::from_yaml_str(&std::fs::read_to_string(path)?),
            Some("json") => Self::from_json_str(&std::fs::read_to_string(path)?),
            _ => Err(Error::Config(format!(
                "unsupported rollout config format: {}",
                path.display()
            ))),
        }
    }

    /// Serialize to YAML.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Yaml`] if serialization fails.
    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}
