//! Experiment - root entity of the rollout engine

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{MetricDefinition, Variant};
use crate::{Error, Result};

/// Lifecycle status of an experiment.
///
/// Transitions are linear: `Draft -> Running -> Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperimentStatus {
    /// Created, assignments available for dry runs, not yet serving traffic.
    #[default]
    Draft,
    /// Serving traffic and collecting metrics.
    Running,
    /// Terminal. Late metrics are still accepted.
    Stopped,
}

impl fmt::Display for ExperimentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Draft => "draft",
            Self::Running => "running",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Statistical settings for an experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Samples each variant needs before a comparison can be conclusive.
    pub minimum_sample_size: usize,
    /// Confidence level of the two-sided test (0.95 means alpha = 0.05).
    pub confidence_level: f64,
    /// Target power used to estimate the required sample size.
    pub power_level: f64,
    /// Whether a promotion may be recommended before `duration` elapsed.
    pub allow_early_termination: bool,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            minimum_sample_size: 100,
            confidence_level: 0.95,
            power_level: 0.8,
            allow_early_termination: false,
        }
    }
}

impl ExperimentConfig {
    /// Two-sided significance level, `1 - confidence_level`.
    #[must_use]
    pub fn alpha(&self) -> f64 {
        1.0 - self.confidence_level
    }
}

/// Experiment represents a controlled rollout of one or more treatments
/// against a control.
///
/// The first entry of `variants` is the control; order is significant for
/// traffic assignment as well. Instances are plain values until handed to
/// [`ExperimentManager::create_experiment`](crate::ExperimentManager::create_experiment),
/// which validates them and takes ownership of their lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(rename = "duration_secs", with = "duration_secs")]
    duration: Duration,
    #[serde(
        rename = "max_duration_secs",
        default,
        with = "optional_duration_secs",
        skip_serializing_if = "Option::is_none"
    )]
    max_duration: Option<Duration>,
    variants: Vec<Variant>,
    metrics: Vec<MetricDefinition>,
    #[serde(default)]
    config: ExperimentConfig,
    #[serde(default)]
    status: ExperimentStatus,
    #[serde(default = "Utc::now")]
    created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    stopped_at: Option<DateTime<Utc>>,
}

impl Experiment {
    /// Create a builder for an experiment with the given ID and name.
    #[must_use]
    pub fn builder(id: impl Into<String>, name: impl Into<String>) -> ExperimentBuilder {
        ExperimentBuilder::new(id, name)
    }

    /// Get the experiment ID.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the experiment name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Get the intended run length.
    #[must_use]
    pub const fn duration(&self) -> Duration {
        self.duration
    }

    /// Get the hard ceiling on run length, if any.
    #[must_use]
    pub const fn max_duration(&self) -> Option<Duration> {
        self.max_duration
    }

    /// Get the variants in configured order. The first is the control.
    #[must_use]
    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    /// Get the control variant.
    #[must_use]
    pub fn control(&self) -> Option<&Variant> {
        self.variants.first()
    }

    /// Look up a variant by ID.
    #[must_use]
    pub fn variant(&self, variant_id: &str) -> Option<&Variant> {
        self.variants.iter().find(|v| v.id() == variant_id)
    }

    /// Get the metric definitions.
    #[must_use]
    pub fn metrics(&self) -> &[MetricDefinition] {
        &self.metrics
    }

    /// Look up a metric definition by name.
    #[must_use]
    pub fn metric(&self, name: &str) -> Option<&MetricDefinition> {
        self.metrics.iter().find(|m| m.name() == name)
    }

    /// Get the statistical configuration.
    #[must_use]
    pub const fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// Get the lifecycle status.
    #[must_use]
    pub const fn status(&self) -> ExperimentStatus {
        self.status
    }

    /// Get the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Get the start timestamp, if started.
    #[must_use]
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Get the stop timestamp, if stopped.
    #[must_use]
    pub const fn stopped_at(&self) -> Option<DateTime<Utc>> {
        self.stopped_at
    }

    /// Time spent running as of `now`. Zero before the start.
    #[must_use]
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        let Some(started) = self.started_at else {
            return Duration::ZERO;
        };
        let end = self.stopped_at.unwrap_or(now);
        end.signed_duration_since(started)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Check every creation-time invariant.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] naming the first violated rule.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(Error::Validation(format!("experiment '{}': {msg}", self.id)));

        if self.id.trim().is_empty() {
            return Err(Error::Validation("experiment id must not be empty".to_string()));
        }
        if self.duration.is_zero() {
            return invalid("duration must be positive".to_string());
        }
        if let Some(max) = self.max_duration {
            if max < self.duration {
                return invalid(format!(
                    "max duration ({}s) must not be shorter than duration ({}s)",
                    max.as_secs(),
                    self.duration.as_secs()
                ));
            }
        }

        if self.variants.is_empty() {
            return invalid("at least one variant is required".to_string());
        }
        let mut variant_ids = HashSet::new();
        let mut variant_names = HashSet::new();
        for variant in &self.variants {
            if variant.id().trim().is_empty() {
                return invalid("variant id must not be empty".to_string());
            }
            if !variant_ids.insert(variant.id()) {
                return invalid(format!("duplicate variant id '{}'", variant.id()));
            }
            if !variant_names.insert(variant.name()) {
                return invalid(format!("duplicate variant name '{}'", variant.name()));
            }
            if variant.traffic_percent() > 100 {
                return invalid(format!(
                    "variant '{}' traffic percent {} exceeds 100",
                    variant.id(),
                    variant.traffic_percent()
                ));
            }
        }
        let total: u32 = self.variants.iter().map(Variant::traffic_percent).sum();
        if total != 100 {
            return invalid(format!("traffic percentages must sum to 100 (got {total})"));
        }

        if self.metrics.is_empty() {
            return invalid("at least one metric is required".to_string());
        }
        let mut metric_names = HashSet::new();
        for metric in &self.metrics {
            if metric.name().trim().is_empty() {
                return invalid("metric name must not be empty".to_string());
            }
            if !metric_names.insert(metric.name()) {
                return invalid(format!("duplicate metric name '{}'", metric.name()));
            }
            for (label, value) in [
                ("minimum improvement", metric.minimum_improvement()),
                ("maximum degradation", metric.maximum_degradation()),
            ] {
                if !value.is_finite() || value < 0.0 {
                    return invalid(format!(
                        "metric '{}' {label} must be a non-negative percentage",
                        metric.name()
                    ));
                }
            }
        }

        let in_unit_interval = |x: f64| x > 0.0 && x < 1.0;
        if !in_unit_interval(self.config.confidence_level) {
            return invalid("confidence level must be within (0, 1)".to_string());
        }
        if !in_unit_interval(self.config.power_level) {
            return invalid("power level must be within (0, 1)".to_string());
        }

        Ok(())
    }

    /// Reset lifecycle fields before registration.
    pub(crate) fn reset_lifecycle(&mut self, now: DateTime<Utc>) {
        self.status = ExperimentStatus::Draft;
        self.created_at = now;
        self.started_at = None;
        self.stopped_at = None;
    }

    /// Transition `Draft -> Running`.
    pub(crate) fn start(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.status != ExperimentStatus::Draft {
            return Err(Error::InvalidState(format!(
                "experiment '{}' is not in draft status (current: {})",
                self.id, self.status
            )));
        }
        self.status = ExperimentStatus::Running;
        self.started_at = Some(now);
        Ok(())
    }

    /// Transition `Running -> Stopped`.
    pub(crate) fn stop(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.status != ExperimentStatus::Running {
            return Err(Error::InvalidState(format!(
                "experiment '{}' is not in running status (current: {})",
                self.id, self.status
            )));
        }
        self.status = ExperimentStatus::Stopped;
        self.stopped_at = Some(now);
        Ok(())
    }
}

/// Builder for `Experiment`.
#[derive(Debug)]
pub struct ExperimentBuilder {
    id: String,
    name: String,
    description: String,
    duration: Duration,
    max_duration: Option<Duration>,
    variants: Vec<Variant>,
    metrics: Vec<MetricDefinition>,
    config: ExperimentConfig,
}

impl ExperimentBuilder {
    /// Create a new builder with required fields.
    ///
    /// The duration defaults to zero and must be set before creation.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            duration: Duration::ZERO,
            max_duration: None,
            variants: Vec::new(),
            metrics: Vec::new(),
            config: ExperimentConfig::default(),
        }
    }

    /// Set the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the intended run length.
    #[must_use]
    pub const fn duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Set the hard ceiling on run length.
    #[must_use]
    pub const fn max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = Some(max_duration);
        self
    }

    /// Append a variant. The first one added is the control.
    #[must_use]
    pub fn variant(mut self, variant: Variant) -> Self {
        self.variants.push(variant);
        self
    }

    /// Append a metric definition.
    #[must_use]
    pub fn metric(mut self, metric: MetricDefinition) -> Self {
        self.metrics.push(metric);
        self
    }

    /// Replace the statistical configuration.
    #[must_use]
    pub fn config(mut self, config: ExperimentConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the minimum per-variant sample size.
    #[must_use]
    pub const fn minimum_sample_size(mut self, size: usize) -> Self {
        self.config.minimum_sample_size = size;
        self
    }

    /// Set the confidence level.
    #[must_use]
    pub const fn confidence_level(mut self, level: f64) -> Self {
        self.config.confidence_level = level;
        self
    }

    /// Build the `Experiment` in `Draft` status. Validation is deferred to
    /// creation.
    #[must_use]
    pub fn build(self) -> Experiment {
        Experiment {
            id: self.id,
            name: self.name,
            description: self.description,
            duration: self.duration,
            max_duration: self.max_duration,
            variants: self.variants,
            metrics: self.metrics,
            config: self.config,
            status: ExperimentStatus::Draft,
            created_at: Utc::now(),
            started_at: None,
            stopped_at: None,
        }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

mod optional_duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(deserializer).map(|secs| secs.map(Duration::from_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_arm(control: u32, treatment: u32) -> Experiment {
        Experiment::builder("exp-1", "Two arms")
            .duration(Duration::from_secs(3600))
            .variant(Variant::new("control", "Control", control))
            .variant(Variant::new("treatment", "Treatment", treatment))
            .metric(MetricDefinition::higher_is_better("score"))
            .build()
    }

    #[test]
    fn test_experiment_builder_defaults() {
        let experiment = two_arm(50, 50);
        assert_eq!(experiment.id(), "exp-1");
        assert_eq!(experiment.status(), ExperimentStatus::Draft);
        assert_eq!(experiment.control().map(Variant::id), Some("control"));
        assert_eq!(experiment.config(), &ExperimentConfig::default());
        assert!(experiment.started_at().is_none());
        assert!(experiment.validate().is_ok());
    }

    #[test]
    fn test_validate_traffic_sum() {
        let err = two_arm(60, 30).validate().unwrap_err();
        assert!(err.to_string().contains("must sum to 100"));
        assert!(err.to_string().contains("got 90"));
    }

    #[test]
    fn test_validate_duplicate_variant_name() {
        let experiment = Experiment::builder("exp-1", "Same names")
            .duration(Duration::from_secs(60))
            .variant(Variant::new("a", "Same", 50))
            .variant(Variant::new("b", "Same", 50))
            .metric(MetricDefinition::higher_is_better("score"))
            .build();

        let err = experiment.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate variant name 'Same'"));
    }

    #[test]
    fn test_validate_zero_duration() {
        let experiment = Experiment::builder("exp-1", "No duration")
            .variant(Variant::new("control", "Control", 100))
            .metric(MetricDefinition::higher_is_better("score"))
            .build();
        assert!(experiment
            .validate()
            .unwrap_err()
            .to_string()
            .contains("duration must be positive"));
    }

    #[test]
    fn test_validate_max_duration_shorter_than_duration() {
        let experiment = Experiment::builder("exp-1", "Ceiling")
            .duration(Duration::from_secs(7200))
            .max_duration(Duration::from_secs(3600))
            .variant(Variant::new("control", "Control", 100))
            .metric(MetricDefinition::higher_is_better("score"))
            .build();
        assert!(matches!(experiment.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_lifecycle_transitions() {
        let mut experiment = two_arm(50, 50);
        let now = Utc::now();

        assert!(experiment.stop(now).is_err());
        experiment.start(now).unwrap();
        assert_eq!(experiment.status(), ExperimentStatus::Running);
        let err = experiment.start(now).unwrap_err();
        assert!(err.to_string().contains("not in draft status"));

        experiment.stop(now).unwrap();
        assert_eq!(experiment.status(), ExperimentStatus::Stopped);
        assert!(experiment.stop(now).is_err());
        assert!(experiment.stopped_at().unwrap() >= experiment.started_at().unwrap());
    }

    #[test]
    fn test_elapsed() {
        let mut experiment = two_arm(50, 50);
        let start = Utc::now();
        assert_eq!(experiment.elapsed(start), Duration::ZERO);

        experiment.start(start).unwrap();
        let later = start + chrono::Duration::seconds(90);
        assert_eq!(experiment.elapsed(later), Duration::from_secs(90));

        experiment.stop(later).unwrap();
        let much_later = later + chrono::Duration::seconds(600);
        assert_eq!(experiment.elapsed(much_later), Duration::from_secs(90));
    }

    #[test]
    fn test_experiment_json_durations_in_seconds() {
        let experiment = two_arm(50, 50);
        let json = serde_json::to_value(&experiment).expect("serialize");
        assert_eq!(json["duration_secs"], 3600);
        assert!(json.get("max_duration_secs").is_none());

        let back: Experiment = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back.duration(), Duration::from_secs(3600));
        assert_eq!(back.variants().len(), 2);
    }
}
