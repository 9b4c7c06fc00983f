//! Metric Definition - what an experiment measures and which way is better

use serde::{Deserialize, Serialize};

/// Aggregation semantics of a metric.
///
/// Informational only: analysis treats every kind as a sample population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Point-in-time measurement (quality score, ratio).
    #[default]
    Gauge,
    /// Per-request count (retries, tokens).
    Counter,
    /// Distribution of durations or sizes (latency).
    Histogram,
}

/// Direction in which a metric improves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricTarget {
    /// Larger values are improvements (quality, conversion).
    HigherIsBetter,
    /// Smaller values are improvements (latency, error rate).
    LowerIsBetter,
}

impl MetricTarget {
    /// Orient a signed relative change so that positive means favourable.
    #[must_use]
    pub fn favourable(self, change: f64) -> f64 {
        match self {
            Self::HigherIsBetter => change,
            Self::LowerIsBetter => -change,
        }
    }
}

/// Metric Definition describes one measured outcome of an experiment.
///
/// ## Practical significance
///
/// A statistically significant change only counts when it clears a
/// threshold, expressed in percent of the control mean:
/// - `minimum_improvement`: favourable change needed for a win
/// - `maximum_degradation`: adverse change tolerated before it is a loss
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDefinition {
    name: String,
    #[serde(default)]
    kind: MetricKind,
    target: MetricTarget,
    #[serde(default)]
    minimum_improvement: f64,
    #[serde(default)]
    maximum_degradation: f64,
}

impl MetricDefinition {
    /// Create a metric definition with zero thresholds.
    #[must_use]
    pub fn new(name: impl Into<String>, target: MetricTarget) -> Self {
        Self {
            name: name.into(),
            kind: MetricKind::Gauge,
            target,
            minimum_improvement: 0.0,
            maximum_degradation: 0.0,
        }
    }

    /// Shorthand for a `HigherIsBetter` metric.
    #[must_use]
    pub fn higher_is_better(name: impl Into<String>) -> Self {
        Self::new(name, MetricTarget::HigherIsBetter)
    }

    /// Shorthand for a `LowerIsBetter` metric.
    #[must_use]
    pub fn lower_is_better(name: impl Into<String>) -> Self {
        Self::new(name, MetricTarget::LowerIsBetter)
    }

    /// Set the aggregation kind.
    #[must_use]
    pub const fn with_kind(mut self, kind: MetricKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set the minimum favourable change (percent) that counts as a win.
    #[must_use]
    pub const fn with_minimum_improvement(mut self, percent: f64) -> Self {
        self.minimum_improvement = percent;
        self
    }

    /// Set the adverse change (percent) tolerated before it is a loss.
    #[must_use]
    pub const fn with_maximum_degradation(mut self, percent: f64) -> Self {
        self.maximum_degradation = percent;
        self
    }

    /// Get the metric name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the aggregation kind.
    #[must_use]
    pub const fn kind(&self) -> MetricKind {
        self.kind
    }

    /// Get the improvement direction.
    #[must_use]
    pub const fn target(&self) -> MetricTarget {
        self.target
    }

    /// Get the minimum improvement threshold in percent.
    #[must_use]
    pub const fn minimum_improvement(&self) -> f64 {
        self.minimum_improvement
    }

    /// Get the maximum degradation tolerance in percent.
    #[must_use]
    pub const fn maximum_degradation(&self) -> f64 {
        self.maximum_degradation
    }
}
