//! Statistical analysis of experiment samples
//!
//! Turns a read-only [`ExperimentSamples`] snapshot into per-metric verdicts
//! and an overall conclusion. Nothing here mutates state.
//!
//! ## Decision pipeline (per metric, per treatment vs. control)
//!
//! ```text
//! n < minimum_sample_size ──────────────▶ Inconclusive
//!        │
//!   Welch t-test at confidence_level
//!        │ not significant ─────────────▶ NoSignificantDifference
//!        │
//!   practical gate on relative change
//!        ├ favourable ≥ minimum_improvement ▶ Improved
//!        ├ adverse ≥ maximum_degradation ───▶ Degraded
//!        └ otherwise ───────────────────────▶ NoSignificantDifference
//! ```
//!
//! The first variant of the experiment is the control.

mod report;
mod stats;

pub use stats::{
    mean_confidence_interval, required_sample_size, welch_t_test, SampleSummary, WelchTest,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::collector::ExperimentSamples;
use crate::experiment::{Experiment, ExperimentStatus, MetricDefinition, MetricTarget, Variant};
use crate::Result;

/// Descriptive statistics of one variant for one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantStatistics {
    /// Variant ID
    pub variant_id: String,
    /// Count, mean, variance, extremes
    pub summary: SampleSummary,
    /// Confidence interval for the mean, below two samples `None`
    pub mean_interval: Option<(f64, f64)>,
}

/// Outcome of comparing one treatment against the control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOutcome {
    /// Significant and practically large in the favourable direction.
    Improved,
    /// Significant and beyond the degradation tolerance.
    Degraded,
    /// Not significant, or significant but within practical thresholds.
    NoSignificantDifference,
    /// Too few samples to say anything. Gather more data.
    Inconclusive,
}

/// Treatment-vs-control comparison for one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    /// Control variant ID
    pub control_id: String,
    /// Treatment variant ID
    pub treatment_id: String,
    /// Control sample count
    pub control_count: usize,
    /// Treatment sample count
    pub treatment_count: usize,
    /// `(treatment - control) / |control| * 100`, `None` if control mean is 0
    pub relative_change_pct: Option<f64>,
    /// Welch test, `None` when the comparison is inconclusive
    pub test: Option<WelchTest>,
    /// Whether the change cleared the metric's practical threshold
    pub practically_significant: bool,
    /// Per-variant samples needed for the configured power, when estimable
    pub required_sample_size: Option<usize>,
    /// Verdict of this comparison
    pub outcome: ComparisonOutcome,
}

impl Comparison {
    /// Relative change oriented so that positive is favourable for `target`.
    ///
    /// Falls back to an infinite change with the sign of the difference
    /// when the control mean is zero.
    #[must_use]
    pub fn favourable_change(&self, target: MetricTarget) -> f64 {
        let change = self.relative_change_pct.unwrap_or_else(|| {
            let difference = self.test.map_or(0.0, |t| t.difference);
            if difference == 0.0 {
                0.0
            } else {
                f64::INFINITY.copysign(difference)
            }
        });
        target.favourable(change)
    }
}

/// Metric-level verdict across all treatments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum MetricVerdict {
    /// A treatment is both statistically and practically better.
    Winner {
        /// Winning variant ID
        variant_id: String,
        /// Its relative change over control
        relative_change_pct: Option<f64>,
    },
    /// No treatment beat the control; keep the control.
    NoWinner,
    /// Some comparison lacked samples and nothing won.
    Inconclusive,
}

/// Full analysis of one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricAnalysis {
    /// Metric name
    pub metric_name: String,
    /// Improvement direction
    pub target: MetricTarget,
    /// Statistics per variant, in experiment order
    pub variants: Vec<VariantStatistics>,
    /// One comparison per treatment
    pub comparisons: Vec<Comparison>,
    /// Metric-level verdict
    pub verdict: MetricVerdict,
}

impl MetricAnalysis {
    /// Comparison for a given treatment.
    #[must_use]
    pub fn comparison(&self, treatment_id: &str) -> Option<&Comparison> {
        self.comparisons
            .iter()
            .find(|c| c.treatment_id == treatment_id)
    }

    /// Statistics for a given variant.
    #[must_use]
    pub fn variant(&self, variant_id: &str) -> Option<&VariantStatistics> {
        self.variants.iter().find(|v| v.variant_id == variant_id)
    }
}

/// Advisory rollout action for a treatment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RolloutDecision {
    /// Improves at least one metric and degrades none.
    Promote,
    /// No practical change anywhere; keep the control.
    Hold,
    /// Degrades at least one metric.
    Rollback,
    /// Some metric is still under-powered, or the run is too young to ship.
    CollectMoreData,
}

/// Rollout decision for one treatment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantDecision {
    /// Treatment variant ID
    pub variant_id: String,
    /// Recommended action
    pub decision: RolloutDecision,
}

/// Result of [`StatisticalAnalyzer::analyze`].
///
/// There is deliberately no single winner field: metrics may disagree, and
/// `conclusion` states every metric's verdict for the caller to weigh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Experiment ID
    pub experiment_id: String,
    /// Status at analysis time
    pub status: ExperimentStatus,
    /// When the analysis ran
    pub analyzed_at: DateTime<Utc>,
    /// Confidence level used
    pub confidence_level: f64,
    /// Minimum per-variant sample size used
    pub minimum_sample_size: usize,
    /// Per-metric results, in experiment order
    pub metrics: Vec<MetricAnalysis>,
    /// Per-treatment advisory decisions
    pub decisions: Vec<VariantDecision>,
    /// Human-readable summary of every verdict
    pub conclusion: String,
}

impl AnalysisResult {
    /// Analysis of a given metric.
    #[must_use]
    pub fn metric(&self, name: &str) -> Option<&MetricAnalysis> {
        self.metrics.iter().find(|m| m.metric_name == name)
    }

    /// Decision for a given treatment.
    #[must_use]
    pub fn decision(&self, variant_id: &str) -> Option<RolloutDecision> {
        self.decisions
            .iter()
            .find(|d| d.variant_id == variant_id)
            .map(|d| d.decision)
    }

    /// True if any metric is inconclusive.
    #[must_use]
    pub fn is_inconclusive(&self) -> bool {
        self.metrics
            .iter()
            .any(|m| m.verdict == MetricVerdict::Inconclusive)
    }
}

/// Stateless significance analyzer.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatisticalAnalyzer;

impl StatisticalAnalyzer {
    /// Create an analyzer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Analyze a sample snapshot against the experiment's definition.
    ///
    /// `now` decides whether a running experiment is still inside its
    /// intended duration, which blocks early promotion unless
    /// `allow_early_termination` is set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Statistics`](crate::Error::Statistics) if a
    /// distribution cannot be built.
    pub fn analyze(
        &self,
        experiment: &Experiment,
        samples: &ExperimentSamples,
        now: DateTime<Utc>,
    ) -> Result<AnalysisResult> {
        let metrics = experiment
            .metrics()
            .iter()
            .map(|metric| self.analyze_metric(experiment, metric, samples))
            .collect::<Result<Vec<_>>>()?;

        let promotion_blocked = experiment.status() == ExperimentStatus::Running
            && !experiment.config().allow_early_termination
            && experiment.elapsed(now) < experiment.duration();
        let decisions = decide(experiment, &metrics, promotion_blocked);
        let conclusion = report::conclusion(experiment, &metrics, &decisions, now);

        debug!(
            experiment_id = experiment.id(),
            metrics = metrics.len(),
            samples = samples.total_samples(),
            "analysis complete"
        );

        Ok(AnalysisResult {
            experiment_id: experiment.id().to_string(),
            status: experiment.status(),
            analyzed_at: now,
            confidence_level: experiment.config().confidence_level,
            minimum_sample_size: experiment.config().minimum_sample_size,
            metrics,
            decisions,
            conclusion,
        })
    }

    fn analyze_metric(
        &self,
        experiment: &Experiment,
        metric: &MetricDefinition,
        samples: &ExperimentSamples,
    ) -> Result<MetricAnalysis> {
        let confidence = experiment.config().confidence_level;
        let variants = experiment
            .variants()
            .iter()
            .map(|variant| -> Result<VariantStatistics> {
                let summary =
                    SampleSummary::from_samples(samples.values(variant.id(), metric.name()));
                Ok(VariantStatistics {
                    variant_id: variant.id().to_string(),
                    summary,
                    mean_interval: mean_confidence_interval(&summary, confidence)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let comparisons = match variants.split_first() {
            Some((control, treatments)) => treatments
                .iter()
                .map(|treatment| self.compare(experiment, metric, control, treatment))
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };

        let verdict = verdict(metric.target(), &comparisons);

        Ok(MetricAnalysis {
            metric_name: metric.name().to_string(),
            target: metric.target(),
            variants,
            comparisons,
            verdict,
        })
    }

    fn compare(
        &self,
        experiment: &Experiment,
        metric: &MetricDefinition,
        control: &VariantStatistics,
        treatment: &VariantStatistics,
    ) -> Result<Comparison> {
        let config = experiment.config();
        let (c, t) = (&control.summary, &treatment.summary);

        let relative_change_pct = (c.count > 0 && t.count > 0 && c.mean != 0.0)
            .then(|| (t.mean - c.mean) / c.mean.abs() * 100.0);
        let required_sample_size = required_sample_size(
            c,
            t,
            metric.minimum_improvement(),
            config.confidence_level,
            config.power_level,
        )?;

        let mut comparison = Comparison {
            control_id: control.variant_id.clone(),
            treatment_id: treatment.variant_id.clone(),
            control_count: c.count,
            treatment_count: t.count,
            relative_change_pct,
            test: None,
            practically_significant: false,
            required_sample_size,
            outcome: ComparisonOutcome::Inconclusive,
        };

        // Under-powered comparisons are never reported as significant.
        let floor = config.minimum_sample_size.max(2);
        if c.count < floor || t.count < floor {
            return Ok(comparison);
        }

        let test = welch_t_test(c, t, config.confidence_level)?;
        comparison.test = Some(test);
        comparison.outcome = ComparisonOutcome::NoSignificantDifference;
        if !test.significant {
            return Ok(comparison);
        }

        let favourable = comparison.favourable_change(metric.target());
        if favourable > 0.0 && favourable >= metric.minimum_improvement() {
            comparison.outcome = ComparisonOutcome::Improved;
            comparison.practically_significant = true;
        } else if favourable < 0.0 && -favourable >= metric.maximum_degradation() {
            comparison.outcome = ComparisonOutcome::Degraded;
            comparison.practically_significant = true;
        }
        Ok(comparison)
    }
}

fn verdict(target: MetricTarget, comparisons: &[Comparison]) -> MetricVerdict {
    let winner = comparisons
        .iter()
        .filter(|c| c.outcome == ComparisonOutcome::Improved)
        .max_by(|a, b| {
            a.favourable_change(target)
                .total_cmp(&b.favourable_change(target))
        });

    if let Some(winner) = winner {
        return MetricVerdict::Winner {
            variant_id: winner.treatment_id.clone(),
            relative_change_pct: winner.relative_change_pct,
        };
    }
    if comparisons
        .iter()
        .any(|c| c.outcome == ComparisonOutcome::Inconclusive)
    {
        MetricVerdict::Inconclusive
    } else {
        MetricVerdict::NoWinner
    }
}

fn decide(
    experiment: &Experiment,
    metrics: &[MetricAnalysis],
    promotion_blocked: bool,
) -> Vec<VariantDecision> {
    experiment
        .variants()
        .iter()
        .skip(1)
        .map(Variant::id)
        .map(|variant_id| {
            let outcomes: Vec<ComparisonOutcome> = metrics
                .iter()
                .filter_map(|m| m.comparison(variant_id))
                .map(|c| c.outcome)
                .collect();
            let has = |outcome| outcomes.contains(&outcome);

            let decision = if has(ComparisonOutcome::Degraded) {
                RolloutDecision::Rollback
            } else if has(ComparisonOutcome::Inconclusive) {
                RolloutDecision::CollectMoreData
            } else if has(ComparisonOutcome::Improved) {
                if promotion_blocked {
                    RolloutDecision::CollectMoreData
                } else {
                    RolloutDecision::Promote
                }
            } else {
                RolloutDecision::Hold
            };

            VariantDecision {
                variant_id: variant_id.to_string(),
                decision,
            }
        })
        .collect()
}
