//! Conclusion text for analysis results

use chrono::{DateTime, Utc};

use super::{Comparison, ComparisonOutcome, MetricAnalysis, RolloutDecision, VariantDecision};
use crate::experiment::{Experiment, ExperimentStatus};

fn format_p(p: f64) -> String {
    if p < 0.001 {
        "p<0.001".to_string()
    } else {
        format!("p={p:.3}")
    }
}

fn format_change(comparison: &Comparison) -> String {
    match comparison.relative_change_pct {
        Some(pct) => format!("{:.1}%", pct.abs()),
        None => {
            let difference = comparison.test.map_or(0.0, |t| t.difference);
            format!("{difference:+.4} (control mean is 0)")
        }
    }
}

fn sample_sizes(comparison: &Comparison) -> String {
    format!(
        "n={} vs {}",
        comparison.treatment_count, comparison.control_count
    )
}

fn describe(metric: &MetricAnalysis, comparison: &Comparison, experiment: &Experiment) -> String {
    let name = &metric.metric_name;
    let treatment = &comparison.treatment_id;
    let control = &comparison.control_id;
    let p = comparison.test.map_or_else(String::new, |t| format_p(t.p_value));

    match comparison.outcome {
        ComparisonOutcome::Improved => format!(
            "{treatment} improves {name} by {} over {control} ({p}, {})",
            format_change(comparison),
            sample_sizes(comparison)
        ),
        ComparisonOutcome::Degraded => format!(
            "{treatment} degrades {name} by {} versus {control} ({p}, {})",
            format_change(comparison),
            sample_sizes(comparison)
        ),
        ComparisonOutcome::NoSignificantDifference => {
            if comparison.test.is_some_and(|t| t.significant) {
                format!(
                    "{treatment} changes {name} by {} ({p}, {}), within practical thresholds",
                    format_change(comparison),
                    sample_sizes(comparison)
                )
            } else {
                format!(
                    "no significant change in {name} for {treatment} ({p}, {})",
                    sample_sizes(comparison)
                )
            }
        }
        ComparisonOutcome::Inconclusive => {
            let config = experiment.config();
            let mut text = format!(
                "{name} inconclusive for {treatment} ({}, need at least {} per variant",
                sample_sizes(comparison),
                config.minimum_sample_size.max(2)
            );
            if let Some(required) = comparison.required_sample_size {
                text.push_str(&format!(
                    "; about {required} per variant for {:.0}% power",
                    config.power_level * 100.0
                ));
            }
            text.push(')');
            text
        }
    }
}

fn recommend(decision: &VariantDecision, control: &str) -> String {
    let variant = &decision.variant_id;
    match decision.decision {
        RolloutDecision::Promote => format!("recommend promoting {variant}"),
        RolloutDecision::Hold => format!("recommend keeping {control} over {variant}"),
        RolloutDecision::Rollback => format!("recommend rolling back {variant}"),
        RolloutDecision::CollectMoreData => format!("collect more data before deciding on {variant}"),
    }
}

/// Render every metric verdict and rollout decision as one line.
pub(super) fn conclusion(
    experiment: &Experiment,
    metrics: &[MetricAnalysis],
    decisions: &[VariantDecision],
    now: DateTime<Utc>,
) -> String {
    let control = experiment.control().map_or("control", |v| v.id());
    let mut parts = Vec::new();

    if experiment.status() == ExperimentStatus::Running {
        parts.push(format!(
            "experiment still running ({}s of {}s elapsed)",
            experiment.elapsed(now).as_secs(),
            experiment.duration().as_secs()
        ));
    }

    if decisions.is_empty() {
        parts.push(format!(
            "no treatment variants to compare; recommend keeping {control}"
        ));
        return parts.join("; ");
    }

    for metric in metrics {
        for comparison in &metric.comparisons {
            parts.push(describe(metric, comparison, experiment));
        }
    }
    for decision in decisions {
        parts.push(recommend(decision, control));
    }

    parts.join("; ")
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::analysis::MetricVerdict;
    use crate::experiment::{MetricDefinition, MetricTarget, Variant};

    #[test]
    fn test_format_p() {
        assert_eq!(format_p(0.0004), "p<0.001");
        assert_eq!(format_p(0.0123), "p=0.012");
        assert_eq!(format_p(1.0), "p=1.000");
    }

    #[test]
    fn test_recommend_wording() {
        let decision = |d| VariantDecision {
            variant_id: "treatment".to_string(),
            decision: d,
        };
        assert_eq!(
            recommend(&decision(RolloutDecision::Promote), "control"),
            "recommend promoting treatment"
        );
        assert_eq!(
            recommend(&decision(RolloutDecision::Hold), "control"),
            "recommend keeping control over treatment"
        );
        assert_eq!(
            recommend(&decision(RolloutDecision::Rollback), "control"),
            "recommend rolling back treatment"
        );
    }

    #[test]
    fn test_inconclusive_mentions_required_sample_size() {
        let experiment = Experiment::builder("exp", "Underpowered")
            .duration(Duration::from_secs(3600))
            .minimum_sample_size(100)
            .variant(Variant::new("control", "Control", 50))
            .variant(Variant::new("treatment", "Treatment", 50))
            .metric(MetricDefinition::higher_is_better("score"))
            .build();
        let comparison = Comparison {
            control_id: "control".to_string(),
            treatment_id: "treatment".to_string(),
            control_count: 12,
            treatment_count: 10,
            relative_change_pct: None,
            test: None,
            practically_significant: false,
            required_sample_size: Some(640),
            outcome: ComparisonOutcome::Inconclusive,
        };
        let metric = MetricAnalysis {
            metric_name: "score".to_string(),
            target: MetricTarget::HigherIsBetter,
            variants: Vec::new(),
            comparisons: vec![comparison.clone()],
            verdict: MetricVerdict::Inconclusive,
        };

        assert_eq!(
            describe(&metric, &comparison, &experiment),
            "score inconclusive for treatment (n=10 vs 12, need at least 100 per variant; \
             about 640 per variant for 80% power)"
        );
    }
}
