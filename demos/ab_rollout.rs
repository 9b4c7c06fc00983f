//! Simulated progressive rollout
//!
//! Routes synthetic traffic through a two-way experiment, records a quality
//! score and a latency per request, then prints the analysis.
//!
//! Run with: `RUST_LOG=trueno_ab=debug cargo run --example ab_rollout`

use std::time::Duration;

use anyhow::Context;
use rand::Rng;
use trueno_ab::experiment::{Experiment, MetricDefinition, MetricKind, Variant};
use trueno_ab::telemetry::init_tracing;
use trueno_ab::ExperimentManager;

const EXPERIMENT: &str = "chunking_strategy_test";

fn main() -> anyhow::Result<()> {
    init_tracing("info");

    let manager = ExperimentManager::new();
    manager.create_experiment(
        Experiment::builder(EXPERIMENT, "Semantic chunking for retrieval")
            .description("Fixed 512-token chunks versus sentence-aware chunks")
            .duration(Duration::from_secs(7 * 24 * 3600))
            .variant(Variant::new("control", "Fixed-size chunks", 50))
            .variant(
                Variant::new("treatment", "Semantic chunks", 50)
                    .with_config("strategy", "semantic")
                    .with_flag("rerank", true),
            )
            .metric(
                MetricDefinition::higher_is_better("chunk_quality_score")
                    .with_minimum_improvement(5.0),
            )
            .metric(
                MetricDefinition::lower_is_better("latency_ms")
                    .with_kind(MetricKind::Histogram)
                    .with_maximum_degradation(20.0),
            )
            .minimum_sample_size(500)
            .build(),
    )?;
    manager.start_experiment(EXPERIMENT)?;

    let mut rng = rand::thread_rng();
    for i in 0..5_000 {
        let subject = format!("user-{i}");
        let variant = manager.get_variant_for_user(EXPERIMENT, &subject)?;

        let semantic = variant.config_value("strategy").and_then(|v| v.as_str()) == Some("semantic");
        let (quality, latency) = if semantic {
            (rng.gen_range(0.70..0.95), rng.gen_range(40.0..70.0))
        } else {
            (rng.gen_range(0.65..0.85), rng.gen_range(35.0..60.0))
        };

        manager.record_metric(EXPERIMENT, variant.id(), "chunk_quality_score", quality)?;
        manager.record_metric(EXPERIMENT, variant.id(), "latency_ms", latency)?;
    }

    manager.stop_experiment(EXPERIMENT)?;
    let result = manager
        .analyze_experiment(EXPERIMENT)
        .context("analysis failed")?;

    for metric in &result.metrics {
        println!("{}:", metric.metric_name);
        for stats in &metric.variants {
            println!(
                "  {:<10} n={:<5} mean={:.4} sd={:.4}",
                stats.variant_id, stats.summary.count, stats.summary.mean, stats.summary.std_dev
            );
        }
        println!("  verdict: {:?}", metric.verdict);
    }
    println!("\n{}", result.conclusion);
    println!("\n{}", serde_json::to_string_pretty(&result.decisions)?);

    Ok(())
}
