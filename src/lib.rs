//! # Trueno-AB: Experiment-Driven Progressive Rollouts
//!
//! **Version**: 0.1.0
//!
//! Trueno-AB runs A/B experiments behind a progressive deployment pipeline.
//! It splits traffic deterministically, collects per-variant metric samples,
//! and turns them into a statistically and practically grounded rollout
//! decision.
//!
//! ## Design Principles (Toyota Way Aligned)
//!
//! - **Poka-Yoke safety**: Definitions are validated before any traffic is routed
//! - **Jidoka**: Degraded treatments stop the line with a rollback decision
//! - **Genchi Genbutsu**: Decisions come from measured samples, never from hunches
//! - **Heijunka**: Stable hashing keeps each subject on one variant for the whole run
//!
//! ## Example Usage
//!
//! ```rust
//! use std::time::Duration;
//! use trueno_ab::experiment::{Experiment, MetricDefinition, Variant};
//! use trueno_ab::{ExperimentManager, RolloutDecision};
//!
//! let manager = ExperimentManager::new();
//! manager.create_experiment(
//!     Experiment::builder("ranking_v2", "Ranking model v2")
//!         .duration(Duration::from_secs(3600))
//!         .variant(Variant::new("control", "Current ranker", 50))
//!         .variant(Variant::new("treatment", "Ranker v2", 50))
//!         .metric(MetricDefinition::higher_is_better("ndcg").with_minimum_improvement(2.0))
//!         .minimum_sample_size(2)
//!         .build(),
//! )?;
//! manager.start_experiment("ranking_v2")?;
//!
//! for (variant, value) in [("control", 0.70), ("control", 0.72), ("treatment", 0.80), ("treatment", 0.82)] {
//!     manager.record_metric("ranking_v2", variant, "ndcg", value)?;
//! }
//!
//! manager.stop_experiment("ranking_v2")?;
//! let result = manager.analyze_experiment("ranking_v2")?;
//! assert_eq!(result.decision("treatment"), Some(RolloutDecision::Promote));
//! # Ok::<(), trueno_ab::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod analysis;
pub mod collector;
pub mod config;
pub mod error;
pub mod experiment;
pub mod manager;
pub mod splitter;
pub mod store;
pub mod telemetry;

pub use analysis::{
    AnalysisResult, Comparison, ComparisonOutcome, MetricAnalysis, MetricVerdict,
    RolloutDecision, StatisticalAnalyzer, VariantDecision,
};
pub use collector::{ExperimentSamples, MetricsCollector};
pub use config::RolloutConfig;
pub use error::{Entity, Error, Result};
pub use experiment::{Experiment, ExperimentStatus, MetricDefinition, MetricTarget, Variant};
pub use manager::ExperimentManager;
pub use splitter::TrafficSplitter;
pub use store::{ExperimentStore, MemoryExperimentStore};
