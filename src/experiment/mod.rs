//! Experiment Definition Schema
//!
//! Data structures describing a progressive rollout: the experiment, the
//! variants traffic is split across, and the metrics that decide whether
//! a treatment ships.
//!
//! ## Schema Overview
//!
//! ```text
//! Experiment (1) ──< Variant (N)          [ordered, first = control]
//!                ──< MetricDefinition (N) [non-empty]
//!                ──  ExperimentConfig     [sample size, confidence, power]
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use std::time::Duration;
//! use trueno_ab::experiment::{Experiment, MetricDefinition, Variant};
//!
//! let experiment = Experiment::builder("chunking_strategy_test", "Chunking strategy")
//!     .duration(Duration::from_secs(7 * 24 * 3600))
//!     .variant(Variant::new("control", "Fixed-size chunks", 50))
//!     .variant(Variant::new("treatment", "Semantic chunks", 50).with_config("strategy", "semantic"))
//!     .metric(MetricDefinition::higher_is_better("chunk_quality_score").with_minimum_improvement(5.0))
//!     .build();
//!
//! assert!(experiment.validate().is_ok());
//! ```

mod definition;
mod metric;
mod variant;

pub use definition::{Experiment, ExperimentBuilder, ExperimentConfig, ExperimentStatus};
pub use metric::{MetricDefinition, MetricKind, MetricTarget};
pub use variant::{ConfigValue, Variant};
