//! Experiment lifecycle management
//!
//! [`ExperimentManager`] is the only entry point callers use. It validates
//! definitions, owns the `draft -> running -> stopped` state machine, and
//! composes the splitter, collector and analyzer.
//!
//! ## Request path
//!
//! ```text
//! get_variant_for_user ──▶ TrafficSplitter   (hash, no state)
//! record_metric ─────────▶ MetricsCollector  (append under experiment lock)
//! ```
//!
//! ## Operator path
//!
//! ```text
//! create_experiment ─▶ start_experiment ─▶ stop_experiment ─▶ analyze_experiment
//! ```

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::analysis::{AnalysisResult, StatisticalAnalyzer};
use crate::collector::MetricsCollector;
use crate::config::RolloutConfig;
use crate::experiment::{Experiment, ExperimentStatus, MetricDefinition, Variant};
use crate::splitter::TrafficSplitter;
use crate::store::{ExperimentStore, MemoryExperimentStore};
use crate::{Error, Result};

/// Log rejected operations at the boundary and pass the error through.
fn rejected<T>(operation: &str, experiment_id: &str, result: Result<T>) -> Result<T> {
    if let Err(err) = &result {
        if err.is_client_error() {
            warn!(operation, experiment_id, error = %err, "operation rejected");
        }
    }
    result
}

/// Owns experiment lifecycle and composes the leaf components.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use trueno_ab::experiment::{Experiment, MetricDefinition, Variant};
/// use trueno_ab::ExperimentManager;
///
/// # fn main() -> trueno_ab::Result<()> {
/// let manager = ExperimentManager::new();
/// manager.create_experiment(
///     Experiment::builder("chunking_strategy_test", "Chunking strategy")
///         .duration(Duration::from_secs(3600))
///         .variant(Variant::new("control", "Control", 50))
///         .variant(Variant::new("treatment", "Treatment", 50))
///         .metric(MetricDefinition::higher_is_better("chunk_quality_score").with_minimum_improvement(5.0))
///         .build(),
/// )?;
/// manager.start_experiment("chunking_strategy_test")?;
///
/// let variant = manager.get_variant_for_user("chunking_strategy_test", "user123")?;
/// manager.record_metric("chunking_strategy_test", variant.id(), "chunk_quality_score", 0.85)?;
///
/// manager.stop_experiment("chunking_strategy_test")?;
/// let result = manager.analyze_experiment("chunking_strategy_test")?;
/// assert!(!result.conclusion.is_empty());
/// # Ok(())
/// # }
/// ```
pub struct ExperimentManager<S: ExperimentStore = MemoryExperimentStore> {
    store: S,
    splitter: TrafficSplitter,
    collector: MetricsCollector,
    analyzer: StatisticalAnalyzer,
}

impl ExperimentManager<MemoryExperimentStore> {
    /// Create a manager backed by a fresh in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::with_store(MemoryExperimentStore::new())
    }
}

impl Default for ExperimentManager<MemoryExperimentStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: ExperimentStore> ExperimentManager<S> {
    /// Create a manager over the given experiment store.
    ///
    /// The store should start empty: the splitter and collector are only
    /// configured by [`create_experiment`](Self::create_experiment).
    pub fn with_store(store: S) -> Self {
        Self {
            store,
            splitter: TrafficSplitter::new(),
            collector: MetricsCollector::new(),
            analyzer: StatisticalAnalyzer::new(),
        }
    }

    /// Get the underlying experiment store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Validate and register an experiment in `draft` status.
    ///
    /// Lifecycle fields on the input are ignored. On success the experiment
    /// is immediately visible to assignment and metric recording.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an invalid definition or a
    /// duplicate id. Nothing is registered on failure.
    pub fn create_experiment(&self, mut experiment: Experiment) -> Result<()> {
        let id = experiment.id().to_string();
        rejected("create", &id, experiment.validate())?;
        experiment.reset_lifecycle(Utc::now());

        // Configure assignment and collection while the store entry is still
        // locked, so every operation sees the experiment from the same instant.
        // A duplicate id never reaches the hook.
        let register = |experiment: &Experiment| {
            let metric_names: Vec<&str> = experiment.metrics().iter().map(MetricDefinition::name).collect();
            self.collector.register(
                experiment.id(),
                experiment.variants().iter().map(Variant::id),
                &metric_names,
            );
            self.splitter.configure(experiment.id(), experiment.variants());
        };
        let (variants, metrics) = (experiment.variants().len(), experiment.metrics().len());
        rejected("create", &id, self.store.insert_with(experiment, register))?;

        info!(experiment_id = %id, variants, metrics, "experiment created");
        Ok(())
    }

    /// Create every experiment of a rollout configuration.
    ///
    /// All definitions are validated before any is registered. Returns the
    /// created ids in configuration order.
    ///
    /// # Errors
    ///
    /// Returns the first validation error, or the first duplicate id met
    /// while registering; experiments registered before it stay registered.
    pub fn create_from_config(&self, config: &RolloutConfig) -> Result<Vec<String>> {
        for experiment in &config.experiments {
            rejected("create", experiment.id(), experiment.validate())?;
        }
        config
            .experiments
            .iter()
            .map(|experiment| {
                self.create_experiment(experiment.clone())?;
                Ok(experiment.id().to_string())
            })
            .collect()
    }

    /// Transition an experiment from `draft` to `running`.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] for an unknown id
    /// - [`Error::InvalidState`] if not in `draft` status
    pub fn start_experiment(&self, id: &str) -> Result<()> {
        let now = Utc::now();
        rejected("start", id, self.store.update(id, |e| e.start(now)))?;
        info!(experiment_id = id, "experiment started");
        Ok(())
    }

    /// Transition an experiment from `running` to `stopped`.
    ///
    /// Stopping twice is an error, not a no-op.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] for an unknown id
    /// - [`Error::InvalidState`] if not in `running` status
    pub fn stop_experiment(&self, id: &str) -> Result<()> {
        let now = Utc::now();
        rejected("stop", id, self.store.update(id, |e| e.stop(now)))?;
        info!(experiment_id = id, "experiment stopped");
        Ok(())
    }

    /// Stop every running experiment that reached its `max_duration` by
    /// `now`. Returns the ids stopped, sorted.
    ///
    /// # Errors
    ///
    /// Propagates store failures. An experiment stopped concurrently by
    /// someone else is skipped.
    pub fn enforce_max_duration(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        let mut stopped = Vec::new();
        for experiment in self.store.list()? {
            let Some(max) = experiment.max_duration() else {
                continue;
            };
            if experiment.status() != ExperimentStatus::Running || experiment.elapsed(now) < max {
                continue;
            }
            match self.store.update(experiment.id(), |e| e.stop(now)) {
                Ok(_) => {
                    info!(
                        experiment_id = experiment.id(),
                        max_duration_secs = max.as_secs(),
                        "experiment stopped at max duration"
                    );
                    stopped.push(experiment.id().to_string());
                }
                Err(Error::InvalidState(_)) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(stopped)
    }

    /// Deterministically pick a variant for a subject.
    ///
    /// Works in every status so dry runs see the same assignment production
    /// traffic will.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown experiment.
    pub fn get_variant_for_user(&self, experiment_id: &str, subject_id: &str) -> Result<Variant> {
        rejected(
            "assign",
            experiment_id,
            self.splitter.assign(experiment_id, subject_id),
        )
    }

    /// Record one observed outcome.
    ///
    /// Accepted in every status; requests in flight when an experiment
    /// stops still report.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] for an unknown experiment, variant or metric
    /// - [`Error::Validation`] for a non-finite value
    pub fn record_metric(
        &self,
        experiment_id: &str,
        variant_id: &str,
        metric_name: &str,
        value: f64,
    ) -> Result<()> {
        rejected(
            "record",
            experiment_id,
            self.collector
                .record(experiment_id, variant_id, metric_name, value),
        )
    }

    /// Analyze the current samples of an experiment in any status.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] for an unknown experiment
    /// - [`Error::Statistics`] if a distribution cannot be built
    pub fn analyze_experiment(&self, id: &str) -> Result<AnalysisResult> {
        let experiment = rejected(
            "analyze",
            id,
            self.store
                .get(id)?
                .ok_or_else(|| Error::experiment_not_found(id)),
        )?;
        let samples = self.collector.snapshot(id)?;
        self.analyzer.analyze(&experiment, &samples, Utc::now())
    }

    /// Get a copy of an experiment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown id.
    pub fn get_experiment(&self, id: &str) -> Result<Experiment> {
        self.store
            .get(id)?
            .ok_or_else(|| Error::experiment_not_found(id))
    }

    /// Get copies of all experiments, sorted by id.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub fn list_experiments(&self) -> Result<Vec<Experiment>> {
        self.store.list()
    }

    /// Look up a metric definition of an experiment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown experiment or metric.
    pub fn metric_definition(&self, experiment_id: &str, metric_name: &str) -> Result<MetricDefinition> {
        self.get_experiment(experiment_id)?
            .metric(metric_name)
            .cloned()
            .ok_or_else(|| Error::metric_not_found(metric_name))
    }
}
