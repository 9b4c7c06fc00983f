//! Metrics collection under concurrent writers
//!
//! Raw observations are stored per experiment as
//! `variant_id -> metric_name -> Vec<f64>`, append-only. Each experiment's
//! samples live behind one `DashMap` entry, so an append and a snapshot of
//! the same experiment never interleave: a snapshot sees every list either
//! before or after a given append.
//!
//! The nested map replaces a flat `"{variant}_{metric}"` key, which would
//! collide for ids containing underscores (`a_b` + `c` vs `a` + `b_c`).

use dashmap::DashMap;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{Error, Result};

/// Read-only copy of every sample recorded for one experiment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperimentSamples {
    experiment_id: String,
    samples: FxHashMap<String, FxHashMap<String, Vec<f64>>>,
}

impl ExperimentSamples {
    fn new<'a>(
        experiment_id: &str,
        variant_ids: impl IntoIterator<Item = &'a str>,
        metric_names: &[&str],
    ) -> Self {
        let samples = variant_ids
            .into_iter()
            .map(|variant| {
                let metrics = metric_names
                    .iter()
                    .map(|metric| ((*metric).to_string(), Vec::new()))
                    .collect();
                (variant.to_string(), metrics)
            })
            .collect();
        Self {
            experiment_id: experiment_id.to_string(),
            samples,
        }
    }

    /// Get the experiment ID.
    #[must_use]
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// Samples for one variant and metric, in insertion order.
    ///
    /// Unknown variants or metrics yield an empty slice.
    #[must_use]
    pub fn values(&self, variant_id: &str, metric_name: &str) -> &[f64] {
        self.samples
            .get(variant_id)
            .and_then(|metrics| metrics.get(metric_name))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Total number of samples across all variants and metrics.
    #[must_use]
    pub fn total_samples(&self) -> usize {
        self.samples
            .values()
            .flat_map(FxHashMap::values)
            .map(Vec::len)
            .sum()
    }

    fn push(&mut self, variant_id: &str, metric_name: &str, value: f64) -> Result<()> {
        let metrics = self
            .samples
            .get_mut(variant_id)
            .ok_or_else(|| Error::variant_not_found(variant_id))?;
        let values = metrics
            .get_mut(metric_name)
            .ok_or_else(|| Error::metric_not_found(metric_name))?;
        values.push(value);
        Ok(())
    }
}

/// Concurrent, append-only sample store.
#[derive(Default)]
pub struct MetricsCollector {
    experiments: DashMap<String, ExperimentSamples>,
}

impl MetricsCollector {
    /// Create an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the variants and metrics an experiment accepts.
    ///
    /// Replaces any samples previously held for `experiment_id`.
    pub fn register<'a>(
        &self,
        experiment_id: &str,
        variant_ids: impl IntoIterator<Item = &'a str>,
        metric_names: &[&str],
    ) {
        let samples = ExperimentSamples::new(experiment_id, variant_ids, metric_names);
        self.experiments.insert(experiment_id.to_string(), samples);
    }

    /// Append one observation.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] if `value` is NaN or infinite
    /// - [`Error::NotFound`] if the experiment, variant or metric was not
    ///   registered
    pub fn record(
        &self,
        experiment_id: &str,
        variant_id: &str,
        metric_name: &str,
        value: f64,
    ) -> Result<()> {
        if !value.is_finite() {
            return Err(Error::Validation(format!(
                "metric '{metric_name}' value must be finite (got {value})"
            )));
        }

        let mut entry = self
            .experiments
            .get_mut(experiment_id)
            .ok_or_else(|| Error::experiment_not_found(experiment_id))?;
        entry.push(variant_id, metric_name, value)?;

        trace!(experiment_id, variant_id, metric_name, value, "recorded metric");
        Ok(())
    }

    /// Copy every sample of an experiment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the experiment was not registered.
    pub fn snapshot(&self, experiment_id: &str) -> Result<ExperimentSamples> {
        self.experiments
            .get(experiment_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::experiment_not_found(experiment_id))
    }

    /// Number of samples recorded for one variant and metric.
    #[must_use]
    pub fn sample_count(&self, experiment_id: &str, variant_id: &str, metric_name: &str) -> usize {
        self.experiments
            .get(experiment_id)
            .map_or(0, |entry| entry.values(variant_id, metric_name).len())
    }
}
