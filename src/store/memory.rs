//! In-memory experiment store using `DashMap`.
//!
//! This is the default backend - experiments are lost on process restart.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::ExperimentStore;
use crate::experiment::Experiment;
use crate::{Error, Result};

/// In-memory experiment registry backed by a sharded concurrent hashmap.
///
/// Updates hold the shard write lock for the duration of the mutation, which
/// makes lifecycle transitions on one experiment linearizable.
pub struct MemoryExperimentStore {
    experiments: DashMap<String, Experiment>,
}

impl MemoryExperimentStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            experiments: DashMap::new(),
        }
    }

    /// Create with pre-allocated capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            experiments: DashMap::with_capacity(capacity),
        }
    }

    /// Get the number of registered experiments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.experiments.len()
    }

    /// Check if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty()
    }
}

impl Default for MemoryExperimentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ExperimentStore for MemoryExperimentStore {
    fn insert_with<F>(&self, experiment: Experiment, on_insert: F) -> Result<()>
    where
        F: FnOnce(&Experiment),
    {
        match self.experiments.entry(experiment.id().to_string()) {
            Entry::Occupied(entry) => Err(Error::Validation(format!(
                "experiment '{}' already exists",
                entry.key()
            ))),
            Entry::Vacant(entry) => {
                // The shard write lock is held until the entry is in place.
                on_insert(&experiment);
                entry.insert(experiment);
                Ok(())
            }
        }
    }

    fn get(&self, id: &str) -> Result<Option<Experiment>> {
        Ok(self.experiments.get(id).map(|e| e.value().clone()))
    }

    fn update<F>(&self, id: &str, mutate: F) -> Result<Experiment>
    where
        F: FnOnce(&mut Experiment) -> Result<()>,
    {
        let mut entry = self
            .experiments
            .get_mut(id)
            .ok_or_else(|| Error::experiment_not_found(id))?;

        // Mutate a copy so a failing closure leaves the entry untouched.
        let mut candidate = entry.value().clone();
        mutate(&mut candidate)?;
        *entry.value_mut() = candidate.clone();
        Ok(candidate)
    }

    fn list(&self) -> Result<Vec<Experiment>> {
        let mut experiments: Vec<Experiment> =
            self.experiments.iter().map(|e| e.value().clone()).collect();
        experiments.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(experiments)
    }

    fn contains(&self, id: &str) -> Result<bool> {
        Ok(self.experiments.contains_key(id))
    }
}
