//! Experiment Store Module
//!
//! The experiment registry behind [`ExperimentManager`](crate::ExperimentManager).
//! The manager never keeps experiments in process-wide state; it is handed a
//! store at construction, so each test can use a fresh one and a persistent
//! backend can be swapped in without touching lifecycle logic.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use trueno_ab::experiment::{Experiment, MetricDefinition, Variant};
//! use trueno_ab::store::{ExperimentStore, MemoryExperimentStore};
//!
//! # fn example() -> trueno_ab::Result<()> {
//! let store = MemoryExperimentStore::new();
//! let experiment = Experiment::builder("exp-1", "Example")
//!     .duration(Duration::from_secs(3600))
//!     .variant(Variant::new("control", "Control", 100))
//!     .metric(MetricDefinition::higher_is_better("score"))
//!     .build();
//!
//! store.insert(experiment)?;
//! assert!(store.contains("exp-1")?);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

mod memory;

pub use memory::MemoryExperimentStore;

use crate::experiment::Experiment;
use crate::Result;

/// Registry of experiments keyed by id.
///
/// Implementations must make [`update`](ExperimentStore::update) atomic per
/// id: two concurrent updates of the same experiment observe each other's
/// effects in some serial order, never interleave.
pub trait ExperimentStore: Send + Sync {
    /// Insert a new experiment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`](crate::Error::Validation) if an
    /// experiment with the same id already exists; the existing entry is
    /// left untouched.
    fn insert(&self, experiment: Experiment) -> Result<()> {
        self.insert_with(experiment, |_| {})
    }

    /// Insert a new experiment, running `on_insert` once the id is known to
    /// be free and before any reader of this store can observe the entry.
    ///
    /// `on_insert` is not called for a duplicate id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`](crate::Error::Validation) if an
    /// experiment with the same id already exists.
    fn insert_with<F>(&self, experiment: Experiment, on_insert: F) -> Result<()>
    where
        F: FnOnce(&Experiment);

    /// Get a copy of an experiment by id.
    ///
    /// Returns `None` if the id is unknown.
    ///
    /// # Errors
    ///
    /// Backend failures only.
    fn get(&self, id: &str) -> Result<Option<Experiment>>;

    /// Apply `mutate` to the stored experiment and return the new value.
    ///
    /// If `mutate` fails, the stored experiment is unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`](crate::Error::NotFound) for unknown ids,
    /// or whatever `mutate` returns.
    fn update<F>(&self, id: &str, mutate: F) -> Result<Experiment>
    where
        F: FnOnce(&mut Experiment) -> Result<()>;

    /// Get copies of all experiments, sorted by id.
    ///
    /// # Errors
    ///
    /// Backend failures only.
    fn list(&self) -> Result<Vec<Experiment>>;

    /// Check if an experiment id is registered.
    ///
    /// # Errors
    ///
    /// Backend failures only.
    fn contains(&self, id: &str) -> Result<bool> {
        Ok(self.get(id)?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::{ExperimentStatus, MetricDefinition, Variant};
    use crate::Error;
    use chrono::Utc;
    use std::sync::Arc;
    use std::time::Duration;

    fn experiment(id: &str) -> Experiment {
        Experiment::builder(id, "Store test")
            .duration(Duration::from_secs(60))
            .variant(Variant::new("control", "Control", 100))
            .metric(MetricDefinition::higher_is_better("score"))
            .build()
    }

    #[test]
    fn test_memory_store_insert_get() {
        let store = MemoryExperimentStore::new();

        store.insert(experiment("exp-1")).unwrap();
        let fetched = store.get("exp-1").unwrap();

        assert_eq!(fetched.map(|e| e.id().to_string()), Some("exp-1".to_string()));
    }

    #[test]
    fn test_memory_store_get_nonexistent() {
        let store = MemoryExperimentStore::new();

        assert!(store.get("missing").unwrap().is_none());
        assert!(!store.contains("missing").unwrap());
    }

    #[test]
    fn test_memory_store_duplicate_insert_rejected() {
        let store = MemoryExperimentStore::new();
        store.insert(experiment("exp-1")).unwrap();

        let err = store.insert(experiment("exp-1")).unwrap_err();

        assert!(matches!(err, Error::Validation(_)));
        assert!(err.to_string().contains("already exists"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_memory_store_insert_with_hook() {
        let store = MemoryExperimentStore::new();
        let mut calls = Vec::new();

        store
            .insert_with(experiment("exp-1"), |e| calls.push(e.id().to_string()))
            .unwrap();
        let duplicate = store.insert_with(experiment("exp-1"), |e| calls.push(e.id().to_string()));

        assert!(duplicate.is_err());
        assert_eq!(calls, vec!["exp-1"]);
        assert!(store.contains("exp-1").unwrap());
    }

    #[test]
    fn test_memory_store_update_applies() {
        let store = MemoryExperimentStore::new();
        store.insert(experiment("exp-1")).unwrap();

        let updated = store.update("exp-1", |e| e.start(Utc::now())).unwrap();

        assert_eq!(updated.status(), ExperimentStatus::Running);
        assert_eq!(
            store.get("exp-1").unwrap().map(|e| e.status()),
            Some(ExperimentStatus::Running)
        );
    }

    #[test]
    fn test_memory_store_failed_update_leaves_entry() {
        let store = MemoryExperimentStore::new();
        store.insert(experiment("exp-1")).unwrap();

        let result = store.update("exp-1", |e| {
            e.start(Utc::now())?;
            Err(Error::InvalidState("abort after mutation".to_string()))
        });

        assert!(result.is_err());
        assert_eq!(
            store.get("exp-1").unwrap().map(|e| e.status()),
            Some(ExperimentStatus::Draft)
        );
    }

    #[test]
    fn test_memory_store_update_nonexistent() {
        let store = MemoryExperimentStore::new();

        let err = store.update("missing", |_| Ok(())).unwrap_err();

        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn test_memory_store_list_sorted() {
        let store = MemoryExperimentStore::new();
        for id in ["c", "a", "b"] {
            store.insert(experiment(id)).unwrap();
        }

        let ids: Vec<String> = store
            .list()
            .unwrap()
            .iter()
            .map(|e| e.id().to_string())
            .collect();

        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_memory_store_concurrent_start_single_winner() {
        let store = Arc::new(MemoryExperimentStore::new());
        store.insert(experiment("exp-1")).unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.update("exp-1", |e| e.start(Utc::now())).is_ok())
            })
            .collect();

        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(successes, 1);
    }

    #[test]
    fn test_memory_store_default() {
        let store = MemoryExperimentStore::default();
        assert!(store.is_empty());
    }
}
