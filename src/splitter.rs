//! Deterministic traffic splitting
//!
//! **Problem**: Each request must land in the same variant every time for the
//! same subject, without storing per-subject assignments.
//!
//! **Solution**: Hash `experiment_id` and `subject_id` into one of 100 buckets
//! and walk the experiment's variants in configured order, each owning a
//! contiguous range of `traffic_percent` buckets.
//!
//! ## Hash function
//!
//! 64-bit FNV-1a over the bytes of `experiment_id`, a `0x00` separator, and
//! `subject_id`, followed by the MurmurHash3 `fmix64` finalizer, reduced
//! modulo 100. The separator keeps `("ab", "c")` and `("a", "bc")` apart; the
//! finalizer spreads FNV's weak low bits before the modulo.
//!
//! Operational caveat: changing this function reshuffles every in-flight
//! assignment. It is fixed here rather than delegated to a hasher crate whose
//! algorithm may change between releases.
//!
//! Toyota Way Principles:
//! - **Poka-Yoke**: No assignment table to leak, drift, or lose on restart
//! - **Heijunka**: Uniform buckets give traffic proportional to weights

use std::sync::Arc;

use dashmap::DashMap;
use tracing::trace;

use crate::experiment::Variant;
use crate::{Error, Result};

/// Number of buckets subjects are hashed into. Traffic percentages are
/// whole numbers, so one bucket is one percent.
pub const BUCKETS: u32 = 100;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(mut hash: u64, bytes: &[u8]) -> u64 {
    for &byte in bytes {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

const fn fmix64(mut k: u64) -> u64 {
    k ^= k >> 33;
    k = k.wrapping_mul(0xff51_afd7_ed55_8ccd);
    k ^= k >> 33;
    k = k.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    k ^= k >> 33;
    k
}

/// Stable 64-bit hash of an `(experiment, subject)` pair.
#[must_use]
pub fn assignment_hash(experiment_id: &str, subject_id: &str) -> u64 {
    let hash = fnv1a(FNV_OFFSET_BASIS, experiment_id.as_bytes());
    let hash = fnv1a(hash, &[0]);
    fmix64(fnv1a(hash, subject_id.as_bytes()))
}

/// Bucket in `0..BUCKETS` for an `(experiment, subject)` pair.
///
/// # Examples
///
/// ```rust
/// use trueno_ab::splitter::{bucket_for, BUCKETS};
///
/// let bucket = bucket_for("chunking_strategy_test", "user123");
/// assert!(bucket < BUCKETS);
/// assert_eq!(bucket, bucket_for("chunking_strategy_test", "user123"));
/// ```
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn bucket_for(experiment_id: &str, subject_id: &str) -> u32 {
    // Result is < 100, truncation is lossless.
    (assignment_hash(experiment_id, subject_id) % u64::from(BUCKETS)) as u32
}

/// Index of the variant owning `bucket`, walking weights in order.
fn variant_index(variants: &[Variant], bucket: u32) -> Option<usize> {
    let mut upper = 0;
    variants.iter().position(|variant| {
        upper += variant.traffic_percent();
        bucket < upper
    })
}

/// Maps subjects to variants without per-subject state.
///
/// Holds each experiment's variants in configured order. Only
/// [`ExperimentManager`](crate::ExperimentManager) configures it, after
/// validation.
#[derive(Default)]
pub struct TrafficSplitter {
    experiments: DashMap<String, Arc<[Variant]>>,
}

impl TrafficSplitter {
    /// Create an empty splitter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the variant weights for an experiment.
    ///
    /// # Panics
    ///
    /// Panics if the traffic percentages do not sum to [`BUCKETS`]. Callers
    /// validate experiments before configuring them; reaching this is a bug.
    pub fn configure(&self, experiment_id: &str, variants: &[Variant]) {
        let total: u32 = variants.iter().map(Variant::traffic_percent).sum();
        assert_eq!(
            total, BUCKETS,
            "traffic weights for '{experiment_id}' must cover every bucket"
        );
        self.experiments
            .insert(experiment_id.to_string(), variants.to_vec().into());
    }

    /// Check if an experiment has been configured.
    #[must_use]
    pub fn contains(&self, experiment_id: &str) -> bool {
        self.experiments.contains_key(experiment_id)
    }

    /// Number of configured experiments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.experiments.len()
    }

    /// Check if no experiment is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty()
    }

    /// Assign a subject to a variant.
    ///
    /// Same `(experiment_id, subject_id)` always yields the same variant,
    /// across calls and across processes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the experiment was never configured.
    ///
    /// # Panics
    ///
    /// Panics if no variant owns the computed bucket, which `configure`
    /// rules out.
    pub fn assign(&self, experiment_id: &str, subject_id: &str) -> Result<Variant> {
        // Clone the Arc so the shard lock is released before the walk.
        let variants = self
            .experiments
            .get(experiment_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| Error::experiment_not_found(experiment_id))?;

        let bucket = bucket_for(experiment_id, subject_id);
        let index = variant_index(&variants, bucket)
            .unwrap_or_else(|| unreachable!("weights for '{experiment_id}' cover every bucket"));

        let variant = variants[index].clone();
        trace!(
            experiment_id,
            subject_id,
            bucket,
            variant_id = variant.id(),
            "assigned variant"
        );
        Ok(variant)
    }
}
