//! Descriptive statistics, Welch's t-test and sample-size estimation
//!
//! References:
//! - Welch (1947): The generalization of "Student's" problem when several
//!   different population variances are involved
//! - Welford (1962): Note on a method for calculating corrected sums of
//!   squares and products

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal, StudentsT};

use crate::{Error, Result};

/// Count, mean and spread of one sample population.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleSummary {
    /// Number of observations
    pub count: usize,
    /// Arithmetic mean (0 when empty)
    pub mean: f64,
    /// Unbiased sample variance (0 below two observations). Saturates to
    /// infinity once the spread exceeds the `f64` range; `std_dev` does not.
    pub variance: f64,
    /// Sample standard deviation
    pub std_dev: f64,
    /// Smallest observation (0 when empty)
    pub min: f64,
    /// Largest observation (0 when empty)
    pub max: f64,
}

impl SampleSummary {
    /// Summarize samples with Welford's algorithm.
    ///
    /// Deviations are accumulated in units of the largest magnitude, so the
    /// result stays finite for tiny and huge finite inputs alike.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_samples(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return Self {
                count: 0,
                mean: 0.0,
                variance: 0.0,
                std_dev: 0.0,
                min: 0.0,
                max: 0.0,
            };
        }

        let (min, max) = samples
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| {
                (lo.min(x), hi.max(x))
            });
        let scale = min.abs().max(max.abs());
        let scale = if scale > 0.0 { scale } else { 1.0 };

        let mut mean = 0.0;
        let mut m2 = 0.0;
        for (i, &x) in samples.iter().enumerate() {
            let x = x / scale;
            let delta = x - mean;
            mean += delta / (i + 1) as f64;
            m2 += delta * (x - mean);
        }

        let count = samples.len();
        let std_dev = if count > 1 {
            (m2 / (count - 1) as f64).sqrt() * scale
        } else {
            0.0
        };

        Self {
            count,
            mean: mean * scale,
            variance: std_dev * std_dev,
            std_dev,
            min,
            max,
        }
    }

    /// Standard error of the mean, `s / √n`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn standard_error(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.std_dev / (self.count as f64).sqrt()
        }
    }
}

fn students_t(freedom: f64) -> Result<StudentsT> {
    StudentsT::new(0.0, 1.0, freedom).map_err(|e| Error::Statistics(e.to_string()))
}

fn standard_normal() -> Result<Normal> {
    Normal::new(0.0, 1.0).map_err(|e| Error::Statistics(e.to_string()))
}

/// Student-t confidence interval for the mean.
///
/// Returns `None` below two observations.
///
/// # Errors
///
/// Returns [`Error::Statistics`] if the t distribution cannot be built.
#[allow(clippy::cast_precision_loss)]
pub fn mean_confidence_interval(
    summary: &SampleSummary,
    confidence_level: f64,
) -> Result<Option<(f64, f64)>> {
    if summary.count < 2 {
        return Ok(None);
    }
    let t = students_t((summary.count - 1) as f64)?;
    let critical = t.inverse_cdf(1.0 - (1.0 - confidence_level) / 2.0);
    let margin = critical * summary.standard_error();
    Ok(Some((summary.mean - margin, summary.mean + margin)))
}

/// Result of a two-sided Welch's t-test of `treatment - control`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WelchTest {
    /// Difference of means, treatment minus control
    pub difference: f64,
    /// t statistic (infinite when both variances are zero and means differ)
    pub t_statistic: f64,
    /// Welch–Satterthwaite degrees of freedom
    pub degrees_of_freedom: f64,
    /// Two-sided p-value
    pub p_value: f64,
    /// Significance level the test was run at
    pub alpha: f64,
    /// `p_value < alpha`
    pub significant: bool,
    /// Confidence interval for the difference of means
    pub difference_interval: (f64, f64),
}

/// Welch's unequal-variances t-test.
///
/// # Errors
///
/// - [`Error::Statistics`] if either population has fewer than two samples
/// - [`Error::Statistics`] if the difference of means or its standard error
///   exceeds the `f64` range
/// - [`Error::Statistics`] if the t distribution cannot be built
#[allow(clippy::cast_precision_loss)]
pub fn welch_t_test(
    control: &SampleSummary,
    treatment: &SampleSummary,
    confidence_level: f64,
) -> Result<WelchTest> {
    if control.count < 2 || treatment.count < 2 {
        return Err(Error::Statistics(format!(
            "welch t-test needs two samples per group (got {} and {})",
            control.count, treatment.count
        )));
    }

    let alpha = 1.0 - confidence_level;
    let difference = treatment.mean - control.mean;
    let se_control = control.standard_error();
    let se_treatment = treatment.standard_error();
    let se = se_control.hypot(se_treatment);
    if !difference.is_finite() || !se.is_finite() {
        return Err(Error::Statistics(format!(
            "welch t-test inputs exceed the f64 range (difference {difference}, standard error {se})"
        )));
    }

    if se == 0.0 {
        // Both populations are constant: the observed difference is exact.
        let (t_statistic, p_value) = if difference == 0.0 {
            (0.0, 1.0)
        } else {
            (f64::INFINITY.copysign(difference), 0.0)
        };
        return Ok(WelchTest {
            difference,
            t_statistic,
            degrees_of_freedom: (control.count + treatment.count - 2) as f64,
            p_value,
            alpha,
            significant: p_value < alpha,
            difference_interval: (difference, difference),
        });
    }

    let t_statistic = difference / se;
    // Welch-Satterthwaite on each group's share of the variance, which stays
    // in [0, 1] where the raw fourth powers would underflow or overflow.
    let w_control = (se_control / se).powi(2);
    let w_treatment = (se_treatment / se).powi(2);
    let degrees_of_freedom = 1.0
        / (w_control.powi(2) / (control.count - 1) as f64
            + w_treatment.powi(2) / (treatment.count - 1) as f64);

    let t = students_t(degrees_of_freedom)?;
    let p_value = (2.0 * (1.0 - t.cdf(t_statistic.abs()))).clamp(0.0, 1.0);
    let critical = t.inverse_cdf(1.0 - alpha / 2.0);

    Ok(WelchTest {
        difference,
        t_statistic,
        degrees_of_freedom,
        p_value,
        alpha,
        significant: p_value < alpha,
        difference_interval: (difference - critical * se, difference + critical * se),
    })
}

/// Per-variant sample size needed to detect a relative change of
/// `minimum_effect_pct` of the control mean with the given power.
///
/// `n = 2 · ((z(1-α/2) + z(power)) · σ / δ)²`, with `σ² = (s₁² + s₂²) / 2`.
/// Saturates at `usize::MAX` when the ratio is beyond any realistic run.
/// Returns `None` when the effect or the spread is zero, or either
/// population has fewer than two samples.
///
/// # Errors
///
/// Returns [`Error::Statistics`] if the normal distribution cannot be built.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn required_sample_size(
    control: &SampleSummary,
    treatment: &SampleSummary,
    minimum_effect_pct: f64,
    confidence_level: f64,
    power_level: f64,
) -> Result<Option<usize>> {
    if control.count < 2 || treatment.count < 2 {
        return Ok(None);
    }
    let delta = minimum_effect_pct / 100.0 * control.mean.abs();
    let sigma = control.std_dev.hypot(treatment.std_dev) / std::f64::consts::SQRT_2;
    if delta <= 0.0 || sigma <= 0.0 {
        return Ok(None);
    }

    let normal = standard_normal()?;
    let z_alpha = normal.inverse_cdf(1.0 - (1.0 - confidence_level) / 2.0);
    let z_beta = normal.inverse_cdf(power_level);
    let n = 2.0 * ((z_alpha + z_beta) * sigma / delta).powi(2);

    // Bounded by the finite inputs above; saturate on absurd ratios.
    Ok(Some(n.ceil().min(usize::MAX as f64) as usize))
}
