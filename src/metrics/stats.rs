//! Statistical reducers.
//!
//! Percentiles use linear interpolation between order statistics
//! (NumPy's default method), so fixtures are reproducible across
//! implementations:
//!
//! ```text
//! r = p/100 * (n-1);  lo = floor(r);  hi = ceil(r)
//! value = v[lo] + (r - lo) * (v[hi] - v[lo])
//! ```

#![allow(clippy::cast_precision_loss)]

use serde::{Deserialize, Serialize};

/// Count/sum/min/max/mean over a set of samples.
///
/// `sum` may overflow to infinity for finite samples near `f64::MAX`;
/// `mean` stays finite because it is rescaled in that case.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricStats {
    /// Number of samples.
    pub count: u64,
    /// Sum of values (0.0 when empty).
    pub sum: f64,
    /// Smallest value (0.0 when empty).
    pub min: f64,
    /// Largest value (0.0 when empty).
    pub max: f64,
    /// Arithmetic mean (0.0 when empty).
    pub mean: f64,
}

impl MetricStats {
    /// Reduce an in-memory slice.
    #[must_use]
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let (min, max) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        let sum: f64 = values.iter().sum();
        let mean = if sum.is_finite() {
            sum / values.len() as f64
        } else {
            scaled_mean(values)
        };
        Self {
            count: values.len() as u64,
            sum,
            min,
            max,
            mean,
        }
    }

    /// Arithmetic mean, or 0.0 when there are no samples.
    #[must_use]
    pub const fn average(&self) -> f64 {
        self.mean
    }

    /// True when no samples matched.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Mean computed as `sum(v / n)`, which cannot overflow for finite input.
#[must_use]
pub fn scaled_mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    values.iter().map(|v| v / n).sum()
}

/// Requested percentiles mapped to their values, in request order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Percentiles(Vec<(f64, f64)>);

impl Percentiles {
    /// Value for percentile `p`, if it was requested.
    #[must_use]
    pub fn get(&self, p: f64) -> Option<f64> {
        self.0
            .iter()
            .find(|(q, _)| (q - p).abs() < f64::EPSILON)
            .map(|(_, v)| *v)
    }

    /// Iterate `(percentile, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.0.iter().copied()
    }

    /// Number of requested percentiles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no percentiles were requested.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Percentile of an ascending-sorted slice. Returns 0.0 when empty.
///
/// `p` is clamped to `[0, 100]`; callers validate before this point.
///
/// ```
/// use metrics_baseline::metrics::percentile_sorted;
///
/// let v: Vec<f64> = (1..=10).map(|i| f64::from(i) * 10.0).collect();
/// assert!((percentile_sorted(&v, 50.0) - 55.0).abs() < 1e-9);
/// ```
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = p.clamp(0.0, 100.0) / 100.0 * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = (rank.ceil() as usize).min(n - 1);
            let frac = rank - lo as f64;
            let span = sorted[hi] - sorted[lo];
            if span.is_finite() {
                sorted[lo] + frac * span
            } else {
                sorted[lo].mul_add(1.0 - frac, sorted[hi] * frac)
            }
        }
    }
}

/// Sort `values` in place and compute every requested percentile.
#[must_use]
pub fn compute_percentiles(values: &mut [f64], requested: &[f64]) -> Percentiles {
    values.sort_by(f64::total_cmp);
    Percentiles(
        requested
            .iter()
            .map(|&p| (p, percentile_sorted(values, p)))
            .collect(),
    )
}
