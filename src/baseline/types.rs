//! Baseline and deviation types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::metrics::Tags;

/// Cache key: one baseline per metric name and tag set.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BaselineKey {
    /// Metric name.
    pub metric_name: String,
    /// Tag filter the baseline was computed under (empty = all samples).
    pub tags: Tags,
}

impl BaselineKey {
    /// Build a key.
    #[must_use]
    pub fn new(metric_name: impl Into<String>, tags: Tags) -> Self {
        Self {
            metric_name: metric_name.into(),
            tags,
        }
    }

    /// Key for all samples of `metric_name`, regardless of tags.
    #[must_use]
    pub fn untagged(metric_name: impl Into<String>) -> Self {
        Self::new(metric_name, Tags::new())
    }
}

/// A cached reference value for one metric.
///
/// Refreshing replaces the whole value; a `Baseline` is never patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    /// Metric name.
    pub metric_name: String,
    /// Tag filter used.
    pub tags: Tags,
    /// The configured percentile of the historical window.
    pub baseline_value: f64,
    /// Which percentile `baseline_value` is.
    pub percentile: f64,
    /// When the baseline was computed.
    pub computed_at: DateTime<Utc>,
    /// Samples in the window.
    pub sample_count: u64,
}

impl Baseline {
    /// The cache key for this baseline.
    #[must_use]
    pub fn key(&self) -> BaselineKey {
        BaselineKey::new(self.metric_name.clone(), self.tags.clone())
    }
}

/// Severity of a deviation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Below the warning threshold; never alerted on.
    Info,
    /// At or above the warning threshold.
    Warning,
    /// At or above the critical threshold.
    Critical,
}

impl Severity {
    /// Classify a deviation percentage against the two thresholds.
    ///
    /// ```
    /// use metrics_baseline::baseline::Severity;
    ///
    /// assert_eq!(Severity::classify(19.9, 20.0, 50.0), Severity::Info);
    /// assert_eq!(Severity::classify(20.0, 20.0, 50.0), Severity::Warning);
    /// assert_eq!(Severity::classify(50.0, 20.0, 50.0), Severity::Critical);
    /// ```
    #[must_use]
    pub fn classify(deviation_percent: f64, warning: f64, critical: f64) -> Self {
        if deviation_percent >= critical {
            Self::Critical
        } else if deviation_percent >= warning {
            Self::Warning
        } else {
            Self::Info
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// A live value that strayed from its baseline. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviationAlert {
    /// Metric name.
    pub metric_name: String,
    /// The value being checked.
    pub current_value: f64,
    /// The cached baseline it was compared against.
    pub baseline_value: f64,
    /// `|current - baseline| / |baseline| * 100`.
    pub deviation_percent: f64,
    /// Warning or Critical.
    pub severity: Severity,
    /// When the check ran.
    pub timestamp: DateTime<Utc>,
    /// Tag set of the baseline.
    pub tags: Tags,
}

/// Percent difference between `current` and `baseline`.
///
/// A zero baseline carries no signal and yields 0.0. Finite inputs always
/// give a finite result; overflow saturates at `f64::MAX`.
#[must_use]
pub fn deviation_between(current: f64, baseline: f64) -> f64 {
    if baseline == 0.0 {
        0.0
    } else {
        ((current - baseline).abs() * 100.0 / baseline.abs()).min(f64::MAX)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(100.0, 100.0 => 0.0 ; "identical")]
    #[test_case(119.0, 100.0 => 19.0 ; "below warning")]
    #[test_case(120.0, 100.0 => 20.0 ; "at warning")]
    #[test_case(50.0, 100.0 => 50.0 ; "drop counts too")]
    #[test_case(7.0, 0.0 => 0.0 ; "zero baseline")]
    fn test_deviation_between(current: f64, baseline: f64) -> f64 {
        deviation_between(current, baseline)
    }

    #[test]
    fn test_deviation_between_saturates() {
        assert_eq!(deviation_between(1.5e308, -1.5e308), f64::MAX);
        assert_eq!(deviation_between(1e10, 1e-300), f64::MAX);
    }

    #[test]
    fn test_severity_ordering_and_display() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Critical);
        assert_eq!(Severity::Critical.to_string(), "critical");
        assert_eq!(serde_json::to_string(&Severity::Warning).unwrap(), "\"warning\"");
    }

    #[test]
    fn test_baseline_key() {
        let mut tags = Tags::new();
        tags.insert("device".into(), "usb".into());
        let baseline = Baseline {
            metric_name: "latency".into(),
            tags: tags.clone(),
            baseline_value: 1.0,
            percentile: 95.0,
            computed_at: Utc::now(),
            sample_count: 10,
        };
        assert_eq!(baseline.key(), BaselineKey::new("latency", tags));
        assert_ne!(baseline.key(), BaselineKey::untagged("latency"));
    }
}
