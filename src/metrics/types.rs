//! Metric sample types.
//!
//! - [`MetricKind`]: how a sample is aggregated
//! - [`MetricSnapshot`]: one immutable, timestamped observation
//! - [`Tags`] / [`Metadata`]: filterable labels and passthrough data

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Bounded key/value labels used for filtering.
pub type Tags = BTreeMap<String, String>;

/// Free-form passthrough data. Stored but never indexed or filtered on.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Kind of a metric sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Monotonic increment, aggregated by sum.
    Counter,
    /// Point-in-time value, aggregated by average or latest.
    Gauge,
    /// Distribution sample, aggregated by percentile.
    Histogram,
    /// Pre-reduced value, passed through.
    Summary,
}

impl MetricKind {
    /// All kinds, in declaration order.
    pub const ALL: [Self; 4] = [Self::Counter, Self::Gauge, Self::Histogram, Self::Summary];

    /// Stable lowercase name, as persisted.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Counter => "counter",
            Self::Gauge => "gauge",
            Self::Histogram => "histogram",
            Self::Summary => "summary",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "counter" => Ok(Self::Counter),
            "gauge" => Ok(Self::Gauge),
            "histogram" => Ok(Self::Histogram),
            "summary" => Ok(Self::Summary),
            other => Err(format!("unknown metric kind '{other}'")),
        }
    }
}

/// One immutable metric observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    /// Sample kind.
    pub kind: MetricKind,
    /// Dotted metric name, e.g. `recording.duration_ms`.
    pub name: String,
    /// Observed value (always finite once stored).
    pub value: f64,
    /// When the sample was taken (UTC). Stored with microsecond precision.
    pub timestamp: DateTime<Utc>,
    /// Filterable labels.
    #[serde(default)]
    pub tags: Tags,
    /// Passthrough data.
    #[serde(default)]
    pub metadata: Metadata,
}

impl MetricSnapshot {
    /// Create a snapshot with no tags or metadata.
    #[must_use]
    pub fn new(
        kind: MetricKind,
        name: impl Into<String>,
        value: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            value,
            timestamp,
            tags: Tags::new(),
            metadata: Metadata::new(),
        }
    }

    /// Add a single tag.
    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Replace all tags.
    #[must_use]
    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }

    /// Attach a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Build a [`Tags`] map from string pairs.
///
/// ```
/// use metrics_baseline::metrics::tags;
///
/// let t = tags([("type", "network")]);
/// assert_eq!(t.get("type").map(String::as_str), Some("network"));
/// ```
#[must_use]
pub fn tags<const N: usize>(pairs: [(&str, &str); N]) -> Tags {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trips_through_str() {
        for kind in MetricKind::ALL {
            assert_eq!(kind.as_str().parse::<MetricKind>().unwrap(), kind);
        }
        assert_eq!("GAUGE".parse::<MetricKind>().unwrap(), MetricKind::Gauge);
        assert!("timer".parse::<MetricKind>().is_err());
    }

    #[test]
    fn test_kind_serializes_lowercase() {
        let json = serde_json::to_string(&MetricKind::Histogram).unwrap();
        assert_eq!(json, "\"histogram\"");
    }

    #[test]
    fn test_snapshot_builder() {
        let ts = Utc::now();
        let snap = MetricSnapshot::new(MetricKind::Counter, "errors", 1.0, ts)
            .with_tag("type", "disk")
            .with_metadata("attempt", serde_json::json!(2));

        assert_eq!(snap.name, "errors");
        assert_eq!(snap.tags.get("type").unwrap(), "disk");
        assert_eq!(snap.metadata.get("attempt").unwrap(), &serde_json::json!(2));
    }

    #[test]
    fn test_snapshot_deserializes_without_tags() {
        let json = r#"{"kind":"gauge","name":"cpu","value":0.5,"timestamp":"2024-01-15T10:30:00Z"}"#;
        let snap: MetricSnapshot = serde_json::from_str(json).unwrap();
        assert!(snap.tags.is_empty());
        assert!(snap.metadata.is_empty());
    }
}
