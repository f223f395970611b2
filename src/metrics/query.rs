//! Read-only metric queries.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::types::{MetricKind, Tags};

/// Default row cap for [`MetricQuery`].
pub const DEFAULT_QUERY_LIMIT: usize = 1000;

/// Start of a look-back window of `span` ending at `end`.
///
/// Saturates at the earliest representable instant instead of overflowing.
#[must_use]
pub fn window_start(end: DateTime<Utc>, span: Duration) -> DateTime<Utc> {
    end.checked_sub_signed(span).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// A read-only request against the metric store.
///
/// The time interval is half-open: `[start, end)`. Missing bounds are
/// unbounded. Tag filters must all match, by exact equality per key.
///
/// ```
/// use metrics_baseline::metrics::MetricQuery;
///
/// let q = MetricQuery::named("errors").tag("type", "network").limit(10);
/// assert_eq!(q.name.as_deref(), Some("errors"));
/// assert_eq!(q.limit, 10);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricQuery {
    /// Exact metric name.
    pub name: Option<String>,
    /// Sample kind.
    pub kind: Option<MetricKind>,
    /// Inclusive lower bound.
    pub start: Option<DateTime<Utc>>,
    /// Exclusive upper bound.
    pub end: Option<DateTime<Utc>>,
    /// Must-match-all tag filter.
    pub tags: Tags,
    /// Maximum rows returned by row queries.
    pub limit: usize,
}

impl Default for MetricQuery {
    fn default() -> Self {
        Self {
            name: None,
            kind: None,
            start: None,
            end: None,
            tags: Tags::new(),
            limit: DEFAULT_QUERY_LIMIT,
        }
    }
}

impl MetricQuery {
    /// Query every metric.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Query a single metric name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Restrict to one kind.
    #[must_use]
    pub const fn kind(mut self, kind: MetricKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Set the inclusive lower bound.
    #[must_use]
    pub const fn since(mut self, start: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self
    }

    /// Set the exclusive upper bound.
    #[must_use]
    pub const fn until(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }

    /// Set both bounds: `[start, end)`.
    #[must_use]
    pub const fn between(self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.since(start).until(end)
    }

    /// Add one tag filter.
    #[must_use]
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Add every tag in `tags` as a filter.
    #[must_use]
    pub fn tags(mut self, tags: &Tags) -> Self {
        self.tags
            .extend(tags.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// Cap the number of rows returned.
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// True when the bounds can never match anything.
    #[must_use]
    pub fn is_empty_range(&self) -> bool {
        matches!((self.start, self.end), (Some(s), Some(e)) if s >= e)
    }
}
