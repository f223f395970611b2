//! Input validation for metric writes.
//!
//! Names and tags must come from a bounded vocabulary chosen by the call
//! site. [`TagPolicy`] enforces the character set and size limits, and can
//! pin the allowed tag keys per metric name so that free-form or
//! identifying text never reaches the store.

use std::collections::{BTreeSet, HashMap};

use super::types::Tags;
use crate::error::MetricsError;

/// Maximum metric name length.
pub const MAX_NAME_LEN: usize = 128;

/// Maximum tag key or value length.
pub const MAX_TAG_LEN: usize = 64;

/// Maximum number of tags on one sample.
pub const MAX_TAGS: usize = 16;

/// Validation rules applied at `record_*` time.
#[derive(Debug, Clone, Default)]
pub struct TagPolicy {
    allowed_keys: HashMap<String, BTreeSet<String>>,
}

impl TagPolicy {
    /// Policy with character/size rules only; any well-formed key is accepted.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the only tag keys `metric` may carry.
    #[must_use]
    pub fn allow_keys<I, S>(mut self, metric: impl Into<String>, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_keys
            .insert(metric.into(), keys.into_iter().map(Into::into).collect());
        self
    }

    /// Validate a full write: name, value and tags.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::InvalidMetricValue`] describing the first
    /// violation found.
    pub fn check(&self, name: &str, value: f64, tags: &Tags) -> Result<(), MetricsError> {
        validate_name(name)?;
        validate_value(name, value)?;
        self.check_tags(name, tags)
    }

    /// Validate tags for `name`.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::InvalidMetricValue`] on an oversized tag set,
    /// a malformed key or value, or a key outside the declared set.
    pub fn check_tags(&self, name: &str, tags: &Tags) -> Result<(), MetricsError> {
        if tags.len() > MAX_TAGS {
            return Err(MetricsError::invalid(
                name,
                format!("at most {MAX_TAGS} tags allowed, got {}", tags.len()),
            ));
        }

        for (key, value) in tags {
            if !is_token(key, MAX_TAG_LEN) {
                return Err(MetricsError::invalid(
                    name,
                    format!("tag key '{key}' must be 1-{MAX_TAG_LEN} chars of [A-Za-z0-9_.:-]"),
                ));
            }
            if !is_token(value, MAX_TAG_LEN) {
                return Err(MetricsError::invalid(
                    name,
                    format!("tag '{key}' value must be 1-{MAX_TAG_LEN} chars of [A-Za-z0-9_.:-]"),
                ));
            }
            if let Some(allowed) = self.allowed_keys.get(name) {
                if !allowed.contains(key) {
                    return Err(MetricsError::invalid(
                        name,
                        format!("tag key '{key}' is not declared for this metric"),
                    ));
                }
            }
        }

        Ok(())
    }
}

/// Validate a metric name.
///
/// # Errors
///
/// Returns [`MetricsError::InvalidMetricValue`] when the name is empty, too
/// long, or not a dotted identifier.
pub fn validate_name(name: &str) -> Result<(), MetricsError> {
    if name.is_empty() {
        return Err(MetricsError::invalid(name, "name must not be empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(MetricsError::invalid(
            name,
            format!("name longer than {MAX_NAME_LEN} chars"),
        ));
    }
    let well_formed = name
        .split('.')
        .all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        });
    if !well_formed {
        return Err(MetricsError::invalid(
            name,
            "name must be dot-separated segments of [A-Za-z0-9_-]",
        ));
    }
    Ok(())
}

/// Reject NaN and infinities.
///
/// # Errors
///
/// Returns [`MetricsError::InvalidMetricValue`] for non-finite values.
pub fn validate_value(name: &str, value: f64) -> Result<(), MetricsError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(MetricsError::invalid(
            name,
            format!("value must be finite, got {value}"),
        ))
    }
}

/// Reject percentiles outside `[0, 100]`.
///
/// # Errors
///
/// Returns [`MetricsError::InvalidMetricValue`] for NaN or out-of-range `p`.
pub fn validate_percentile(name: &str, p: f64) -> Result<(), MetricsError> {
    if (0.0..=100.0).contains(&p) {
        Ok(())
    } else {
        Err(MetricsError::invalid(
            name,
            format!("percentile must be within [0, 100], got {p}"),
        ))
    }
}

fn is_token(s: &str, max_len: usize) -> bool {
    !s.is_empty()
        && s.len() <= max_len
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':' | '-'))
}
