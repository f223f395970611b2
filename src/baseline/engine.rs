//! Rolling baselines and deviation checks.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Duration;

use super::types::{deviation_between, Baseline, BaselineKey, DeviationAlert, Severity};
use crate::error::{ConfigError, MetricsError};
use crate::metrics::{window_start, MetricQuery, MetricsAggregator, Tags};

// ============================================================================
// Baseline Configuration
// ============================================================================

/// Configuration for baseline calculation and alert thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct BaselineConfig {
    /// How many days of history feed a baseline.
    pub window_days: u32,
    /// Fewer samples than this and no baseline is produced.
    pub min_data_points: u64,
    /// Deviation percent at which a Warning is raised.
    pub deviation_threshold_percent: f64,
    /// Deviation percent at which a Critical is raised.
    pub critical_threshold_percent: f64,
    /// Which percentile of the window is "normal".
    pub baseline_percentile: f64,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            window_days: 7,
            min_data_points: 10,
            deviation_threshold_percent: 20.0,
            critical_threshold_percent: 50.0,
            baseline_percentile: 95.0,
        }
    }
}

impl BaselineConfig {
    /// Check that every field is usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_days == 0 {
            return Err(invalid("BASELINE_WINDOW_DAYS", "must be at least 1"));
        }
        if self.min_data_points == 0 {
            return Err(invalid("BASELINE_MIN_DATA_POINTS", "must be at least 1"));
        }
        if !(0.0..=100.0).contains(&self.baseline_percentile) {
            return Err(invalid("BASELINE_PERCENTILE", "must be between 0 and 100"));
        }
        if !(self.deviation_threshold_percent.is_finite() && self.deviation_threshold_percent > 0.0)
        {
            return Err(invalid(
                "BASELINE_DEVIATION_THRESHOLD",
                "must be a positive number",
            ));
        }
        if !(self.critical_threshold_percent.is_finite()
            && self.critical_threshold_percent > self.deviation_threshold_percent)
        {
            return Err(invalid(
                "BASELINE_CRITICAL_THRESHOLD",
                "must be greater than the deviation threshold",
            ));
        }
        Ok(())
    }

    fn window(&self) -> Duration {
        Duration::days(i64::from(self.window_days))
    }
}

fn invalid(var: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        var: var.into(),
        reason: reason.into(),
    }
}

// ============================================================================
// BaselineEngine
// ============================================================================

/// Computes, caches and compares against per-metric baselines.
///
/// Recomputation only happens in [`BaselineEngine::update_baselines`] and
/// [`BaselineEngine::refresh_baseline`]; reads never touch the store.
#[derive(Debug)]
pub struct BaselineEngine {
    aggregator: MetricsAggregator,
    config: BaselineConfig,
    cache: RwLock<HashMap<BaselineKey, Baseline>>,
}

impl BaselineEngine {
    /// Create an engine reading from `aggregator` after validating `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the first bad field.
    pub fn try_new(
        aggregator: MetricsAggregator,
        config: BaselineConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new(aggregator, config))
    }

    /// Create an engine reading from `aggregator`.
    ///
    /// The config is taken as-is; see [`BaselineEngine::try_new`].
    #[must_use]
    pub fn new(aggregator: MetricsAggregator, config: BaselineConfig) -> Self {
        Self {
            aggregator,
            config,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Create with default config.
    #[must_use]
    pub fn with_defaults(aggregator: MetricsAggregator) -> Self {
        Self::new(aggregator, BaselineConfig::default())
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &BaselineConfig {
        &self.config
    }

    /// The aggregator this engine reads from.
    #[must_use]
    pub const fn aggregator(&self) -> &MetricsAggregator {
        &self.aggregator
    }

    /// Compute a fresh baseline from `[now - window_days, now)`.
    ///
    /// Returns `Ok(None)` when fewer than `min_data_points` samples exist;
    /// that is the normal state for a new metric. Does not touch the cache.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::StorageUnavailable`] if the store fails.
    pub async fn calculate_baseline(
        &self,
        name: &str,
        tags: &Tags,
    ) -> Result<Option<Baseline>, MetricsError> {
        let now = self.aggregator.now();
        let query = MetricQuery::named(name)
            .tags(tags)
            .between(window_start(now, self.config.window()), now);

        let stats = self.aggregator.stats(&query).await?;
        if stats.count < self.config.min_data_points {
            tracing::debug!(
                metric = %name,
                samples = stats.count,
                required = self.config.min_data_points,
                "Not enough data for baseline"
            );
            return Ok(None);
        }

        let percentile = self.config.baseline_percentile;
        let baseline_value = self
            .aggregator
            .percentiles(&query, &[percentile])
            .await?
            .get(percentile)
            .unwrap_or(0.0);

        Ok(Some(Baseline {
            metric_name: name.to_string(),
            tags: tags.clone(),
            baseline_value,
            percentile,
            computed_at: now,
            sample_count: stats.count,
        }))
    }

    /// Compute one baseline and cache (or evict) it.
    ///
    /// This is how a tagged baseline starts being tracked; later
    /// [`BaselineEngine::update_baselines`] calls keep it fresh.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::StorageUnavailable`] if the store fails.
    pub async fn refresh_baseline(
        &self,
        name: &str,
        tags: &Tags,
    ) -> Result<Option<Baseline>, MetricsError> {
        let fresh = self.calculate_baseline(name, tags).await?;
        let key = BaselineKey::new(name, tags.clone());
        let mut cache = self.write_cache();
        match &fresh {
            Some(baseline) => {
                cache.insert(key, baseline.clone());
            }
            None => {
                cache.remove(&key);
            }
        }
        Ok(fresh)
    }

    /// Recompute cached baselines for `names` (every known metric when
    /// `None`). For each name the untagged baseline and every tagged
    /// baseline already cached are recomputed; any that now lack data are
    /// evicted. The cache is only modified once all computations succeed.
    ///
    /// Returns the number of cached baselines afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::StorageUnavailable`] if the store fails.
    pub async fn update_baselines(&self, names: Option<&[String]>) -> Result<usize, MetricsError> {
        let keys = self.keys_to_refresh(names).await?;

        let mut computed = Vec::with_capacity(keys.len());
        for key in keys {
            let fresh = self.calculate_baseline(&key.metric_name, &key.tags).await?;
            computed.push((key, fresh));
        }

        let mut cache = self.write_cache();
        for (key, fresh) in computed {
            match fresh {
                Some(baseline) => {
                    tracing::debug!(
                        metric = %key.metric_name,
                        value = baseline.baseline_value,
                        samples = baseline.sample_count,
                        "Baseline refreshed"
                    );
                    cache.insert(key, baseline);
                }
                None => {
                    cache.remove(&key);
                }
            }
        }

        let cached = cache.len();
        drop(cache);
        tracing::info!(cached, "Baselines updated");
        Ok(cached)
    }

    async fn keys_to_refresh(
        &self,
        names: Option<&[String]>,
    ) -> Result<Vec<BaselineKey>, MetricsError> {
        let cached: Vec<BaselineKey> = self.read_cache().keys().cloned().collect();

        let mut wanted: Vec<String> = match names {
            Some(names) => names.to_vec(),
            None => {
                let mut all = self.aggregator.metric_names().await?;
                all.extend(cached.iter().map(|k| k.metric_name.clone()));
                all.into_iter().collect()
            }
        };
        wanted.sort();
        wanted.dedup();

        let mut keys: Vec<BaselineKey> = wanted.iter().map(BaselineKey::untagged).collect();
        keys.extend(
            cached
                .into_iter()
                .filter(|k| !k.tags.is_empty() && wanted.contains(&k.metric_name)),
        );
        Ok(keys)
    }

    /// Last cached baseline for a key. Never recomputes.
    #[must_use]
    pub fn get_baseline(&self, name: &str, tags: &Tags) -> Option<Baseline> {
        self.read_cache()
            .get(&BaselineKey::new(name, tags.clone()))
            .cloned()
    }

    /// Every cached baseline, ordered by key.
    #[must_use]
    pub fn baselines(&self) -> Vec<Baseline> {
        let mut all: Vec<Baseline> = self.read_cache().values().cloned().collect();
        all.sort_by(|a, b| a.key().cmp(&b.key()));
        all
    }

    /// Raw deviation of `current_value` from the cached baseline, without
    /// classification. `None` when no baseline is cached.
    #[must_use]
    pub fn deviation_percent(&self, name: &str, current_value: f64, tags: &Tags) -> Option<f64> {
        self.get_baseline(name, tags)
            .map(|b| deviation_between(current_value, b.baseline_value))
    }

    /// Compare a live value with the cached baseline.
    ///
    /// `None` when there is no baseline, the value is not finite, or the
    /// deviation is below the warning threshold.
    #[must_use]
    pub fn check_deviation(
        &self,
        name: &str,
        current_value: f64,
        tags: &Tags,
    ) -> Option<DeviationAlert> {
        if !current_value.is_finite() {
            return None;
        }
        let baseline = self.get_baseline(name, tags)?;
        let deviation_percent = deviation_between(current_value, baseline.baseline_value);
        let severity = Severity::classify(
            deviation_percent,
            self.config.deviation_threshold_percent,
            self.config.critical_threshold_percent,
        );
        if severity == Severity::Info {
            return None;
        }

        Some(DeviationAlert {
            metric_name: name.to_string(),
            current_value,
            baseline_value: baseline.baseline_value,
            deviation_percent,
            severity,
            timestamp: self.aggregator.now(),
            tags: tags.clone(),
        })
    }

    fn read_cache(&self) -> RwLockReadGuard<'_, HashMap<BaselineKey, Baseline>> {
        self.cache.read().unwrap_or_else(|poison_error| {
            tracing::warn!("Reading baselines from poisoned lock, using recovered data");
            PoisonError::into_inner(poison_error)
        })
    }

    fn write_cache(&self) -> RwLockWriteGuard<'_, HashMap<BaselineKey, Baseline>> {
        self.cache.write().unwrap_or_else(|poison_error| {
            tracing::warn!("Writing baselines through poisoned lock, using recovered data");
            PoisonError::into_inner(poison_error)
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::float_cmp
)]
mod tests {
    use super::*;
    use crate::metrics::{tags, MetricKind, MetricSnapshot};
    use std::sync::Arc;

    use crate::test_utils::{fixed_clock, test_aggregator};
    use crate::traits::{ManualTimeProvider, MockMetricStore, TimeProvider};
    use test_case::test_case;

    async fn engine_with_histogram(values: &[f64]) -> (BaselineEngine, ManualTimeProvider) {
        let (agg, clock) = test_aggregator().await;
        for &v in values {
            agg.record_histogram("request.duration", v, &Tags::new())
                .await
                .unwrap();
            clock.advance(Duration::seconds(1));
        }
        (BaselineEngine::with_defaults(agg), clock)
    }

    fn tens() -> Vec<f64> {
        (1..=10).map(|i| f64::from(i) * 10.0).collect()
    }

    #[tokio::test]
    async fn test_nine_samples_is_not_enough() {
        let (engine, _clock) = engine_with_histogram(&tens()[..9]).await;
        let baseline = engine
            .calculate_baseline("request.duration", &Tags::new())
            .await
            .unwrap();
        assert!(baseline.is_none());
    }

    #[tokio::test]
    async fn test_exactly_min_samples_is_enough() {
        let (engine, _clock) = engine_with_histogram(&tens()).await;
        let baseline = engine
            .calculate_baseline("request.duration", &Tags::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(baseline.sample_count, 10);
        assert!(baseline.baseline_value >= 90.0);
        assert!((baseline.baseline_value - 95.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_unbounded_window_does_not_overflow() {
        let (engine, _clock) = engine_with_histogram(&tens()).await;
        let huge = BaselineEngine::new(
            engine.aggregator().clone(),
            BaselineConfig {
                window_days: u32::MAX,
                ..BaselineConfig::default()
            },
        );
        let baseline = huge
            .calculate_baseline("request.duration", &Tags::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(baseline.sample_count, 10);
    }

    #[tokio::test]
    async fn test_try_new_rejects_invalid_config() {
        let (agg, _clock) = test_aggregator().await;
        let err = BaselineEngine::try_new(
            agg.clone(),
            BaselineConfig {
                window_days: 0,
                ..BaselineConfig::default()
            },
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { var, .. } if var == "BASELINE_WINDOW_DAYS"
        ));
        assert!(BaselineEngine::try_new(agg, BaselineConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn test_calculate_does_not_cache() {
        let (engine, _clock) = engine_with_histogram(&tens()).await;
        engine
            .calculate_baseline("request.duration", &Tags::new())
            .await
            .unwrap();
        assert!(engine.get_baseline("request.duration", &Tags::new()).is_none());
    }

    #[tokio::test]
    async fn test_samples_outside_window_are_ignored() {
        let (agg, clock) = test_aggregator().await;
        let now = clock.now();
        let old: Vec<_> = (0..10)
            .map(|i| {
                MetricSnapshot::new(
                    MetricKind::Histogram,
                    "latency",
                    f64::from(i),
                    now - Duration::days(8),
                )
            })
            .collect();
        agg.record_batch(&old).await.unwrap();

        let engine = BaselineEngine::with_defaults(agg);
        assert!(engine
            .calculate_baseline("latency", &Tags::new())
            .await
            .unwrap()
            .is_none());

        let wide = BaselineEngine::new(
            engine.aggregator().clone(),
            BaselineConfig {
                window_days: 9,
                ..BaselineConfig::default()
            },
        );
        assert!(wide
            .calculate_baseline("latency", &Tags::new())
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_update_baselines_is_idempotent() {
        let (engine, _clock) = engine_with_histogram(&tens()).await;

        assert_eq!(engine.update_baselines(None).await.unwrap(), 1);
        let first = engine.get_baseline("request.duration", &Tags::new()).unwrap();
        assert_eq!(engine.update_baselines(None).await.unwrap(), 1);
        let second = engine.get_baseline("request.duration", &Tags::new()).unwrap();

        assert_eq!(first.baseline_value, second.baseline_value);
        assert_eq!(first.sample_count, second.sample_count);
    }

    #[tokio::test]
    async fn test_update_baselines_for_selected_names() {
        let (engine, clock) = engine_with_histogram(&tens()).await;
        for _ in 0..10 {
            engine
                .aggregator()
                .record_gauge("cpu", 0.5, &Tags::new())
                .await
                .unwrap();
        }
        clock.advance(Duration::seconds(1));

        engine
            .update_baselines(Some(&["cpu".to_string()]))
            .await
            .unwrap();
        assert!(engine.get_baseline("cpu", &Tags::new()).is_some());
        assert!(engine.get_baseline("request.duration", &Tags::new()).is_none());
    }

    #[tokio::test]
    async fn test_update_evicts_baselines_that_aged_out() {
        let (engine, clock) = engine_with_histogram(&tens()).await;
        engine.update_baselines(None).await.unwrap();
        assert_eq!(engine.baselines().len(), 1);

        clock.advance(Duration::days(8));
        assert_eq!(engine.update_baselines(None).await.unwrap(), 0);
        assert!(engine.get_baseline("request.duration", &Tags::new()).is_none());
    }

    #[tokio::test]
    async fn test_tagged_baselines_are_refreshed() {
        let (agg, clock) = test_aggregator().await;
        let usb = tags([("device", "usb")]);
        for i in 0..10 {
            agg.record_gauge("input.level", f64::from(i), &usb).await.unwrap();
            agg.record_gauge("input.level", 100.0, &tags([("device", "builtin")]))
                .await
                .unwrap();
        }
        clock.advance(Duration::seconds(1));

        let engine = BaselineEngine::with_defaults(agg);
        let tagged = engine.refresh_baseline("input.level", &usb).await.unwrap().unwrap();
        assert!(tagged.baseline_value < 10.0);

        engine.update_baselines(None).await.unwrap();
        let keys: Vec<BaselineKey> = engine.baselines().iter().map(Baseline::key).collect();
        assert_eq!(
            keys,
            vec![
                BaselineKey::untagged("input.level"),
                BaselineKey::new("input.level", usb),
            ]
        );
    }

    #[tokio::test]
    async fn test_check_deviation_without_baseline() {
        let (engine, _clock) = engine_with_histogram(&tens()[..3]).await;
        engine.update_baselines(None).await.unwrap();
        assert!(engine
            .check_deviation("request.duration", 1_000.0, &Tags::new())
            .is_none());
        assert!(engine
            .deviation_percent("request.duration", 1_000.0, &Tags::new())
            .is_none());
    }

    #[tokio::test]
    async fn test_scenario_critical_alert() {
        let (engine, _clock) = engine_with_histogram(&tens()).await;
        engine.update_baselines(None).await.unwrap();

        let alert = engine
            .check_deviation("request.duration", 200.0, &Tags::new())
            .unwrap();
        assert_eq!(alert.severity, Severity::Critical);
        assert_eq!(alert.metric_name, "request.duration");
        assert!(alert.deviation_percent > 100.0);
    }

    fn engine_with_fixed_baseline(value: f64) -> BaselineEngine {
        let agg = MetricsAggregator::new(Arc::new(MockMetricStore::new()))
            .with_clock(Arc::new(fixed_clock()));
        let engine = BaselineEngine::with_defaults(agg);
        let now = engine.aggregator().now();
        engine.write_cache().insert(
            BaselineKey::untagged("m"),
            Baseline {
                metric_name: "m".into(),
                tags: Tags::new(),
                baseline_value: value,
                percentile: 95.0,
                computed_at: now,
                sample_count: 10,
            },
        );
        engine
    }

    #[test_case(119.0 => None ; "below warning")]
    #[test_case(120.0 => Some(Severity::Warning) ; "warning boundary inclusive")]
    #[test_case(149.9 => Some(Severity::Warning) ; "just below critical")]
    #[test_case(150.0 => Some(Severity::Critical) ; "critical boundary inclusive")]
    #[test_case(100.0 => None ; "identical value")]
    #[test_case(40.0 => Some(Severity::Critical) ; "drop below baseline")]
    fn test_classification(current: f64) -> Option<Severity> {
        let engine = engine_with_fixed_baseline(100.0);
        engine
            .check_deviation("m", current, &Tags::new())
            .map(|a| a.severity)
    }

    #[test]
    fn test_non_finite_value_never_alerts() {
        let engine = engine_with_fixed_baseline(100.0);
        assert!(engine.check_deviation("m", f64::NAN, &Tags::new()).is_none());
        assert!(engine.check_deviation("m", f64::INFINITY, &Tags::new()).is_none());
    }

    #[test]
    fn test_zero_baseline_never_alerts() {
        let engine = engine_with_fixed_baseline(0.0);
        assert!(engine.check_deviation("m", 1e6, &Tags::new()).is_none());
        assert_eq!(engine.deviation_percent("m", 1e6, &Tags::new()), Some(0.0));
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(BaselineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_configs() {
        let bad = [
            BaselineConfig {
                window_days: 0,
                ..BaselineConfig::default()
            },
            BaselineConfig {
                min_data_points: 0,
                ..BaselineConfig::default()
            },
            BaselineConfig {
                baseline_percentile: 101.0,
                ..BaselineConfig::default()
            },
            BaselineConfig {
                deviation_threshold_percent: 0.0,
                ..BaselineConfig::default()
            },
            BaselineConfig {
                critical_threshold_percent: 10.0,
                ..BaselineConfig::default()
            },
        ];
        for config in bad {
            assert!(config.validate().is_err(), "{config:?} should be rejected");
        }
    }
}
