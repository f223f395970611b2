//! Metric snapshot storage operations.

#![allow(clippy::missing_errors_doc, clippy::cast_precision_loss)]

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};

use super::core::SqliteStorage;
use crate::error::StorageError;
use crate::metrics::{
    scaled_mean, Metadata, MetricKind, MetricQuery, MetricSnapshot, MetricStats, Tags,
};

const SNAPSHOT_COLUMNS: &str =
    "SELECT s.id, s.kind, s.name, s.value, s.timestamp, s.tags_json, s.metadata_json \
     FROM metric_snapshots s";

/// Append the `WHERE` clause for `query` to `builder`.
///
/// Every tag filter becomes its own `IN` subquery against the tag index,
/// so all of them must match.
fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, query: &MetricQuery) {
    builder.push(" WHERE 1 = 1");
    if let Some(name) = &query.name {
        builder.push(" AND s.name = ").push_bind(name.clone());
    }
    if let Some(kind) = query.kind {
        builder.push(" AND s.kind = ").push_bind(kind.as_str());
    }
    if let Some(start) = query.start {
        builder
            .push(" AND s.timestamp >= ")
            .push_bind(SqliteStorage::to_micros(start));
    }
    if let Some(end) = query.end {
        builder
            .push(" AND s.timestamp < ")
            .push_bind(SqliteStorage::to_micros(end));
    }
    for (key, value) in &query.tags {
        builder
            .push(" AND s.id IN (SELECT snapshot_id FROM metric_tags WHERE tag_key = ")
            .push_bind(key.clone())
            .push(" AND tag_value = ")
            .push_bind(value.clone())
            .push(")");
    }
}

fn encode_json<T: serde::Serialize>(what: &str, value: &T) -> Result<String, StorageError> {
    serde_json::to_string(value).map_err(|e| StorageError::Internal {
        message: format!("Failed to encode {what}: {e}"),
    })
}

fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, StorageError>
where
    T: sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
{
    row.try_get(name).map_err(|e| StorageError::Internal {
        message: format!("Failed to decode column '{name}': {e}"),
    })
}

impl SqliteStorage {
    /// Insert one snapshot and its tag index rows on an open connection.
    async fn insert_snapshot_on(
        conn: &mut SqliteConnection,
        snapshot: &MetricSnapshot,
    ) -> Result<i64, StorageError> {
        let tags_json = encode_json("tags", &snapshot.tags)?;
        let metadata_json = encode_json("metadata", &snapshot.metadata)?;

        let result = sqlx::query(
            "INSERT INTO metric_snapshots (kind, name, value, timestamp, tags_json, metadata_json)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(snapshot.kind.as_str())
        .bind(&snapshot.name)
        .bind(snapshot.value)
        .bind(Self::to_micros(snapshot.timestamp))
        .bind(&tags_json)
        .bind(&metadata_json)
        .execute(&mut *conn)
        .await
        .map_err(|e| Self::query_error("INSERT metric_snapshots", format!("{e}")))?;

        let id = result.last_insert_rowid();

        for (key, value) in &snapshot.tags {
            sqlx::query("INSERT INTO metric_tags (snapshot_id, tag_key, tag_value) VALUES (?, ?, ?)")
                .bind(id)
                .bind(key)
                .bind(value)
                .execute(&mut *conn)
                .await
                .map_err(|e| Self::query_error("INSERT metric_tags", format!("{e}")))?;
        }

        Ok(id)
    }

    /// Save a snapshot, returning its row id.
    pub async fn save_snapshot(&self, snapshot: &MetricSnapshot) -> Result<i64, StorageError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Self::query_error("BEGIN", format!("{e}")))?;

        let id = Self::insert_snapshot_on(&mut *tx, snapshot).await?;

        tx.commit()
            .await
            .map_err(|e| Self::query_error("COMMIT", format!("{e}")))?;

        tracing::debug!(metric = %snapshot.name, kind = %snapshot.kind, id, "Saved snapshot");
        Ok(id)
    }

    /// Save many snapshots in one transaction.
    pub async fn save_snapshots(&self, snapshots: &[MetricSnapshot]) -> Result<u64, StorageError> {
        if snapshots.is_empty() {
            return Ok(0);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Self::query_error("BEGIN", format!("{e}")))?;

        for snapshot in snapshots {
            Self::insert_snapshot_on(&mut *tx, snapshot).await?;
        }

        tx.commit()
            .await
            .map_err(|e| Self::query_error("COMMIT", format!("{e}")))?;

        tracing::debug!(count = snapshots.len(), "Saved snapshot batch");
        Ok(snapshots.len() as u64)
    }

    /// Get snapshots matching `query`, oldest first, capped at `query.limit`.
    pub async fn get_snapshots(
        &self,
        query: &MetricQuery,
    ) -> Result<Vec<MetricSnapshot>, StorageError> {
        if query.is_empty_range() || query.limit == 0 {
            return Ok(Vec::new());
        }

        let mut builder = QueryBuilder::<Sqlite>::new(SNAPSHOT_COLUMNS);
        push_filters(&mut builder, query);
        builder
            .push(" ORDER BY s.timestamp ASC, s.id ASC LIMIT ")
            .push_bind(i64::try_from(query.limit).unwrap_or(i64::MAX));

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Self::query_error("SELECT metric_snapshots", format!("{e}")))?;

        rows.iter().map(Self::row_to_snapshot).collect()
    }

    /// Get every value matching `query`, ignoring its limit.
    pub async fn get_values(&self, query: &MetricQuery) -> Result<Vec<f64>, StorageError> {
        if query.is_empty_range() {
            return Ok(Vec::new());
        }

        let mut builder = QueryBuilder::<Sqlite>::new("SELECT s.value FROM metric_snapshots s");
        push_filters(&mut builder, query);

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Self::query_error("SELECT metric values", format!("{e}")))?;

        rows.iter().map(|row| column::<f64>(row, "value")).collect()
    }

    /// Compute count/sum/min/max in SQL, ignoring the query limit.
    pub async fn get_stats(&self, query: &MetricQuery) -> Result<MetricStats, StorageError> {
        if query.is_empty_range() {
            return Ok(MetricStats::default());
        }

        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT COUNT(*) AS n, SUM(s.value) AS total, MIN(s.value) AS lo, MAX(s.value) AS hi \
             FROM metric_snapshots s",
        );
        push_filters(&mut builder, query);

        let row = builder
            .build()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Self::query_error("SELECT metric stats", format!("{e}")))?;

        let count: i64 = column(&row, "n")?;
        if count == 0 {
            return Ok(MetricStats::default());
        }

        let sum = column::<Option<f64>>(&row, "total")?.unwrap_or(0.0);
        let mean = if sum.is_finite() {
            sum / count as f64
        } else {
            // Finite samples whose sum overflowed: rescale in a second pass.
            scaled_mean(&self.get_values(query).await?)
        };

        Ok(MetricStats {
            count: u64::try_from(count).unwrap_or(0),
            sum,
            min: column::<Option<f64>>(&row, "lo")?.unwrap_or(0.0),
            max: column::<Option<f64>>(&row, "hi")?.unwrap_or(0.0),
            mean,
        })
    }

    /// Get the most recent snapshot matching `query`.
    pub async fn get_latest_snapshot(
        &self,
        query: &MetricQuery,
    ) -> Result<Option<MetricSnapshot>, StorageError> {
        if query.is_empty_range() {
            return Ok(None);
        }

        let mut builder = QueryBuilder::<Sqlite>::new(SNAPSHOT_COLUMNS);
        push_filters(&mut builder, query);
        builder.push(" ORDER BY s.timestamp DESC, s.id DESC LIMIT 1");

        let row = builder
            .build()
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Self::query_error("SELECT latest snapshot", format!("{e}")))?;

        row.as_ref().map(Self::row_to_snapshot).transpose()
    }

    /// Get every distinct metric name.
    pub async fn get_metric_names(&self) -> Result<BTreeSet<String>, StorageError> {
        let rows = sqlx::query("SELECT DISTINCT name FROM metric_snapshots")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Self::query_error("SELECT metric names", format!("{e}")))?;

        rows.iter().map(|row| column::<String>(row, "name")).collect()
    }

    /// Get tag keys and their observed values for one metric.
    pub async fn get_tag_values(
        &self,
        name: &str,
    ) -> Result<BTreeMap<String, BTreeSet<String>>, StorageError> {
        let rows = sqlx::query(
            "SELECT DISTINCT t.tag_key, t.tag_value
             FROM metric_tags t JOIN metric_snapshots s ON s.id = t.snapshot_id
             WHERE s.name = ?",
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Self::query_error("SELECT tag values", format!("{e}")))?;

        let mut out: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for row in &rows {
            let key: String = column(row, "tag_key")?;
            let value: String = column(row, "tag_value")?;
            out.entry(key).or_default().insert(value);
        }
        Ok(out)
    }

    /// Delete snapshots older than `cutoff` and their tag rows.
    pub async fn delete_snapshots_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError> {
        let cutoff_us = Self::to_micros(cutoff);
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Self::query_error("BEGIN", format!("{e}")))?;

        sqlx::query(
            "DELETE FROM metric_tags WHERE snapshot_id IN
             (SELECT id FROM metric_snapshots WHERE timestamp < ?)",
        )
        .bind(cutoff_us)
        .execute(&mut *tx)
        .await
        .map_err(|e| Self::query_error("DELETE metric_tags", format!("{e}")))?;

        let result = sqlx::query("DELETE FROM metric_snapshots WHERE timestamp < ?")
            .bind(cutoff_us)
            .execute(&mut *tx)
            .await
            .map_err(|e| Self::query_error("DELETE metric_snapshots", format!("{e}")))?;

        tx.commit()
            .await
            .map_err(|e| Self::query_error("COMMIT", format!("{e}")))?;

        Ok(result.rows_affected())
    }

    /// Convert a database row to a [`MetricSnapshot`].
    fn row_to_snapshot(row: &SqliteRow) -> Result<MetricSnapshot, StorageError> {
        let kind_str: String = column(row, "kind")?;
        let kind = kind_str
            .parse::<MetricKind>()
            .map_err(|message| StorageError::Internal { message })?;
        let tags_json: String = column(row, "tags_json")?;
        let metadata_json: String = column(row, "metadata_json")?;

        let tags: Tags = serde_json::from_str(&tags_json).map_err(|e| StorageError::Internal {
            message: format!("Failed to decode tags: {e}"),
        })?;
        let metadata: Metadata =
            serde_json::from_str(&metadata_json).map_err(|e| StorageError::Internal {
                message: format!("Failed to decode metadata: {e}"),
            })?;

        Ok(MetricSnapshot {
            kind,
            name: column(row, "name")?,
            value: column(row, "value")?,
            timestamp: Self::from_micros(column(row, "timestamp")?)?,
            tags,
            metadata,
        })
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::float_cmp
)]
mod tests {
    use super::*;
    use crate::metrics::tags;
    use crate::storage::core::tests::test_storage;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn counter(name: &str, value: f64, offset_secs: i64) -> MetricSnapshot {
        MetricSnapshot::new(
            MetricKind::Counter,
            name,
            value,
            t0() + Duration::seconds(offset_secs),
        )
    }

    #[tokio::test]
    async fn test_save_and_get_snapshot() {
        let storage = test_storage().await;
        let snap = counter("errors", 1.0, 0)
            .with_tag("type", "network")
            .with_metadata("path", serde_json::json!("ignored"));

        let id = storage.save_snapshot(&snap).await.unwrap();
        assert!(id > 0);

        let rows = storage
            .get_snapshots(&MetricQuery::named("errors"))
            .await
            .unwrap();
        assert_eq!(rows, vec![snap]);
    }

    #[tokio::test]
    async fn test_snapshots_ordered_and_limited() {
        let storage = test_storage().await;
        storage
            .save_snapshots(&[
                counter("a", 3.0, 30),
                counter("a", 1.0, 10),
                counter("a", 2.0, 20),
            ])
            .await
            .unwrap();

        let rows = storage
            .get_snapshots(&MetricQuery::named("a").limit(2))
            .await
            .unwrap();
        let values: Vec<f64> = rows.iter().map(|s| s.value).collect();
        assert_eq!(values, vec![1.0, 2.0]);
    }

    #[tokio::test]
    async fn test_half_open_interval() {
        let storage = test_storage().await;
        storage
            .save_snapshots(&[counter("a", 1.0, 0), counter("a", 2.0, 10)])
            .await
            .unwrap();

        let q = MetricQuery::named("a").between(t0(), t0() + Duration::seconds(10));
        let rows = storage.get_snapshots(&q).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value, 1.0);
    }

    #[tokio::test]
    async fn test_tag_filter_must_match_all() {
        let storage = test_storage().await;
        storage
            .save_snapshots(&[
                counter("errors", 1.0, 0).with_tags(tags([("type", "network"), ("os", "linux")])),
                counter("errors", 1.0, 1).with_tags(tags([("type", "network"), ("os", "mac")])),
                counter("errors", 1.0, 2).with_tags(tags([("type", "disk")])),
            ])
            .await
            .unwrap();

        let network = MetricQuery::named("errors").tag("type", "network");
        assert_eq!(storage.get_stats(&network).await.unwrap().count, 2);

        let both = network.tag("os", "mac");
        assert_eq!(storage.get_stats(&both).await.unwrap().count, 1);

        let missing = MetricQuery::named("errors").tag("region", "eu");
        assert!(storage.get_snapshots(&missing).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stats_mean_survives_sum_overflow() {
        let storage = test_storage().await;
        let batch: Vec<_> = [1.5e308, 1.5e308, 0.0]
            .into_iter()
            .zip(0..)
            .map(|(value, offset)| {
                MetricSnapshot::new(MetricKind::Gauge, "g", value, t0() + Duration::seconds(offset))
            })
            .collect();
        storage.save_snapshots(&batch).await.unwrap();

        let stats = storage.get_stats(&MetricQuery::named("g")).await.unwrap();
        assert_eq!(stats.count, 3);
        assert!(!stats.sum.is_finite());
        assert!(stats.average().is_finite());
        assert!((stats.average() - 1e308).abs() < 1e294);
    }

    #[tokio::test]
    async fn test_stats_ignore_limit() {
        let storage = test_storage().await;
        let batch: Vec<_> = (0..5).map(|i| counter("c", 1.0, i)).collect();
        storage.save_snapshots(&batch).await.unwrap();

        let stats = storage
            .get_stats(&MetricQuery::named("c").limit(1))
            .await
            .unwrap();
        assert_eq!(stats.count, 5);
        assert_eq!(stats.sum, 5.0);
        assert_eq!(
            storage
                .get_values(&MetricQuery::named("c").limit(1))
                .await
                .unwrap()
                .len(),
            5
        );
    }

    #[tokio::test]
    async fn test_stats_empty() {
        let storage = test_storage().await;
        let stats = storage.get_stats(&MetricQuery::named("none")).await.unwrap();
        assert_eq!(stats, MetricStats::default());
    }

    #[tokio::test]
    async fn test_latest_snapshot() {
        let storage = test_storage().await;
        storage
            .save_snapshots(&[counter("g", 5.0, 50), counter("g", 9.0, 90), counter("g", 1.0, 10)])
            .await
            .unwrap();

        let latest = storage
            .get_latest_snapshot(&MetricQuery::named("g"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.value, 9.0);
        assert!(storage
            .get_latest_snapshot(&MetricQuery::named("other"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_metric_names_and_tag_values() {
        let storage = test_storage().await;
        storage
            .save_snapshots(&[
                counter("errors", 1.0, 0).with_tag("type", "network"),
                counter("errors", 1.0, 1).with_tag("type", "disk"),
                counter("sessions", 1.0, 2),
            ])
            .await
            .unwrap();

        let names = storage.get_metric_names().await.unwrap();
        assert_eq!(
            names.into_iter().collect::<Vec<_>>(),
            vec!["errors".to_string(), "sessions".to_string()]
        );

        let tag_values = storage.get_tag_values("errors").await.unwrap();
        let types = tag_values.get("type").unwrap();
        assert!(types.contains("network") && types.contains("disk"));
        assert!(storage.get_tag_values("sessions").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_before_removes_tags() {
        let storage = test_storage().await;
        storage
            .save_snapshots(&[
                counter("errors", 1.0, 0).with_tag("type", "old"),
                counter("errors", 1.0, 100).with_tag("type", "new"),
            ])
            .await
            .unwrap();

        let removed = storage
            .delete_snapshots_before(t0() + Duration::seconds(50))
            .await
            .unwrap();
        assert_eq!(removed, 1);

        let tag_values = storage.get_tag_values("errors").await.unwrap();
        let types = tag_values.get("type").unwrap();
        assert!(!types.contains("old"));
        assert!(types.contains("new"));
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() {
        let storage = test_storage().await;
        assert_eq!(storage.save_snapshots(&[]).await.unwrap(), 0);
    }
}
