//! `MetricStore` implementation for `SqliteStorage`.

#![allow(clippy::missing_errors_doc)]

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StorageError;
use crate::metrics::{MetricQuery, MetricSnapshot, MetricStats};
use crate::traits::MetricStore;

use super::core::SqliteStorage;

#[async_trait]
impl MetricStore for SqliteStorage {
    async fn append(&self, snapshot: &MetricSnapshot) -> Result<i64, StorageError> {
        self.save_snapshot(snapshot).await
    }

    async fn append_batch(&self, snapshots: &[MetricSnapshot]) -> Result<u64, StorageError> {
        self.save_snapshots(snapshots).await
    }

    async fn query(&self, query: &MetricQuery) -> Result<Vec<MetricSnapshot>, StorageError> {
        self.get_snapshots(query).await
    }

    async fn values(&self, query: &MetricQuery) -> Result<Vec<f64>, StorageError> {
        self.get_values(query).await
    }

    async fn stats(&self, query: &MetricQuery) -> Result<MetricStats, StorageError> {
        self.get_stats(query).await
    }

    async fn latest(&self, query: &MetricQuery) -> Result<Option<MetricSnapshot>, StorageError> {
        self.get_latest_snapshot(query).await
    }

    async fn metric_names(&self) -> Result<BTreeSet<String>, StorageError> {
        self.get_metric_names().await
    }

    async fn tag_values(
        &self,
        name: &str,
    ) -> Result<BTreeMap<String, BTreeSet<String>>, StorageError> {
        self.get_tag_values(name).await
    }

    async fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError> {
        self.delete_snapshots_before(cutoff).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::metrics::MetricKind;
    use crate::storage::core::tests::test_storage;

    #[tokio::test]
    async fn test_store_through_trait_object() {
        let store: Arc<dyn MetricStore> = Arc::new(test_storage().await);
        let snap = MetricSnapshot::new(MetricKind::Gauge, "cpu", 0.25, Utc::now());

        store.append(&snap).await.unwrap();

        let rows = store.query(&MetricQuery::named("cpu")).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(store.stats(&MetricQuery::all()).await.unwrap().sum, 0.25);
        assert!(store.metric_names().await.unwrap().contains("cpu"));
    }
}
