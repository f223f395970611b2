//! Storage backend.
//!
//! This module provides:
//! - `SQLite` time-series table for metric snapshots
//! - Secondary tag index for must-match-all filtering
//! - Retention pruning
//!
//! # Architecture
//!
//! The storage layer uses `SQLite` with the `sqlx` crate for async operations.
//! Every append runs in its own short transaction (snapshot row plus tag
//! rows); file-backed stores use WAL so readers see a consistent snapshot
//! without blocking writers.
//!
//! The implementation is split across submodules:
//! - `core`: Pool management, migrations, and helper functions
//! - `snapshots`: Snapshot insert/select/delete operations
//! - `trait_impl`: [`MetricStore`](crate::traits::MetricStore) implementation
//!
//! # Example
//!
//! ```ignore
//! use metrics_baseline::storage::SqliteStorage;
//!
//! let storage = SqliteStorage::new("./data/metrics.db").await?;
//! ```

mod core;
mod snapshots;
mod trait_impl;

pub use self::core::SqliteStorage;
