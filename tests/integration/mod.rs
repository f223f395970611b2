//! Integration tests for the metrics baseline engine.
//!
//! These tests drive the public API end to end against real `SQLite`
//! stores, with a manual clock so windows are deterministic.

mod baseline_workflow;
mod common;
mod concurrency;
mod dashboard_workflow;
mod error_recovery;
mod properties;
