//! Warehouse access contracts
//!
//! The pipeline reads metric history and dimension breakdowns from, and
//! appends alerts and drivers to, an analytics warehouse. These traits keep
//! the decision logic testable against in-memory fakes; [`PgWarehouse`]
//! provides the Postgres implementation.

mod postgres;

pub use postgres::{PgWarehouse, WarehouseTables};

use std::collections::HashMap;

use anyhow::Result;
use chrono::NaiveDate;

use crate::attribution::{DimensionSpec, MetricFamily};
use crate::models::{Alert, Driver, MetricPoint};

pub use async_trait::async_trait;

/// One segment's value within a dimension breakdown
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentValue {
    pub segment_key: String,
    pub value: f64,
}

/// Supplies daily history for one metric
#[async_trait]
pub trait MetricHistorySource: Send + Sync {
    /// Fetch up to `lookback_days` of daily observations, in any order
    async fn fetch_daily(&self, metric: &str, lookback_days: u32) -> Result<Vec<MetricPoint>>;
}

/// Supplies per-segment breakdowns for attribution
#[async_trait]
pub trait BreakdownSource: Send + Sync {
    /// Per-segment average over the `baseline_days` days strictly before
    /// `alert_date`, restricted to the alert date's weekday
    async fn baseline_by_segment(
        &self,
        dim: &DimensionSpec,
        family: MetricFamily,
        alert_date: NaiveDate,
        baseline_days: u32,
    ) -> Result<Vec<SegmentValue>>;

    /// Per-segment value on `alert_date` exactly
    async fn current_by_segment(
        &self,
        dim: &DimensionSpec,
        family: MetricFamily,
        alert_date: NaiveDate,
    ) -> Result<Vec<SegmentValue>>;

    /// Display names for the dimension's segment keys
    async fn segment_names(&self, dim: &DimensionSpec) -> Result<HashMap<String, String>>;
}

/// Append-only sink for alert rows
#[async_trait]
pub trait AlertStore: Send + Sync {
    async fn insert_alerts(&self, alerts: &[Alert]) -> Result<()>;
}

/// Append-only sink for driver rows
#[async_trait]
pub trait DriverStore: Send + Sync {
    async fn insert_drivers(&self, drivers: &[Driver]) -> Result<()>;
}

/// True when `name` is usable as a SQL identifier without quoting
///
/// Query builders only splice identifiers that pass this check and come
/// from configuration; all values are bound parameters.
pub fn is_safe_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}
