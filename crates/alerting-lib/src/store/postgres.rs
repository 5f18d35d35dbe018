//! Postgres-backed warehouse access
//!
//! All date and limit inputs are bound parameters; table and column names
//! are spliced only after validating them against the configured
//! allow-list.

use std::collections::HashMap;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::PgPool;
use sqlx::Row;
use tracing::debug;

use super::{
    is_safe_identifier, AlertStore, BreakdownSource, DriverStore, MetricHistorySource,
    SegmentValue,
};
use crate::attribution::{DimensionSpec, MetricFamily};
use crate::models::{Alert, Driver, MetricPoint};

/// Table names for the reference warehouse layout
#[derive(Debug, Clone)]
pub struct WarehouseTables {
    /// Schema holding the daily KPI marts
    pub marts_schema: String,
    /// Aggregate daily KPI table
    pub history_table: String,
    /// Date column shared by the mart tables
    pub date_column: String,
    /// Alert output table
    pub alerts_table: String,
    /// Driver output table
    pub drivers_table: String,
}

impl Default for WarehouseTables {
    fn default() -> Self {
        Self {
            marts_schema: "dbt_dev_marts".to_string(),
            history_table: "mart_kpis_daily".to_string(),
            date_column: "pickup_date".to_string(),
            alerts_table: "kpi_alerts".to_string(),
            drivers_table: "kpi_alert_drivers".to_string(),
        }
    }
}

impl WarehouseTables {
    /// Reject any configured identifier that would need quoting
    pub fn validate(&self) -> Result<()> {
        for name in [
            &self.marts_schema,
            &self.history_table,
            &self.date_column,
            &self.alerts_table,
            &self.drivers_table,
        ] {
            if !is_safe_identifier(name) {
                bail!("unsafe identifier in warehouse configuration: {name:?}");
            }
        }
        Ok(())
    }
}

/// Warehouse client implementing every store contract over one pool
pub struct PgWarehouse {
    pool: PgPool,
    tables: WarehouseTables,
}

impl PgWarehouse {
    /// Wrap an existing pool, validating the configured identifiers
    pub fn new(pool: PgPool, tables: WarehouseTables) -> Result<Self> {
        tables.validate()?;
        Ok(Self { pool, tables })
    }

    /// Connect to the warehouse and validate the configured identifiers
    pub async fn connect(database_url: &str, tables: WarehouseTables) -> Result<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .context("Failed to connect to the warehouse")?;
        Self::new(pool, tables)
    }

    fn check_dimension(&self, dim: &DimensionSpec) -> Result<()> {
        for name in dim.identifiers() {
            if !is_safe_identifier(name) {
                bail!(
                    "unsafe identifier in dimension {:?}: {name:?}",
                    dim.dimension
                );
            }
        }
        Ok(())
    }
}

#[async_trait]
impl MetricHistorySource for PgWarehouse {
    async fn fetch_daily(&self, metric: &str, lookback_days: u32) -> Result<Vec<MetricPoint>> {
        if !is_safe_identifier(metric) {
            bail!("unsafe metric identifier: {metric:?}");
        }
        let t = &self.tables;
        let sql = format!(
            "SELECT {date} AS date, CAST({metric} AS DOUBLE PRECISION) AS value \
             FROM {schema}.{table} \
             ORDER BY {date} DESC \
             LIMIT $1",
            date = t.date_column,
            metric = metric,
            schema = t.marts_schema,
            table = t.history_table,
        );

        let rows = sqlx::query(&sql)
            .bind(i64::from(lookback_days))
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to fetch history for {metric}"))?;

        Ok(rows
            .into_iter()
            .map(|row| MetricPoint {
                date: row.get("date"),
                value: row.get("value"),
            })
            .collect())
    }
}

#[async_trait]
impl BreakdownSource for PgWarehouse {
    async fn baseline_by_segment(
        &self,
        dim: &DimensionSpec,
        family: MetricFamily,
        alert_date: NaiveDate,
        baseline_days: u32,
    ) -> Result<Vec<SegmentValue>> {
        self.check_dimension(dim)?;
        let t = &self.tables;
        let sql = format!(
            "SELECT CAST({seg} AS TEXT) AS segment_key, \
                    CAST(AVG({col}) AS DOUBLE PRECISION) AS value \
             FROM {schema}.{table} \
             WHERE {date} < $1 \
               AND {date} >= $1 - ($2 * INTERVAL '1 day') \
               AND EXTRACT(DOW FROM {date}) = EXTRACT(DOW FROM $1) \
             GROUP BY 1",
            seg = dim.segment_column,
            col = dim.metric_column(family),
            schema = t.marts_schema,
            table = dim.table,
            date = t.date_column,
        );

        let rows = sqlx::query(&sql)
            .bind(alert_date)
            .bind(baseline_days as i32)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to fetch baseline for dimension {}", dim.dimension))?;

        Ok(rows
            .into_iter()
            .map(|row| SegmentValue {
                segment_key: row.get("segment_key"),
                value: row.get("value"),
            })
            .collect())
    }

    async fn current_by_segment(
        &self,
        dim: &DimensionSpec,
        family: MetricFamily,
        alert_date: NaiveDate,
    ) -> Result<Vec<SegmentValue>> {
        self.check_dimension(dim)?;
        let t = &self.tables;
        let sql = format!(
            "SELECT CAST({seg} AS TEXT) AS segment_key, \
                    CAST({col} AS DOUBLE PRECISION) AS value \
             FROM {schema}.{table} \
             WHERE {date} = $1",
            seg = dim.segment_column,
            col = dim.metric_column(family),
            schema = t.marts_schema,
            table = dim.table,
            date = t.date_column,
        );

        let rows = sqlx::query(&sql)
            .bind(alert_date)
            .fetch_all(&self.pool)
            .await
            .with_context(|| {
                format!("Failed to fetch current values for dimension {}", dim.dimension)
            })?;

        Ok(rows
            .into_iter()
            .map(|row| SegmentValue {
                segment_key: row.get("segment_key"),
                value: row.get("value"),
            })
            .collect())
    }

    async fn segment_names(&self, dim: &DimensionSpec) -> Result<HashMap<String, String>> {
        let Some(lookup) = &dim.lookup else {
            return Ok(HashMap::new());
        };
        self.check_dimension(dim)?;
        let sql = format!(
            "SELECT CAST({key} AS TEXT) AS segment_key, {name} AS display_name \
             FROM {schema}.{table}",
            key = lookup.key_column,
            name = lookup.name_column,
            schema = self.tables.marts_schema,
            table = lookup.table,
        );

        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to fetch segment names for {}", dim.dimension))?;

        Ok(rows
            .into_iter()
            .map(|row| (row.get("segment_key"), row.get("display_name")))
            .collect())
    }
}

#[async_trait]
impl AlertStore for PgWarehouse {
    async fn insert_alerts(&self, alerts: &[Alert]) -> Result<()> {
        let sql = format!(
            "INSERT INTO {table} \
             (alert_id, alert_date, metric_name, grain, metric_value, expected_value, \
              deviation_pct, severity, method, explanation) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            table = self.tables.alerts_table,
        );

        for alert in alerts {
            sqlx::query(&sql)
                .bind(alert.alert_id)
                .bind(alert.alert_date)
                .bind(&alert.metric_name)
                .bind(alert.grain.to_string())
                .bind(alert.metric_value)
                .bind(alert.expected_value)
                .bind(alert.deviation_pct)
                .bind(alert.severity.to_string())
                .bind(alert.method.to_string())
                .bind(&alert.explanation)
                .execute(&self.pool)
                .await
                .with_context(|| format!("Failed to insert alert for {}", alert.metric_name))?;
        }

        debug!(count = alerts.len(), "Inserted alert rows");
        Ok(())
    }
}

#[async_trait]
impl DriverStore for PgWarehouse {
    async fn insert_drivers(&self, drivers: &[Driver]) -> Result<()> {
        let sql = format!(
            "INSERT INTO {table} \
             (alert_id, dimension, segment_value, baseline_value, current_value, \
              delta, contribution_pct, rank) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            table = self.tables.drivers_table,
        );

        for driver in drivers {
            sqlx::query(&sql)
                .bind(driver.alert_id)
                .bind(&driver.dimension)
                .bind(&driver.segment_value)
                .bind(driver.baseline_value)
                .bind(driver.current_value)
                .bind(driver.delta)
                .bind(driver.contribution_pct)
                .bind(driver.rank as i32)
                .execute(&self.pool)
                .await
                .with_context(|| {
                    format!("Failed to insert driver {} for alert {}", driver.dimension, driver.alert_id)
                })?;
        }

        debug!(count = drivers.len(), "Inserted driver rows");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tables_pass_validation() {
        assert!(WarehouseTables::default().validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_injectable_names() {
        let tables = WarehouseTables {
            alerts_table: "kpi_alerts; DROP TABLE kpi_alerts".to_string(),
            ..WarehouseTables::default()
        };
        assert!(tables.validate().is_err());

        let tables = WarehouseTables {
            marts_schema: "dbt_dev_marts'".to_string(),
            ..WarehouseTables::default()
        };
        assert!(tables.validate().is_err());
    }
}
