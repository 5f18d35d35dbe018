//! Driver ranking for confirmed anomalies
//!
//! For each configured dimension, compares every segment's value on the
//! alert date against its same-weekday average over the preceding weeks and
//! ranks the largest absolute movers. Failures are scoped to a single
//! dimension; the rest of the analysis still reports.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::{debug, warn};

use super::{DimensionSpec, MetricFamily};
use crate::models::{Alert, Driver, Grain};
use crate::store::{BreakdownSource, SegmentValue};

/// Tuning for driver selection
#[derive(Debug, Clone)]
pub struct AttributionConfig {
    /// Days of history feeding the same-weekday baseline
    pub baseline_days: u32,
    /// Minimum absolute delta for a segment to count as a driver
    pub noise_floor: f64,
    /// Maximum drivers reported per dimension
    pub top_k: usize,
    /// Dimensions to analyze
    pub dimensions: Vec<DimensionSpec>,
}

impl Default for AttributionConfig {
    fn default() -> Self {
        Self {
            baseline_days: 28,
            noise_floor: 10.0,
            top_k: 3,
            dimensions: DimensionSpec::standard(),
        }
    }
}

/// Ranks the dimension segments that best explain an anomaly
pub struct AttributionEngine {
    source: Arc<dyn BreakdownSource>,
    config: AttributionConfig,
}

impl AttributionEngine {
    pub fn new(source: Arc<dyn BreakdownSource>, config: AttributionConfig) -> Self {
        Self { source, config }
    }

    /// Rank drivers for a persisted alert
    ///
    /// Returns an empty list for unsupported grains. A query failure in one
    /// dimension is logged and yields no drivers for that dimension only.
    pub async fn attribute(&self, alert: &Alert) -> Vec<Driver> {
        if alert.grain != Grain::Daily {
            debug!(
                metric = %alert.metric_name,
                grain = %alert.grain,
                "Attribution supports daily grain only"
            );
            return Vec::new();
        }

        debug!(
            metric = %alert.metric_name,
            date = %alert.alert_date,
            "Investigating drivers"
        );

        let family = MetricFamily::of(&alert.metric_name);
        let mut drivers = Vec::new();
        for dim in &self.config.dimensions {
            match self.analyze_dimension(alert, dim, family).await {
                Ok(mut found) => drivers.append(&mut found),
                Err(e) => warn!(
                    metric = %alert.metric_name,
                    dimension = %dim.dimension,
                    error = %e,
                    "Dimension attribution failed"
                ),
            }
        }
        drivers
    }

    async fn analyze_dimension(
        &self,
        alert: &Alert,
        dim: &DimensionSpec,
        family: MetricFamily,
    ) -> anyhow::Result<Vec<Driver>> {
        let baseline = self
            .source
            .baseline_by_segment(dim, family, alert.alert_date, self.config.baseline_days)
            .await?;
        let current = self
            .source
            .current_by_segment(dim, family, alert.alert_date)
            .await?;
        let names = match &dim.lookup {
            Some(_) => self.source.segment_names(dim).await?,
            None => HashMap::new(),
        };

        let ranked = rank_segments(&baseline, &current, self.config.noise_floor, self.config.top_k);
        let total_gap = (alert.metric_value - alert.expected_value).abs();

        Ok(ranked
            .into_iter()
            .enumerate()
            .map(|(idx, seg)| {
                let contribution_pct = if total_gap > 0.0 {
                    seg.delta.abs() / total_gap
                } else {
                    0.0
                };
                let segment_value = names
                    .get(&seg.key)
                    .cloned()
                    .unwrap_or_else(|| seg.key.clone());
                Driver {
                    alert_id: alert.alert_id,
                    dimension: dim.dimension.clone(),
                    segment_value,
                    baseline_value: seg.baseline,
                    current_value: seg.current,
                    delta: seg.delta,
                    contribution_pct,
                    rank: (idx + 1) as u32,
                }
            })
            .collect())
    }
}

/// Per-segment movement between baseline and the alert date
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentDelta {
    pub key: String,
    pub baseline: f64,
    pub current: f64,
    pub delta: f64,
}

/// Outer-join baseline and current values, drop noise, keep the top movers
///
/// Segments present on only one side are treated as 0 on the missing side.
/// Ties in absolute delta break deterministically by segment key.
pub fn rank_segments(
    baseline: &[SegmentValue],
    current: &[SegmentValue],
    noise_floor: f64,
    top_k: usize,
) -> Vec<SegmentDelta> {
    let mut merged: BTreeMap<&str, (f64, f64)> = BTreeMap::new();
    for row in baseline {
        merged.entry(&row.segment_key).or_default().0 = row.value;
    }
    for row in current {
        merged.entry(&row.segment_key).or_default().1 = row.value;
    }

    let mut deltas: Vec<SegmentDelta> = merged
        .into_iter()
        .map(|(key, (baseline, current))| SegmentDelta {
            key: key.to_string(),
            baseline,
            current,
            delta: current - baseline,
        })
        .filter(|d| d.delta.abs() >= noise_floor)
        .collect();

    deltas.sort_by(|a, b| {
        b.delta
            .abs()
            .partial_cmp(&a.delta.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    deltas.truncate(top_k);
    deltas
}
