//! Core data models for the alerting pipeline

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single daily observation of a metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Ordered daily history for one metric
///
/// Rows may arrive from the warehouse in any order; the constructor sorts
/// ascending by date so the latest observation is always the last element.
#[derive(Debug, Clone)]
pub struct MetricSeries {
    points: Vec<MetricPoint>,
}

impl MetricSeries {
    pub fn new(mut points: Vec<MetricPoint>) -> Self {
        points.sort_by_key(|p| p.date);
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The most recent observation, if any
    pub fn latest(&self) -> Option<&MetricPoint> {
        self.points.last()
    }

    /// Every observation before the latest, oldest first
    pub fn history(&self) -> &[MetricPoint] {
        match self.points.len() {
            0 => &[],
            n => &self.points[..n - 1],
        }
    }

    /// All observation values, oldest first
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }
}

/// Alert severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// Detection method that produced an anomaly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    ZScore,
    DowBaseline,
}

impl std::fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectionMethod::ZScore => write!(f, "z_score"),
            DetectionMethod::DowBaseline => write!(f, "dow_baseline"),
        }
    }
}

/// Time granularity of a monitored metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grain {
    Daily,
    Weekly,
    Monthly,
}

impl std::fmt::Display for Grain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Grain::Daily => write!(f, "daily"),
            Grain::Weekly => write!(f, "weekly"),
            Grain::Monthly => write!(f, "monthly"),
        }
    }
}

/// Result of one detection method firing against the latest observation
///
/// Transient; the pipeline maps it into an [`Alert`] before persistence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyResult {
    pub date: NaiveDate,
    pub method: DetectionMethod,
    pub actual: f64,
    pub expected: f64,
    pub deviation_pct: f64,
    pub score: f64,
    pub severity: Severity,
    pub explanation: String,
}

/// An anomaly joined with its rule context, awaiting identity assignment
#[derive(Debug, Clone)]
pub struct StagedAlert {
    pub metric_name: String,
    pub grain: Grain,
    pub result: AnomalyResult,
}

impl StagedAlert {
    /// Correlation identity within a run
    ///
    /// The method is part of the key so two methods firing for the same
    /// metric and date stay distinguishable.
    pub fn key(&self) -> (String, NaiveDate, DetectionMethod) {
        (self.metric_name.clone(), self.result.date, self.result.method)
    }

    /// Freeze into an immutable alert once an ID is assigned
    pub fn into_alert(self, alert_id: Uuid) -> Alert {
        Alert {
            alert_id,
            metric_name: self.metric_name,
            grain: self.grain,
            metric_value: self.result.actual,
            expected_value: self.result.expected,
            deviation_pct: self.result.deviation_pct,
            severity: self.result.severity,
            method: self.result.method,
            explanation: self.result.explanation,
            alert_date: self.result.date,
        }
    }
}

/// A confirmed anomaly with identity, ready for persistence
///
/// Immutable after the ID is assigned; persisted once, never updated.
#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub alert_id: Uuid,
    pub metric_name: String,
    pub grain: Grain,
    pub metric_value: f64,
    pub expected_value: f64,
    pub deviation_pct: f64,
    pub severity: Severity,
    pub method: DetectionMethod,
    pub explanation: String,
    pub alert_date: NaiveDate,
}

/// A dimension segment identified as a significant contributor to an alert
#[derive(Debug, Clone, Serialize)]
pub struct Driver {
    pub alert_id: Uuid,
    pub dimension: String,
    pub segment_value: String,
    pub baseline_value: f64,
    pub current_value: f64,
    pub delta: f64,
    /// Share of the alert's total gap explained by this segment alone;
    /// not normalized across drivers and may exceed 1
    pub contribution_pct: f64,
    /// 1-based position within this dimension's kept drivers
    pub rank: u32,
}
