//! Anomaly scoring for daily metric series
//!
//! This module evaluates detection methods against the most recent
//! observation of a metric:
//! - `z_score`: robust deviation from the series median (MAD-based)
//! - `dow_baseline`: deviation from the same-weekday average of recent weeks
//!
//! A method that cannot be evaluated (insufficient or degenerate history)
//! yields no result rather than an error.

mod dow_baseline;
mod zscore;

pub use dow_baseline::{DEFAULT_LOOKBACK_WEEKS, DEFAULT_THRESHOLD_PCT};
pub use zscore::DEFAULT_THRESHOLD;

use serde::{Deserialize, Serialize};

use crate::models::{AnomalyResult, DetectionMethod, MetricSeries};

/// A detection method with its tuning parameters
///
/// Deserializes directly from the rules file, e.g.
/// `{ name: z_score, threshold: 3.0 }`. Adding a method means adding a
/// variant here and handling it in [`AnomalyDetector::evaluate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum MethodSpec {
    ZScore {
        #[serde(default = "default_threshold")]
        threshold: f64,
    },
    DowBaseline {
        #[serde(default = "default_lookback_weeks")]
        lookback_weeks: usize,
        #[serde(default = "default_threshold_pct")]
        threshold_pct: f64,
    },
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

fn default_lookback_weeks() -> usize {
    DEFAULT_LOOKBACK_WEEKS
}

fn default_threshold_pct() -> f64 {
    DEFAULT_THRESHOLD_PCT
}

impl MethodSpec {
    /// The detection method this spec configures
    pub fn method(&self) -> DetectionMethod {
        match self {
            MethodSpec::ZScore { .. } => DetectionMethod::ZScore,
            MethodSpec::DowBaseline { .. } => DetectionMethod::DowBaseline,
        }
    }
}

/// Scores a metric history against configured detection methods
pub struct AnomalyDetector {
    series: MetricSeries,
}

impl AnomalyDetector {
    /// Build a detector over the given history
    ///
    /// [`MetricSeries::new`] sorts by date, so callers may pass warehouse
    /// rows in any order.
    pub fn new(series: MetricSeries) -> Self {
        Self { series }
    }

    /// Evaluate `methods` in order, returning the results that fired
    ///
    /// Output order matches the method order; methods that do not fire are
    /// omitted.
    pub fn score(&self, methods: &[MethodSpec]) -> Vec<AnomalyResult> {
        methods.iter().filter_map(|m| self.evaluate(m)).collect()
    }

    /// Evaluate a single method against the latest observation
    pub fn evaluate(&self, method: &MethodSpec) -> Option<AnomalyResult> {
        match method {
            MethodSpec::ZScore { threshold } => zscore::check_zscore(&self.series, *threshold),
            MethodSpec::DowBaseline {
                lookback_weeks,
                threshold_pct,
            } => dow_baseline::check_dow_baseline(&self.series, *lookback_weeks, *threshold_pct),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MetricPoint, Severity};
    use chrono::{Days, NaiveDate};

    fn daily_series(values: &[f64]) -> MetricSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        MetricSeries::new(
            values
                .iter()
                .enumerate()
                .map(|(i, v)| MetricPoint {
                    date: start + Days::new(i as u64),
                    value: *v,
                })
                .collect(),
        )
    }

    #[test]
    fn test_method_spec_parses_with_defaults() {
        let spec: MethodSpec = serde_json::from_str(r#"{"name": "z_score"}"#).unwrap();
        assert_eq!(
            spec,
            MethodSpec::ZScore {
                threshold: DEFAULT_THRESHOLD
            }
        );

        let spec: MethodSpec = serde_json::from_str(r#"{"name": "dow_baseline"}"#).unwrap();
        assert_eq!(
            spec,
            MethodSpec::DowBaseline {
                lookback_weeks: DEFAULT_LOOKBACK_WEEKS,
                threshold_pct: DEFAULT_THRESHOLD_PCT,
            }
        );
    }

    #[test]
    fn test_unknown_method_rejected() {
        let result: Result<MethodSpec, _> = serde_json::from_str(r#"{"name": "holt_winters"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_score_order_matches_method_order() {
        // Mostly 10 with occasional 100s keeps the MAD at zero, so the
        // degenerate z-score branch fires, and the latest Monday is far from
        // the Monday average, so dow_baseline fires too.
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(); // a Monday
        let mut points = Vec::new();
        for i in 0..29u64 {
            let date = start + Days::new(i);
            let value = if i % 7 == 0 { 100.0 } else { 10.0 };
            points.push(MetricPoint { date, value });
        }
        points.last_mut().unwrap().value = 50.0; // latest Monday dips

        let detector = AnomalyDetector::new(MetricSeries::new(points));
        let methods = vec![
            MethodSpec::ZScore { threshold: 3.0 },
            MethodSpec::DowBaseline {
                lookback_weeks: 4,
                threshold_pct: 0.2,
            },
        ];

        let results = detector.score(&methods);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].method, crate::models::DetectionMethod::ZScore);
        assert_eq!(
            results[1].method,
            crate::models::DetectionMethod::DowBaseline
        );
        assert_eq!(results[1].severity, Severity::Critical);
    }

    #[test]
    fn test_scoring_is_idempotent() {
        let mut values = vec![100.0; 29];
        values.push(1000.0);
        let detector = AnomalyDetector::new(daily_series(&values));
        let methods = vec![MethodSpec::ZScore { threshold: 3.0 }];

        let first = detector.score(&methods);
        let second = detector.score(&methods);
        assert_eq!(first, second);
    }
}
