//! Robust z-score detection
//!
//! Flags the latest observation when it sits too many robust standard
//! deviations from the series median. Median/MAD standardization keeps the
//! baseline stable even when the history itself contains outliers.

use crate::models::{AnomalyResult, DetectionMethod, MetricSeries, Severity};

/// Minimum series length for a meaningful z-score
const MIN_POINTS: usize = 5;

/// MAD-to-sigma scale factor under a normal-distribution assumption
const MAD_SCALE: f64 = 1.4826;

/// Default number of robust standard deviations to flag
pub const DEFAULT_THRESHOLD: f64 = 3.0;

/// Evaluate the robust z-score method against the latest observation
///
/// Returns `None` when the series is too short to judge, or when the latest
/// value is within the threshold.
pub(super) fn check_zscore(series: &MetricSeries, threshold: f64) -> Option<AnomalyResult> {
    if series.len() < MIN_POINTS {
        return None;
    }
    let latest = series.latest()?;

    let values = series.values();
    let med = median(&values);
    let mad = scaled_mad(&values, med);

    let deviation_pct = if med != 0.0 {
        (latest.value - med) / med
    } else {
        0.0
    };

    if mad == 0.0 {
        // Constant history: any departure from the median is a hard anomaly.
        if latest.value != med {
            return Some(AnomalyResult {
                date: latest.date,
                method: DetectionMethod::ZScore,
                actual: latest.value,
                expected: med,
                deviation_pct,
                score: f64::INFINITY,
                severity: Severity::Critical,
                explanation: format!(
                    "Value {:.2} differs from constant baseline {:.2}",
                    latest.value, med
                ),
            });
        }
        return None;
    }

    let z = (latest.value - med) / mad;
    if z.abs() <= threshold {
        return None;
    }

    let severity = if z.abs() > threshold * 1.5 {
        Severity::Critical
    } else {
        Severity::Warning
    };

    Some(AnomalyResult {
        date: latest.date,
        method: DetectionMethod::ZScore,
        actual: latest.value,
        expected: med,
        deviation_pct,
        score: z,
        severity,
        explanation: format!(
            "Value {:.2} is {:.2} sigma from median {:.2}",
            latest.value, z, med
        ),
    })
}

/// Median of a sample (mean of the middle pair for even lengths)
fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

/// Median absolute deviation scaled to approximate a standard deviation
fn scaled_mad(values: &[f64], med: f64) -> f64 {
    let deviations: Vec<f64> = values.iter().map(|v| (v - med).abs()).collect();
    median(&deviations) * MAD_SCALE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MetricPoint;
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
    fn test_stable_series_never_fires() {
        let series = daily_series(&[100.0; 30]);
        assert!(check_zscore(&series, 3.0).is_none());
        assert!(check_zscore(&series, 0.5).is_none());
    }

    #[test]
    fn test_spike_fires_critical() {
        let mut values = vec![100.0; 29];
        values.push(1000.0);
        let series = daily_series(&values);

        let result = check_zscore(&series, 3.0).unwrap();
        assert_eq!(result.method, DetectionMethod::ZScore);
        assert_eq!(result.actual, 1000.0);
        assert_eq!(result.expected, 100.0);
        assert_eq!(result.severity, Severity::Critical);
        assert!(result.score > 3.0);
        assert!(result.score.is_infinite());
        assert!((result.deviation_pct - 9.0).abs() < 1e-9);
    }

    #[test]
    fn test_short_series_no_result() {
        let series = daily_series(&[1.0, 500.0, 2.0, 900.0]);
        assert!(check_zscore(&series, 3.0).is_none());
    }

    #[test]
    fn test_moderate_deviation_is_warning() {
        // Median 100, scaled MAD 14.826; 150 lands at z ~= 3.37, between the
        // threshold and the 1.5x critical cutoff.
        let values = [90.0, 110.0, 90.0, 110.0, 90.0, 110.0, 90.0, 110.0, 90.0, 150.0];
        let series = daily_series(&values);

        let result = check_zscore(&series, 3.0).unwrap();
        assert_eq!(result.severity, Severity::Warning);
        assert!(result.score > 3.0 && result.score < 4.5);
        assert!((result.deviation_pct - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_negative_spike_fires() {
        // Median 90, scaled MAD 14.826; 40 lands at z ~= -3.37.
        let values = [90.0, 110.0, 90.0, 110.0, 90.0, 110.0, 90.0, 110.0, 90.0, 40.0];
        let series = daily_series(&values);

        let result = check_zscore(&series, 3.0).unwrap();
        assert!(result.score < -3.0);
    }

    #[test]
    fn test_unsorted_input_matches_sorted() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut values = vec![100.0; 29];
        values.push(1000.0);

        let mut shuffled: Vec<MetricPoint> = values
            .iter()
            .enumerate()
            .map(|(i, v)| MetricPoint {
                date: start + Days::new(i as u64),
                value: *v,
            })
            .collect();
        shuffled.reverse();
        shuffled.swap(3, 17);

        let sorted = daily_series(&values);
        let from_shuffled = MetricSeries::new(shuffled);

        assert_eq!(
            check_zscore(&sorted, 3.0),
            check_zscore(&from_shuffled, 3.0)
        );
    }
}
