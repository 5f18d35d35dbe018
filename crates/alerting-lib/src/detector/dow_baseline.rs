//! Day-of-week baseline detection
//!
//! Compares the latest observation to the average of the same weekday over
//! recent prior weeks, catching weekly-seasonal metrics that a global
//! z-score would smooth over.

use crate::models::{AnomalyResult, DetectionMethod, MetricPoint, MetricSeries, Severity};
use chrono::Datelike;

/// Minimum same-weekday history points required
const MIN_MATCHES: usize = 2;

/// Default number of prior same-weekday observations to average
pub const DEFAULT_LOOKBACK_WEEKS: usize = 4;

/// Default relative deviation to flag
pub const DEFAULT_THRESHOLD_PCT: f64 = 0.20;

/// Evaluate the day-of-week baseline method against the latest observation
///
/// The latest point is excluded from its own baseline. A zero baseline means
/// the method cannot evaluate, not that the metric is anomalous.
pub(super) fn check_dow_baseline(
    series: &MetricSeries,
    lookback_weeks: usize,
    threshold_pct: f64,
) -> Option<AnomalyResult> {
    let latest = series.latest()?;
    let latest_dow = latest.date.weekday();

    let matches: Vec<&MetricPoint> = series
        .history()
        .iter()
        .filter(|p| p.date.weekday() == latest_dow)
        .collect();

    // Most recent `lookback_weeks` occurrences; fewer is fine as long as
    // there are at least two.
    let window = if matches.len() > lookback_weeks {
        &matches[matches.len() - lookback_weeks..]
    } else {
        &matches[..]
    };

    if window.len() < MIN_MATCHES {
        return None;
    }

    let baseline = window.iter().map(|p| p.value).sum::<f64>() / window.len() as f64;
    if baseline == 0.0 {
        return None;
    }

    let diff_pct = (latest.value - baseline) / baseline;
    if diff_pct.abs() <= threshold_pct {
        return None;
    }

    let severity = if diff_pct.abs() > threshold_pct * 2.0 {
        Severity::Critical
    } else {
        Severity::Warning
    };

    Some(AnomalyResult {
        date: latest.date,
        method: DetectionMethod::DowBaseline,
        actual: latest.value,
        expected: baseline,
        deviation_pct: diff_pct,
        score: diff_pct,
        severity,
        explanation: format!(
            "Value {:.2} is {:.0}% from {}-week avg {:.2}",
            latest.value,
            diff_pct * 100.0,
            lookback_weeks,
            baseline
        ),
    })
}
