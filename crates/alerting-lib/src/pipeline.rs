//! Alert pipeline coordination
//!
//! Drives one evaluation run: score each configured metric's history,
//! persist confirmed alerts, attribute each alert to its dimension drivers,
//! persist the drivers. A single metric's failure never aborts the run;
//! only configuration and store-connectivity problems do.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tracing::{info, warn};
use uuid::Uuid;

use crate::attribution::{AttributionConfig, AttributionEngine};
use crate::detector::AnomalyDetector;
use crate::models::{Alert, AnomalyResult, MetricSeries, StagedAlert};
use crate::observability::PipelineMetrics;
use crate::rules::{AlertRule, RuleSet};
use crate::store::{AlertStore, BreakdownSource, DriverStore, MetricHistorySource};

/// Minimum history rows before a metric is worth scoring
const MIN_HISTORY_ROWS: usize = 5;

/// Tuning for one pipeline run
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Days of daily history fetched per metric
    pub lookback_days: u32,
    /// Attribution tuning (baseline window, noise floor, top-k, dimensions)
    pub attribution: AttributionConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            lookback_days: 60,
            attribution: AttributionConfig::default(),
        }
    }
}

/// Outcome of one pipeline run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub rules_evaluated: usize,
    pub metrics_skipped: usize,
    pub alerts_written: usize,
    pub drivers_written: usize,
}

/// Coordinates scoring, persistence, and attribution for a rule set
pub struct AlertPipeline {
    history: Arc<dyn MetricHistorySource>,
    alerts: Arc<dyn AlertStore>,
    drivers: Arc<dyn DriverStore>,
    attribution: AttributionEngine,
    config: PipelineConfig,
    metrics: PipelineMetrics,
}

impl AlertPipeline {
    pub fn new(
        history: Arc<dyn MetricHistorySource>,
        breakdowns: Arc<dyn BreakdownSource>,
        alerts: Arc<dyn AlertStore>,
        drivers: Arc<dyn DriverStore>,
        config: PipelineConfig,
    ) -> Self {
        let attribution = AttributionEngine::new(breakdowns, config.attribution.clone());
        Self {
            history,
            alerts,
            drivers,
            attribution,
            config,
            metrics: PipelineMetrics::new(),
        }
    }

    /// Execute one run over the given rules
    ///
    /// Rules are evaluated in order. Zero anomalies means zero writes and a
    /// successful run. All alerts are durable before any driver referencing
    /// them is written.
    pub async fn run(&self, rules: &RuleSet) -> Result<RunSummary> {
        let start = Instant::now();
        let mut summary = RunSummary::default();
        let mut staged: Vec<StagedAlert> = Vec::new();
        let mut seen = HashSet::new();

        for rule in rules.rules() {
            summary.rules_evaluated += 1;
            self.metrics.inc_rules_evaluated();

            let results = match self.evaluate_rule(rule).await {
                Ok(Some(results)) => results,
                Ok(None) => {
                    summary.metrics_skipped += 1;
                    continue;
                }
                Err(e) => {
                    summary.metrics_skipped += 1;
                    self.metrics.inc_query_errors();
                    warn!(metric = %rule.metric, error = %e, "Skipping metric");
                    continue;
                }
            };

            for result in results {
                let candidate = StagedAlert {
                    metric_name: rule.metric.clone(),
                    grain: rule.grain,
                    result,
                };
                if !seen.insert(candidate.key()) {
                    warn!(
                        metric = %candidate.metric_name,
                        date = %candidate.result.date,
                        method = %candidate.result.method,
                        "Duplicate staged alert skipped"
                    );
                    continue;
                }
                info!(
                    metric = %candidate.metric_name,
                    severity = %candidate.result.severity,
                    explanation = %candidate.result.explanation,
                    "Anomaly detected"
                );
                self.metrics.inc_anomalies_detected();
                staged.push(candidate);
            }
        }

        if staged.is_empty() {
            info!("No anomalies detected");
            self.metrics.observe_run_latency(start.elapsed().as_secs_f64());
            return Ok(summary);
        }

        // Identity is assigned here, before persistence, so attribution
        // never has to read IDs back from the store.
        let alerts: Vec<Alert> = staged
            .into_iter()
            .map(|s| s.into_alert(Uuid::new_v4()))
            .collect();

        self.alerts.insert_alerts(&alerts).await?;
        summary.alerts_written = alerts.len();
        self.metrics.add_alerts_written(alerts.len() as u64);
        info!(count = alerts.len(), "Alerts persisted");

        let mut drivers = Vec::new();
        for alert in &alerts {
            let mut found = self.attribution.attribute(alert).await;
            drivers.append(&mut found);
        }

        if !drivers.is_empty() {
            self.drivers.insert_drivers(&drivers).await?;
            summary.drivers_written = drivers.len();
            self.metrics.add_drivers_written(drivers.len() as u64);
            info!(count = drivers.len(), "Drivers persisted");
        }

        self.metrics.observe_run_latency(start.elapsed().as_secs_f64());
        Ok(summary)
    }

    /// Fetch and score one rule's metric
    ///
    /// `Ok(None)` means the metric had too little history to evaluate.
    async fn evaluate_rule(&self, rule: &AlertRule) -> Result<Option<Vec<AnomalyResult>>> {
        let points = self
            .history
            .fetch_daily(&rule.metric, self.config.lookback_days)
            .await?;

        if points.len() < MIN_HISTORY_ROWS {
            info!(metric = %rule.metric, rows = points.len(), "Not enough history");
            return Ok(None);
        }

        let detector = AnomalyDetector::new(MetricSeries::new(points));
        Ok(Some(detector.score(&rule.methods)))
    }
}
