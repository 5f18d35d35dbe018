//! Core library for KPI anomaly alerting
//!
//! This crate provides the decision logic of the alerting system:
//! - Anomaly scoring over daily metric series (robust z-score and
//!   day-of-week baseline methods)
//! - Root-cause attribution of confirmed anomalies to dimension segments
//! - The alert pipeline coordinating scoring, persistence, and attribution
//! - Warehouse access contracts and their Postgres implementation

pub mod attribution;
pub mod detector;
pub mod models;
pub mod observability;
pub mod pipeline;
pub mod rules;
pub mod store;

pub use models::*;
pub use observability::PipelineMetrics;
pub use pipeline::{AlertPipeline, PipelineConfig, RunSummary};
pub use rules::{AlertRule, RuleSet, RulesError};
