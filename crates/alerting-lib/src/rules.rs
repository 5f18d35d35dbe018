//! Alert rule configuration
//!
//! Rules are an ordered list of metrics with the detection methods to run
//! against each. Loading validates everything up front: evaluating against
//! a partially-broken rule set is unsafe, so any problem is fatal before
//! the pipeline touches the warehouse.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::detector::MethodSpec;
use crate::models::Grain;
use crate::store::is_safe_identifier;

/// Fatal problems with the rule configuration
#[derive(Debug, Error)]
pub enum RulesError {
    #[error("failed to read rules file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse rules: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("rule {index}: metric name is empty")]
    EmptyMetric { index: usize },
    #[error("rule {index}: metric {metric:?} is not a plain column identifier")]
    UnsafeMetric { index: usize, metric: String },
    #[error("rule {index}: no detection methods configured")]
    NoMethods { index: usize },
    #[error("rule {index}: method {method} configured more than once")]
    DuplicateMethod { index: usize, method: String },
}

/// One metric to monitor and how to score it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRule {
    pub metric: String,
    pub grain: Grain,
    pub methods: Vec<MethodSpec>,
}

#[derive(Debug, Deserialize)]
struct RawRuleSet {
    rules: Vec<AlertRule>,
}

/// Validated, ordered rule list
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<AlertRule>,
}

impl RuleSet {
    /// Validate and wrap an ordered rule list
    pub fn new(rules: Vec<AlertRule>) -> Result<Self, RulesError> {
        for (index, rule) in rules.iter().enumerate() {
            if rule.metric.trim().is_empty() {
                return Err(RulesError::EmptyMetric { index });
            }
            if !is_safe_identifier(&rule.metric) {
                return Err(RulesError::UnsafeMetric {
                    index,
                    metric: rule.metric.clone(),
                });
            }
            if rule.methods.is_empty() {
                return Err(RulesError::NoMethods { index });
            }
            let mut seen = HashSet::new();
            for spec in &rule.methods {
                if !seen.insert(spec.method()) {
                    return Err(RulesError::DuplicateMethod {
                        index,
                        method: spec.method().to_string(),
                    });
                }
            }
        }
        Ok(Self { rules })
    }

    /// Parse and validate rules from YAML text
    pub fn from_yaml(text: &str) -> Result<Self, RulesError> {
        let raw: RawRuleSet = serde_yaml::from_str(text)?;
        Self::new(raw.rules)
    }

    /// Load and validate rules from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RulesError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| RulesError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    pub fn rules(&self) -> &[AlertRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::{DEFAULT_LOOKBACK_WEEKS, DEFAULT_THRESHOLD_PCT};

    const VALID_RULES: &str = r"
rules:
  - metric: total_trips
    grain: daily
    methods:
      - name: z_score
        threshold: 3.0
      - name: dow_baseline
        threshold_pct: 0.2
  - metric: total_revenue
    grain: daily
    methods:
      - name: z_score
";

    #[test]
    fn test_valid_rules_parse_in_order() {
        let rules = RuleSet::from_yaml(VALID_RULES).unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules.rules()[0].metric, "total_trips");
        assert_eq!(rules.rules()[0].grain, Grain::Daily);
        assert_eq!(rules.rules()[1].metric, "total_revenue");
    }

    #[test]
    fn test_method_defaults_apply() {
        let rules = RuleSet::from_yaml(VALID_RULES).unwrap();
        let methods = &rules.rules()[0].methods;
        assert_eq!(
            methods[1],
            MethodSpec::DowBaseline {
                lookback_weeks: DEFAULT_LOOKBACK_WEEKS,
                threshold_pct: DEFAULT_THRESHOLD_PCT,
            }
        );
    }

    #[test]
    fn test_unknown_method_is_fatal() {
        let text = r"
rules:
  - metric: total_trips
    grain: daily
    methods:
      - name: prophet
";
        assert!(matches!(
            RuleSet::from_yaml(text),
            Err(RulesError::Parse(_))
        ));
    }

    #[test]
    fn test_empty_methods_fatal() {
        let text = r"
rules:
  - metric: total_trips
    grain: daily
    methods: []
";
        assert!(matches!(
            RuleSet::from_yaml(text),
            Err(RulesError::NoMethods { index: 0 })
        ));
    }

    #[test]
    fn test_unsafe_metric_fatal() {
        let text = r"
rules:
  - metric: total_trips; drop table kpi_alerts
    grain: daily
    methods:
      - name: z_score
";
        assert!(matches!(
            RuleSet::from_yaml(text),
            Err(RulesError::UnsafeMetric { index: 0, .. })
        ));
    }

    #[test]
    fn test_duplicate_method_fatal() {
        let text = r"
rules:
  - metric: total_trips
    grain: daily
    methods:
      - name: z_score
        threshold: 3.0
      - name: z_score
        threshold: 4.0
";
        assert!(matches!(
            RuleSet::from_yaml(text),
            Err(RulesError::DuplicateMethod { index: 0, .. })
        ));
    }
}
