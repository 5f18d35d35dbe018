//! Dimension definitions for root-cause attribution
//!
//! Each definition names the warehouse tables and columns used to break an
//! aggregate metric down by segment. Identifiers live here, in
//! configuration, and nowhere else; query builders reject anything that
//! does not pass the allow-list check before splicing it into SQL.

use serde::{Deserialize, Serialize};

/// Metric family, used to pick the breakdown column for an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricFamily {
    Trips,
    Revenue,
}

impl MetricFamily {
    /// Infer the family from a metric name
    pub fn of(metric_name: &str) -> Self {
        if metric_name.contains("trips") {
            MetricFamily::Trips
        } else {
            MetricFamily::Revenue
        }
    }
}

/// Lookup table mapping segment keys to display names
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentLookup {
    pub table: String,
    pub key_column: String,
    pub name_column: String,
}

/// One dimension along which an aggregate metric can be broken down
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionSpec {
    /// Dimension name reported on drivers (e.g. "zone")
    pub dimension: String,
    /// Breakdown table holding per-segment daily values
    pub table: String,
    /// Column identifying the segment within the breakdown table
    pub segment_column: String,
    /// Column holding trip-count metrics
    pub trips_column: String,
    /// Column holding revenue metrics
    pub revenue_column: String,
    /// Optional lookup for human-readable segment names
    pub lookup: Option<SegmentLookup>,
}

impl DimensionSpec {
    /// Breakdown column for the given metric family
    pub fn metric_column(&self, family: MetricFamily) -> &str {
        match family {
            MetricFamily::Trips => &self.trips_column,
            MetricFamily::Revenue => &self.revenue_column,
        }
    }

    /// Every identifier this dimension contributes to query text
    pub fn identifiers(&self) -> Vec<&str> {
        let mut ids = vec![
            self.table.as_str(),
            self.segment_column.as_str(),
            self.trips_column.as_str(),
            self.revenue_column.as_str(),
        ];
        if let Some(lookup) = &self.lookup {
            ids.push(lookup.table.as_str());
            ids.push(lookup.key_column.as_str());
            ids.push(lookup.name_column.as_str());
        }
        ids
    }

    /// The zone and payment-type dimensions of the reference warehouse
    pub fn standard() -> Vec<DimensionSpec> {
        vec![
            DimensionSpec {
                dimension: "zone".to_string(),
                table: "mart_kpis_by_zone_daily".to_string(),
                segment_column: "pickup_location_id".to_string(),
                trips_column: "total_trips".to_string(),
                revenue_column: "total_revenue".to_string(),
                lookup: Some(SegmentLookup {
                    table: "dim_taxi_zone".to_string(),
                    key_column: "location_id".to_string(),
                    name_column: "zone".to_string(),
                }),
            },
            DimensionSpec {
                dimension: "payment_type".to_string(),
                table: "mart_kpis_by_payment_daily".to_string(),
                segment_column: "payment_type".to_string(),
                trips_column: "total_trips".to_string(),
                revenue_column: "total_revenue".to_string(),
                lookup: None,
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::is_safe_identifier;

    #[test]
    fn test_family_inferred_from_metric_name() {
        assert_eq!(MetricFamily::of("total_trips"), MetricFamily::Trips);
        assert_eq!(MetricFamily::of("avg_trips_per_day"), MetricFamily::Trips);
        assert_eq!(MetricFamily::of("total_revenue"), MetricFamily::Revenue);
        assert_eq!(MetricFamily::of("avg_fare"), MetricFamily::Revenue);
    }

    #[test]
    fn test_metric_column_selection() {
        let dims = DimensionSpec::standard();
        assert_eq!(dims[0].metric_column(MetricFamily::Trips), "total_trips");
        assert_eq!(
            dims[0].metric_column(MetricFamily::Revenue),
            "total_revenue"
        );
    }

    #[test]
    fn test_standard_dimensions_pass_allow_list() {
        for dim in DimensionSpec::standard() {
            for id in dim.identifiers() {
                assert!(is_safe_identifier(id), "identifier {id:?} not safe");
            }
        }
    }
}
