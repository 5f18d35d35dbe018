//! Root-cause attribution for confirmed anomalies
//!
//! Given a persisted alert, queries per-dimension breakdowns and ranks the
//! segments whose movement best explains the aggregate deviation.

mod dimension;
mod engine;

pub use dimension::{DimensionSpec, MetricFamily, SegmentLookup};
pub use engine::{rank_segments, AttributionConfig, AttributionEngine, SegmentDelta};
