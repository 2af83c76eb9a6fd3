//! Detectors: the pattern scanner over SQL text and the plan-based passes.
//!
//! Plan-based detectors each walk the same immutable tree independently.
//! They never share traversal state, so one detector's severity logic can
//! change without touching another's. A detector that trips over a malformed
//! sub-structure returns a [`DetectorError`]; the caller treats that as an
//! empty contribution and keeps going.

pub mod cardinality;
pub mod index;
pub mod io;
pub mod join;
pub mod orm;
pub mod pattern;
pub mod reporting;
pub mod statistics;

use chrono::{DateTime, Utc};

use crate::config::Thresholds;
use crate::error::DetectorError;
use crate::issue::Issue;
use crate::plan::NormalizedPlanNode;
use crate::stats::TableStats;

/// Everything a plan-based detector may look at for one analysis call.
#[derive(Debug, Clone, Copy)]
pub struct DetectionContext<'a> {
    pub root: &'a NormalizedPlanNode,
    pub sql: &'a str,
    pub stats: Option<&'a TableStats>,
    /// Other statements captured alongside `sql` (for N+1 detection)
    pub batch: &'a [String],
    pub thresholds: &'a Thresholds,
    /// Reference time for age calculations
    pub as_of: DateTime<Utc>,
}

/// A detector that consumes the normalized plan.
pub trait PlanDetector: Send + Sync {
    /// Short stable name used in logs and report warnings.
    fn name(&self) -> &'static str;

    fn detect(&self, ctx: &DetectionContext<'_>) -> Result<Vec<Issue>, DetectorError>;
}

/// All plan-based detectors, in report order.
pub fn plan_detectors() -> Vec<Box<dyn PlanDetector>> {
    vec![
        Box::new(index::IndexDetector),
        Box::new(join::JoinStrategyDetector),
        Box::new(io::IoWorkloadDetector),
        Box::new(reporting::ReportingShapeDetector),
        Box::new(orm::OrmShapeDetector),
        Box::new(statistics::StaleStatisticsDetector),
        Box::new(cardinality::CardinalityDetector),
    ]
}

/// Validate a row count read from a plan node.
///
/// Absent counts are fine (`Ok(None)`); negative or non-finite counts mean the
/// plan is inconsistent and the detector should bail out.
pub(crate) fn checked_rows(
    detector: &'static str,
    node: &NormalizedPlanNode,
    field: &str,
    value: Option<f64>,
) -> Result<Option<f64>, DetectorError> {
    match value {
        Some(v) if !v.is_finite() || v < 0.0 => Err(DetectorError::new(
            detector,
            format!("{} on '{}' is invalid: {}", field, node.node_label, v),
        )),
        other => Ok(other),
    }
}

/// Format a row count for titles ("~1.2M rows").
pub(crate) fn human_rows(rows: f64) -> String {
    if rows >= 1_000_000.0 {
        format!("{:.1}M", rows / 1_000_000.0)
    } else if rows >= 10_000.0 {
        format!("{:.0}k", rows / 1_000.0)
    } else {
        format!("{:.0}", rows)
    }
}
