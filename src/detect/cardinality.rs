//! Cardinality detector: estimated vs actual row counts on profiled plans.
//!
//! Only nodes that carry both numbers are compared, so plans from a plain
//! EXPLAIN (no execution) produce nothing.

use std::collections::HashSet;

use super::{checked_rows, human_rows, DetectionContext, PlanDetector};
use crate::error::DetectorError;
use crate::issue::{Issue, IssueType, Severity};

const NAME: &str = "cardinality";

/// Misestimate factor at which severity becomes high
const SEVERE_FACTOR: f64 = 100.0;

pub struct CardinalityDetector;

impl PlanDetector for CardinalityDetector {
    fn name(&self) -> &'static str {
        NAME
    }

    fn detect(&self, ctx: &DetectionContext<'_>) -> Result<Vec<Issue>, DetectorError> {
        let t = ctx.thresholds;
        let mut issues = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for node in ctx.root.iter() {
            let estimated = checked_rows(NAME, node, "estimated_rows", node.estimated_rows)?;
            let actual = checked_rows(NAME, node, "actual_rows", node.actual_rows)?;
            let (Some(estimated), Some(actual)) = (estimated, actual) else {
                continue;
            };
            if estimated.max(actual) < t.misestimate_min_rows {
                continue;
            }

            // Zero on either side counts as one row so the factor stays finite
            let factor = estimated.max(actual) / estimated.min(actual).max(1.0);
            if factor < t.misestimate_factor {
                continue;
            }

            let object = node.display_name().to_string();
            if !seen.insert(object.to_lowercase()) {
                continue;
            }

            let direction = if actual > estimated {
                "underestimated"
            } else {
                "overestimated"
            };
            let severity = if factor >= SEVERE_FACTOR {
                Severity::High
            } else {
                Severity::Medium
            };

            let mut issue = Issue::new(
                IssueType::WrongCardinality,
                severity,
                format!("Row count {} {:.0}x on {}", direction, factor, object),
                format!(
                    "{} was estimated at {} rows but produced {}. Plans chosen from a bad \
                     estimate (join order, join method, memory) are often far from optimal.",
                    node.node_label,
                    human_rows(estimated),
                    human_rows(actual)
                ),
                "Refresh statistics on the tables involved (ANALYZE)",
            );
            if node.filter_text.is_some() {
                issue = issue.with_recommendation(
                    "If the filter columns are correlated, create extended statistics on them",
                );
            }
            issues.push(
                issue
                    .with_recommendation(
                        "Raise the statistics target on skewed columns if estimates stay off",
                    )
                    .with_affected(object)
                    .with_metric("estimated_rows", estimated)
                    .with_metric("actual_rows", actual)
                    .with_metric("misestimate_factor", factor),
            );
        }

        tracing::debug!(detector = NAME, issues = issues.len(), "detector finished");
        Ok(issues)
    }
}
