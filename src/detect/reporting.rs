//! Reporting-shape detector: analytic queries that should be paginated or
//! materialized.

use regex::Regex;
use std::sync::LazyLock;

use super::{DetectionContext, PlanDetector};
use crate::error::DetectorError;
use crate::issue::{Issue, IssueType, Severity};
use crate::sql;

const NAME: &str = "reporting";

static WINDOW_FUNCTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\)\s*over\s*(?:\(|[a-z_]\w*)").expect("valid regex"));
static AGGREGATE_FUNCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:count|sum|avg|min|max|stddev(?:_pop|_samp)?|variance|var_pop|var_samp|array_agg|string_agg|jsonb?_agg|bool_and|bool_or|listagg|group_concat|median|percentile_cont|percentile_disc)\s*\(",
    )
    .expect("valid regex")
});
static GROUP_BY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bgroup\s+by\b").expect("valid regex"));
static ROW_LIMIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\blimit\s+\S|\bfetch\s+(?:first|next)\b|\brownum\b|\btop\s*\(?\s*\d")
        .expect("valid regex")
});

pub struct ReportingShapeDetector;

impl PlanDetector for ReportingShapeDetector {
    fn name(&self) -> &'static str {
        NAME
    }

    fn detect(&self, ctx: &DetectionContext<'_>) -> Result<Vec<Issue>, DetectorError> {
        let t = ctx.thresholds;
        let text = sql::scannable(ctx.sql);
        let mut issues = Vec::new();

        let windows = WINDOW_FUNCTION.find_iter(&text).count();
        if windows > t.max_window_functions {
            issues.push(
                Issue::new(
                    IssueType::InefficientReporting,
                    Severity::Medium,
                    format!("{} window functions in one query", windows),
                    format!(
                        "Each window function may need its own sort over the full input. \
                         {} of them make this query expensive to run on demand.",
                        windows
                    ),
                    "Precompute the windowed values in a materialized view refreshed on a schedule",
                )
                .with_recommendation("Share one WINDOW definition where partitions and orderings match")
                .with_metric("window_functions", windows),
            );
        }

        let aggregates = AGGREGATE_FUNCTION.find_iter(&text).count();
        if aggregates > t.max_aggregates {
            issues.push(
                Issue::new(
                    IssueType::InefficientReporting,
                    Severity::Low,
                    format!("{} aggregate expressions in one query", aggregates),
                    format!(
                        "The query computes {} aggregates. Heavy aggregation over live tables \
                         competes with transactional load.",
                        aggregates
                    ),
                    "Serve this report from a summary table or materialized view",
                )
                .with_metric("aggregates", aggregates),
            );
        }

        if GROUP_BY.is_match(&text) && !ROW_LIMIT.is_match(&text) {
            issues.push(
                Issue::new(
                    IssueType::InefficientReporting,
                    Severity::Low,
                    "GROUP BY without LIMIT",
                    "The grouped result is unbounded. Every group is computed and returned \
                     even if the caller shows only the first page.",
                    "Add LIMIT (with ORDER BY) and paginate the grouped result",
                ),
            );
        }

        tracing::debug!(detector = NAME, issues = issues.len(), "detector finished");
        Ok(issues)
    }
}
