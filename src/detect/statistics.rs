//! Stale-statistics detector.
//!
//! The planner's row estimates are only as good as the last ANALYZE. For
//! every table the plan scans that has a stats entry, flag tables never
//! analyzed or analyzed too long ago. Without stats this detector is silent.

use std::collections::HashSet;

use super::{DetectionContext, PlanDetector};
use crate::error::DetectorError;
use crate::issue::{Issue, IssueType, Severity};
use crate::sql;

const NAME: &str = "statistics";

pub struct StaleStatisticsDetector;

impl PlanDetector for StaleStatisticsDetector {
    fn name(&self) -> &'static str {
        NAME
    }

    fn detect(&self, ctx: &DetectionContext<'_>) -> Result<Vec<Issue>, DetectorError> {
        let Some(stats) = ctx.stats else {
            return Ok(Vec::new());
        };
        let t = ctx.thresholds;
        let mut issues = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        let relations = ctx
            .root
            .iter()
            .filter(|n| n.operation.is_scan())
            .filter_map(|n| n.relation_name.as_deref());

        for relation in relations {
            if !seen.insert(relation.to_lowercase()) {
                continue;
            }
            let Some(stat) = stats.get(relation) else {
                continue;
            };

            let days = stat
                .last_analyzed()
                .map(|at| (ctx.as_of - at).num_seconds().max(0) as f64 / 86_400.0);
            let severity = match days {
                None => Severity::High,
                Some(d) if d >= t.stats_critical_days => Severity::High,
                Some(d) if d >= t.stats_warning_days => Severity::Medium,
                Some(_) => continue,
            };

            let description = match days {
                None => format!(
                    "{} has never been analyzed. The planner is estimating row counts \
                     without any statistics.",
                    relation
                ),
                Some(_) => format!(
                    "{} was last analyzed {} ago. Row estimates may no longer match the data.",
                    relation,
                    format_days(days)
                ),
            };

            let mut issue = Issue::new(
                IssueType::StaleStatistics,
                severity,
                format!("Stale statistics on {}", relation),
                description,
                format!("ANALYZE {};", quote_qualified(relation)),
            )
            .with_recommendation("Check that autovacuum is keeping up with writes to this table")
            .with_affected(relation)
            .with_metric("days_since_analyze", format_days(days));
            if let Some(d) = days {
                issue = issue.with_metric("age_days", d);
            }
            issues.push(issue);
        }

        tracing::debug!(detector = NAME, issues = issues.len(), "detector finished");
        Ok(issues)
    }
}

fn quote_qualified(name: &str) -> String {
    name.split('.')
        .map(sql::quote_ident)
        .collect::<Vec<_>>()
        .join(".")
}

/// Format days for display
fn format_days(days: Option<f64>) -> String {
    match days {
        None => "never".to_string(),
        Some(d) if d < 1.0 => format!("{:.0} hours", d * 24.0),
        Some(d) if d < 7.0 => format!("{:.1} days", d),
        Some(d) => format!("{:.0} days", d),
    }
}
