//! Index detector: scans that should be index lookups, and index lookups
//! that match too much of their table to pay off.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

use super::{checked_rows, human_rows, DetectionContext, PlanDetector};
use crate::error::DetectorError;
use crate::issue::{Issue, IssueType, Severity};
use crate::plan::{NormalizedPlanNode, Operation};
use crate::sql;

const NAME: &str = "index";

/// Columns named in one filter before the index suggestion stops growing
const MAX_INDEX_COLUMNS: usize = 3;

static FILTER_COLUMN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)([a-z_"][\w$."]*)(?:::[a-z_ ]+?)?\s*(?:=|<>|!=|<=|>=|<|>|!?~~\*?|\bis\b|\b(?:not\s+)?(?:like|ilike|in|between)\b)"#,
    )
    .expect("valid regex")
});

pub struct IndexDetector;

impl PlanDetector for IndexDetector {
    fn name(&self) -> &'static str {
        NAME
    }

    fn detect(&self, ctx: &DetectionContext<'_>) -> Result<Vec<Issue>, DetectorError> {
        let mut issues = Vec::new();
        let mut seen: HashSet<(IssueType, String)> = HashSet::new();

        for node in ctx.root.iter() {
            let issue = match node.operation {
                // Bitmap access through a named index already uses one
                Operation::BitmapScan if node.iter().any(|n| n.index_name.is_some()) => None,
                Operation::SequentialScan | Operation::BitmapScan => scan_issue(ctx, node)?,
                Operation::IndexScan => selectivity_issue(ctx, node)?,
                _ => None,
            };
            if let Some(issue) = issue {
                let key = (issue.issue_type(), node.display_name().to_lowercase());
                if seen.insert(key) {
                    issues.push(issue);
                }
            }
        }

        tracing::debug!(detector = NAME, issues = issues.len(), "detector finished");
        Ok(issues)
    }
}

/// Row count for a scan: the plan's estimate, else the table size from stats.
fn scan_rows(
    ctx: &DetectionContext<'_>,
    node: &NormalizedPlanNode,
) -> Result<Option<(f64, &'static str)>, DetectorError> {
    if let Some(rows) = checked_rows(NAME, node, "estimated_rows", node.estimated_rows)? {
        return Ok(Some((rows, "plan")));
    }
    let from_stats = node
        .relation_name
        .as_deref()
        .and_then(|rel| ctx.stats.and_then(|s| s.row_count(rel)));
    Ok(from_stats.map(|rows| (rows as f64, "stats")))
}

fn scan_issue(
    ctx: &DetectionContext<'_>,
    node: &NormalizedPlanNode,
) -> Result<Option<Issue>, DetectorError> {
    let t = ctx.thresholds;
    let Some((rows, source)) = scan_rows(ctx, node)? else {
        return Ok(None);
    };
    if rows <= t.large_table_rows {
        return Ok(None);
    }
    let relation = node.display_name();

    match node.filter_text.as_deref() {
        Some(filter) => {
            let columns = filter_columns(filter);
            let severity = if rows >= t.high_severity_rows {
                Severity::High
            } else {
                Severity::Medium
            };
            let title = if columns.is_empty() {
                format!("Missing index on {}", relation)
            } else {
                format!("Missing index on {} ({})", relation, columns.join(", "))
            };
            let recommendation = match node.relation_name.as_deref() {
                Some(table) if !columns.is_empty() => create_index_sql(table, &columns),
                _ => format!(
                    "Index the columns compared in the filter on {}: {}",
                    relation, filter
                ),
            };

            Ok(Some(
                Issue::new(
                    IssueType::MissingIndex,
                    severity,
                    title,
                    format!(
                        "{} reads ~{} rows and discards those failing `{}`. An index on \
                         the filtered columns would let the engine fetch only matching rows.",
                        node.node_label,
                        human_rows(rows),
                        filter
                    ),
                    recommendation,
                )
                .with_affected(relation)
                .with_affected_all(columns)
                .with_metric("estimated_rows", rows)
                .with_metric("row_source", source)
                .with_metric("filter", filter),
            ))
        }
        None if node.operation == Operation::SequentialScan => {
            let severity = if rows >= t.high_severity_rows {
                Severity::Medium
            } else {
                Severity::Low
            };
            Ok(Some(
                Issue::new(
                    IssueType::FullTableScan,
                    severity,
                    format!("Full table scan on {}", relation),
                    format!(
                        "{} reads all ~{} rows of {} with no filter pushed down.",
                        node.node_label,
                        human_rows(rows),
                        relation
                    ),
                    "Add a selective WHERE clause or LIMIT if the caller does not need every row",
                )
                .with_recommendation(format!(
                    "If the scan feeds a join, index the join column on {}",
                    relation
                ))
                .with_affected(relation)
                .with_metric("estimated_rows", rows)
                .with_metric("row_source", source),
            ))
        }
        None => Ok(None),
    }
}

fn selectivity_issue(
    ctx: &DetectionContext<'_>,
    node: &NormalizedPlanNode,
) -> Result<Option<Issue>, DetectorError> {
    let Some(estimated) = checked_rows(NAME, node, "estimated_rows", node.estimated_rows)? else {
        return Ok(None);
    };
    let Some(table) = node.relation_name.as_deref() else {
        return Ok(None);
    };
    let Some(table_rows) = ctx.stats.and_then(|s| s.row_count(table)) else {
        return Ok(None);
    };
    if table_rows == 0 {
        return Ok(None);
    }

    let ratio = estimated / table_rows as f64;
    if ratio <= ctx.thresholds.low_selectivity_ratio {
        return Ok(None);
    }

    let index = node.index_name.as_deref().unwrap_or("index");
    Ok(Some(
        Issue::new(
            IssueType::InefficientIndex,
            Severity::Medium,
            format!("Low-selectivity index scan on {}", table),
            format!(
                "{} via {} is expected to match {:.0}% of {} ({} of {} rows). At that \
                 selectivity random index lookups cost more than a sequential read.",
                node.node_label,
                index,
                ratio * 100.0,
                table,
                human_rows(estimated),
                human_rows(table_rows as f64)
            ),
            format!(
                "Make the predicate on {} more selective or add the filtering columns to {}",
                table, index
            ),
        )
        .with_recommendation(format!(
            "If {} is rarely selective, consider dropping it to save write overhead",
            index
        ))
        .with_affected(table)
        .with_affected(index)
        .with_metric("estimated_rows", estimated)
        .with_metric("table_rows", table_rows)
        .with_metric("selectivity", ratio),
    ))
}

/// Columns compared in a filter expression, in order of appearance.
///
/// Qualifiers and quotes are dropped: `("o"."status" = 'open')` gives
/// `status`. Literal contents are masked first so values never look like
/// columns.
pub(crate) fn filter_columns(filter: &str) -> Vec<String> {
    let masked = sql::mask_literals(filter);
    let mut columns: Vec<String> = Vec::new();

    for caps in FILTER_COLUMN.captures_iter(&masked) {
        let raw = caps[1].replace('"', "");
        let column = raw.rsplit('.').next().unwrap_or(&raw).to_lowercase();
        if column.is_empty() || is_keyword(&column) || columns.contains(&column) {
            continue;
        }
        columns.push(column);
        if columns.len() == MAX_INDEX_COLUMNS {
            break;
        }
    }

    columns
}

fn is_keyword(word: &str) -> bool {
    matches!(
        word,
        "and" | "or" | "not" | "null" | "true" | "false" | "any" | "all" | "select" | "exists"
    )
}

fn create_index_sql(table: &str, columns: &[String]) -> String {
    let bare = table.rsplit('.').next().unwrap_or(table);
    let index_name: String = format!("idx_{}_{}", bare, columns.join("_"))
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    let table_sql = table
        .split('.')
        .map(sql::quote_ident)
        .collect::<Vec<_>>()
        .join(".");
    let column_sql = columns
        .iter()
        .map(|c| sql::quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "CREATE INDEX {} ON {} ({});",
        index_name, table_sql, column_sql
    )
}
