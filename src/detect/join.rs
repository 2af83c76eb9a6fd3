//! Join-strategy detector: nested loops over large inputs and hash joins
//! big enough to spill.

use super::{checked_rows, human_rows, DetectionContext, PlanDetector};
use crate::error::DetectorError;
use crate::issue::{Issue, IssueType, Severity};
use crate::plan::{NormalizedPlanNode, Operation};

const NAME: &str = "join";

pub struct JoinStrategyDetector;

impl PlanDetector for JoinStrategyDetector {
    fn name(&self) -> &'static str {
        NAME
    }

    fn detect(&self, ctx: &DetectionContext<'_>) -> Result<Vec<Issue>, DetectorError> {
        let mut issues = Vec::new();

        for node in ctx.root.iter() {
            let issue = match node.operation {
                Operation::NestedLoop => nested_loop_issue(ctx, node)?,
                Operation::HashJoin => hash_join_issue(ctx, node)?,
                _ => None,
            };
            issues.extend(issue);
        }

        tracing::debug!(detector = NAME, issues = issues.len(), "detector finished");
        Ok(issues)
    }
}

/// Estimated rows of each child, skipping children with no estimate.
fn child_rows(node: &NormalizedPlanNode) -> Result<Vec<(&NormalizedPlanNode, f64)>, DetectorError> {
    let mut rows = Vec::with_capacity(node.children.len());
    for child in &node.children {
        if let Some(r) = checked_rows(NAME, child, "estimated_rows", child.estimated_rows)? {
            rows.push((child, r));
        }
    }
    Ok(rows)
}

fn joined_relations(node: &NormalizedPlanNode) -> Vec<String> {
    node.iter()
        .skip(1)
        .filter_map(|n| n.relation_name.clone())
        .collect()
}

fn nested_loop_issue(
    ctx: &DetectionContext<'_>,
    node: &NormalizedPlanNode,
) -> Result<Option<Issue>, DetectorError> {
    let rows = child_rows(node)?;
    let Some(&(largest, max_rows)) = rows
        .iter()
        .max_by(|a, b| a.1.total_cmp(&b.1))
    else {
        return Ok(None);
    };
    if max_rows <= ctx.thresholds.large_join_rows {
        return Ok(None);
    }

    let relations = joined_relations(node);
    Ok(Some(
        Issue::new(
            IssueType::PoorJoinStrategy,
            Severity::High,
            format!("Nested loop over ~{} rows", human_rows(max_rows)),
            format!(
                "{} iterates an input of ~{} rows ({}). Each outer row probes the inner \
                 side, so cost grows with the product of both inputs.",
                node.node_label,
                human_rows(max_rows),
                largest.display_name()
            ),
            "Index the inner side's join column so each probe is a lookup, or let the \
             planner choose a hash or merge join",
        )
        .with_recommendation(
            "Check that row estimates on both inputs are accurate; an underestimate often \
             causes this plan",
        )
        .with_affected_all(relations)
        .with_metric("max_child_rows", max_rows),
    ))
}

fn hash_join_issue(
    ctx: &DetectionContext<'_>,
    node: &NormalizedPlanNode,
) -> Result<Option<Issue>, DetectorError> {
    let rows = child_rows(node)?;
    if rows.is_empty() {
        return Ok(None);
    }
    let combined: f64 = rows.iter().map(|(_, r)| r).sum();
    if combined <= ctx.thresholds.hash_join_rows {
        return Ok(None);
    }

    Ok(Some(
        Issue::new(
            IssueType::PoorJoinStrategy,
            Severity::Medium,
            format!("Large hash join (~{} input rows)", human_rows(combined)),
            format!(
                "{} builds and probes ~{} rows in total. A hash table this size may \
                 exceed working memory and spill to disk.",
                node.node_label,
                human_rows(combined)
            ),
            "Filter both inputs earlier so fewer rows reach the join",
        )
        .with_recommendation("Raise work_mem for this query if the join cannot be reduced")
        .with_affected_all(joined_relations(node))
        .with_metric("combined_rows", combined),
    ))
}
