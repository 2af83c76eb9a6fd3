//! MySQL EXPLAIN FORMAT=TREE plans, supplied as one opaque string.
//!
//! The text is tokenized line by line: operation keywords are found by
//! substring search and every match becomes a flat node under a synthetic
//! root. Nesting in the text is not reconstructed, so these plans are always
//! shallow. A `Filter:` line attaches its condition to the scan that follows.

use regex::Regex;
use std::sync::LazyLock;

use super::{NormalizedPlanNode, Operation, RawPlan};
use crate::error::PlanError;

const ENGINE: &str = "mysql";

static COST_ANNOTATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\(cost=(\d+(?:\.\d+)?(?:e[+-]?\d+)?)(?:\.\.(\d+(?:\.\d+)?(?:e[+-]?\d+)?))?\s+rows=(\d+(?:\.\d+)?(?:e[+-]?\d+)?)\)")
        .expect("valid regex")
});
static ACTUAL_ANNOTATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\(actual time=[\d.e+-]+\.\.[\d.e+-]+\s+rows=(\d+(?:\.\d+)?(?:e[+-]?\d+)?)\s+loops=(\d+)\)")
        .expect("valid regex")
});
static ON_RELATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bon\s+<?([\w.$]+)>?").expect("valid regex"));
static USING_INDEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\busing\s+([\w.$]+)").expect("valid regex"));

pub(super) fn normalize(raw: &RawPlan) -> Result<NormalizedPlanNode, PlanError> {
    let text = match raw {
        RawPlan::Text(text) => text.clone(),
        RawPlan::Json(serde_json::Value::String(s)) => s.clone(),
        RawPlan::Json(serde_json::Value::Array(items)) => {
            let lines: Option<Vec<&str>> = items.iter().map(|v| v.as_str()).collect();
            lines
                .ok_or_else(|| PlanError::malformed(ENGINE, "expected an array of plan lines"))?
                .join("\n")
        }
        RawPlan::Json(_) => {
            return Err(PlanError::malformed(ENGINE, "expected tree-format plan text"));
        }
    };

    let nodes = tokenize(&text);
    if nodes.is_empty() {
        return Err(PlanError::malformed(
            ENGINE,
            "no plan operations found in text",
        ));
    }

    let mut root = NormalizedPlanNode::new(Operation::Other, "Query plan");
    root.cost = nodes[0].cost;
    root.estimated_rows = nodes[0].estimated_rows;
    root.children = nodes;
    Ok(root)
}

fn tokenize(text: &str) -> Vec<NormalizedPlanNode> {
    let mut nodes = Vec::new();
    let mut pending_filter: Option<String> = None;

    for line in text.lines() {
        let trimmed = line.trim();
        let body = trimmed.strip_prefix("->").unwrap_or(trimmed).trim();
        if body.is_empty() {
            continue;
        }
        let lower = body.to_ascii_lowercase();

        if let Some(condition) = filter_condition(body) {
            pending_filter = Some(condition);
            continue;
        }

        let Some(operation) = classify(&lower) else {
            if trimmed.starts_with("->") {
                nodes.push(build_node(Operation::Other, body));
            }
            continue;
        };

        let mut node = build_node(operation, body);
        if operation.is_scan() {
            node.relation_name = ON_RELATION
                .captures(body)
                .map(|c| c[1].to_string());
            if operation == Operation::IndexScan {
                node.index_name = USING_INDEX.captures(body).map(|c| c[1].to_string());
            }
            node.filter_text = pending_filter.take();
        } else {
            pending_filter = None;
        }
        nodes.push(node);
    }

    nodes
}

fn classify(lower: &str) -> Option<Operation> {
    if lower.contains("table scan on") {
        Some(Operation::SequentialScan)
    } else if lower.contains("index lookup on")
        || lower.contains("index range scan on")
        || lower.contains("index scan on")
        || lower.contains("index skip scan on")
        || lower.contains("constant row from")
    {
        Some(Operation::IndexScan)
    } else if lower.contains("nested loop") {
        Some(Operation::NestedLoop)
    } else if lower.contains("hash join") {
        Some(Operation::HashJoin)
    } else if lower.starts_with("sort") {
        Some(Operation::Sort)
    } else if lower.contains("aggregate") || lower.starts_with("group") {
        Some(Operation::Aggregate)
    } else {
        None
    }
}

fn filter_condition(body: &str) -> Option<String> {
    let rest = body.strip_prefix("Filter:")?;
    let condition = match rest.find("  (") {
        Some(idx) => &rest[..idx],
        None => rest,
    };
    Some(condition.trim().to_string())
}

fn build_node(operation: Operation, body: &str) -> NormalizedPlanNode {
    let label = match body.find("  (") {
        Some(idx) => body[..idx].trim(),
        None => body,
    };
    let mut node = NormalizedPlanNode::new(operation, label);

    if let Some(caps) = COST_ANNOTATION.captures(body) {
        // Range form "cost=startup..total" keeps the total
        node.cost = caps
            .get(2)
            .or_else(|| caps.get(1))
            .and_then(|m| m.as_str().parse().ok());
        node.estimated_rows = caps.get(3).and_then(|m| m.as_str().parse().ok());
    }
    if let Some(caps) = ACTUAL_ANNOTATION.captures(body) {
        node.actual_rows = caps.get(1).and_then(|m| m.as_str().parse().ok());
        node.actual_loops = caps.get(2).and_then(|m| m.as_str().parse().ok());
    }
    node
}
