//! PostgreSQL EXPLAIN (FORMAT JSON) plans.

use serde::Deserialize;

use super::{Buffers, NormalizedPlanNode, Operation, RawPlan};
use crate::error::PlanError;

const ENGINE: &str = "postgresql";

#[derive(Debug, Deserialize)]
struct PlanNode {
    #[serde(rename = "Node Type")]
    node_type: String,
    #[serde(rename = "Relation Name")]
    relation_name: Option<String>,
    #[serde(rename = "Schema")]
    schema: Option<String>,
    #[serde(rename = "Index Name")]
    index_name: Option<String>,
    #[serde(rename = "Total Cost")]
    total_cost: Option<f64>,
    #[serde(rename = "Plan Rows")]
    plan_rows: Option<f64>,
    #[serde(rename = "Actual Rows")]
    actual_rows: Option<f64>,
    #[serde(rename = "Actual Loops")]
    actual_loops: Option<f64>,
    #[serde(rename = "Filter")]
    filter: Option<String>,
    #[serde(rename = "Recheck Cond")]
    recheck_cond: Option<String>,
    #[serde(rename = "Index Cond")]
    index_cond: Option<String>,
    #[serde(rename = "Shared Hit Blocks")]
    shared_hit_blocks: Option<u64>,
    #[serde(rename = "Shared Read Blocks")]
    shared_read_blocks: Option<u64>,
    #[serde(rename = "Plans", default)]
    plans: Vec<PlanNode>,
}

pub(super) fn normalize(raw: &RawPlan) -> Result<NormalizedPlanNode, PlanError> {
    let value = match raw {
        RawPlan::Json(v) => v.clone(),
        RawPlan::Text(text) => serde_json::from_str(text)
            .map_err(|e| PlanError::malformed(ENGINE, format!("expected JSON plan: {}", e)))?,
    };

    let root_value = locate_root(value)?;
    let root: PlanNode = serde_json::from_value(root_value)
        .map_err(|e| PlanError::malformed(ENGINE, e.to_string()))?;

    Ok(convert(root))
}

/// Accept `[{"Plan": {...}}]`, `{"Plan": {...}}`, or a bare node object.
fn locate_root(value: serde_json::Value) -> Result<serde_json::Value, PlanError> {
    let value = match value {
        serde_json::Value::Array(mut items) => {
            if items.is_empty() {
                return Err(PlanError::malformed(ENGINE, "empty plan array"));
            }
            items.swap_remove(0)
        }
        other => other,
    };

    match value {
        serde_json::Value::Object(mut map) => match map.remove("Plan") {
            Some(plan) => Ok(plan),
            None => Ok(serde_json::Value::Object(map)),
        },
        other => Err(PlanError::malformed(
            ENGINE,
            format!("expected a plan object, found {}", json_kind(&other)),
        )),
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

fn convert(node: PlanNode) -> NormalizedPlanNode {
    let mut out = NormalizedPlanNode::new(map_node_type(&node.node_type), node.node_type);
    out.estimated_rows = node.plan_rows;
    out.actual_rows = node.actual_rows;
    out.actual_loops = node.actual_loops;
    out.cost = node.total_cost;
    out.relation_name = match (node.schema, node.relation_name) {
        (Some(schema), Some(rel)) if schema != "public" => Some(format!("{}.{}", schema, rel)),
        (_, rel) => rel,
    };
    out.index_name = node.index_name;
    out.filter_text = node.filter.or(node.recheck_cond).or(node.index_cond);
    out.buffers = match (node.shared_hit_blocks, node.shared_read_blocks) {
        (Some(hits), Some(reads)) => Some(Buffers { hits, reads }),
        _ => None,
    };
    out.children = node.plans.into_iter().map(convert).collect();
    out
}

fn map_node_type(node_type: &str) -> Operation {
    match node_type {
        "Seq Scan" | "Parallel Seq Scan" => Operation::SequentialScan,
        "Index Scan" | "Index Only Scan" | "Parallel Index Scan" | "Parallel Index Only Scan" => {
            Operation::IndexScan
        }
        "Bitmap Heap Scan" | "Bitmap Index Scan" | "Parallel Bitmap Heap Scan" => {
            Operation::BitmapScan
        }
        "Nested Loop" => Operation::NestedLoop,
        "Hash Join" => Operation::HashJoin,
        "Merge Join" => Operation::MergeJoin,
        "Sort" | "Incremental Sort" => Operation::Sort,
        "Aggregate" | "HashAggregate" | "GroupAggregate" | "WindowAgg" => Operation::Aggregate,
        _ => Operation::Other,
    }
}
