//! Oracle plans: flat PLAN_TABLE / V$SQL_PLAN_STATISTICS_ALL rows.
//!
//! Each row carries an `ID` and a `PARENT_ID` (null for the root). Rows are
//! reassembled into a tree; siblings are ordered by `POSITION`, then `ID`.
//! Column names are matched case-insensitively.

use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

use super::{Buffers, NormalizedPlanNode, Operation, RawPlan};
use crate::error::PlanError;

const ENGINE: &str = "oracle";

struct PlanRow {
    id: i64,
    parent_id: Option<i64>,
    position: Option<i64>,
    node: NormalizedPlanNode,
}

pub(super) fn normalize(raw: &RawPlan) -> Result<NormalizedPlanNode, PlanError> {
    let value = match raw {
        RawPlan::Json(v) => v.clone(),
        RawPlan::Text(text) => serde_json::from_str(text)
            .map_err(|e| PlanError::malformed(ENGINE, format!("expected JSON rows: {}", e)))?,
    };

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match take_ci(&mut map, "rows") {
            Some(Value::Array(items)) => items,
            _ => return Err(PlanError::malformed(ENGINE, "expected an array of plan rows")),
        },
        _ => return Err(PlanError::malformed(ENGINE, "expected an array of plan rows")),
    };

    if items.is_empty() {
        return Err(PlanError::malformed(ENGINE, "plan has no rows"));
    }

    let rows = items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Object(map) => parse_row(&map),
            _ => Err(PlanError::malformed(ENGINE, format!("row {} is not an object", i))),
        })
        .collect::<Result<Vec<_>, _>>()?;

    assemble(rows)
}

fn parse_row(row: &Map<String, Value>) -> Result<PlanRow, PlanError> {
    let id = int_field(row, "ID")
        .ok_or_else(|| PlanError::malformed(ENGINE, "row without a numeric ID"))?;
    let operation = text_field(row, "OPERATION")
        .ok_or_else(|| PlanError::malformed(ENGINE, format!("row {} has no OPERATION", id)))?;
    let options = text_field(row, "OPTIONS");

    let op = map_operation(&operation, options.as_deref());
    let label = match &options {
        Some(opts) => format!("{} {}", operation, opts),
        None => operation.clone(),
    };

    let mut node = NormalizedPlanNode::new(op, label);
    let object_name = text_field(row, "OBJECT_NAME");
    if operation.eq_ignore_ascii_case("INDEX") || op == Operation::BitmapScan {
        node.index_name = object_name;
    } else {
        node.relation_name = object_name;
    }
    node.estimated_rows = num_field(row, "CARDINALITY");
    let loops = num_field(row, "LAST_STARTS").or_else(|| num_field(row, "STARTS"));
    node.actual_loops = loops;
    // Output rows are summed over all starts; CARDINALITY is per start
    node.actual_rows = num_field(row, "LAST_OUTPUT_ROWS")
        .or_else(|| num_field(row, "A_ROWS"))
        .map(|total| match loops {
            Some(loops) if loops > 1.0 => total / loops,
            _ => total,
        });
    node.cost = num_field(row, "COST");
    node.filter_text =
        text_field(row, "FILTER_PREDICATES").or_else(|| text_field(row, "ACCESS_PREDICATES"));
    node.buffers = match (
        uint_field(row, "LAST_CR_BUFFER_GETS"),
        uint_field(row, "LAST_DISK_READS"),
    ) {
        (Some(gets), Some(reads)) => Some(Buffers {
            hits: gets.saturating_sub(reads),
            reads,
        }),
        _ => None,
    };

    Ok(PlanRow {
        id,
        parent_id: int_field(row, "PARENT_ID"),
        position: int_field(row, "POSITION"),
        node,
    })
}

/// Rebuild the tree from parent links.
fn assemble(rows: Vec<PlanRow>) -> Result<NormalizedPlanNode, PlanError> {
    let total = rows.len();
    let mut nodes: HashMap<i64, NormalizedPlanNode> = HashMap::with_capacity(total);
    let mut children: BTreeMap<i64, Vec<(Option<i64>, i64)>> = BTreeMap::new();
    let mut roots: Vec<(Option<i64>, i64)> = Vec::new();

    for row in &rows {
        if row.parent_id == Some(row.id) {
            return Err(PlanError::malformed(
                ENGINE,
                format!("row {} is its own parent", row.id),
            ));
        }
    }

    for row in rows {
        if nodes.contains_key(&row.id) {
            return Err(PlanError::malformed(ENGINE, format!("duplicate row ID {}", row.id)));
        }
        match row.parent_id {
            Some(parent) => children
                .entry(parent)
                .or_default()
                .push((row.position, row.id)),
            None => roots.push((row.position, row.id)),
        }
        nodes.insert(row.id, row.node);
    }

    if let Some(parent) = children.keys().find(|p| !nodes.contains_key(p)) {
        return Err(PlanError::malformed(
            ENGINE,
            format!("row references missing parent ID {}", parent),
        ));
    }
    if roots.is_empty() {
        return Err(PlanError::malformed(ENGINE, "no root row (PARENT_ID is never null)"));
    }

    for siblings in children.values_mut() {
        siblings.sort();
    }
    roots.sort();

    let mut built = 0usize;
    let mut trees = Vec::with_capacity(roots.len());
    for (_, id) in &roots {
        trees.push(build(*id, &mut nodes, &children, &mut built)?);
    }

    if built != total {
        return Err(PlanError::malformed(
            ENGINE,
            format!("{} row(s) are not reachable from a root", total - built),
        ));
    }

    if trees.len() == 1 {
        Ok(trees.remove(0))
    } else {
        let mut root = NormalizedPlanNode::new(Operation::Other, "PLAN");
        root.children = trees;
        Ok(root)
    }
}

fn build(
    id: i64,
    nodes: &mut HashMap<i64, NormalizedPlanNode>,
    children: &BTreeMap<i64, Vec<(Option<i64>, i64)>>,
    built: &mut usize,
) -> Result<NormalizedPlanNode, PlanError> {
    let mut node = nodes
        .remove(&id)
        .ok_or_else(|| PlanError::malformed(ENGINE, format!("row {} visited twice", id)))?;
    *built += 1;
    if let Some(kids) = children.get(&id) {
        for (_, child_id) in kids {
            let child = build(*child_id, nodes, children, built)?;
            node.children.push(child);
        }
    }
    Ok(node)
}

fn map_operation(operation: &str, options: Option<&str>) -> Operation {
    let operation = operation.to_ascii_uppercase();
    let options = options.unwrap_or("").to_ascii_uppercase();

    match operation.as_str() {
        "TABLE ACCESS" if options.contains("INDEX") => Operation::IndexScan,
        "TABLE ACCESS" if options.contains("FULL") => Operation::SequentialScan,
        "INDEX" => Operation::IndexScan,
        "NESTED LOOPS" => Operation::NestedLoop,
        "HASH JOIN" => Operation::HashJoin,
        "MERGE JOIN" => Operation::MergeJoin,
        "SORT" if options.contains("AGGREGATE") || options.contains("GROUP BY") => {
            Operation::Aggregate
        }
        "SORT" => Operation::Sort,
        "HASH" if options.contains("GROUP BY") || options.contains("UNIQUE") => {
            Operation::Aggregate
        }
        op if op.starts_with("BITMAP") => Operation::BitmapScan,
        _ => Operation::Other,
    }
}

fn lookup<'a>(row: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    row.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v)
}

fn take_ci(map: &mut Map<String, Value>, key: &str) -> Option<Value> {
    let actual = map.keys().find(|k| k.eq_ignore_ascii_case(key))?.clone();
    map.remove(&actual)
}

fn text_field(row: &Map<String, Value>, key: &str) -> Option<String> {
    match lookup(row, key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn num_field(row: &Map<String, Value>, key: &str) -> Option<f64> {
    match lookup(row, key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn int_field(row: &Map<String, Value>, key: &str) -> Option<i64> {
    match lookup(row, key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn uint_field(row: &Map<String, Value>, key: &str) -> Option<u64> {
    int_field(row, key).and_then(|v| u64::try_from(v).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows() -> Value {
        json!([
            {"ID": 0, "PARENT_ID": null, "OPERATION": "SELECT STATEMENT", "COST": 812},
            {"ID": 1, "PARENT_ID": 0, "OPERATION": "HASH JOIN", "CARDINALITY": 5000, "POSITION": 1},
            {"ID": 3, "PARENT_ID": 1, "OPERATION": "TABLE ACCESS", "OPTIONS": "FULL",
             "OBJECT_NAME": "ORDERS", "CARDINALITY": 250000, "POSITION": 2,
             "FILTER_PREDICATES": "\"O\".\"STATUS\"='OPEN'",
             "LAST_CR_BUFFER_GETS": 1000, "LAST_DISK_READS": 990},
            {"ID": 2, "PARENT_ID": 1, "OPERATION": "INDEX", "OPTIONS": "RANGE SCAN",
             "OBJECT_NAME": "CUSTOMERS_PK", "CARDINALITY": "12", "POSITION": 1}
        ])
    }

    #[test]
    fn test_reassembles_tree_from_parent_links() {
        let root = normalize(&RawPlan::Json(rows())).unwrap();
        assert_eq!(root.node_label, "SELECT STATEMENT");
        assert_eq!(root.children.len(), 1);

        let join = &root.children[0];
        assert_eq!(join.operation, Operation::HashJoin);
        // POSITION orders siblings, not ID
        assert_eq!(join.children[0].operation, Operation::IndexScan);
        assert_eq!(join.children[0].index_name.as_deref(), Some("CUSTOMERS_PK"));
        assert_eq!(join.children[0].estimated_rows, Some(12.0));

        let scan = &join.children[1];
        assert_eq!(scan.operation, Operation::SequentialScan);
        assert_eq!(scan.relation_name.as_deref(), Some("ORDERS"));
        assert_eq!(scan.node_label, "TABLE ACCESS FULL");
        assert_eq!(scan.buffers, Some(Buffers { hits: 10, reads: 990 }));
    }

    #[test]
    fn test_lowercase_column_names() {
        let raw = json!([{"id": 0, "parent_id": null, "operation": "TABLE ACCESS", "options": "FULL", "object_name": "T"}]);
        let root = normalize(&RawPlan::Json(raw)).unwrap();
        assert_eq!(root.operation, Operation::SequentialScan);
        assert_eq!(root.relation_name.as_deref(), Some("T"));
    }

    #[test]
    fn test_multiple_roots_get_synthetic_parent() {
        let raw = json!([
            {"ID": 1, "OPERATION": "TABLE ACCESS", "OPTIONS": "FULL", "OBJECT_NAME": "A"},
            {"ID": 2, "OPERATION": "TABLE ACCESS", "OPTIONS": "FULL", "OBJECT_NAME": "B"}
        ]);
        let root = normalize(&RawPlan::Json(raw)).unwrap();
        assert_eq!(root.node_label, "PLAN");
        assert_eq!(root.children.len(), 2);
    }

    #[test]
    fn test_unknown_operation_maps_to_other() {
        let raw = json!([{"ID": 0, "OPERATION": "PX COORDINATOR"}]);
        let root = normalize(&RawPlan::Json(raw)).unwrap();
        assert_eq!(root.operation, Operation::Other);
    }

    #[test]
    fn test_missing_parent_is_malformed() {
        let raw = json!([
            {"ID": 0, "OPERATION": "SELECT STATEMENT"},
            {"ID": 1, "PARENT_ID": 7, "OPERATION": "SORT", "OPTIONS": "ORDER BY"}
        ]);
        assert!(matches!(
            normalize(&RawPlan::Json(raw)),
            Err(PlanError::MalformedPlan { .. })
        ));
    }

    #[test]
    fn test_cycle_without_root_is_malformed() {
        let raw = json!([
            {"ID": 1, "PARENT_ID": 2, "OPERATION": "SORT"},
            {"ID": 2, "PARENT_ID": 1, "OPERATION": "SORT"}
        ]);
        assert!(normalize(&RawPlan::Json(raw)).is_err());
    }

    #[test]
    fn test_unreachable_cycle_is_malformed() {
        let raw = json!([
            {"ID": 0, "OPERATION": "SELECT STATEMENT"},
            {"ID": 1, "PARENT_ID": 2, "OPERATION": "SORT"},
            {"ID": 2, "PARENT_ID": 1, "OPERATION": "SORT"}
        ]);
        assert!(normalize(&RawPlan::Json(raw)).is_err());
    }

    #[test]
    fn test_empty_and_non_array_are_malformed() {
        assert!(normalize(&RawPlan::Json(json!([]))).is_err());
        assert!(normalize(&RawPlan::Json(json!("plan"))).is_err());
        assert!(normalize(&RawPlan::Json(json!([{"OPERATION": "SORT"}]))).is_err());
    }

    #[test]
    fn test_actual_rows_are_per_start() {
        let raw = json!([
            {"ID": 0, "OPERATION": "NESTED LOOPS", "CARDINALITY": 50000,
             "LAST_STARTS": 1, "LAST_OUTPUT_ROWS": 50000},
            {"ID": 1, "PARENT_ID": 0, "OPERATION": "TABLE ACCESS", "OPTIONS": "BY INDEX ROWID",
             "OBJECT_NAME": "CUSTOMERS", "CARDINALITY": 1, "POSITION": 2,
             "LAST_STARTS": 50000, "LAST_OUTPUT_ROWS": 50000}
        ]);
        let root = normalize(&RawPlan::Json(raw)).unwrap();
        assert_eq!(root.actual_rows, Some(50000.0));

        let inner = &root.children[0];
        assert_eq!(inner.actual_loops, Some(50000.0));
        assert_eq!(inner.actual_rows, Some(1.0));
    }

    #[test]
    fn test_rows_wrapper_object() {
        let raw = json!({"rows": [{"ID": 0, "OPERATION": "SELECT STATEMENT"}]});
        assert!(normalize(&RawPlan::Json(raw)).is_ok());
    }
}
