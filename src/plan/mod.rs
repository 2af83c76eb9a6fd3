//! Plan normalization: one node model for every supported engine.
//!
//! Each engine hands over its plan in a different shape. PostgreSQL gives a
//! nested JSON tree, Oracle a flat table of rows linked by parent ids, and
//! MySQL's tree format a single block of text. [`normalize`] dispatches on
//! [`EngineId`] and returns a [`NormalizedPlanNode`] tree the detectors walk.

mod mysql;
mod oracle;
mod postgres;

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::PlanError;

/// Normalized plan operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    SequentialScan,
    IndexScan,
    BitmapScan,
    NestedLoop,
    HashJoin,
    MergeJoin,
    Sort,
    Aggregate,
    Other,
}

impl Operation {
    pub fn is_scan(&self) -> bool {
        matches!(
            self,
            Operation::SequentialScan | Operation::IndexScan | Operation::BitmapScan
        )
    }

    pub fn is_join(&self) -> bool {
        matches!(
            self,
            Operation::NestedLoop | Operation::HashJoin | Operation::MergeJoin
        )
    }
}

/// Buffer (block) counters for one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Buffers {
    pub hits: u64,
    pub reads: u64,
}

impl Buffers {
    /// Cache hit ratio, or `None` when the node touched no blocks.
    pub fn hit_ratio(&self) -> Option<f64> {
        let total = self.hits.saturating_add(self.reads);
        if total == 0 {
            None
        } else {
            Some(self.hits as f64 / total as f64)
        }
    }
}

/// One node of a normalized execution plan.
///
/// Optional fields are `None` when the engine did not report them. Zero
/// always means "measured as zero".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedPlanNode {
    pub operation: Operation,
    /// The engine's own name for the operation ("Seq Scan", "TABLE ACCESS FULL", ...)
    pub node_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_rows: Option<f64>,
    /// Rows produced per loop, comparable with `estimated_rows`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_rows: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_loops: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relation_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buffers: Option<Buffers>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NormalizedPlanNode>,
}

impl NormalizedPlanNode {
    pub fn new(operation: Operation, node_label: impl Into<String>) -> Self {
        Self {
            operation,
            node_label: node_label.into(),
            estimated_rows: None,
            actual_rows: None,
            actual_loops: None,
            cost: None,
            relation_name: None,
            index_name: None,
            filter_text: None,
            buffers: None,
            children: Vec::new(),
        }
    }

    /// Pre-order iterator over this node and all descendants.
    pub fn iter(&self) -> PlanIter<'_> {
        PlanIter { stack: vec![self] }
    }

    /// Number of nodes in the tree rooted here.
    pub fn node_count(&self) -> usize {
        self.iter().count()
    }

    /// Relation name, or the node label when the node is not tied to a table.
    pub fn display_name(&self) -> &str {
        self.relation_name.as_deref().unwrap_or(&self.node_label)
    }
}

/// Pre-order traversal over a plan tree.
pub struct PlanIter<'a> {
    stack: Vec<&'a NormalizedPlanNode>,
}

impl<'a> Iterator for PlanIter<'a> {
    type Item = &'a NormalizedPlanNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        // Push in reverse so children come out in plan order
        for child in node.children.iter().rev() {
            self.stack.push(child);
        }
        Some(node)
    }
}

/// Engines whose plans we can normalize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineId {
    /// EXPLAIN (FORMAT JSON): nested tree of key/value maps
    Postgresql,
    /// PLAN_TABLE / V$SQL_PLAN rows linked by ID and PARENT_ID
    Oracle,
    /// EXPLAIN FORMAT=TREE text
    Mysql,
}

impl EngineId {
    pub const ALL: [EngineId; 3] = [EngineId::Postgresql, EngineId::Oracle, EngineId::Mysql];

    const NAMES: [&'static str; 5] = ["postgresql", "postgres", "pg", "oracle", "mysql"];

    pub fn as_str(&self) -> &'static str {
        match self {
            EngineId::Postgresql => "postgresql",
            EngineId::Oracle => "oracle",
            EngineId::Mysql => "mysql",
        }
    }

    /// Other names accepted for this engine.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            EngineId::Postgresql => &["postgres", "pg"],
            EngineId::Oracle | EngineId::Mysql => &[],
        }
    }

    /// Shape of the raw payload this engine supplies.
    pub fn plan_shape(&self) -> &'static str {
        match self {
            EngineId::Postgresql => "tree",
            EngineId::Oracle => "table",
            EngineId::Mysql => "text",
        }
    }
}

impl fmt::Display for EngineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineId {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgresql" | "postgres" | "pg" => Ok(EngineId::Postgresql),
            "oracle" => Ok(EngineId::Oracle),
            "mysql" => Ok(EngineId::Mysql),
            _ => Err(PlanError::UnsupportedEngine {
                engine: s.to_string(),
                suggestion: crate::suggest::best_match(s.trim(), &Self::NAMES, 2),
            }),
        }
    }
}

/// A raw plan payload as received from the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum RawPlan {
    Json(serde_json::Value),
    Text(String),
}

impl RawPlan {
    /// Interpret file or request contents: JSON when it parses, text otherwise.
    pub fn from_contents(contents: &str) -> Self {
        match serde_json::from_str::<serde_json::Value>(contents) {
            Ok(value) => RawPlan::Json(value),
            Err(_) => RawPlan::Text(contents.to_string()),
        }
    }
}

/// Normalize a raw plan for the engine named by `engine_id`.
///
/// Fails with [`PlanError::UnsupportedEngine`] for unknown engine names and
/// [`PlanError::MalformedPlan`] when no root node can be built.
pub fn normalize(engine_id: &str, raw_plan: &RawPlan) -> Result<NormalizedPlanNode, PlanError> {
    let engine: EngineId = engine_id.parse()?;
    normalize_engine(engine, raw_plan)
}

/// Normalize a raw plan for an already-resolved engine.
pub fn normalize_engine(
    engine: EngineId,
    raw_plan: &RawPlan,
) -> Result<NormalizedPlanNode, PlanError> {
    let root = match engine {
        EngineId::Postgresql => postgres::normalize(raw_plan)?,
        EngineId::Oracle => oracle::normalize(raw_plan)?,
        EngineId::Mysql => mysql::normalize(raw_plan)?,
    };
    tracing::debug!(
        engine = engine.as_str(),
        nodes = root.node_count(),
        root = %root.node_label,
        "normalized plan"
    );
    Ok(root)
}
