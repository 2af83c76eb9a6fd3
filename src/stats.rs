//! Table statistics supplied by the caller.
//!
//! Only two facts are used: when a table was last analyzed (for stale
//! statistics) and roughly how many rows it holds (for selectivity and for
//! engines whose plans carry no row estimates).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Statistics for one table
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct TableStat {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_analyze: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_autoanalyze: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,
}

impl TableStat {
    /// Most recent of the manual and automatic analyze timestamps.
    pub fn last_analyzed(&self) -> Option<DateTime<Utc>> {
        match (self.last_analyze, self.last_autoanalyze) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }
}

/// Statistics keyed by table name.
///
/// Keys are stored lowercased without quotes. Lookups accept `schema.table`
/// or a bare `table` name, in any case.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(from = "BTreeMap<String, TableStat>", into = "BTreeMap<String, TableStat>")]
pub struct TableStats {
    tables: BTreeMap<String, TableStat>,
}

impl From<BTreeMap<String, TableStat>> for TableStats {
    fn from(raw: BTreeMap<String, TableStat>) -> Self {
        let mut stats = TableStats::default();
        for (name, stat) in raw {
            stats.insert(&name, stat);
        }
        stats
    }
}

impl From<TableStats> for BTreeMap<String, TableStat> {
    fn from(stats: TableStats) -> Self {
        stats.tables
    }
}

impl TableStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, table: &str, stat: TableStat) {
        self.tables.insert(normalize_name(table), stat);
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn get(&self, table: &str) -> Option<&TableStat> {
        let name = normalize_name(table);
        if let Some(stat) = self.tables.get(&name) {
            return Some(stat);
        }
        match name.rsplit_once('.') {
            // Qualified lookup, stats keyed by bare name
            Some((_, bare)) => self.tables.get(bare),
            // Bare lookup, stats keyed by qualified name
            None => self
                .tables
                .iter()
                .find(|(key, _)| key.rsplit_once('.').map(|(_, t)| t) == Some(name.as_str()))
                .map(|(_, stat)| stat),
        }
    }

    /// Known row count for a table, if any.
    pub fn row_count(&self, table: &str) -> Option<u64> {
        self.get(table).and_then(|s| s.row_count)
    }
}

fn normalize_name(name: &str) -> String {
    name.trim().replace('"', "").to_lowercase()
}
