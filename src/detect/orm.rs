//! ORM-shape detector: symptoms of generated SQL.
//!
//! Three signals: too many tables in one statement, `SELECT *` across joins,
//! and N+1 loops (many structurally identical statements in one batch).

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use super::{pattern, DetectionContext, PlanDetector};
use crate::error::DetectorError;
use crate::issue::{Issue, IssueType, Severity};
use crate::sql;

const NAME: &str = "orm";

/// Characters of a repeated statement shown in the N+1 description
const SAMPLE_CHARS: usize = 120;

static FROM_LIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)\bfrom\s+([\w."]+(?:\s+(?:as\s+)?\w+)?(?:\s*,\s*[\w."]+(?:\s+(?:as\s+)?\w+)?)*)"#,
    )
    .expect("valid regex")
});
static JOIN_TABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\bjoin\s+(?:lateral\s+)?([\w."]+)"#).expect("valid regex"));
static JOIN_KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bjoin\b").expect("valid regex"));
// Functions whose argument syntax uses FROM
static FROM_IN_FUNCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:extract|substring|trim|position|overlay)\s*\([^()]*\)")
        .expect("valid regex")
});

pub struct OrmShapeDetector;

impl PlanDetector for OrmShapeDetector {
    fn name(&self) -> &'static str {
        NAME
    }

    fn detect(&self, ctx: &DetectionContext<'_>) -> Result<Vec<Issue>, DetectorError> {
        let t = ctx.thresholds;
        let text = sql::scannable(ctx.sql);
        let shape = TableShape::of(&text);
        let mut issues = Vec::new();

        if shape.tables.len() > t.max_joined_tables {
            issues.push(
                Issue::new(
                    IssueType::OrmGenerated,
                    Severity::Medium,
                    format!("{} tables in one statement", shape.tables.len()),
                    format!(
                        "The statement touches {} distinct tables. Wide eager-loading joins like \
                         this are typical of ORM-generated SQL and multiply planning and row width.",
                        shape.tables.len()
                    ),
                    "Load related data in separate, targeted queries or narrow the eager-load",
                )
                .with_affected_all(shape.tables.iter().cloned())
                .with_metric("tables", shape.tables.len()),
            );
        }

        if shape.joins >= t.overfetch_min_joins && pattern::has_wildcard_projection(&text) {
            issues.push(
                Issue::new(
                    IssueType::OrmGenerated,
                    Severity::Medium,
                    format!("SELECT * across {} joins", shape.joins),
                    "Every column of every joined table is fetched. Across joins this \
                     duplicates parent columns on each child row.",
                    "Select only the columns the caller uses from each joined table",
                )
                .with_affected_all(shape.tables.iter().cloned())
                .with_metric("joins", shape.joins),
            );
        }

        issues.extend(n_plus_one_issues(ctx.batch, t.n_plus_one_min_batch));

        tracing::debug!(detector = NAME, issues = issues.len(), "detector finished");
        Ok(issues)
    }
}

/// Tables and join count read from statement text.
#[derive(Debug, Default)]
struct TableShape {
    /// Distinct tables, lowercased, in order of appearance
    tables: Vec<String>,
    /// Explicit JOINs plus comma joins
    joins: usize,
}

impl TableShape {
    fn of(text: &str) -> Self {
        let text = FROM_IN_FUNCTION.replace_all(text, "");
        let mut shape = TableShape {
            joins: JOIN_KEYWORD.find_iter(&text).count(),
            ..Default::default()
        };

        for caps in FROM_LIST.captures_iter(&text) {
            let entries: Vec<&str> = caps[1].split(',').collect();
            shape.joins += entries.len() - 1;
            for entry in entries {
                if let Some(name) = entry.split_whitespace().next() {
                    shape.add(name);
                }
            }
        }
        for caps in JOIN_TABLE.captures_iter(&text) {
            shape.add(&caps[1]);
        }
        shape
    }

    fn add(&mut self, name: &str) {
        let name = name.replace('"', "").to_lowercase();
        if name.is_empty() || matches!(name.as_str(), "select" | "lateral" | "dual") {
            return;
        }
        if !self.tables.contains(&name) {
            self.tables.push(name);
        }
    }
}

/// One critical issue per group of structurally identical statements at or
/// above `min_batch`, largest group first.
///
/// Statements are grouped by fingerprint across the whole batch, not by
/// adjacency. A loop that interleaves its lookups with other statements
/// (parent fetch, child fetch, parent fetch, ...) still counts as one run.
/// Reads only the batch, so the analyzer also calls it when no plan is
/// available.
pub(crate) fn n_plus_one_issues(batch: &[String], min_batch: usize) -> Vec<Issue> {
    let mut groups: BTreeMap<String, (usize, &str)> = BTreeMap::new();
    for statement in batch.iter().filter(|s| !s.trim().is_empty()) {
        groups
            .entry(sql::fingerprint(statement))
            .or_insert((0, statement.as_str()))
            .0 += 1;
    }

    let mut repeated: Vec<(String, usize, &str)> = groups
        .into_iter()
        .filter(|(_, (count, _))| *count >= min_batch)
        .map(|(fp, (count, sample))| (fp, count, sample))
        .collect();
    repeated.sort_by(|a, b| b.1.cmp(&a.1));

    repeated
        .into_iter()
        .map(|(fp, count, sample)| {
            Issue::new(
                IssueType::OrmGenerated,
                Severity::Critical,
                format!("N+1 query pattern ({} identical statements)", count),
                format!(
                    "The batch contains {} statements that differ only in parameter values: {}. \
                     This is the signature of a per-row lookup inside an application loop.",
                    count,
                    sql::excerpt(sample.trim(), SAMPLE_CHARS)
                ),
                "Fetch the rows in one query with WHERE ... IN (...) or a join",
            )
            .with_recommendation("Enable eager loading for this association in the ORM")
            .with_metric("repetitions", count)
            .with_metric("fingerprint", fp)
        })
        .collect()
}
