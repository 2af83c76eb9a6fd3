//! Pattern detector: textual anti-patterns in the SQL itself.
//!
//! Runs with or without a plan. Every check is a regex or a small
//! paren-depth scan, not a parser, so unusual SQL may slip through
//! (false negatives) and the occasional false positive is reported at low or
//! medium severity only. Each check contributes at most one issue.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::issue::{Issue, IssueType, Severity};
use crate::sql;

/// Equality conditions on one column joined by OR before suggesting IN
const MIN_OR_CONDITIONS: usize = 3;

static SELECT_STAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bselect\s+(?:distinct\s+(?:on\s*\([^)]*\)\s*)?|all\s+)?(?:[\w"]+\.)?\*"#)
        .expect("valid regex")
});
static LIST_STAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i),\s*(?:[\w"]+\.)?\*\s*(?:,|\bfrom\b)"#).expect("valid regex")
});
static SELECT_DISTINCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bselect\s+distinct\s+").expect("valid regex"));
static DISTINCT_ON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^on\s*\(").expect("valid regex"));
static ID_COLUMN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:^|,)\s*(?:[\w"]+\.)?"?id"?\s*(?:,|$|\bas\b)"#).expect("valid regex")
});
static GROUP_BY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bgroup\s+by\b").expect("valid regex"));
static OR_SPLIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bor\b").expect("valid regex"));
static TRAILING_EQ: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([\w."]+)\s*=\s*(?:'[^']*'|[\w.$?:-]+)\s*\)*\s*$"#).expect("valid regex")
});
static LEADING_EQ: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\s*\(*\s*([\w."]+)\s*=[^=]"#).expect("valid regex"));
static SOLE_EQ: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*\(*\s*([\w."]+)\s*=\s*(?:'[^']*'|[\w.$?:-]+)\s*\)*\s*$"#)
        .expect("valid regex")
});
static PAREN_SELECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\(\s*select\b").expect("valid regex"));
static NOT_IN_SUBQUERY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)([\w."]+)\s+not\s+in\s*\(\s*select\b"#).expect("valid regex")
});
static LEADING_WILDCARD_LIKE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)([\w."]+)\s*\)*\s+(?:not\s+)?i?like\s+'%"#).expect("valid regex")
});
static PREDICATE_REGION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)\b(?:where|on|having)\b(.*?)(?:\b(?:group\s+by|order\s+by|limit|union|window|join|where|having|returning)\b|$)",
    )
    .expect("valid regex")
});
static WRAPPED_COLUMN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b([a-z_][a-z0-9_]*)\s*\(\s*(?:'[^']*'\s*,\s*)?([a-z_][\w.]*)\s*(?:(?:,|\s+as\s+)[^()]*)?\)\s*(?:=|<>|!=|<=|>=|<|>|\blike\b|\bilike\b|\bin\b|\bbetween\b)",
    )
    .expect("valid regex")
});

/// Scan SQL text for anti-patterns. Never fails; unparseable text simply
/// yields fewer findings.
pub fn scan(sql_text: &str) -> Vec<Issue> {
    let text = sql::scannable(sql_text);
    let literal_text = sql::strip_comments(sql_text);

    let checks = [
        check_select_star(&text),
        check_redundant_distinct(&text),
        check_multiple_or(&text),
        check_projection_subquery(&text),
        check_not_in_subquery(&text),
        check_leading_wildcard_like(&literal_text),
        check_function_on_column(&text),
    ];

    let issues: Vec<Issue> = checks.into_iter().flatten().collect();
    tracing::debug!(issues = issues.len(), "pattern scan complete");
    issues
}

/// True when the statement projects `*` or `alias.*`.
pub(crate) fn has_wildcard_projection(text: &str) -> bool {
    SELECT_STAR.is_match(text) || LIST_STAR.is_match(text)
}

fn check_select_star(text: &str) -> Option<Issue> {
    if !has_wildcard_projection(text) {
        return None;
    }
    Some(Issue::new(
        IssueType::SuboptimalPattern,
        Severity::Medium,
        "SELECT * retrieves every column",
        "The query projects all columns. This transfers unused data, defeats \
         index-only scans, and breaks silently when columns are added.",
        "List only the columns the caller needs instead of SELECT *",
    )
    .with_affected("*")
    .with_metric("pattern", "wildcard_projection"))
}

fn check_redundant_distinct(text: &str) -> Option<Issue> {
    let m = SELECT_DISTINCT.find(text)?;
    if DISTINCT_ON.is_match(&text[m.end()..]) {
        return None;
    }
    let projection = projection_list(text, m.end())?;

    let reason = if ID_COLUMN.is_match(projection.trim()) {
        "the projection already includes a unique id column"
    } else if GROUP_BY.is_match(text) {
        "GROUP BY already yields one row per group"
    } else {
        return None;
    };

    Some(
        Issue::new(
            IssueType::SuboptimalPattern,
            Severity::Low,
            "DISTINCT over already-unique rows",
            format!(
                "DISTINCT forces a sort or hash to remove duplicates, but {}.",
                reason
            ),
            "Remove DISTINCT; the rows are already unique",
        )
        .with_metric("pattern", "redundant_distinct"),
    )
}

fn check_multiple_or(text: &str) -> Option<Issue> {
    let segments: Vec<&str> = OR_SPLIT.split(text).collect();
    if segments.len() < MIN_OR_CONDITIONS {
        return None;
    }

    let mut best: Option<(String, usize)> = None;
    let mut current: Option<(String, usize)> = None;

    for pair in segments.windows(2) {
        let left = TRAILING_EQ.captures(pair[0]).map(|c| column_key(&c[1]));
        let right = LEADING_EQ.captures(pair[1]).map(|c| column_key(&c[1]));

        match (left, right) {
            (Some(l), Some(r)) if l == r => match current.as_mut() {
                // Extend the run only when the left segment is a bare comparison
                Some((col, n)) if *col == l && SOLE_EQ.is_match(pair[0]) => *n += 1,
                _ => current = Some((l, 2)),
            },
            _ => current = None,
        }

        if let Some((col, n)) = &current {
            if best.as_ref().map_or(true, |(_, b)| n > b) {
                best = Some((col.clone(), *n));
            }
        }
    }

    let (column, count) = best.filter(|(_, n)| *n >= MIN_OR_CONDITIONS)?;
    Some(
        Issue::new(
            IssueType::SuboptimalPattern,
            Severity::Low,
            format!("{} OR conditions on {}", count, column),
            format!(
                "The predicate compares {} against {} values with OR. A chain of ORs \
                 is harder for the planner to turn into a single index lookup.",
                column, count
            ),
            format!("Rewrite as {} IN (...)", column),
        )
        .with_affected(column)
        .with_metric("or_conditions", count)
        .with_metric("pattern", "multiple_or"),
    )
}

fn check_projection_subquery(text: &str) -> Option<Issue> {
    let start = find_top_level_select(text)?;
    let projection = projection_list(text, start + "select".len())?;
    let count = PAREN_SELECT.find_iter(projection).count();
    if count == 0 {
        return None;
    }
    Some(
        Issue::new(
            IssueType::SuboptimalPattern,
            Severity::Medium,
            "Subquery in SELECT list",
            format!(
                "The projection contains {} correlated subquer{} evaluated once per output row.",
                count,
                if count == 1 { "y" } else { "ies" }
            ),
            "Move the subquery into a JOIN (or LATERAL join) so it runs once",
        )
        .with_metric("projection_subqueries", count)
        .with_metric("pattern", "projection_subquery"),
    )
}

fn check_not_in_subquery(text: &str) -> Option<Issue> {
    let caps = NOT_IN_SUBQUERY.captures(text)?;
    let column = column_key(&caps[1]);
    Some(
        Issue::new(
            IssueType::SuboptimalPattern,
            Severity::Medium,
            "NOT IN (subquery)",
            "NOT IN over a subquery cannot use an anti-join when the subquery may \
             return NULLs, and returns no rows at all if it does.",
            "Rewrite as NOT EXISTS (SELECT 1 ...) or LEFT JOIN ... WHERE key IS NULL",
        )
        .with_affected(column)
        .with_metric("pattern", "not_in_subquery"),
    )
}

fn check_leading_wildcard_like(text: &str) -> Option<Issue> {
    let caps = LEADING_WILDCARD_LIKE.captures(text)?;
    let column = column_key(&caps[1]);
    Some(
        Issue::new(
            IssueType::SuboptimalPattern,
            Severity::Medium,
            format!("Leading wildcard LIKE on {}", column),
            "A pattern starting with % cannot use a B-tree index, so every row is \
             examined.",
            "Anchor the pattern at the start, or use a trigram (pg_trgm) or full-text index",
        )
        .with_affected(column)
        .with_metric("pattern", "leading_wildcard_like"),
    )
}

fn check_function_on_column(text: &str) -> Option<Issue> {
    for region in PREDICATE_REGION.captures_iter(text) {
        let body = &region[1];
        for caps in WRAPPED_COLUMN.captures_iter(body) {
            let function = caps[1].to_ascii_lowercase();
            let column = caps[2].to_ascii_lowercase();
            if is_not_a_function(&function) || is_keyword(&column) {
                continue;
            }
            return Some(
                Issue::new(
                    IssueType::SuboptimalPattern,
                    Severity::Medium,
                    format!("Function {}() wraps column {} in a predicate", function, column),
                    format!(
                        "Applying {}() to {} hides the column from ordinary indexes, \
                         forcing a scan.",
                        function, column
                    ),
                    format!(
                        "Compare the bare column, or create an expression index on ({}({}))",
                        function, column
                    ),
                )
                .with_affected(column)
                .with_metric("function", function)
                .with_metric("pattern", "function_on_column"),
            );
        }
    }
    None
}

fn is_not_a_function(word: &str) -> bool {
    matches!(
        word,
        "and" | "or" | "not" | "in" | "exists" | "any" | "all" | "some" | "values" | "when"
            | "then" | "else" | "case" | "as" | "on" | "where" | "over" | "select" | "using"
    )
}

fn is_keyword(word: &str) -> bool {
    matches!(word, "select" | "null" | "true" | "false" | "distinct" | "case")
}

fn column_key(raw: &str) -> String {
    raw.replace('"', "").to_lowercase()
}

/// Byte offset of the first SELECT at paren depth zero.
fn find_top_level_select(text: &str) -> Option<usize> {
    let lower = text.to_ascii_lowercase();
    let bytes = lower.as_bytes();
    let mut depth = 0i32;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'(' => depth += 1,
            b')' => depth -= 1,
            _ if depth == 0 && keyword_at(bytes, i, b"select") => return Some(i),
            _ => {}
        }
    }
    None
}

/// The projection list starting at byte offset `start` (just past SELECT):
/// everything up to the FROM at the same paren depth (or the end of text).
pub(crate) fn projection_list(text: &str, start: usize) -> Option<&str> {
    if start > text.len() {
        return None;
    }
    let lower = text.to_ascii_lowercase();
    let bytes = lower.as_bytes();
    let mut depth = 0i32;
    for i in start..bytes.len() {
        match bytes[i] {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth < 0 {
                    return text.get(start..i);
                }
            }
            _ if depth == 0 && keyword_at(bytes, i, b"from") => return text.get(start..i),
            _ => {}
        }
    }
    text.get(start..)
}

fn keyword_at(bytes: &[u8], i: usize, keyword: &[u8]) -> bool {
    let end = i + keyword.len();
    if end > bytes.len() || &bytes[i..end] != keyword {
        return false;
    }
    let is_word = |b: u8| b.is_ascii_alphanumeric() || b == b'_';
    let before_ok = i == 0 || !is_word(bytes[i - 1]);
    let after_ok = end == bytes.len() || !is_word(bytes[end]);
    before_ok && after_ok
}
