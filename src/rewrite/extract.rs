//! Extraction strategies, tried in order by the interpreter.
//!
//! Each is a pure function from the raw response to an optional candidate.
//! None of them validate; that is the interpreter's job.

use regex::Regex;
use std::sync::LazyLock;

/// Tags that may wrap the rewritten statement, in preference order
const SQL_TAGS: [&str; 5] = ["sql", "optimized_sql", "optimized_query", "rewritten_sql", "query"];

/// Keyword hits a multi-line run needs before it counts as SQL
const MIN_RUN_KEYWORDS: usize = 3;
/// Shortest single line accepted as a last resort
const MIN_LINE_CHARS: usize = 20;

static TAG_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    SQL_TAGS
        .iter()
        .map(|tag| tag_regex(tag))
        .collect()
});
static EXPLANATION_TAG: LazyLock<Regex> = LazyLock::new(|| tag_regex("explanation"));
static RECOMMENDATIONS_TAG: LazyLock<Regex> = LazyLock::new(|| tag_regex("recommendations"));
// `--- LABEL ---`, `--- LABEL:` or `--- LABEL`
static SECTION_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*-{3,}\s*([A-Za-z][A-Za-z0-9 _/()]*?)\s*:?\s*(?:-{3,})?\s*$")
        .expect("valid regex")
});
static RULE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*-{3,}\s*$").expect("valid regex"));
// Label line under a rule; text after the colon starts the body
static LABEL_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z][A-Za-z0-9 _/()]*?)\s*:\s*(.*)$").expect("valid regex")
});
static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[ \t]*([A-Za-z0-9_+-]*)[^\n]*\n(.*?)```").expect("valid regex")
});
// Any case at the start of a line, uppercase after a `:` lead-in
static SQL_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^[ \t]*((?i:select|with|update|insert|delete))\b|:[ \t]*(SELECT|WITH|UPDATE|INSERT|DELETE)\b",
    )
    .expect("valid regex")
});
static LINE_STARTS_SQL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*\(?\s*(?:select|with|update|insert|delete)\b").expect("valid regex")
});
static BLANK_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*\r?\n").expect("valid regex"));
static SQL_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:select|from|where|join|inner|left|right|outer|on|group|order|by|having|limit|offset|insert|into|values|update|set|delete|with|as|union|distinct|exists|case|when|then|end)\b",
    )
    .expect("valid regex")
});

fn tag_regex(tag: &str) -> Regex {
    Regex::new(&format!(r"(?is)<{tag}>\s*(.*?)\s*</{tag}>")).expect("valid regex")
}

/// Explicit `<sql>...</sql>`-style delimiters.
pub(super) fn xml_tag(text: &str) -> Option<String> {
    TAG_PATTERNS
        .iter()
        .filter_map(|re| re.captures(text))
        .map(|caps| unfence(&caps[1]))
        .find(|s| !s.is_empty())
}

/// A dashed header naming the SQL (`--- OPTIMIZED QUERY ---`, or a dash
/// rule followed by `OPTIMIZED QUERY:`), up to the next dashed line.
pub(super) fn section_marker(text: &str) -> Option<String> {
    section(text, |label| {
        (label.contains("SQL") || label.contains("QUERY"))
            && !label.contains("ORIGINAL")
            && !label.contains("EXPLANATION")
    })
    .map(|s| unfence(&s))
    .filter(|s| !s.is_empty())
}

/// First fenced code block, preferring blocks tagged `sql`.
pub(super) fn code_block(text: &str) -> Option<String> {
    let blocks: Vec<(String, String)> = CODE_FENCE
        .captures_iter(text)
        .map(|caps| (caps[1].to_lowercase(), caps[2].trim().to_string()))
        .filter(|(_, body)| !body.is_empty())
        .collect();

    blocks
        .iter()
        .find(|(lang, _)| lang == "sql")
        .or_else(|| blocks.first())
        .map(|(_, body)| body.clone())
}

/// From the first SQL-starting keyword to the next blank line.
///
/// The keyword must open a line or follow a colon; mid-sentence mentions of
/// `SELECT` in prose are not statements.
pub(super) fn heuristic(text: &str) -> Option<String> {
    let start = heuristic_start(text)?;
    let rest = &text[start..];
    let end = BLANK_LINE.find(rest).map_or(rest.len(), |m| m.start());
    let candidate = rest[..end].trim();
    (!candidate.is_empty()).then(|| candidate.to_string())
}

/// Prose between the start of the heuristic's paragraph and its statement.
pub(super) fn heuristic_lead_in(text: &str) -> &str {
    let Some(start) = heuristic_start(text) else {
        return "";
    };
    let before = &text[..start];
    let paragraph = BLANK_LINE.find_iter(before).last().map_or(0, |m| m.end());
    &before[paragraph..]
}

fn heuristic_start(text: &str) -> Option<usize> {
    let caps = SQL_START.captures(text)?;
    caps.get(1).or_else(|| caps.get(2)).map(|m| m.start())
}

/// Highest-scoring contiguous run of non-blank lines, else the best single
/// line.
pub(super) fn best_effort(text: &str) -> Option<String> {
    let lines: Vec<&str> = text.lines().collect();

    let mut best_run: Option<(usize, &[&str])> = None;
    for run in lines.split(|l| l.trim().is_empty()) {
        if run.is_empty() {
            continue;
        }
        // Drop leading prose so the run starts at the statement
        let run = match run.iter().position(|l| LINE_STARTS_SQL.is_match(l)) {
            Some(i) => &run[i..],
            None => run,
        };
        let score: usize = run.iter().map(|l| keyword_hits(l)).sum();
        if best_run.map_or(true, |(s, _)| score > s) {
            best_run = Some((score, run));
        }
    }
    if let Some((score, run)) = best_run {
        if score >= MIN_RUN_KEYWORDS {
            return Some(run.join("\n").trim().to_string());
        }
    }

    let mut best_line: Option<(usize, &str)> = None;
    for line in &lines {
        let line = line.trim();
        if line.chars().count() < MIN_LINE_CHARS {
            continue;
        }
        let hits = keyword_hits(line);
        if hits > 0 && best_line.map_or(true, |(h, _)| hits > h) {
            best_line = Some((hits, line));
        }
    }
    best_line.map(|(_, line)| line.to_string())
}

/// The whole response with every line commented out.
pub(super) fn full_fallback(text: &str) -> Option<String> {
    let commented: Vec<String> = text.lines().map(|l| format!("-- {}", l)).collect();
    Some(commented.join("\n"))
}

pub(super) fn explanation(text: &str) -> String {
    tagged_or_section(text, &EXPLANATION_TAG, "EXPLANATION")
}

pub(super) fn recommendations(text: &str) -> String {
    tagged_or_section(text, &RECOMMENDATIONS_TAG, "RECOMMENDATION")
}

fn tagged_or_section(text: &str, tag: &Regex, label: &str) -> String {
    if let Some(caps) = tag.captures(text) {
        return caps[1].trim().to_string();
    }
    section(text, |l| l.contains(label)).unwrap_or_default()
}

/// A section boundary: its label (empty for a bare rule), any text after the
/// label's colon, and how many lines it spans.
struct Header<'a> {
    label: &'a str,
    inline: &'a str,
    lines: usize,
}

fn header_at<'a>(lines: &[&'a str], i: usize) -> Option<Header<'a>> {
    let line = lines[i];
    if RULE_LINE.is_match(line) {
        let labelled = lines
            .get(i + 1)
            .copied()
            .and_then(|next| LABEL_LINE.captures(next));
        return Some(match labelled {
            Some(caps) => Header {
                label: caps.get(1).map_or("", |m| m.as_str()),
                inline: caps.get(2).map_or("", |m| m.as_str()),
                lines: 2,
            },
            None => Header {
                label: "",
                inline: "",
                lines: 1,
            },
        });
    }
    SECTION_HEADER.captures(line).map(|caps| Header {
        label: caps.get(1).map_or("", |m| m.as_str()),
        inline: "",
        lines: 1,
    })
}

/// Body of the first dashed section whose uppercased label satisfies `want`.
/// The body runs to the next dashed line of any kind.
fn section(text: &str, want: impl Fn(&str) -> bool) -> Option<String> {
    let lines: Vec<&str> = text.lines().collect();
    let mut body: Option<Vec<&str>> = None;
    let mut i = 0;
    while i < lines.len() {
        match header_at(&lines, i) {
            Some(header) => {
                if body.is_some() {
                    break;
                }
                if !header.label.is_empty() && want(&header.label.to_uppercase()) {
                    let mut first = Vec::new();
                    if !header.inline.trim().is_empty() {
                        first.push(header.inline);
                    }
                    body = Some(first);
                }
                i += header.lines;
            }
            None => {
                if let Some(body) = body.as_mut() {
                    body.push(lines[i]);
                }
                i += 1;
            }
        }
    }
    body.map(|lines| lines.join("\n").trim().to_string())
}

/// Strip a surrounding code fence, if the candidate is one.
fn unfence(candidate: &str) -> String {
    let trimmed = candidate.trim();
    match CODE_FENCE.captures(trimmed) {
        Some(caps) if trimmed.starts_with("```") => caps[2].trim().to_string(),
        _ => trimmed.to_string(),
    }
}

fn keyword_hits(line: &str) -> usize {
    SQL_KEYWORD.find_iter(line).count()
}
