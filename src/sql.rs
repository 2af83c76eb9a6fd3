//! SQL text utilities: comment stripping, literal masking, identifier
//! quoting, and structural fingerprints.
//!
//! None of these parse SQL. They are lexical passes that understand just
//! enough (single-quoted literals, `--` and `/* */` comments) to keep the
//! detectors from matching inside strings or comments.

use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::LazyLock;

/// Maximum excerpt length (characters) for diagnostics.
pub const MAX_EXCERPT_LENGTH: usize = 500;

static NUMBER_LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d+(\.\d+)?\b").expect("valid regex"));
static IN_LIST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bin\s*\(\s*\?(\s*,\s*\?)*\s*\)").expect("valid regex"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
static SIMPLE_IDENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z_][a-z0-9_$]*$").expect("valid regex"));

/// Quote a PostgreSQL identifier only when it would not survive unquoted.
///
/// Lowercase identifiers made of letters, digits, `_` and `$` pass through
/// untouched; anything else is wrapped in double quotes with embedded quotes
/// doubled.
pub fn quote_ident(s: &str) -> String {
    if SIMPLE_IDENT.is_match(s) && !is_reserved(s) {
        s.to_string()
    } else {
        format!("\"{}\"", s.replace('"', "\"\""))
    }
}

fn is_reserved(s: &str) -> bool {
    matches!(
        s,
        "user" | "table" | "select" | "order" | "group" | "from" | "where" | "limit" | "index"
    )
}

/// Remove `--` line comments and `/* */` block comments, leaving literals intact.
pub fn strip_comments(sql: &str) -> String {
    let mut result = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            result.push(c);
            if c == '\'' {
                if chars.peek() == Some(&'\'') {
                    // Escaped quote
                    result.push('\'');
                    chars.next();
                } else {
                    in_string = false;
                }
            }
            continue;
        }

        match c {
            '\'' => {
                in_string = true;
                result.push(c);
            }
            '-' if chars.peek() == Some(&'-') => {
                // Line comment: skip to end of line, keep the newline
                for next in chars.by_ref() {
                    if next == '\n' {
                        result.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = ' ';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
                result.push(' ');
            }
            _ => result.push(c),
        }
    }

    result
}

/// Replace the contents of single-quoted literals with `?`, keeping the quotes.
///
/// `WHERE name = 'O''Brien'` becomes `WHERE name = '?'`.
pub fn mask_literals(sql: &str) -> String {
    let mut result = String::with_capacity(sql.len());
    let mut in_string = false;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        if in_string {
            if c == '\'' {
                if chars.peek() == Some(&'\'') {
                    chars.next();
                } else {
                    result.push_str("?'");
                    in_string = false;
                }
            }
        } else if c == '\'' {
            in_string = true;
            result.push('\'');
        } else {
            result.push(c);
        }
    }

    // Unterminated literal
    if in_string {
        result.push_str("?'");
    }

    result
}

/// Text the detectors scan: comments removed, literal contents masked.
pub fn scannable(sql: &str) -> String {
    mask_literals(&strip_comments(sql))
}

/// Normalized structural form of a statement: literals and numbers replaced
/// by `?`, `IN` lists collapsed, whitespace collapsed, lowercased.
///
/// Two statements that differ only in parameter values normalize equally.
pub fn normalize_structure(sql: &str) -> String {
    let masked = scannable(sql).replace("'?'", "?");
    let numbers = NUMBER_LITERAL.replace_all(&masked, "?");
    let lists = IN_LIST.replace_all(&numbers, "in (?)");
    let collapsed = WHITESPACE.replace_all(lists.trim(), " ");
    collapsed
        .trim_end_matches(';')
        .trim()
        .to_lowercase()
}

/// Stable fingerprint of a statement's structure (hex SHA-256 prefix).
pub fn fingerprint(sql: &str) -> String {
    let digest = Sha256::digest(normalize_structure(sql).as_bytes());
    hex::encode(&digest[..8])
}

/// First `max_chars` characters of `text`, with `...` appended when cut.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
