//! Validation gate for extracted candidates.
//!
//! A candidate is accepted only if it reads like a statement: long enough,
//! not just comments, starts with a statement keyword, has a structural
//! clause, and carries none of the phrases a model uses to report failure.

use regex::Regex;
use sqlparser::dialect::{GenericDialect, PostgreSqlDialect};
use sqlparser::parser::Parser;
use std::sync::LazyLock;
use thiserror::Error;

use crate::sql;

const MIN_CANDIDATE_CHARS: usize = 10;

const STATEMENT_KEYWORDS: [&str; 5] = ["SELECT", "WITH", "UPDATE", "INSERT", "DELETE"];

/// Phrases that mark a response as the model's own failure report
pub const ERROR_PHRASES: [&str; 14] = [
    "could not parse",
    "couldn't parse",
    "optimization failed",
    "failed to optimize",
    "unable to optimize",
    "cannot be optimized",
    "error:",
    "syntax error",
    "i cannot",
    "i can't",
    "i'm sorry",
    "i apologize",
    "as an ai",
    "no optimization possible",
];

static STRUCTURAL_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:from|where|join|set|values)\b").expect("valid regex")
});

/// Why a candidate was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("no candidate found")]
    NotFound,
    #[error("too short ({0} characters)")]
    TooShort(usize),
    #[error("nothing left after removing comments")]
    OnlyComments,
    #[error("does not start with a SQL statement keyword")]
    NoStatementKeyword,
    #[error("contains error phrase '{0}'")]
    ErrorPhrase(String),
    #[error("no FROM, WHERE, JOIN, SET or VALUES clause")]
    NoStructuralKeyword,
}

/// Check a candidate against the gate. `extra_phrases` extend
/// [`ERROR_PHRASES`] and are matched case-insensitively.
pub fn check(candidate: &str, extra_phrases: &[String]) -> Result<(), Rejection> {
    let candidate = candidate.trim();
    let chars = candidate.chars().count();
    if chars < MIN_CANDIDATE_CHARS {
        return Err(Rejection::TooShort(chars));
    }

    let body = sql::strip_comments(candidate);
    let body = body.trim();
    if body.is_empty() {
        return Err(Rejection::OnlyComments);
    }

    let first_word: String = body
        .trim_start_matches('(')
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_uppercase();
    if !STATEMENT_KEYWORDS.contains(&first_word.as_str()) {
        return Err(Rejection::NoStatementKeyword);
    }

    if let Some(phrase) = error_phrase(candidate, extra_phrases) {
        return Err(Rejection::ErrorPhrase(phrase));
    }

    if !STRUCTURAL_KEYWORD.is_match(&sql::mask_literals(body)) {
        return Err(Rejection::NoStructuralKeyword);
    }

    Ok(())
}

/// First error phrase found in `text`, lowercased.
pub fn error_phrase(text: &str, extra_phrases: &[String]) -> Option<String> {
    let lower = text.to_lowercase();
    let extra = extra_phrases.iter().map(|p| p.to_lowercase());
    ERROR_PHRASES
        .iter()
        .map(|p| p.to_string())
        .chain(extra)
        .find(|p| !p.is_empty() && lower.contains(p.as_str()))
}

/// Whether a SQL parser accepts the statement (PostgreSQL dialect, then
/// generic).
pub fn parses(statement: &str) -> bool {
    Parser::parse_sql(&PostgreSqlDialect {}, statement).is_ok()
        || Parser::parse_sql(&GenericDialect {}, statement).is_ok()
}
