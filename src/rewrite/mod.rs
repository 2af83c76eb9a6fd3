//! Rewrite interpreter: recover a SQL statement from a free-text model
//! response.
//!
//! Extraction strategies run in a fixed order, from the most explicit
//! (delimiter tags) to the least (the whole response, commented out). The
//! first candidate that passes [`validate::check`] wins. The last strategy
//! never passes, so prose is never returned as SQL.

mod extract;
pub mod validate;

use serde::Serialize;
use std::fmt;

use crate::config::RewriteConfig;
use crate::sql;
use validate::Rejection;

/// `parse_method` value when no strategy produced a valid statement
pub const FAILED: &str = "failed";

/// Characters of each candidate kept in the attempt log
const ATTEMPT_EXCERPT_CHARS: usize = 200;

/// Extraction strategies, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ParseMethod {
    XmlTag,
    SectionMarker,
    CodeBlock,
    Heuristic,
    BestEffort,
    FullFallback,
}

impl ParseMethod {
    pub const ALL: [ParseMethod; 6] = [
        ParseMethod::XmlTag,
        ParseMethod::SectionMarker,
        ParseMethod::CodeBlock,
        ParseMethod::Heuristic,
        ParseMethod::BestEffort,
        ParseMethod::FullFallback,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ParseMethod::XmlTag => "XmlTag",
            ParseMethod::SectionMarker => "SectionMarker",
            ParseMethod::CodeBlock => "CodeBlock",
            ParseMethod::Heuristic => "Heuristic",
            ParseMethod::BestEffort => "BestEffort",
            ParseMethod::FullFallback => "FullFallback",
        }
    }

    fn extract(&self, text: &str) -> Option<String> {
        match self {
            ParseMethod::XmlTag => extract::xml_tag(text),
            ParseMethod::SectionMarker => extract::section_marker(text),
            ParseMethod::CodeBlock => extract::code_block(text),
            ParseMethod::Heuristic => extract::heuristic(text),
            ParseMethod::BestEffort => extract::best_effort(text),
            ParseMethod::FullFallback => extract::full_fallback(text),
        }
    }
}

impl fmt::Display for ParseMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One strategy tried during interpretation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attempt {
    pub method: ParseMethod,
    /// Excerpt of what the strategy extracted, if anything
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted: Option<String>,
    /// Why the candidate was rejected; `None` for the accepted attempt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection: Option<String>,
}

/// Outcome of interpreting one model response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedRewrite {
    pub success: bool,
    /// Accepted statement; empty on failure
    pub sql: String,
    pub explanation: String,
    pub recommendations: String,
    /// Winning strategy name, or "failed"
    pub parse_method: String,
    /// Whether a SQL parser accepts `sql`
    pub is_valid_sql: bool,
    /// Start of the raw response, kept on failure for diagnostics
    #[serde(skip_serializing_if = "String::is_empty")]
    pub raw_response_excerpt: String,
    pub attempts: Vec<Attempt>,
    /// The accepted statement matches the original up to whitespace and case
    pub unchanged: bool,
}

/// Interpreter with configurable error phrases and excerpt length.
#[derive(Debug, Clone, Default)]
pub struct RewriteInterpreter {
    config: RewriteConfig,
}

impl RewriteInterpreter {
    pub fn new(config: RewriteConfig) -> Self {
        Self { config }
    }

    /// Extract and validate a statement from `raw`. `original_sql` may be
    /// empty; it only feeds the `unchanged` flag.
    pub fn interpret(&self, raw: &str, original_sql: &str) -> ParsedRewrite {
        let mut attempts = Vec::with_capacity(ParseMethod::ALL.len());
        let mut accepted: Option<(ParseMethod, String)> = None;

        for method in ParseMethod::ALL {
            let candidate = method.extract(raw);
            let verdict = match &candidate {
                None => Err(Rejection::NotFound),
                Some(c) => validate::check(c, &self.config.extra_error_phrases)
                    .and_then(|()| self.check_lead_in(method, raw)),
            };
            tracing::debug!(
                method = method.as_str(),
                found = candidate.is_some(),
                accepted = verdict.is_ok(),
                "rewrite strategy tried"
            );

            attempts.push(Attempt {
                method,
                extracted: candidate
                    .as_deref()
                    .map(|c| sql::excerpt(c, ATTEMPT_EXCERPT_CHARS)),
                rejection: verdict.as_ref().err().map(|r| r.to_string()),
            });

            if let (Some(candidate), Ok(())) = (candidate, verdict) {
                accepted = Some((method, candidate.trim().to_string()));
                break;
            }
        }

        let explanation = extract::explanation(raw);
        let recommendations = extract::recommendations(raw);

        match accepted {
            Some((method, statement)) => ParsedRewrite {
                success: true,
                is_valid_sql: validate::parses(&statement),
                unchanged: !original_sql.trim().is_empty()
                    && same_statement(&statement, original_sql),
                sql: statement,
                explanation,
                recommendations,
                parse_method: method.as_str().to_string(),
                raw_response_excerpt: String::new(),
                attempts,
            },
            None => {
                tracing::debug!(attempts = attempts.len(), "no valid statement in response");
                ParsedRewrite {
                    success: false,
                    sql: String::new(),
                    explanation,
                    recommendations,
                    parse_method: FAILED.to_string(),
                    is_valid_sql: false,
                    raw_response_excerpt: sql::excerpt(raw, self.config.excerpt_chars),
                    attempts,
                    unchanged: false,
                }
            }
        }
    }

    /// The heuristic cuts its candidate out of a paragraph; an apology or
    /// failure report in front of it rejects the candidate too.
    fn check_lead_in(&self, method: ParseMethod, raw: &str) -> Result<(), Rejection> {
        if method != ParseMethod::Heuristic {
            return Ok(());
        }
        match validate::error_phrase(
            extract::heuristic_lead_in(raw),
            &self.config.extra_error_phrases,
        ) {
            Some(phrase) => Err(Rejection::ErrorPhrase(phrase)),
            None => Ok(()),
        }
    }
}

/// Interpret with the default configuration.
pub fn interpret(raw: &str, original_sql: &str) -> ParsedRewrite {
    RewriteInterpreter::default().interpret(raw, original_sql)
}

fn same_statement(a: &str, b: &str) -> bool {
    fn canonical(s: &str) -> String {
        s.split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .trim_end_matches(';')
            .trim_end()
            .to_lowercase()
    }
    canonical(a) == canonical(b)
}
