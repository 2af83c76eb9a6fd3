//! Integration tests for `plancheck rewrite`.

use crate::common::{parse_json, stdout, Workspace};

#[test]
fn test_recovered_statement_exits_zero() {
    let ws = Workspace::new();
    ws.write(
        "response.txt",
        "Sure! Here is a faster version:\n\n```sql\nSELECT id, email FROM users WHERE email = $1;\n```\n",
    );

    let output = ws.run_plancheck_exit(&["rewrite", "--response", "response.txt"], 0);
    let out = stdout(&output);
    assert!(out.contains("Method: CodeBlock"), "{}", out);
    assert!(out.contains("SELECT id, email FROM users WHERE email = $1;"), "{}", out);
}

#[test]
fn test_quiet_prints_only_the_statement() {
    let ws = Workspace::new();
    ws.write("response.txt", "<sql>SELECT id FROM users</sql>");

    let output = ws.run_plancheck_exit(&["rewrite", "--response", "response.txt", "--quiet"], 0);
    assert_eq!(stdout(&output).trim(), "SELECT id FROM users");
}

#[test]
fn test_error_response_exits_one_with_failed_method() {
    let ws = Workspace::new();
    ws.write("response.txt", "-- Optimization failed: could not parse");

    let output = ws.run_plancheck_exit(&["rewrite", "--response", "response.txt", "--json"], 1);
    let json = parse_json(&output);
    assert_eq!(json["ok"], true);
    assert_eq!(json["schema_id"], "plancheck.rewrite");
    assert_eq!(json["severity"], "warning");
    assert_eq!(json["data"]["success"], false);
    assert_eq!(json["data"]["parse_method"], "failed");
    assert_eq!(json["data"]["attempts"].as_array().unwrap().len(), 6);
    assert_eq!(
        json["data"]["raw_response_excerpt"],
        "-- Optimization failed: could not parse"
    );
}

#[test]
fn test_original_marks_unchanged_rewrite() {
    let ws = Workspace::new();
    ws.write("response.txt", "<sql>select id\nfrom users;</sql>");
    ws.write("original.sql", "SELECT id FROM users");

    let output = ws.run_plancheck_exit(
        &[
            "rewrite", "--response", "response.txt", "--original", "original.sql", "--json",
        ],
        0,
    );
    let json = parse_json(&output);
    assert_eq!(json["severity"], "healthy");
    assert_eq!(json["data"]["unchanged"], true);
    assert_eq!(json["data"]["parse_method"], "XmlTag");
}

#[test]
fn test_response_from_stdin() {
    let ws = Workspace::new();
    let output = ws.run_plancheck_stdin(
        &["rewrite", "--response", "-", "--json"],
        "--- OPTIMIZED SQL ---\nSELECT a FROM t WHERE b = 1\n--- EXPLANATION ---\nUses the index on b.",
    );
    assert_eq!(output.status.code(), Some(0));
    let json = parse_json(&output);
    assert_eq!(json["data"]["parse_method"], "SectionMarker");
    assert_eq!(json["data"]["explanation"], "Uses the index on b.");
}

#[test]
fn test_configured_error_phrase() {
    let ws = Workspace::new();
    ws.write("response.txt", "```sql\nSELECT 1 FROM t -- model overloaded\n```");
    ws.write(
        "plancheck.toml",
        "[rewrite]\nextra_error_phrases = [\"model overloaded\"]\n",
    );

    ws.run_plancheck_exit(&["rewrite", "--response", "response.txt"], 1);
}
