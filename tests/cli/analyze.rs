//! Integration tests for `plancheck analyze`.

use crate::common::{
    parse_json, pg_seq_scan, stderr, stdout, Workspace, MYSQL_TABLE_SCAN, PG_NESTED_LOOP,
};

// ============================================================================
// Exit codes
// ============================================================================

#[test]
fn test_clean_query_exits_zero() {
    let ws = Workspace::new();
    ws.write("q.sql", "SELECT id FROM users WHERE id = 1");

    let output = ws.run_plancheck_exit(&["analyze", "--sql", "q.sql"], 0);
    assert!(stdout(&output).contains("No performance issues detected."));
}

#[test]
fn test_findings_exit_one() {
    let ws = Workspace::new();
    ws.write("q.sql", "SELECT * FROM users");

    let output = ws.run_plancheck_exit(&["analyze", "--sql", "q.sql"], 1);
    let out = stdout(&output);
    assert!(out.contains("ISSUES:"), "{}", out);
    assert!(out.contains("SELECT * retrieves every column"), "{}", out);
}

#[test]
fn test_n_plus_one_batch_exits_two() {
    let ws = Workspace::new();
    ws.write("q.sql", "SELECT id FROM orders WHERE customer_id = 7");
    ws.write("plan.json", &pg_seq_scan("orders", 500, "(customer_id = 7)"));
    let batch: String = (0..30)
        .map(|i| format!("SELECT name FROM customers WHERE id = {}\n", i))
        .collect();
    ws.write("batch.sql", &batch);

    ws.run_plancheck_exit(
        &[
            "analyze", "--sql", "q.sql", "--engine", "pg", "--plan", "plan.json", "--batch",
            "batch.sql",
        ],
        2,
    );
}

#[test]
fn test_batch_without_plan_exits_two() {
    let ws = Workspace::new();
    ws.write("q.sql", "SELECT id FROM orders WHERE customer_id = 7");
    ws.write("batch.sql", &"SELECT name FROM customers WHERE id = 7\n".repeat(30));

    let output = ws.run_plancheck_exit(
        &["analyze", "--sql", "q.sql", "--batch", "batch.sql", "--json"],
        2,
    );
    let json = parse_json(&output);
    assert_eq!(json["severity"], "critical");
    assert_eq!(json["data"]["issues"][0]["issue_type"], "orm_generated");
}

#[test]
fn test_missing_sql_file_is_operational_failure() {
    let ws = Workspace::new();
    let output = ws.run_plancheck_exit(&["analyze", "--sql", "missing.sql"], 10);
    assert!(stderr(&output).contains("missing.sql"));
}

#[test]
fn test_engine_without_plan_is_usage_error() {
    let ws = Workspace::new();
    ws.write("q.sql", "SELECT 1");
    let output = ws.run_plancheck(&["analyze", "--sql", "q.sql", "--engine", "pg"]);
    assert!(!output.status.success());
}

// ============================================================================
// JSON output
// ============================================================================

#[test]
fn test_json_envelope() {
    let ws = Workspace::new();
    ws.write("q.sql", "SELECT id, total FROM orders WHERE status = 'open'");
    ws.write("plan.txt", MYSQL_TABLE_SCAN);

    let output = ws.run_plancheck_exit(
        &[
            "analyze", "--sql", "q.sql", "--engine", "mysql", "--plan", "plan.txt", "--json",
        ],
        1,
    );
    let json = parse_json(&output);

    assert_eq!(json["ok"], true);
    assert_eq!(json["schema_id"], "plancheck.analysis");
    assert!(json["schema_version"].is_string());
    assert!(json["tool_version"].is_string());
    assert!(json["generated_at"].is_string());
    assert_eq!(json["severity"], "warning");
    assert!(json.get("warnings").is_none());

    let data = &json["data"];
    assert_eq!(data["issues"][0]["issue_type"], "missing_index");
    assert_eq!(data["issues"][0]["severity"], "high");
    let total = data["total_issues"].as_u64().unwrap();
    let counts = &data["severity_counts"];
    let sum: u64 = ["critical", "high", "medium", "low"]
        .iter()
        .map(|k| counts[*k].as_u64().unwrap())
        .sum();
    assert_eq!(sum, total);
}

#[test]
fn test_unsupported_engine_reports_warning_and_runs_text_checks() {
    let ws = Workspace::new();
    ws.write("q.sql", "SELECT * FROM users");
    ws.write("plan.json", PG_NESTED_LOOP);

    let output = ws.run_plancheck_exit(
        &[
            "analyze", "--sql", "q.sql", "--engine", "sybase", "--plan", "plan.json", "--json",
        ],
        1,
    );
    let json = parse_json(&output);
    let warning = json["warnings"][0].as_str().unwrap();
    assert!(warning.contains("unsupported engine 'sybase'"), "{}", warning);
    assert_eq!(json["data"]["total_issues"], 1);
}

#[test]
fn test_stats_file_drives_stale_statistics() {
    let ws = Workspace::new();
    ws.write("q.sql", "SELECT id FROM orders WHERE status = 'open'");
    ws.write("plan.json", &pg_seq_scan("orders", 500, "(status = 'open'::text)"));
    ws.write("stats.json", r#"{"orders": {"row_count": 500}}"#);

    let output = ws.run_plancheck_exit(
        &[
            "analyze", "--sql", "q.sql", "--engine", "postgresql", "--plan", "plan.json",
            "--stats", "stats.json", "--json",
        ],
        1,
    );
    let json = parse_json(&output);
    let issues = json["data"]["issues"].as_array().unwrap();
    assert!(issues
        .iter()
        .any(|i| i["issue_type"] == "stale_statistics" && i["severity"] == "high"));
}

#[test]
fn test_invalid_stats_file_is_operational_failure() {
    let ws = Workspace::new();
    ws.write("q.sql", "SELECT 1");
    ws.write("stats.json", "not json");

    let output =
        ws.run_plancheck_exit(&["analyze", "--sql", "q.sql", "--stats", "stats.json", "--json"], 10);
    let json = parse_json(&output);
    assert_eq!(json["ok"], false);
    assert_eq!(json["schema_id"], "plancheck.error");
    assert!(json["errors"][0]["message"]
        .as_str()
        .unwrap()
        .contains("stats.json"));
}

#[test]
fn test_sql_from_stdin() {
    let ws = Workspace::new();
    let output = ws.run_plancheck_stdin(
        &["analyze", "--sql", "-", "--json"],
        "SELECT * FROM t WHERE a=1 OR a=2 OR a=3 OR a=4",
    );
    assert_eq!(output.status.code(), Some(1));
    let json = parse_json(&output);
    assert_eq!(json["data"]["total_issues"], 2);
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_config_thresholds_apply() {
    let ws = Workspace::new();
    ws.write("q.sql", "SELECT id, total FROM orders WHERE status = 'open'");
    ws.write("plan.txt", MYSQL_TABLE_SCAN);
    ws.write("plancheck.toml", "[thresholds]\nlarge_table_rows = 1000000\n");

    ws.run_plancheck_exit(
        &["analyze", "--sql", "q.sql", "--engine", "mysql", "--plan", "plan.txt"],
        0,
    );
}

#[test]
fn test_invalid_config_exits_twelve() {
    let ws = Workspace::new();
    ws.write("q.sql", "SELECT 1");
    ws.write("bad.toml", "[thresholds]\nmin_cache_hit_ratio = 4.0\n");

    let output =
        ws.run_plancheck_exit(&["--config", "bad.toml", "analyze", "--sql", "q.sql"], 12);
    assert!(stderr(&output).contains("min_cache_hit_ratio"));
}

#[test]
fn test_missing_explicit_config_exits_twelve() {
    let ws = Workspace::new();
    ws.write("q.sql", "SELECT 1");

    let output = ws.run_plancheck_exit(
        &["analyze", "--sql", "q.sql", "--config", "nope.toml", "--json"],
        12,
    );
    let json = parse_json(&output);
    assert_eq!(json["errors"][0]["code"], "config_error");
}
