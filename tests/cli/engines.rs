//! Integration tests for `plancheck engines` and global flags.

use crate::common::{parse_json, stdout, Workspace};

#[test]
fn test_engines_human() {
    let ws = Workspace::new();
    let output = ws.run_plancheck_exit(&["engines"], 0);
    let out = stdout(&output);
    for name in ["postgresql", "oracle", "mysql"] {
        assert!(out.contains(name), "missing {}: {}", name, out);
    }
}

#[test]
fn test_engines_json() {
    let ws = Workspace::new();
    let output = ws.run_plancheck_exit(&["engines", "--json"], 0);
    let json = parse_json(&output);
    assert_eq!(json["schema_id"], "plancheck.engines");
    assert_eq!(json["severity"], "healthy");

    let engines = json["data"].as_array().unwrap();
    assert_eq!(engines.len(), 3);
    assert_eq!(engines[0]["name"], "postgresql");
    assert_eq!(engines[0]["plan_shape"], "tree");
    assert_eq!(engines[0]["aliases"][1], "pg");
    assert_eq!(engines[2]["plan_shape"], "text");
}

#[test]
fn test_version_json() {
    let ws = Workspace::new();
    let output = ws.run_plancheck_exit(&["--version", "--json"], 0);
    let json = parse_json(&output);
    assert_eq!(json["ok"], true);
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[test]
fn test_unknown_subcommand_json_is_usage_error() {
    let ws = Workspace::new();
    let output = ws.run_plancheck_exit(&["explain", "--json"], 10);
    let json = parse_json(&output);
    assert_eq!(json["ok"], false);
    assert_eq!(json["errors"][0]["code"], "usage_error");
}
