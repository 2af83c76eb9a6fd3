//! Common test infrastructure for plancheck integration tests.
//!
//! Provides:
//! - Workspace: temp directory holding query, plan, stats and response files
//! - Binary runner with an isolated environment
//! - Plan fixtures for each supported engine
//! - Output assertion helpers

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

use chrono::{DateTime, TimeZone, Utc};

/// Fixed reference time so statistics ages are deterministic
pub fn as_of() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

/// A temp directory to write input files into and run the binary from.
pub struct Workspace {
    pub dir: tempfile::TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("Failed to create temp dir"),
        }
    }

    /// Write a file into the workspace and return its name
    pub fn write(&self, name: &str, contents: &str) -> String {
        std::fs::write(self.path(name), contents)
            .unwrap_or_else(|_| panic!("Failed to write {}", name));
        name.to_string()
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_plancheck"));
        cmd.args(args)
            .current_dir(self.dir.path())
            // Isolate environment
            .env_clear()
            .env("HOME", self.dir.path())
            .env("PATH", std::env::var("PATH").unwrap_or_default())
            .env("NO_COLOR", "1");
        cmd
    }

    /// Run plancheck with isolated environment
    pub fn run_plancheck(&self, args: &[&str]) -> Output {
        self.command(args)
            .output()
            .expect("Failed to execute plancheck")
    }

    /// Run plancheck with `input` on stdin
    pub fn run_plancheck_stdin(&self, args: &[&str], input: &str) -> Output {
        let mut child = self
            .command(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("Failed to spawn plancheck");
        child
            .stdin
            .take()
            .expect("stdin is piped")
            .write_all(input.as_bytes())
            .expect("Failed to write stdin");
        child.wait_with_output().expect("Failed to wait for plancheck")
    }

    /// Run plancheck and assert a specific exit code
    pub fn run_plancheck_exit(&self, args: &[&str], expected_code: i32) -> Output {
        let output = self.run_plancheck(args);
        assert_eq!(
            output.status.code(),
            Some(expected_code),
            "plancheck {:?} expected exit {} but got {:?}:\nstdout: {}\nstderr: {}",
            args,
            expected_code,
            output.status.code(),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        output
    }
}

// ============================================================================
// Plan fixtures
// ============================================================================

/// PostgreSQL EXPLAIN (FORMAT JSON) with a single filtered sequential scan
pub fn pg_seq_scan(table: &str, rows: u64, filter: &str) -> String {
    serde_json::json!([{
        "Plan": {
            "Node Type": "Seq Scan",
            "Relation Name": table,
            "Plan Rows": rows,
            "Total Cost": 4580.0,
            "Filter": filter
        }
    }])
    .to_string()
}

/// PostgreSQL plan: nested loop over a large outer scan and an index lookup
pub const PG_NESTED_LOOP: &str = r#"[{"Plan": {
    "Node Type": "Nested Loop",
    "Plan Rows": 200000,
    "Plans": [
        {"Node Type": "Seq Scan", "Relation Name": "orders", "Plan Rows": 200000,
         "Filter": "(status = 'open'::text)",
         "Shared Hit Blocks": 100, "Shared Read Blocks": 900},
        {"Node Type": "Index Scan", "Relation Name": "customers", "Index Name": "customers_pkey",
         "Plan Rows": 1, "Index Cond": "(id = orders.customer_id)"}
    ]
}}]"#;

/// Oracle PLAN_TABLE rows with a full scan on ORDERS
pub const ORACLE_FULL_SCAN: &str = r#"[
    {"ID": 0, "PARENT_ID": null, "OPERATION": "SELECT STATEMENT", "COST": 812},
    {"ID": 1, "PARENT_ID": 0, "OPERATION": "TABLE ACCESS", "OPTIONS": "FULL",
     "OBJECT_NAME": "ORDERS", "CARDINALITY": 250000,
     "FILTER_PREDICATES": "\"ORDERS\".\"STATUS\"='OPEN'"}
]"#;

/// MySQL EXPLAIN FORMAT=TREE with a filtered table scan
pub const MYSQL_TABLE_SCAN: &str = "\
-> Filter: (orders.status = 'open')  (cost=25010.00 rows=25000)
    -> Table scan on orders  (cost=25010.00 rows=250000)
";

// ============================================================================
// Output assertion helpers
// ============================================================================

/// Parse JSON output and return the value
pub fn parse_json(output: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(&stdout)
        .unwrap_or_else(|e| panic!("Invalid JSON output:\n{}\nError: {}", stdout, e))
}

/// Get stdout as string
pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

/// Get stderr as string
pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}
