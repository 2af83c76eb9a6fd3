use chrono::Duration;
use plancheck::{
    AnalysisRequest, Analyzer, Config, DetectionReport, IssueType, RawPlan, Severity, TableStat,
    TableStats,
};

use crate::common::{as_of, pg_seq_scan, MYSQL_TABLE_SCAN, ORACLE_FULL_SCAN, PG_NESTED_LOOP};

fn count(report: &DetectionReport, kind: IssueType) -> usize {
    report.issues.iter().filter(|i| i.issue_type() == kind).count()
}

fn assert_counts_consistent(report: &DetectionReport) {
    let c = &report.severity_counts;
    assert_eq!(c.critical + c.high + c.medium + c.low, report.total_issues);
    assert_eq!(report.issues.len(), report.total_issues);
    let severities: Vec<Severity> = report.issues.iter().map(|i| i.severity()).collect();
    let mut sorted = severities.clone();
    sorted.sort_by(|a, b| b.cmp(a));
    assert_eq!(severities, sorted, "issues not ordered by severity");
}

const ORDERS_QUERY: &str = "SELECT id, total FROM orders WHERE status = 'open'";

#[test]
fn test_filtered_full_scan_is_missing_index_on_every_engine() {
    for (engine, plan) in [
        ("postgresql", pg_seq_scan("orders", 250_000, "(status = 'open'::text)")),
        ("oracle", ORACLE_FULL_SCAN.to_string()),
        ("mysql", MYSQL_TABLE_SCAN.to_string()),
    ] {
        let request =
            AnalysisRequest::new(ORDERS_QUERY).with_plan(engine, RawPlan::from_contents(&plan));
        let report = Analyzer::default().analyze(&request);

        assert!(report.warnings.is_empty(), "{}: {:?}", engine, report.warnings);
        let issue = report
            .issues
            .iter()
            .find(|i| i.issue_type() == IssueType::MissingIndex)
            .unwrap_or_else(|| panic!("{}: no missing index in {:?}", engine, report.issues));
        assert_eq!(issue.severity(), Severity::High, "{}", engine);
        assert!(issue
            .affected_objects()
            .iter()
            .any(|o| o.eq_ignore_ascii_case("orders")));
        assert!(issue.recommendations()[0].contains("CREATE INDEX"), "{}", engine);
        assert_counts_consistent(&report);
    }
}

#[test]
fn test_mysql_index_recommendation() {
    let request = AnalysisRequest::new(ORDERS_QUERY)
        .with_plan("mysql", RawPlan::from_contents(MYSQL_TABLE_SCAN));
    let report = Analyzer::default().analyze(&request);
    let issue = &report.issues[0];
    assert_eq!(issue.title(), "Missing index on orders (status)");
    assert_eq!(
        issue.recommendations()[0],
        "CREATE INDEX idx_orders_status ON orders (status);"
    );
}

#[test]
fn test_nested_loop_plan_reports_join_index_and_io() {
    let request = AnalysisRequest::new(
        "SELECT o.id, c.name FROM orders o JOIN customers c ON c.id = o.customer_id \
         WHERE o.status = 'open'",
    )
    .with_plan("postgresql", RawPlan::from_contents(PG_NESTED_LOOP));
    let report = Analyzer::default().analyze(&request);

    assert_eq!(count(&report, IssueType::PoorJoinStrategy), 1);
    assert_eq!(count(&report, IssueType::MissingIndex), 1);
    assert_eq!(count(&report, IssueType::HighIoWorkload), 1);
    assert_eq!(report.max_severity(), Some(Severity::High));
    assert_counts_consistent(&report);
}

#[test]
fn test_wildcard_projection_reported_once_with_or_without_plan() {
    let sql = "SELECT * FROM orders WHERE status = 'open'";
    let plan = RawPlan::from_contents(&pg_seq_scan("orders", 500, "(status = 'open'::text)"));

    for request in [
        AnalysisRequest::new(sql),
        AnalysisRequest::new(sql).with_plan("postgresql", plan.clone()),
        AnalysisRequest::new(sql).with_plan("nosuchdb", plan),
    ] {
        let report = Analyzer::default().analyze(&request);
        let wildcard = report
            .issues
            .iter()
            .filter(|i| i.title() == "SELECT * retrieves every column")
            .count();
        assert_eq!(wildcard, 1, "{:?}", report.issues);
    }
}

#[test]
fn test_multiple_or_and_wildcard_only() {
    let report = Analyzer::default()
        .analyze(&AnalysisRequest::new("SELECT * FROM t WHERE a=1 OR a=2 OR a=3 OR a=4"));
    assert_eq!(report.total_issues, 2);
    assert!(report
        .issues
        .iter()
        .all(|i| i.issue_type() == IssueType::SuboptimalPattern));
    assert_eq!(
        report.summary,
        "Found 2 issues: 0 critical, 0 high, 1 medium, 1 low across 1 categories."
    );
}

#[test]
fn test_clean_query_has_no_issues() {
    let request = AnalysisRequest::new("SELECT id FROM users WHERE id = 42").with_plan(
        "postgresql",
        RawPlan::from_contents(
            r#"{"Plan": {"Node Type": "Index Scan", "Relation Name": "users",
                "Index Name": "users_pkey", "Plan Rows": 1, "Index Cond": "(id = 42)"}}"#,
        ),
    );
    let report = Analyzer::default().analyze(&request);
    assert!(report.is_clean(), "{:?}", report.issues);
    assert_eq!(report.summary, "No performance issues detected.");
}

#[test]
fn test_stale_statistics_use_reference_time() {
    let mut stats = TableStats::new();
    stats.insert(
        "public.orders",
        TableStat {
            last_autoanalyze: Some(as_of() - Duration::days(45)),
            row_count: Some(250_000),
            ..Default::default()
        },
    );
    let request = AnalysisRequest::new(ORDERS_QUERY)
        .with_plan(
            "postgresql",
            RawPlan::from_contents(&pg_seq_scan("orders", 250_000, "(status = 'open'::text)")),
        )
        .with_stats(stats)
        .as_of(as_of());
    let report = Analyzer::default().analyze(&request);

    let stale: Vec<_> = report
        .issues
        .iter()
        .filter(|i| i.issue_type() == IssueType::StaleStatistics)
        .collect();
    assert_eq!(stale.len(), 1);
    assert_eq!(stale[0].severity(), Severity::High);
    assert_eq!(stale[0].recommendations()[0], "ANALYZE orders;");
}

#[test]
fn test_repeated_statements_in_batch_are_n_plus_one() {
    let batch: Vec<String> = (0..25)
        .map(|i| format!("SELECT * FROM order_items WHERE order_id = {}", i))
        .chain(std::iter::once("SELECT count(*) FROM orders".to_string()))
        .collect();
    let request = AnalysisRequest::new("SELECT id FROM orders WHERE customer_id = 7")
        .with_plan(
            "postgresql",
            RawPlan::from_contents(&pg_seq_scan("orders", 500, "(customer_id = 7)")),
        )
        .with_batch(batch);
    let report = Analyzer::default().analyze(&request);

    assert_eq!(report.max_severity(), Some(Severity::Critical));
    let issue = &report.issues[0];
    assert_eq!(issue.issue_type(), IssueType::OrmGenerated);
    assert_eq!(
        issue.metric("repetitions").map(|m| m.to_string()).as_deref(),
        Some("25")
    );
}

#[test]
fn test_thresholds_come_from_config() {
    let config = Config::from_toml("[thresholds]\nlarge_table_rows = 1000000\n").unwrap();
    let request = AnalysisRequest::new(ORDERS_QUERY)
        .with_plan("mysql", RawPlan::from_contents(MYSQL_TABLE_SCAN));
    let report = Analyzer::new(config).analyze(&request);
    assert_eq!(count(&report, IssueType::MissingIndex), 0);
}
