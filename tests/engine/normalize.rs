use plancheck::{normalize, EngineId, Operation, PlanError, RawPlan};

use crate::common::{pg_seq_scan, MYSQL_TABLE_SCAN, ORACLE_FULL_SCAN, PG_NESTED_LOOP};

fn fixture(engine: EngineId) -> RawPlan {
    match engine {
        EngineId::Postgresql => RawPlan::from_contents(PG_NESTED_LOOP),
        EngineId::Oracle => RawPlan::from_contents(ORACLE_FULL_SCAN),
        EngineId::Mysql => RawPlan::from_contents(MYSQL_TABLE_SCAN),
    }
}

#[test]
fn test_every_engine_yields_a_sequential_scan() {
    for engine in EngineId::ALL {
        let root = normalize(engine.as_str(), &fixture(engine))
            .unwrap_or_else(|e| panic!("{} fixture failed: {}", engine, e));
        let scan = root
            .iter()
            .find(|n| n.operation == Operation::SequentialScan)
            .unwrap_or_else(|| panic!("{} plan has no sequential scan", engine));
        assert!(
            scan.relation_name
                .as_deref()
                .is_some_and(|r| r.eq_ignore_ascii_case("orders")),
            "{}: {:?}",
            engine,
            scan.relation_name
        );
        assert!(scan.filter_text.is_some(), "{} scan lost its filter", engine);
        assert!(root.node_count() >= 2);
    }
}

#[test]
fn test_unsupported_engine_always_errors() {
    for raw in [
        RawPlan::from_contents(PG_NESTED_LOOP),
        RawPlan::from_contents(MYSQL_TABLE_SCAN),
        RawPlan::Text(String::new()),
    ] {
        match normalize("sqlite", &raw) {
            Err(PlanError::UnsupportedEngine { engine, .. }) => assert_eq!(engine, "sqlite"),
            other => panic!("expected UnsupportedEngine, got {:?}", other),
        }
    }
}

#[test]
fn test_engine_aliases_normalize_the_same_plan() {
    let raw = RawPlan::from_contents(&pg_seq_scan("users", 500, "(id = 1)"));
    let full = normalize("postgresql", &raw).unwrap();
    assert_eq!(normalize("postgres", &raw).unwrap(), full);
    assert_eq!(normalize("PG", &raw).unwrap(), full);
}

#[test]
fn test_plan_for_the_wrong_engine_is_malformed() {
    let raw = RawPlan::from_contents(MYSQL_TABLE_SCAN);
    assert!(matches!(
        normalize("oracle", &raw),
        Err(PlanError::MalformedPlan { .. })
    ));
}
