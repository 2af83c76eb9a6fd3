use plancheck::rewrite::FAILED;
use plancheck::{interpret, Config, ParseMethod, RewriteInterpreter};

const RESPONSES: [&str; 7] = [
    "<optimized_sql>SELECT id FROM users WHERE email = $1</optimized_sql>",
    "--- OPTIMIZED QUERY ---\nSELECT id FROM users WHERE email = $1\n--- EXPLANATION ---\nNarrower projection.",
    "Here you go:\n```sql\nSELECT id FROM users;\n```",
    "Rewritten:\nSELECT id\nFROM users\nWHERE email = $1\n\nThis avoids the wildcard.",
    "-- Optimization failed: could not parse",
    "I'm sorry, I cannot help with that query.",
    "The original SELECT statement FROM the users table is already optimal.",
];

#[test]
fn test_each_strategy_wins_on_its_own_shape() {
    let methods: Vec<String> = RESPONSES[..4]
        .iter()
        .map(|raw| interpret(raw, "").parse_method)
        .collect();
    assert_eq!(methods, vec!["XmlTag", "SectionMarker", "CodeBlock", "Heuristic"]);
}

#[test]
fn test_interpretation_is_idempotent_for_every_response() {
    for raw in RESPONSES {
        let first = interpret(raw, "");
        let second = interpret(raw, "");
        assert_eq!(first.parse_method, second.parse_method, "{:?}", raw);
        assert_eq!(first.success, second.success, "{:?}", raw);
        assert_eq!(first, second);
    }
}

#[test]
fn test_failure_walks_all_strategies() {
    for raw in &RESPONSES[4..] {
        let parsed = interpret(raw, "SELECT * FROM users");
        assert!(!parsed.success);
        assert_eq!(parsed.parse_method, FAILED);
        let methods: Vec<ParseMethod> = parsed.attempts.iter().map(|a| a.method).collect();
        assert_eq!(methods, ParseMethod::ALL.to_vec());
        assert!(!parsed.raw_response_excerpt.is_empty());
    }
}

#[test]
fn test_accepted_statement_never_contains_error_phrase() {
    for raw in RESPONSES {
        let parsed = interpret(raw, "");
        if parsed.success {
            let lower = parsed.sql.to_lowercase();
            for phrase in plancheck::rewrite::validate::ERROR_PHRASES {
                assert!(!lower.contains(phrase), "{:?} accepted with {:?}", parsed.sql, phrase);
            }
        }
    }
}

#[test]
fn test_configured_phrase_rejects_otherwise_valid_sql() {
    let config =
        Config::from_toml("[rewrite]\nextra_error_phrases = [\"placeholder query\"]\n").unwrap();
    let interpreter = RewriteInterpreter::new(config.rewrite);
    let parsed =
        interpreter.interpret("```sql\nSELECT 1 FROM t -- placeholder query\n```", "");
    assert!(!parsed.success);
    assert!(interpret("```sql\nSELECT 1 FROM t -- placeholder query\n```", "").success);
}

#[test]
fn test_serialized_shape() {
    let value = serde_json::to_value(interpret(RESPONSES[2], "SELECT id FROM users")).unwrap();
    assert_eq!(value["success"], true);
    assert_eq!(value["parse_method"], "CodeBlock");
    assert_eq!(value["sql"], "SELECT id FROM users;");
    assert_eq!(value["is_valid_sql"], true);
    assert_eq!(value["unchanged"], true);
    assert!(value.get("raw_response_excerpt").is_none());
}
