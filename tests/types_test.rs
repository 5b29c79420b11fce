use phase_bench::types::*;

#[test]
fn difficulty_display_matches_toml_case() {
    assert_eq!(Difficulty::Easy.to_string(), "easy");
    assert_eq!(Difficulty::Expert.to_string(), "expert");
}

#[test]
fn rule_kind_display_is_snake_case() {
    assert_eq!(RuleKind::NoMutation.to_string(), "no_mutation");
    assert_eq!(RuleKind::CorrectError.to_string(), "correct_error");
}

#[test]
fn script_json_round_trips_through_serde_json() {
    let value = ScriptJson::List(vec![
        ScriptJson::Int(1),
        ScriptJson::Str("two".to_string()),
        ScriptJson::Bool(true),
        ScriptJson::Null,
    ]);
    let raw = serde_json::to_string(&value).unwrap();
    let parsed: ScriptJson = serde_json::from_str(&raw).unwrap();
    assert_eq!(parsed, value);
}

#[test]
fn feedback_serializes_without_delta_or_error_when_absent() {
    let feedback = Feedback {
        phase_id: 0,
        attempt_id: 1,
        status: Status::Valid,
        status_reason: "All rules pass".to_string(),
        violations: vec![],
        summary: Summary { rules_total: 1, rules_passed: 1, rules_failed: 0, coverage: 1.0 },
        delta: None,
        error: None,
    };
    let raw = serde_json::to_string(&feedback).unwrap();
    assert!(!raw.contains("\"delta\""));
    assert!(!raw.contains("\"error\""));
}

#[test]
fn feedback_includes_delta_when_present() {
    let feedback = Feedback {
        phase_id: 0,
        attempt_id: 2,
        status: Status::PartiallyValid,
        status_reason: "Fails checks: correctness".to_string(),
        violations: vec![Violation { rule_id: "correctness".to_string(), scope: "case_0".to_string(), count: 1 }],
        summary: Summary { rules_total: 1, rules_passed: 0, rules_failed: 1, coverage: 0.0 },
        delta: Some(Delta { coverage_change: -1.0, new_failures: vec!["correctness".to_string()], fixed_failures: vec![] }),
        error: None,
    };
    let raw = serde_json::to_string(&feedback).unwrap();
    assert!(raw.contains("\"delta\""));
    let parsed: Feedback = serde_json::from_str(&raw).unwrap();
    assert_eq!(parsed, feedback);
}

#[test]
fn error_info_serializes_kind_as_type() {
    let info = ErrorInfo { kind: "Timeout".to_string(), message: "slow".to_string(), phase: ErrorPhase::Execution };
    let raw = serde_json::to_string(&info).unwrap();
    assert!(raw.contains("\"type\":\"Timeout\""));
}

#[test]
fn limits_and_execution_defaults_match_spec() {
    assert_eq!(Limits::default().max_attempts_per_phase, 10);
    assert_eq!(Limits::default().max_total_attempts, 50);
    assert_eq!(Execution::default().timeout_seconds, 30);
}

#[test]
fn task_config_parses_from_toml_with_defaults() {
    let toml_src = r#"
        id = "fizzbuzz"
        name = "FizzBuzz"
        difficulty = "medium"

        [interface]
        function_name = "solve"
        signature = "solve(n: int) -> str"

        [[phases]]
        id = 0
        description = "basic"
    "#;
    let parsed: TaskConfig = toml::from_str(toml_src).unwrap();
    assert_eq!(parsed.limits, Limits::default());
    assert_eq!(parsed.execution, Execution::default());
    assert!(parsed.interface.allowed_imports.is_empty());
}
