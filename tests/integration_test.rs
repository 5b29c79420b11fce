mod common;

use std::time::Duration;

use phase_bench::rule::registry::build_registry;
use phase_bench::session::{FailureReason, Session, SessionStatus};
use phase_bench::task::loader::load_task;
use phase_bench::types::Status;

use common::{write_task, SINGLE_PHASE_TASK_TOML, SINGLE_PHASE_TESTS_JSON};

fn start_session(task_toml: &str, tests_json: &str) -> (Session, phase_bench::rule::registry::Registry, phase_bench::task::loader::LoadedTask) {
    let dir = common::task_dir();
    write_task(dir.path(), task_toml, tests_json, "# Problem\n");
    let task = load_task(dir.path()).unwrap();
    let rules: Vec<_> = task.config.phases.iter().flat_map(|p| p.rules.clone()).collect();
    let registry = build_registry(&rules);
    let session = Session::new(task.config.phases.clone(), task.config.limits);
    (session, registry, task)
}

/// S1 — Immediate success, single phase.
#[test]
fn s1_immediate_success_single_phase() {
    let (mut session, registry, task) = start_session(SINGLE_PHASE_TASK_TOML, SINGLE_PHASE_TESTS_JSON);
    let code = "def solve(n):\n    if n % 3 == 0:\n        return \"Fizz\"\n    if n % 5 == 0:\n        return \"Buzz\"\n    return n\n";
    let outcome = session
        .submit_attempt(code, "solve", &task.config.interface.allowed_imports, &registry, &task.tests, Duration::from_secs(1))
        .unwrap();

    assert_eq!(outcome.feedback.status, Status::Valid);
    assert!(outcome.feedback.violations.is_empty());
    assert_eq!(outcome.feedback.summary.coverage, 1.0);
    assert_eq!(outcome.status, SessionStatus::Completed);
}

/// S2 — Progressive fix: a wrong solution gets partial credit, then a
/// corrected resubmission clears the phase.
#[test]
fn s2_progressive_fix() {
    let (mut session, registry, task) = start_session(SINGLE_PHASE_TASK_TOML, SINGLE_PHASE_TESTS_JSON);
    let wrong = "def solve(n):\n    return n\n";
    let first = session
        .submit_attempt(wrong, "solve", &task.config.interface.allowed_imports, &registry, &task.tests, Duration::from_secs(1))
        .unwrap();
    assert_eq!(first.feedback.status, Status::PartiallyValid);
    assert!(first.feedback.violations.iter().any(|v| v.rule_id == "correctness"));
    assert_eq!(first.status, SessionStatus::InProgress);

    let fixed = "def solve(n):\n    if n % 3 == 0:\n        return \"Fizz\"\n    if n % 5 == 0:\n        return \"Buzz\"\n    return n\n";
    let second = session
        .submit_attempt(fixed, "solve", &task.config.interface.allowed_imports, &registry, &task.tests, Duration::from_secs(1))
        .unwrap();
    assert_eq!(second.feedback.status, Status::Valid);
    let delta = second.feedback.delta.expect("delta against previous attempt");
    assert_eq!(delta.fixed_failures, vec!["correctness".to_string()]);
    assert_eq!(second.status, SessionStatus::Completed);
}

/// S3 — Syntax error surfaces as a Feedback `error`, not a fatal session abort.
#[test]
fn s3_syntax_error() {
    let (mut session, registry, task) = start_session(SINGLE_PHASE_TASK_TOML, SINGLE_PHASE_TESTS_JSON);
    let broken = "def solve(n:\n    return n\n";
    let outcome = session
        .submit_attempt(broken, "solve", &task.config.interface.allowed_imports, &registry, &task.tests, Duration::from_secs(1))
        .unwrap();

    assert_eq!(outcome.feedback.status, Status::Error);
    let error = outcome.feedback.error.expect("error info present");
    assert_eq!(error.kind, "SyntaxError");
    assert!(outcome.feedback.violations.is_empty());
    assert_eq!(outcome.feedback.summary.coverage, 0.0);
    assert_eq!(outcome.feedback.summary.rules_total, 1);
}

/// S4 — Disallowed import surfaces as an `ImportViolation` Feedback error.
#[test]
fn s4_disallowed_import() {
    let (mut session, registry, task) = start_session(SINGLE_PHASE_TASK_TOML, SINGLE_PHASE_TESTS_JSON);
    let imports_math = "import math\ndef solve(n):\n    return n\n";
    let outcome = session
        .submit_attempt(imports_math, "solve", &task.config.interface.allowed_imports, &registry, &task.tests, Duration::from_secs(1))
        .unwrap();

    assert_eq!(outcome.feedback.status, Status::Error);
    let error = outcome.feedback.error.expect("error info present");
    assert_eq!(error.kind, "ImportViolation");
    assert!(error.message.contains("math"));
}

/// S5 — Cap exhaustion: three broken attempts against a 3-attempt phase cap
/// leave the phase failed and the session terminally failed.
#[test]
fn s5_cap_exhaustion() {
    let dir = common::task_dir();
    write_task(dir.path(), SINGLE_PHASE_TASK_TOML, SINGLE_PHASE_TESTS_JSON, "# Problem\n");
    let task = load_task(dir.path()).unwrap();
    let rules: Vec<_> = task.config.phases.iter().flat_map(|p| p.rules.clone()).collect();
    let registry = build_registry(&rules);
    let mut session = Session::new(
        task.config.phases.clone(),
        phase_bench::types::Limits { max_attempts_per_phase: 3, max_total_attempts: 20 },
    );

    let wrong = "def solve(n):\n    return n\n";
    let mut last = None;
    for _ in 0..3 {
        last = Some(
            session
                .submit_attempt(wrong, "solve", &task.config.interface.allowed_imports, &registry, &task.tests, Duration::from_secs(1))
                .unwrap(),
        );
    }
    assert_eq!(last.unwrap().status, SessionStatus::InProgress);

    let fourth = session
        .submit_attempt(wrong, "solve", &task.config.interface.allowed_imports, &registry, &task.tests, Duration::from_secs(1))
        .unwrap();
    assert_eq!(fourth.status, SessionStatus::Failed);
    assert_eq!(fourth.failure_reason, Some(FailureReason::PhaseCap));
}

/// S6 — Multi-phase collapse on transition: a solution already satisfying
/// phases 0, 1, and 2 completes the whole session in one attempt.
#[test]
fn s6_multi_phase_collapse() {
    let task_toml = r#"
id = "identity-chain"
name = "Identity Chain"
difficulty = "easy"

[interface]
function_name = "solve"
signature = "def solve(x)"
allowed_imports = []

[[phases]]
id = 0
description = "correctness"

[[phases.rules]]
id = "correctness"
description = "matches expected output"
kind = "correctness"

[[phases]]
id = 1
description = "no mutation"

[[phases.rules]]
id = "no_mutation"
description = "does not mutate the input"
kind = "no_mutation"

[[phases]]
id = 2
description = "deterministic"

[[phases.rules]]
id = "deterministic"
description = "repeated calls agree"
kind = "deterministic"
"#;
    let tests_json = r#"[
        {"input": [1, 2, 3], "expected": [1, 2, 3], "phase": 0, "tags": []}
    ]"#;
    let (mut session, registry, task) = start_session(task_toml, tests_json);
    let identity = "def solve(x):\n    return x\n";

    let outcome = session
        .submit_attempt(identity, "solve", &task.config.interface.allowed_imports, &registry, &task.tests, Duration::from_secs(1))
        .unwrap();

    assert_eq!(outcome.feedback.status, Status::Valid);
    assert_eq!(outcome.implicit_feedback.len(), 2);
    assert!(outcome.implicit_feedback.iter().all(|f| f.status == Status::Valid));
    assert_eq!(outcome.status, SessionStatus::Completed);
    assert_eq!(session.total_attempts(), 1);
}
