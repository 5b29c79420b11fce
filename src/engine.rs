//! Phased Evaluation Engine (SPEC_FULL.md §4.D).
//!
//! Runs one attempt's solution against every rule declared for the current
//! phase, aggregating per-`(rule_id, scope)` violation counts the way the
//! reference evaluator's `evaluate()` does, but resolving each rule's check
//! via the compiled [`crate::rule::registry::Registry`] instead of
//! `getattr(self, f"check_{rule.id}")`.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use crate::error::BenchError;
use crate::rule::registry::Registry;
use crate::sandbox::Sandbox;
use crate::types::{Delta, Phase, RuleResult, Status, Summary, TestCase, Violation};

/// Result of evaluating one attempt against one phase, before it is wrapped
/// into a `Feedback` envelope by the session layer (which also knows the
/// `phase_id`/`attempt_id`/previous-feedback needed for `status`/`delta`).
pub struct EvaluationOutcome {
    pub violations: Vec<Violation>,
    pub summary: Summary,
}

/// Evaluates `function_name` against every test relevant to `phase`
/// (tests from this phase and all earlier ones, per SPEC_FULL.md §4.D).
///
/// A per-(test, rule) execution error (timeout, runtime exception) is
/// counted as a violation with scope `"error"` rather than aborting the
/// whole evaluation — mirroring the reference evaluator's blanket
/// `except Exception` around each `check_*` call. A *fatal* sandbox error
/// (one that should never occur once `Sandbox::prepare` has already
/// succeeded) is propagated instead.
pub fn evaluate(
    sandbox: &Sandbox,
    function_name: &str,
    registry: &Registry,
    phase: &Phase,
    tests: &[TestCase],
    timeout: Duration,
) -> Result<EvaluationOutcome, BenchError> {
    let relevant: Vec<&TestCase> = tests.iter().filter(|t| t.phase <= phase.id).collect();

    if relevant.is_empty() {
        return Ok(EvaluationOutcome {
            violations: Vec::new(),
            summary: Summary {
                rules_total: phase.rules.len() as u32,
                rules_passed: phase.rules.len() as u32,
                rules_failed: 0,
                coverage: 1.0,
            },
        });
    }

    let mut violation_counts: BTreeMap<(String, String), u32> = BTreeMap::new();
    let mut tests_passed = 0u32;

    for test in &relevant {
        let mut test_passed_all = true;
        for rule in &phase.rules {
            let check = registry
                .get(&rule.id)
                .ok_or_else(|| BenchError::Evaluation(format!("no check registered for rule '{}'", rule.id)))?;

            let result = match check.check(sandbox, function_name, test, &rule.params, timeout) {
                Ok(r) => r,
                Err(e) if e.is_execution_error() => RuleResult::failed("error"),
                Err(e) => return Err(e),
            };

            if !result.passed {
                test_passed_all = false;
                let scope = result.scope.unwrap_or_else(|| "unknown".to_string());
                *violation_counts.entry((rule.id.clone(), scope)).or_insert(0) += 1;
            }
        }
        if test_passed_all {
            tests_passed += 1;
        }
    }

    let violations: Vec<Violation> = violation_counts
        .into_iter()
        .map(|((rule_id, scope), count)| Violation { rule_id, scope, count })
        .collect();

    let rules_total = phase.rules.len() as u32;
    let failed_rule_ids: BTreeSet<&str> = violations.iter().map(|v| v.rule_id.as_str()).collect();
    let rules_failed = failed_rule_ids.len() as u32;
    let coverage = tests_passed as f64 / relevant.len() as f64;

    Ok(EvaluationOutcome {
        violations,
        summary: Summary {
            rules_total,
            rules_passed: rules_total.saturating_sub(rules_failed),
            rules_failed,
            coverage,
        },
    })
}

/// Computes the coverage-change / newly-failing / newly-fixed rule-id delta
/// against the previous attempt's feedback for this phase, as
/// `runner.py`'s `_calculate_delta` does with a set-difference.
pub fn calculate_delta(
    violations: &[Violation],
    summary: &Summary,
    previous_violations: &[Violation],
    previous_summary: &Summary,
) -> Delta {
    let current: BTreeSet<&str> = violations.iter().map(|v| v.rule_id.as_str()).collect();
    let previous: BTreeSet<&str> = previous_violations.iter().map(|v| v.rule_id.as_str()).collect();

    Delta {
        coverage_change: summary.coverage - previous_summary.coverage,
        new_failures: current.difference(&previous).map(|s| s.to_string()).collect(),
        fixed_failures: previous.difference(&current).map(|s| s.to_string()).collect(),
    }
}

/// Derives the attempt's `Status` from its evaluation summary. `Error` is
/// never returned here — it is reserved for preparation/evaluation-driver
/// failures the session layer reports separately; a clean evaluation run
/// that simply fails every rule is still `partially_valid` per SPEC_FULL.md
/// §4.D step 5 ("the engine does not currently emit `invalid` distinct from
/// `partially_valid`").
pub fn status_for_summary(summary: &Summary) -> Status {
    if summary.rules_failed == 0 {
        Status::Valid
    } else {
        Status::PartiallyValid
    }
}
