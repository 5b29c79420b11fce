//! Built-in rule kind implementations, grounded on the reference evaluator's
//! `check_no_mutation`/`check_deterministic` helpers and generalized to the
//! other kinds SPEC_FULL.md's rule model adds (`correct_error`,
//! `correct_type`, `performance`).

use std::time::Duration;

use crate::error::BenchError;
use crate::rule::RuleCheck;
use crate::sandbox::Sandbox;
use crate::script::value::Value;
use crate::types::{RuleParams, RuleResult, TestCase};

fn invoke_with(
    sandbox: &Sandbox,
    function_name: &str,
    test: &TestCase,
    timeout: Duration,
) -> Result<Value, BenchError> {
    let input = Value::from_script_json(&test.input);
    sandbox.invoke(function_name, vec![input], timeout)
}

pub struct CorrectnessCheck;

impl RuleCheck for CorrectnessCheck {
    fn check(
        &self,
        sandbox: &Sandbox,
        function_name: &str,
        test: &TestCase,
        _params: &RuleParams,
        timeout: Duration,
    ) -> Result<RuleResult, BenchError> {
        let actual = invoke_with(sandbox, function_name, test, timeout)?;
        let expected = Value::from_script_json(&test.expected);
        if actual.structural_eq(&expected) {
            Ok(RuleResult::success())
        } else {
            let scope = test.tags.first().cloned().unwrap_or_else(|| "unknown".to_string());
            Ok(RuleResult::failed(scope))
        }
    }
}

pub struct NoMutationCheck;

impl RuleCheck for NoMutationCheck {
    fn check(
        &self,
        sandbox: &Sandbox,
        function_name: &str,
        test: &TestCase,
        _params: &RuleParams,
        timeout: Duration,
    ) -> Result<RuleResult, BenchError> {
        let original = Value::from_script_json(&test.input);
        let working_copy = original.deep_copy();
        sandbox.invoke(function_name, vec![working_copy.clone()], timeout)?;

        if original.structural_eq(&working_copy) {
            return Ok(RuleResult::success());
        }

        let scope = match (&original, &working_copy) {
            (Value::Dict(before), Value::Dict(after)) => {
                let before = before.borrow();
                let after = after.borrow();
                let nested = before.iter().any(|(k, v)| {
                    matches!(v, Value::Dict(_) | Value::List(_))
                        && after.get(k).is_none_or(|v2| !v.structural_eq(v2))
                });
                if nested {
                    "nested"
                } else {
                    "direct"
                }
            }
            _ => "direct",
        };
        Ok(RuleResult::failed(scope))
    }
}

pub struct DeterministicCheck;

impl RuleCheck for DeterministicCheck {
    fn check(
        &self,
        sandbox: &Sandbox,
        function_name: &str,
        test: &TestCase,
        params: &RuleParams,
        timeout: Duration,
    ) -> Result<RuleResult, BenchError> {
        let runs = params.runs.unwrap_or(3).max(1);
        let scope = params.scope.as_deref().unwrap_or("consistency");
        let base_input = Value::from_script_json(&test.input);
        let mut first: Option<Value> = None;
        for _ in 0..runs {
            let copy = base_input.deep_copy();
            let result = sandbox.invoke(function_name, vec![copy], timeout)?;
            match &first {
                None => first = Some(result),
                Some(f) if !f.structural_eq(&result) => return Ok(RuleResult::failed(scope)),
                Some(_) => {}
            }
        }
        Ok(RuleResult::success())
    }
}

pub struct CorrectErrorCheck;

impl RuleCheck for CorrectErrorCheck {
    fn check(
        &self,
        sandbox: &Sandbox,
        function_name: &str,
        test: &TestCase,
        params: &RuleParams,
        timeout: Duration,
    ) -> Result<RuleResult, BenchError> {
        let expected_kind = match &test.expected {
            crate::types::ScriptJson::Str(s) => s.clone(),
            _ => return Ok(RuleResult::failed("bad_expectation")),
        };
        match invoke_with(sandbox, function_name, test, timeout) {
            Ok(_) => Ok(RuleResult::failed("missing")),
            Err(BenchError::Runtime { kind, message }) if kind == expected_kind => {
                if params.requires_context.unwrap_or(false) && message.trim().is_empty() {
                    return Ok(RuleResult::failed("missing_context"));
                }
                Ok(RuleResult::success())
            }
            Err(BenchError::Runtime { .. }) => Ok(RuleResult::failed("wrong_type")),
            Err(other) => Err(other),
        }
    }
}

pub struct CorrectTypeCheck;

impl RuleCheck for CorrectTypeCheck {
    fn check(
        &self,
        sandbox: &Sandbox,
        function_name: &str,
        test: &TestCase,
        params: &RuleParams,
        timeout: Duration,
    ) -> Result<RuleResult, BenchError> {
        let expected_kind = params.expected_kind.as_deref().unwrap_or("");
        let actual = invoke_with(sandbox, function_name, test, timeout)?;
        if actual.type_name() == expected_kind {
            Ok(RuleResult::success())
        } else {
            Ok(RuleResult::failed("type"))
        }
    }
}

pub struct PerformanceCheck;

impl RuleCheck for PerformanceCheck {
    fn check(
        &self,
        sandbox: &Sandbox,
        function_name: &str,
        test: &TestCase,
        params: &RuleParams,
        timeout: Duration,
    ) -> Result<RuleResult, BenchError> {
        let budget = params
            .budget_seconds
            .map(Duration::from_secs_f64)
            .unwrap_or(timeout);
        let bounded = budget.min(timeout);
        match invoke_with(sandbox, function_name, test, bounded) {
            Ok(_) => Ok(RuleResult::success()),
            Err(BenchError::Timeout(_)) => Ok(RuleResult::failed("timeout")),
            Err(other) => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::Sandbox;
    use crate::types::ScriptJson;

    #[test]
    fn correctness_check_scopes_violation_by_first_test_tag() {
        let code = "def solve(n):\n    return n\n";
        let sandbox = Sandbox::prepare(code, &[]).unwrap();
        let test = TestCase {
            input: ScriptJson::Int(-1),
            expected: ScriptJson::Str("invalid".to_string()),
            phase: 0,
            tags: vec!["negative_handling".to_string(), "edge_case".to_string()],
        };
        let result = CorrectnessCheck
            .check(&sandbox, "solve", &test, &RuleParams::default(), Duration::from_secs(1))
            .unwrap();
        assert!(!result.passed);
        assert_eq!(result.scope.as_deref(), Some("negative_handling"));
    }

    #[test]
    fn correctness_check_scopes_untagged_test_as_unknown() {
        let code = "def solve(n):\n    return n\n";
        let sandbox = Sandbox::prepare(code, &[]).unwrap();
        let test = TestCase {
            input: ScriptJson::Int(1),
            expected: ScriptJson::Int(2),
            phase: 0,
            tags: vec![],
        };
        let result = CorrectnessCheck
            .check(&sandbox, "solve", &test, &RuleParams::default(), Duration::from_secs(1))
            .unwrap();
        assert!(!result.passed);
        assert_eq!(result.scope.as_deref(), Some("unknown"));
    }

    #[test]
    fn deterministic_check_defaults_to_consistency_scope() {
        let code = "counter = [0]\ndef pick(n):\n    counter[0] = counter[0] + 1\n    return counter[0]\n";
        let sandbox = Sandbox::prepare(code, &[]).unwrap();
        let test = TestCase {
            input: ScriptJson::Int(1),
            expected: ScriptJson::Null,
            phase: 0,
            tags: vec![],
        };
        let result = DeterministicCheck
            .check(&sandbox, "pick", &test, &RuleParams::default(), Duration::from_secs(1))
            .unwrap();
        assert!(!result.passed);
        assert_eq!(result.scope.as_deref(), Some("consistency"));
    }

    #[test]
    fn deterministic_check_honors_scope_override_param() {
        let code = "counter = [0]\ndef pick(n):\n    counter[0] = counter[0] + 1\n    return counter[0]\n";
        let sandbox = Sandbox::prepare(code, &[]).unwrap();
        let test = TestCase {
            input: ScriptJson::Int(1),
            expected: ScriptJson::Null,
            phase: 0,
            tags: vec![],
        };
        let params = RuleParams {
            scope: Some("ordering".to_string()),
            ..RuleParams::default()
        };
        let result = DeterministicCheck
            .check(&sandbox, "pick", &test, &params, Duration::from_secs(1))
            .unwrap();
        assert!(!result.passed);
        assert_eq!(result.scope.as_deref(), Some("ordering"));
    }

    #[test]
    fn correct_error_check_passes_when_candidate_raises_expected_kind() {
        let code = "def divide(n):\n    if n == 0:\n        raise ValueError(\"cannot divide by zero\")\n    return 100 / n\n";
        let sandbox = Sandbox::prepare(code, &[]).unwrap();
        let test = TestCase {
            input: ScriptJson::Int(0),
            expected: ScriptJson::Str("ValueError".to_string()),
            phase: 0,
            tags: vec![],
        };
        let result = CorrectErrorCheck
            .check(&sandbox, "divide", &test, &RuleParams::default(), Duration::from_secs(1))
            .unwrap();
        assert!(result.passed);
    }

    #[test]
    fn correct_error_check_fails_when_candidate_raises_wrong_kind() {
        let code = "def divide(n):\n    if n == 0:\n        raise RuntimeError(\"boom\")\n    return 100 / n\n";
        let sandbox = Sandbox::prepare(code, &[]).unwrap();
        let test = TestCase {
            input: ScriptJson::Int(0),
            expected: ScriptJson::Str("ValueError".to_string()),
            phase: 0,
            tags: vec![],
        };
        let result = CorrectErrorCheck
            .check(&sandbox, "divide", &test, &RuleParams::default(), Duration::from_secs(1))
            .unwrap();
        assert!(!result.passed);
        assert_eq!(result.scope.as_deref(), Some("wrong_type"));
    }

    #[test]
    fn correct_error_check_fails_when_context_is_required_but_message_is_blank() {
        let code = "def divide(n):\n    if n == 0:\n        raise ValueError(\"\")\n    return 100 / n\n";
        let sandbox = Sandbox::prepare(code, &[]).unwrap();
        let test = TestCase {
            input: ScriptJson::Int(0),
            expected: ScriptJson::Str("ValueError".to_string()),
            phase: 0,
            tags: vec![],
        };
        let params = RuleParams {
            requires_context: Some(true),
            ..RuleParams::default()
        };
        let result = CorrectErrorCheck
            .check(&sandbox, "divide", &test, &params, Duration::from_secs(1))
            .unwrap();
        assert!(!result.passed);
        assert_eq!(result.scope.as_deref(), Some("missing_context"));
    }

    #[test]
    fn correct_error_check_fails_when_no_error_is_raised() {
        let code = "def divide(n):\n    return 100 / n\n";
        let sandbox = Sandbox::prepare(code, &[]).unwrap();
        let test = TestCase {
            input: ScriptJson::Int(5),
            expected: ScriptJson::Str("ValueError".to_string()),
            phase: 0,
            tags: vec![],
        };
        let result = CorrectErrorCheck
            .check(&sandbox, "divide", &test, &RuleParams::default(), Duration::from_secs(1))
            .unwrap();
        assert!(!result.passed);
        assert_eq!(result.scope.as_deref(), Some("missing"));
    }
}
