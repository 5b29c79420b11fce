use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// --- Enums ---

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    Expert,
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
            Difficulty::Expert => "expert",
        };
        write!(f, "{}", s)
    }
}

/// Status of a single evaluation attempt.
///
/// `Invalid` is reserved for forward-compatible deserialization of externally
/// authored feedback; the engine never constructs it (see DESIGN.md).
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Valid,
    PartiallyValid,
    Invalid,
    Error,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    InProgress,
    Valid,
    Failed,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    InProgress,
    Completed,
    Failed,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPhase {
    Execution,
    Evaluation,
}

// --- Task definition (immutable after load) ---

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Rule {
    pub id: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
    pub kind: RuleKind,
    #[serde(default)]
    pub params: RuleParams,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    Correctness,
    NoMutation,
    Deterministic,
    CorrectError,
    CorrectType,
    Performance,
}

impl std::fmt::Display for RuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RuleKind::Correctness => "correctness",
            RuleKind::NoMutation => "no_mutation",
            RuleKind::Deterministic => "deterministic",
            RuleKind::CorrectError => "correct_error",
            RuleKind::CorrectType => "correct_type",
            RuleKind::Performance => "performance",
        };
        write!(f, "{}", s)
    }
}

/// Kind-specific parameters for a rule (see SPEC_FULL.md §4.C').
#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
#[serde(default)]
pub struct RuleParams {
    pub runs: Option<u32>,
    pub scope: Option<String>,
    pub requires_context: Option<bool>,
    pub expected_kind: Option<String>,
    pub budget_seconds: Option<f64>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Phase {
    pub id: u32,
    pub description: String,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Interface {
    pub function_name: String,
    pub signature: String,
    #[serde(default)]
    pub allowed_imports: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Execution {
    pub timeout_seconds: u64,
}

impl Default for Execution {
    fn default() -> Self {
        Self { timeout_seconds: 30 }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Limits {
    pub max_attempts_per_phase: u32,
    pub max_total_attempts: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_attempts_per_phase: 10,
            max_total_attempts: 50,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TaskConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub difficulty: Difficulty,
    pub interface: Interface,
    pub phases: Vec<Phase>,
    #[serde(default)]
    pub limits: Limits,
    #[serde(default)]
    pub execution: Execution,
}

// --- Values exchanged between engine and test corpus ---

/// A loosely-typed value used for test inputs/expectations, mirroring the
/// value kinds the sandbox's scripting language can produce.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum ScriptJson {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<ScriptJson>),
    Map(BTreeMap<String, ScriptJson>),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TestCase {
    pub input: ScriptJson,
    pub expected: ScriptJson,
    pub phase: u32,
    #[serde(default)]
    pub tags: Vec<String>,
}

// --- Evaluation outputs ---

#[derive(Debug, Clone, PartialEq)]
pub struct RuleResult {
    pub passed: bool,
    pub scope: Option<String>,
}

impl RuleResult {
    pub fn success() -> Self {
        Self {
            passed: true,
            scope: None,
        }
    }

    pub fn failed(scope: impl Into<String>) -> Self {
        Self {
            passed: false,
            scope: Some(scope.into()),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Violation {
    pub rule_id: String,
    pub scope: String,
    pub count: u32,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Summary {
    pub rules_total: u32,
    pub rules_passed: u32,
    pub rules_failed: u32,
    pub coverage: f64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Delta {
    pub coverage_change: f64,
    pub new_failures: Vec<String>,
    pub fixed_failures: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ErrorInfo {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub phase: ErrorPhase,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Feedback {
    pub phase_id: u32,
    pub attempt_id: u32,
    pub status: Status,
    pub status_reason: String,
    pub violations: Vec<Violation>,
    pub summary: Summary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<Delta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

impl Feedback {
    pub fn failed_rule_ids(&self) -> std::collections::BTreeSet<String> {
        self.violations.iter().map(|v| v.rule_id.clone()).collect()
    }
}

// --- Workspace documents ---

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TaskLimitsMessage {
    pub total_phases: u32,
    pub max_attempts_per_phase: u32,
    pub max_total_attempts: u32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct InitialTaskMessage {
    pub task_id: String,
    pub problem: String,
    pub interface: Interface,
    pub limits: TaskLimitsMessage,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RuleDescriptor {
    pub id: String,
    pub description: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PhaseMessage {
    pub task_id: String,
    pub phase_id: u32,
    pub phase_transition: bool,
    pub rules: Vec<RuleDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_feedback: Option<Feedback>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implicit_evaluation: Option<Feedback>,
}

// --- Metrics / report ---

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PhaseReport {
    pub phase_id: u32,
    pub status: PhaseStatus,
    pub attempts: u32,
    pub final_coverage: f64,
    pub duration_seconds: f64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OverallResult {
    pub status: TaskStatus,
    pub total_attempts: u32,
    pub total_phases: u32,
    pub phases_completed: u32,
    pub total_duration_seconds: f64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MetricsReport {
    pub task_id: String,
    pub agent_id: String,
    pub timestamp: String,
    pub phases: Vec<PhaseReport>,
    pub overall: OverallResult,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_result_constructors() {
        assert!(RuleResult::success().passed);
        let f = RuleResult::failed("ordering");
        assert!(!f.passed);
        assert_eq!(f.scope.as_deref(), Some("ordering"));
    }

    #[test]
    fn feedback_failed_rule_ids_dedupes_and_sorts() {
        let feedback = Feedback {
            phase_id: 0,
            attempt_id: 1,
            status: Status::PartiallyValid,
            status_reason: "x".to_string(),
            violations: vec![
                Violation {
                    rule_id: "b".to_string(),
                    scope: "s1".to_string(),
                    count: 1,
                },
                Violation {
                    rule_id: "a".to_string(),
                    scope: "s2".to_string(),
                    count: 2,
                },
                Violation {
                    rule_id: "a".to_string(),
                    scope: "s1".to_string(),
                    count: 1,
                },
            ],
            summary: Summary {
                rules_total: 2,
                rules_passed: 0,
                rules_failed: 2,
                coverage: 0.0,
            },
            delta: None,
            error: None,
        };
        let ids: Vec<String> = feedback.failed_rule_ids().into_iter().collect();
        assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn serde_round_trip_task_config() {
        let toml_src = r#"
            id = "fizzbuzz"
            name = "FizzBuzz"
            difficulty = "easy"

            [interface]
            function_name = "solve"
            signature = "solve(n: int) -> str"
            allowed_imports = []

            [[phases]]
            id = 0
            description = "basic"

            [[phases.rules]]
            id = "correctness"
            description = "matches expected output"
            kind = "correctness"
        "#;
        let parsed: TaskConfig = toml::from_str(toml_src).unwrap();
        assert_eq!(parsed.id, "fizzbuzz");
        assert_eq!(parsed.phases.len(), 1);
        assert_eq!(parsed.phases[0].rules[0].kind, RuleKind::Correctness);
    }
}
