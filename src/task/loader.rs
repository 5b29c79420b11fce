//! Task directory loading and structural validation (SPEC_FULL.md §4.A).
//!
//! A task directory holds `task.toml` (descriptor), `problem.md` (prose
//! shown to the agent), and `tests.json` (the test corpus) — the Rust-native
//! replacement for the reference loader's `task.yaml` + dynamically imported
//! `evaluator.py`/`tests.py` modules, which have no portable Rust analogue.

use std::fs;
use std::path::Path;

use crate::error::BenchError;
use crate::task::descriptor::parse_task_config;
use crate::types::{RuleKind, TaskConfig, TestCase};

pub struct LoadedTask {
    pub config: TaskConfig,
    pub problem: String,
    pub tests: Vec<TestCase>,
}

/// A non-fatal structural concern surfaced to the operator (e.g. via
/// `phase-bench validate`).
#[derive(Debug, Clone, PartialEq)]
pub struct TaskWarning {
    pub condition: String,
    pub location: String,
}

impl std::fmt::Display for TaskWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.condition, self.location)
    }
}

pub fn load_task(dir: &Path) -> Result<LoadedTask, BenchError> {
    let task_path = dir.join("task.toml");
    let problem_path = dir.join("problem.md");
    let tests_path = dir.join("tests.json");

    let task_contents = fs::read_to_string(&task_path)
        .map_err(|e| BenchError::Load(format!("cannot read {}: {}", task_path.display(), e)))?;
    let config = parse_task_config(&task_contents, &task_path)?;

    let problem = fs::read_to_string(&problem_path)
        .map_err(|e| BenchError::Load(format!("cannot read {}: {}", problem_path.display(), e)))?;

    let tests_contents = fs::read_to_string(&tests_path)
        .map_err(|e| BenchError::Load(format!("cannot read {}: {}", tests_path.display(), e)))?;
    let tests: Vec<TestCase> = serde_json::from_str(&tests_contents)
        .map_err(|e| BenchError::Load(format!("cannot parse {}: {}", tests_path.display(), e)))?;

    validate_structure(&config)?;

    Ok(LoadedTask {
        config,
        problem,
        tests,
    })
}

/// Hard structural checks: these abort loading if violated.
fn validate_structure(config: &TaskConfig) -> Result<(), BenchError> {
    if config.phases.len() < 3 {
        return Err(BenchError::Load(format!(
            "task '{}' declares {} phase(s); at least 3 are required",
            config.id,
            config.phases.len()
        )));
    }

    for (i, phase) in config.phases.iter().enumerate() {
        let expected = i as u32;
        if phase.id != expected {
            return Err(BenchError::Load(format!(
                "task '{}': phase ids must run 0..N-1 in order; expected {}, found {}",
                config.id, expected, phase.id
            )));
        }

        for rule in &phase.rules {
            validate_rule_params(&config.id, phase.id, rule.id.as_str(), rule.kind, &rule.params)?;
        }
    }

    Ok(())
}

fn validate_rule_params(
    task_id: &str,
    phase_id: u32,
    rule_id: &str,
    kind: RuleKind,
    params: &crate::types::RuleParams,
) -> Result<(), BenchError> {
    let missing = |field: &str| {
        BenchError::Load(format!(
            "task '{}' phase {} rule '{}' ({}): missing required param '{}'",
            task_id, phase_id, rule_id, kind, field
        ))
    };
    match kind {
        RuleKind::CorrectType if params.expected_kind.is_none() => Err(missing("expected_kind")),
        RuleKind::Performance if params.budget_seconds.is_none() => Err(missing("budget_seconds")),
        _ => Ok(()),
    }
}

/// Soft warnings: surfaced but never fatal. Mirrors the difficulty-tier
/// phase-count guidance and per-phase test coverage checks SPEC_FULL.md
/// adds on top of the reference loader's silent `dict.get` defaulting.
pub fn collect_warnings(task: &LoadedTask) -> Vec<TaskWarning> {
    use crate::types::Difficulty;

    let mut warnings = Vec::new();
    let phase_count = task.config.phases.len();
    let expected_range: (usize, usize) = match task.config.difficulty {
        Difficulty::Easy => (3, 5),
        Difficulty::Medium => (6, 15),
        Difficulty::Hard => (16, 30),
        Difficulty::Expert => (31, 50),
    };
    if phase_count < expected_range.0 || phase_count > expected_range.1 {
        warnings.push(TaskWarning {
            condition: format!(
                "{} phases is unusual for difficulty '{}' (expected {}-{})",
                phase_count, task.config.difficulty, expected_range.0, expected_range.1
            ),
            location: format!("{} phases", task.config.id),
        });
    }

    let covered_phase_ids: std::collections::HashSet<u32> = task.tests.iter().map(|t| t.phase).collect();
    for phase in &task.config.phases {
        if !covered_phase_ids.contains(&phase.id) {
            warnings.push(TaskWarning {
                condition: "no test cases cover this phase".to_string(),
                location: format!("phase {}", phase.id),
            });
        }
    }

    warnings
}
