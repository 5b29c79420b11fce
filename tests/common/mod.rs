#![allow(dead_code)]

use std::fs;
use std::path::Path;

use tempfile::TempDir;

/// A three-phase task: phase 0 checks correctness of an `add_one`-style
/// solution, phase 1 additionally requires the input list to be left
/// unmutated, phase 2 requires determinism. Mirrors the fixture shape used in
/// `src/session.rs`'s own tests. Three phases is the minimum a task
/// descriptor may declare (SPEC_FULL.md §4.A).
pub const TWO_PHASE_TASK_TOML: &str = r#"
id = "increment"
name = "Increment"
difficulty = "easy"

[interface]
function_name = "solve"
signature = "def solve(x)"
allowed_imports = []

[limits]
max_attempts_per_phase = 5
max_total_attempts = 20

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
description = "does not mutate the input list"
kind = "no_mutation"
scope = "direct"

[phases.rules.params]
scope = "direct"

[[phases]]
id = 2
description = "deterministic"

[[phases.rules]]
id = "deterministic"
description = "repeated calls agree"
kind = "deterministic"
"#;

pub const TWO_PHASE_TESTS_JSON: &str = r#"[
    {"input": 1, "expected": 1, "phase": 0, "tags": []},
    {"input": [1, 2, 3], "expected": [1, 2, 3], "phase": 1, "tags": []}
]"#;

/// A task whose only *substantive* rule lives in phase 0; phases 1 and 2
/// carry rules (`no_mutation`, `deterministic`) that a pure, non-mutating
/// FizzBuzz solution satisfies for free, so submissions that clear phase 0
/// still collapse straight through to session completion. Three phases is
/// the minimum a task descriptor may declare (SPEC_FULL.md §4.A).
pub const SINGLE_PHASE_TASK_TOML: &str = r#"
id = "fizzbuzz"
name = "FizzBuzz"
difficulty = "easy"

[interface]
function_name = "solve"
signature = "def solve(n)"
allowed_imports = []

[[phases]]
id = 0
description = "basic correctness"

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

pub const SINGLE_PHASE_TESTS_JSON: &str = r#"[
    {"input": 3, "expected": "Fizz", "phase": 0, "tags": []},
    {"input": 5, "expected": "Buzz", "phase": 0, "tags": []}
]"#;

/// Writes a complete task directory (`task.toml`, `problem.md`, `tests.json`)
/// under `dir`.
pub fn write_task(dir: &Path, task_toml: &str, tests_json: &str, problem: &str) {
    fs::create_dir_all(dir).expect("create task dir");
    fs::write(dir.join("task.toml"), task_toml).expect("write task.toml");
    fs::write(dir.join("problem.md"), problem).expect("write problem.md");
    fs::write(dir.join("tests.json"), tests_json).expect("write tests.json");
}

/// A fresh temp directory to use as a task directory.
pub fn task_dir() -> TempDir {
    TempDir::new().expect("create task dir")
}

/// A fresh temp directory to use as a workspace directory.
pub fn workspace_dir() -> TempDir {
    TempDir::new().expect("create workspace dir")
}
