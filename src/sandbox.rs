//! Sandboxed execution layer (SPEC_FULL.md §4.B).
//!
//! `prepare` performs the static import-allow-list check and loads a
//! candidate solution's top-level definitions; `invoke` calls a named
//! function under a wall-clock deadline. The reference sandbox enforces its
//! timeout by running the call in a separate OS process and killing it; the
//! scripting language's values (`Rc<RefCell<_>>` lists and dicts) are not
//! `Send`, so that approach doesn't carry over directly. Instead the
//! interpreter checks the deadline cooperatively at every loop iteration and
//! function call (see `Interpreter::call_function_with_deadline`) and bails
//! out with a timeout error from inside the call itself.

use std::time::{Duration, Instant};

use crate::error::BenchError;
use crate::script::interpreter::{Interpreter, TIMEOUT_KIND};
use crate::script::value::Value;
use crate::script::{collect_imports, lexer::Lexer, parser};

/// A loaded candidate solution, ready to be invoked.
pub struct Sandbox {
    interpreter: Interpreter,
}

impl Sandbox {
    /// Lexes, parses, statically checks imports against `allowed_imports`,
    /// and evaluates top-level statements (function definitions).
    pub fn prepare(code: &str, allowed_imports: &[String]) -> Result<Self, BenchError> {
        let tokens = Lexer::new(code)
            .tokenize()
            .map_err(|e| BenchError::Syntax(e.to_string()))?;
        let program = parser::parse(tokens).map_err(|e| BenchError::Syntax(e.to_string()))?;

        for module in collect_imports(&program) {
            if !allowed_imports.iter().any(|m| m == &module) {
                return Err(BenchError::ImportViolation {
                    module,
                    allowed: allowed_imports.to_vec(),
                });
            }
        }

        let mut interpreter = Interpreter::new();
        interpreter
            .load(&program)
            .map_err(|e| BenchError::Runtime {
                kind: e.kind.clone(),
                message: e.message.clone(),
            })?;

        Ok(Self { interpreter })
    }

    pub fn has_entry(&self, function_name: &str) -> bool {
        matches!(
            self.interpreter.lookup(function_name),
            Some(Value::Function(_)) | Some(Value::Builtin(_))
        )
    }

    /// Invokes `function_name` with `args`, bounded by `timeout`. The
    /// deadline is checked at every loop iteration and call inside the
    /// interpreter, so a runaway `while True:` is interrupted rather than
    /// hanging the caller.
    pub fn invoke(
        &self,
        function_name: &str,
        args: Vec<Value>,
        timeout: Duration,
    ) -> Result<Value, BenchError> {
        if !self.has_entry(function_name) {
            return Err(BenchError::EntryMissing(function_name.to_string()));
        }

        let deadline = Instant::now() + timeout;
        match self
            .interpreter
            .call_function_with_deadline(function_name, args, deadline)
        {
            Ok(value) => Ok(value),
            Err(e) if e.kind == TIMEOUT_KIND => Err(BenchError::Timeout(timeout.as_secs())),
            Err(e) => Err(BenchError::Runtime {
                kind: e.kind,
                message: e.message,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_disallowed_import() {
        let code = "import os\ndef f(x):\n    return x\n";
        let err = Sandbox::prepare(code, &[]).unwrap_err();
        assert!(matches!(err, BenchError::ImportViolation { .. }));
    }

    #[test]
    fn allows_whitelisted_import() {
        let code = "import math\ndef f(x):\n    return x\n";
        let sandbox = Sandbox::prepare(code, &["math".to_string()]).unwrap();
        assert!(sandbox.has_entry("f"));
    }

    #[test]
    fn invoke_runs_entry_function() {
        let code = "def add(a, b):\n    return a + b\n";
        let sandbox = Sandbox::prepare(code, &[]).unwrap();
        let result = sandbox
            .invoke("add", vec![Value::Int(2), Value::Int(3)], Duration::from_secs(5))
            .unwrap();
        assert!(matches!(result, Value::Int(5)));
    }

    #[test]
    fn invoke_missing_entry_errors() {
        let code = "def add(a, b):\n    return a + b\n";
        let sandbox = Sandbox::prepare(code, &[]).unwrap();
        let err = sandbox
            .invoke("missing", vec![], Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, BenchError::EntryMissing(_)));
    }

    #[test]
    fn invoke_times_out_on_infinite_loop() {
        let code = "def spin():\n    while True:\n        x = 1\n";
        let sandbox = Sandbox::prepare(code, &[]).unwrap();
        let err = sandbox
            .invoke("spin", vec![], Duration::from_millis(50))
            .unwrap_err();
        assert!(matches!(err, BenchError::Timeout(_)));
    }
}
