//! Rule/Scope Evaluation Protocol (SPEC_FULL.md §4.C).
//!
//! Each [`RuleKind`](crate::types::RuleKind) is implemented once as a
//! [`RuleCheck`] and resolved per-rule by [`registry::build_registry`],
//! mirroring the reference evaluator's `getattr(self, f"check_{rule.id}")`
//! dispatch but as a compiled table instead of runtime reflection.

pub mod kinds;
pub mod registry;

use std::time::Duration;

use crate::error::BenchError;
use crate::sandbox::Sandbox;
use crate::types::{RuleParams, RuleResult, TestCase};

/// A single rule's pass/fail check against one test case.
pub trait RuleCheck {
    fn check(
        &self,
        sandbox: &Sandbox,
        function_name: &str,
        test: &TestCase,
        params: &RuleParams,
        timeout: Duration,
    ) -> Result<RuleResult, BenchError>;
}
