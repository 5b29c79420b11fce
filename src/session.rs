//! Phase State Machine (SPEC_FULL.md §4.E).
//!
//! Owns the mutable per-session state (current phase, attempt counters,
//! previous feedback) and drives one attempt at a time through
//! [`crate::engine::evaluate`], deciding phase advancement — including the
//! recursive implicit-evaluation collapse this rewrite adds over the
//! reference `run_interactive`'s single-step advance (see DESIGN.md).

use std::time::Duration;

use crate::engine::{self, EvaluationOutcome};
use crate::error::BenchError;
use crate::rule::registry::Registry;
use crate::sandbox::Sandbox;
use crate::types::{ErrorInfo, Feedback, Limits, Phase, Status, Summary, TestCase, Violation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    InProgress,
    Completed,
    Failed,
}

/// Reason a session reached a terminal `Failed` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    TotalCap,
    PhaseCap,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureReason::TotalCap => "total_cap",
            FailureReason::PhaseCap => "phase_cap",
        };
        write!(f, "{}", s)
    }
}

/// Outcome of submitting one candidate source to the session: the feedback
/// for the submitted attempt, any implicit evaluations produced by phase
/// collapse, and the session status after applying them.
pub struct AttemptOutcome {
    pub feedback: Feedback,
    pub implicit_feedback: Vec<Feedback>,
    pub status: SessionStatus,
    pub failure_reason: Option<FailureReason>,
}

/// Engine-owned, mutable phase progression state (SPEC_FULL.md §3 "Phase State").
pub struct Session {
    phases: Vec<Phase>,
    limits: Limits,
    current_phase_idx: usize,
    total_attempts: u32,
    phase_attempts: u32,
    previous_feedback: Option<Feedback>,
}

impl Session {
    pub fn new(phases: Vec<Phase>, limits: Limits) -> Self {
        Self {
            phases,
            limits,
            current_phase_idx: 0,
            total_attempts: 0,
            phase_attempts: 0,
            previous_feedback: None,
        }
    }

    pub fn current_phase_id(&self) -> u32 {
        self.phases[self.current_phase_idx].id
    }

    pub fn current_phase(&self) -> &Phase {
        &self.phases[self.current_phase_idx]
    }

    pub fn total_attempts(&self) -> u32 {
        self.total_attempts
    }

    pub fn previous_feedback(&self) -> Option<&Feedback> {
        self.previous_feedback.as_ref()
    }

    fn is_last_phase(&self) -> bool {
        self.current_phase_idx == self.phases.len() - 1
    }

    /// Submits `source`, attempting to prepare and evaluate it against the
    /// current phase. Empty source is treated as an error attempt that still
    /// counts toward both attempt caps (SPEC_FULL.md §4.E).
    pub fn submit_attempt(
        &mut self,
        source: &str,
        function_name: &str,
        allowed_imports: &[String],
        registry: &Registry,
        tests: &[TestCase],
        timeout: Duration,
    ) -> Result<AttemptOutcome, BenchError> {
        if let Some(reason) = self.check_limits_before_attempt() {
            return Ok(self.terminal_outcome(reason));
        }

        self.total_attempts += 1;
        self.phase_attempts += 1;

        let feedback = if source.trim().is_empty() {
            self.feedback_for_error(
                self.current_phase_id(),
                self.total_attempts,
                BenchError::Syntax("empty candidate source".to_string()).to_error_info(),
            )
        } else {
            self.run_one_attempt(source, function_name, allowed_imports, registry, tests, timeout)?
        };

        self.previous_feedback = Some(feedback.clone());

        let mut implicit_feedback = Vec::new();
        let mut status = SessionStatus::InProgress;
        let failure_reason = None;

        if feedback.status == Status::Valid {
            if self.is_last_phase() {
                status = SessionStatus::Completed;
            } else {
                self.current_phase_idx += 1;
                self.phase_attempts = 0;
                let collapse = self.collapse_implicit_evaluations(
                    source,
                    function_name,
                    allowed_imports,
                    registry,
                    tests,
                    timeout,
                )?;
                implicit_feedback = collapse.0;
                status = collapse.1;
            }
        }

        Ok(AttemptOutcome {
            feedback,
            implicit_feedback,
            status,
            failure_reason,
        })
    }

    /// Recursively evaluates the same source under each newly-entered phase's
    /// rules without consuming attempt budget, collapsing as many
    /// already-satisfied phases as the solution passes in one go
    /// (SPEC_FULL.md invariant #8 / scenario S6).
    ///
    /// Implicit evaluations never update `previous_feedback` (which tracks
    /// only the last *non-transition* result, per SPEC_FULL.md §3's Phase
    /// State), so every implicit Feedback in the collapse chain reports delta
    /// against the same triggering attempt, not against the previous
    /// implicit step.
    fn collapse_implicit_evaluations(
        &mut self,
        source: &str,
        function_name: &str,
        allowed_imports: &[String],
        registry: &Registry,
        tests: &[TestCase],
        timeout: Duration,
    ) -> Result<(Vec<Feedback>, SessionStatus), BenchError> {
        let mut produced = Vec::new();
        loop {
            let feedback = self.run_one_attempt(source, function_name, allowed_imports, registry, tests, timeout)?;
            let is_valid = feedback.status == Status::Valid;
            produced.push(feedback);

            if !is_valid {
                return Ok((produced, SessionStatus::InProgress));
            }
            if self.is_last_phase() {
                return Ok((produced, SessionStatus::Completed));
            }
            self.current_phase_idx += 1;
            self.phase_attempts = 0;
        }
    }

    fn run_one_attempt(
        &self,
        source: &str,
        function_name: &str,
        allowed_imports: &[String],
        registry: &Registry,
        tests: &[TestCase],
        timeout: Duration,
    ) -> Result<Feedback, BenchError> {
        let phase = &self.phases[self.current_phase_idx];
        match Sandbox::prepare(source, allowed_imports) {
            Ok(sandbox) => match engine::evaluate(&sandbox, function_name, registry, phase, tests, timeout) {
                Ok(outcome) => Ok(self.feedback_for_outcome(phase.id, self.total_attempts, outcome)),
                Err(e) if e.is_execution_error() => {
                    Ok(self.feedback_for_error(phase.id, self.total_attempts, e.to_error_info()))
                }
                Err(e) => Err(e),
            },
            Err(e) if e.is_execution_error() => {
                Ok(self.feedback_for_error(phase.id, self.total_attempts, e.to_error_info()))
            }
            Err(e) => Err(e),
        }
    }

    fn feedback_for_outcome(&self, phase_id: u32, attempt_id: u32, outcome: EvaluationOutcome) -> Feedback {
        let status = engine::status_for_summary(&outcome.summary);
        let status_reason = status_reason_for(status, &outcome.violations);
        let delta = self.previous_feedback.as_ref().map(|prev| {
            engine::calculate_delta(&outcome.violations, &outcome.summary, &prev.violations, &prev.summary)
        });

        Feedback {
            phase_id,
            attempt_id,
            status,
            status_reason,
            violations: outcome.violations,
            summary: outcome.summary,
            delta,
            error: None,
        }
    }

    fn feedback_for_error(&self, phase_id: u32, attempt_id: u32, error: ErrorInfo) -> Feedback {
        Feedback {
            phase_id,
            attempt_id,
            status: Status::Error,
            status_reason: error.message.clone(),
            violations: Vec::new(),
            summary: Summary {
                rules_total: self.phases[self.current_phase_idx].rules.len() as u32,
                rules_passed: 0,
                rules_failed: 0,
                coverage: 0.0,
            },
            delta: None,
            error: Some(error),
        }
    }

    /// Whether the next attempt would be rejected outright by the attempt
    /// caps, with no evaluation performed. Exposed so a caller driving the
    /// session from outside `submit_attempt` (e.g. a polling loop waiting on
    /// a file that the agent never rewrites again) can detect and terminate
    /// the session deterministically without waiting for another submission
    /// that will never come (SPEC_FULL.md §4.E).
    pub fn check_limits_before_attempt(&self) -> Option<FailureReason> {
        if self.total_attempts >= self.limits.max_total_attempts {
            Some(FailureReason::TotalCap)
        } else if self.phase_attempts >= self.limits.max_attempts_per_phase {
            Some(FailureReason::PhaseCap)
        } else {
            None
        }
    }

    /// Builds the `Failed` outcome for a session whose attempt budget is
    /// already exhausted, without consuming any further budget or running
    /// an evaluation. Callers must not count this outcome as a real attempt
    /// in per-phase metrics (SPEC_FULL.md §8 scenario S5's `attempts` count
    /// reflects only real evaluations).
    pub fn terminal_outcome(&self, reason: FailureReason) -> AttemptOutcome {
        let phase = &self.phases[self.current_phase_idx];
        AttemptOutcome {
            feedback: Feedback {
                phase_id: phase.id,
                attempt_id: self.total_attempts,
                status: Status::Error,
                status_reason: format!("attempt budget exhausted: {}", reason),
                violations: Vec::new(),
                summary: Summary {
                    rules_total: phase.rules.len() as u32,
                    rules_passed: 0,
                    rules_failed: 0,
                    coverage: 0.0,
                },
                delta: None,
                error: None,
            },
            implicit_feedback: Vec::new(),
            status: SessionStatus::Failed,
            failure_reason: Some(reason),
        }
    }
}

/// `"All rules pass"` when valid, otherwise `"Fails checks: r1, r2, …"` with
/// failed rule ids sorted (SPEC_FULL.md §4.D step 5).
fn status_reason_for(status: Status, violations: &[Violation]) -> String {
    if status == Status::Valid {
        return "All rules pass".to_string();
    }
    let mut rule_ids: Vec<&str> = violations.iter().map(|v| v.rule_id.as_str()).collect();
    rule_ids.sort_unstable();
    rule_ids.dedup();
    format!("Fails checks: {}", rule_ids.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::registry::build_registry;
    use crate::types::{Rule, RuleKind, RuleParams, ScriptJson};

    fn phases() -> Vec<Phase> {
        vec![
            Phase {
                id: 0,
                description: "basic".to_string(),
                rules: vec![Rule {
                    id: "correctness".to_string(),
                    description: "matches".to_string(),
                    scopes: vec![],
                    kind: RuleKind::Correctness,
                    params: RuleParams::default(),
                }],
            },
            Phase {
                id: 1,
                description: "no mutation".to_string(),
                rules: vec![Rule {
                    id: "no_mutation".to_string(),
                    description: "does not mutate input".to_string(),
                    scopes: vec![],
                    kind: RuleKind::NoMutation,
                    params: RuleParams { scope: Some("direct".to_string()), ..Default::default() },
                }],
            },
        ]
    }

    fn tests_corpus() -> Vec<TestCase> {
        vec![
            TestCase { input: ScriptJson::Int(1), expected: ScriptJson::Int(2), phase: 0, tags: vec![] },
            TestCase {
                input: ScriptJson::List(vec![ScriptJson::Int(1)]),
                expected: ScriptJson::List(vec![ScriptJson::Int(1)]),
                phase: 1,
                tags: vec![],
            },
        ]
    }

    #[test]
    fn solution_satisfying_both_phases_collapses_to_completion() {
        // Both phase 0 (correctness against x) and phase 1 (no_mutation) hold
        // for the identity function, so the phase-0 attempt should implicitly
        // clear phase 1 too and complete the session in one submission.
        let code = "def solve(x):\n    return x\n";
        let mut session = Session::new(phases(), Limits { max_attempts_per_phase: 5, max_total_attempts: 10 });
        let registry = build_registry(&session.phases.iter().flat_map(|p| p.rules.clone()).collect::<Vec<_>>());
        let corpus = vec![
            TestCase { input: ScriptJson::Int(1), expected: ScriptJson::Int(1), phase: 0, tags: vec![] },
            TestCase {
                input: ScriptJson::List(vec![ScriptJson::Int(1)]),
                expected: ScriptJson::List(vec![ScriptJson::Int(1)]),
                phase: 1,
                tags: vec![],
            },
        ];
        let outcome = session
            .submit_attempt(code, "solve", &[], &registry, &corpus, Duration::from_secs(1))
            .unwrap();

        assert_eq!(outcome.feedback.status, Status::Valid);
        assert_eq!(outcome.implicit_feedback.len(), 1);
        assert_eq!(outcome.implicit_feedback[0].status, Status::Valid);
        assert_eq!(outcome.status, SessionStatus::Completed);
    }

    #[test]
    fn empty_source_counts_as_error_attempt() {
        let mut session = Session::new(phases(), Limits { max_attempts_per_phase: 5, max_total_attempts: 10 });
        let registry = build_registry(&session.phases.iter().flat_map(|p| p.rules.clone()).collect::<Vec<_>>());
        let outcome = session
            .submit_attempt("   ", "solve", &[], &registry, &tests_corpus(), Duration::from_secs(1))
            .unwrap();
        assert_eq!(outcome.feedback.status, Status::Error);
        assert_eq!(session.total_attempts(), 1);
    }

    #[test]
    fn phase_cap_exhaustion_fails_session_on_next_submission() {
        // Wrong solution: never satisfies phase 0's correctness rule, so the
        // cap check (which runs before each attempt) only bites once the
        // already-spent attempt's budget is exhausted, per SPEC_FULL.md
        // §4.E's "Limit checks before each attempt".
        let code = "def solve(x):\n    return x\n";
        let mut session = Session::new(phases(), Limits { max_attempts_per_phase: 1, max_total_attempts: 10 });
        let registry = build_registry(&session.phases.iter().flat_map(|p| p.rules.clone()).collect::<Vec<_>>());
        let first = session
            .submit_attempt(code, "solve", &[], &registry, &tests_corpus(), Duration::from_secs(1))
            .unwrap();
        assert_eq!(first.status, SessionStatus::InProgress);
        assert_eq!(first.feedback.status, Status::PartiallyValid);

        let second = session
            .submit_attempt(code, "solve", &[], &registry, &tests_corpus(), Duration::from_secs(1))
            .unwrap();
        assert_eq!(second.status, SessionStatus::Failed);
        assert_eq!(second.failure_reason, Some(FailureReason::PhaseCap));
    }
}
