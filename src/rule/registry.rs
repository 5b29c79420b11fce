//! Builds a `rule_id -> RuleCheck` table from a task's declared rules.

use std::collections::HashMap;

use crate::rule::kinds::{
    CorrectErrorCheck, CorrectTypeCheck, CorrectnessCheck, DeterministicCheck, NoMutationCheck,
    PerformanceCheck,
};
use crate::rule::RuleCheck;
use crate::types::{Rule, RuleKind};

pub struct Registry {
    checks: HashMap<String, Box<dyn RuleCheck>>,
}

impl Registry {
    pub fn get(&self, rule_id: &str) -> Option<&dyn RuleCheck> {
        self.checks.get(rule_id).map(|b| b.as_ref())
    }
}

fn check_for_kind(kind: RuleKind) -> Box<dyn RuleCheck> {
    match kind {
        RuleKind::Correctness => Box::new(CorrectnessCheck),
        RuleKind::NoMutation => Box::new(NoMutationCheck),
        RuleKind::Deterministic => Box::new(DeterministicCheck),
        RuleKind::CorrectError => Box::new(CorrectErrorCheck),
        RuleKind::CorrectType => Box::new(CorrectTypeCheck),
        RuleKind::Performance => Box::new(PerformanceCheck),
    }
}

/// Builds the registry from every rule declared across all phases, so a rule
/// reused in a later phase resolves to the same check implementation.
pub fn build_registry(rules: &[Rule]) -> Registry {
    let mut checks: HashMap<String, Box<dyn RuleCheck>> = HashMap::new();
    for rule in rules {
        checks.insert(rule.id.clone(), check_for_kind(rule.kind));
    }
    Registry { checks }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Rule, RuleParams};

    fn rule(id: &str, kind: RuleKind) -> Rule {
        Rule {
            id: id.to_string(),
            description: String::new(),
            scopes: vec![],
            kind,
            params: RuleParams::default(),
        }
    }

    #[test]
    fn resolves_each_declared_rule() {
        let rules = vec![
            rule("correctness", RuleKind::Correctness),
            rule("no_mutation", RuleKind::NoMutation),
        ];
        let registry = build_registry(&rules);
        assert!(registry.get("correctness").is_some());
        assert!(registry.get("no_mutation").is_some());
        assert!(registry.get("missing").is_none());
    }
}
