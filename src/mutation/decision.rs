// Copyright 2024 The Kubernetes Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The decision builder.

use super::engine::{AppliedAssignment, RuleFailure};
use super::path::FieldPath;
use super::registry::RuleRef;
use super::rule::FieldAssignment;
use std::fmt;
use tracing::warn;

/// PatchConflict records a write that a later rule overwrote, either at the
/// same path or at one of its ancestors.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchConflict {
    /// The path that was overwritten.
    pub path: FieldPath,
    pub overwritten: RuleRef,
    /// The path written by the winning rule (equal to, or an ancestor of, `path`).
    pub winning_path: FieldPath,
    pub winner: RuleRef,
}

impl fmt::Display for PatchConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path == self.winning_path {
            write!(f, "{}: {} overwritten by {}", self.path, self.overwritten, self.winner)
        } else {
            write!(
                f,
                "{}: {} overwritten by {} via {}",
                self.path, self.overwritten, self.winner, self.winning_path
            )
        }
    }
}

/// Decision is the engine's answer for one request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Decision {
    pub allowed: bool,
    /// Winning assignments in application order.
    pub patch: Vec<FieldAssignment>,
    pub reason: Option<String>,
    pub conflicts: Vec<PatchConflict>,
    pub failures: Vec<RuleFailure>,
}

impl Decision {
    /// Allow the request unmodified.
    pub fn allow() -> Self {
        Self {
            allowed: true,
            ..Default::default()
        }
    }

    /// Deny the request. Only used when the request cannot be interpreted.
    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
            ..Default::default()
        }
    }

    /// One line per failure and per conflict, suitable for response warnings.
    pub fn warnings(&self) -> Vec<String> {
        self.failures
            .iter()
            .map(|f| format!("rule {} failed: {}", f.source, f.error))
            .chain(self.conflicts.iter().map(|c| format!("patch conflict at {}", c)))
            .collect()
    }
}

/// Build the decision for a completed pass.
///
/// A write is dropped when a later write targets the same path or one of its
/// ancestors; registration order decides, so the highest index wins. Every
/// drop caused by another rule is recorded as a PatchConflict. Rule failures
/// never deny the request.
pub fn build(assignments: Vec<AppliedAssignment>, failures: Vec<RuleFailure>) -> Decision {
    let mut patch = Vec::with_capacity(assignments.len());
    let mut conflicts = Vec::new();

    for (i, applied) in assignments.iter().enumerate() {
        let shadowing = assignments[i + 1..]
            .iter()
            .rev()
            .find(|later| later.assignment.path.is_prefix_of(&applied.assignment.path));

        match shadowing {
            // A rule overwriting its own earlier write is not a conflict.
            Some(winner) if winner.source == applied.source => {}
            Some(winner) => {
                let conflict = PatchConflict {
                    path: applied.assignment.path.clone(),
                    overwritten: applied.source.clone(),
                    winning_path: winner.assignment.path.clone(),
                    winner: winner.source.clone(),
                };
                warn!(
                    path = %conflict.path,
                    overwritten = %conflict.overwritten,
                    winner = %conflict.winner,
                    "patch conflict resolved by registration order"
                );
                conflicts.push(conflict);
            }
            None => patch.push(applied.assignment.clone()),
        }
    }

    let reason = summarize(&failures, &conflicts);
    Decision {
        allowed: true,
        patch,
        reason,
        conflicts,
        failures,
    }
}

fn summarize(failures: &[RuleFailure], conflicts: &[PatchConflict]) -> Option<String> {
    let mut parts = Vec::new();
    if !failures.is_empty() {
        let list: Vec<String> = failures.iter().map(|f| f.to_string()).collect();
        parts.push(format!("{} rule(s) failed: [{}]", failures.len(), list.join(", ")));
    }
    if !conflicts.is_empty() {
        let list: Vec<String> = conflicts.iter().map(|c| c.to_string()).collect();
        parts.push(format!(
            "{} write(s) overwritten: [{}]",
            conflicts.len(),
            list.join(", ")
        ));
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::RuleError;
    use serde_json::{json, Value};

    fn source(rule: &str, index: usize) -> RuleRef {
        RuleRef {
            capability: "c".to_string(),
            rule: rule.to_string(),
            index,
        }
    }

    fn applied(rule: &str, index: usize, path: &str, value: Value) -> AppliedAssignment {
        AppliedAssignment {
            source: source(rule, index),
            assignment: FieldAssignment::new(FieldPath::parse(path).unwrap(), value),
        }
    }

    #[test]
    fn test_no_assignments_no_reason() {
        let decision = build(Vec::new(), Vec::new());
        assert!(decision.allowed);
        assert!(decision.patch.is_empty());
        assert!(decision.reason.is_none());
        assert!(decision.warnings().is_empty());
    }

    #[test]
    fn test_last_registered_wins() {
        let decision = build(
            vec![
                applied("low", 0, "spec.type", json!("NodePort")),
                applied("other", 1, "metadata.name", json!("x")),
                applied("high", 2, "spec.type", json!("LoadBalancer")),
            ],
            Vec::new(),
        );

        assert_eq!(decision.patch.len(), 2);
        assert_eq!(decision.patch[0].path.to_string(), "metadata.name");
        assert_eq!(decision.patch[1].value, json!("LoadBalancer"));
        assert_eq!(decision.conflicts.len(), 1);
        assert_eq!(decision.conflicts[0].overwritten.rule, "low");
        assert_eq!(decision.conflicts[0].winner.rule, "high");
        let reason = decision.reason.unwrap();
        assert!(reason.contains("1 write(s) overwritten"));
        assert!(reason.contains("c/low (#0) overwritten by c/high (#2)"));
    }

    #[test]
    fn test_three_writers_all_lose_to_the_last() {
        let decision = build(
            vec![
                applied("a", 0, "spec.x", json!(1)),
                applied("b", 1, "spec.x", json!(2)),
                applied("c", 2, "spec.x", json!(3)),
            ],
            Vec::new(),
        );
        assert_eq!(decision.patch, vec![FieldAssignment::new(FieldPath::parse("spec.x").unwrap(), json!(3))]);
        assert!(decision.conflicts.iter().all(|c| c.winner.rule == "c"));
        assert_eq!(decision.conflicts.len(), 2);
    }

    #[test]
    fn test_rule_overwriting_itself_is_not_a_conflict() {
        let decision = build(
            vec![
                applied("tier", 0, "metadata.labels.tier", json!("default")),
                applied("tier", 0, "metadata.labels.tier", json!("frontend")),
            ],
            Vec::new(),
        );

        assert!(decision.conflicts.is_empty());
        assert!(decision.reason.is_none());
        assert!(decision.warnings().is_empty());
        assert_eq!(
            decision.patch,
            vec![FieldAssignment::new(FieldPath::label("tier"), json!("frontend"))]
        );
    }

    #[test]
    fn test_self_overwrite_then_other_rule_wins() {
        let decision = build(
            vec![
                applied("a", 0, "spec.x", json!(1)),
                applied("a", 0, "spec.x", json!(2)),
                applied("b", 1, "spec.x", json!(3)),
            ],
            Vec::new(),
        );
        assert_eq!(decision.patch.len(), 1);
        assert_eq!(decision.patch[0].value, json!(3));
        assert_eq!(decision.conflicts.len(), 2);
        assert!(decision.conflicts.iter().all(|c| c.overwritten.rule == "a" && c.winner.rule == "b"));
    }

    #[test]
    fn test_ancestor_write_shadows_descendant() {
        let decision = build(
            vec![
                applied("limits", 0, "spec.containers[0].resources.limits.cpu", json!("2")),
                applied("resources", 1, "spec.containers[0].resources", json!({"limits": {"cpu": "3"}})),
                applied("after", 2, "spec.containers[0].resources.requests", json!({"cpu": "1"})),
            ],
            Vec::new(),
        );

        let paths: Vec<String> = decision.patch.iter().map(|a| a.path.to_string()).collect();
        assert_eq!(
            paths,
            vec!["spec.containers[0].resources", "spec.containers[0].resources.requests"]
        );
        assert_eq!(decision.conflicts.len(), 1);
        assert_eq!(decision.conflicts[0].winning_path.to_string(), "spec.containers[0].resources");
        assert!(decision.conflicts[0].to_string().contains("via spec.containers[0].resources"));
    }

    #[test]
    fn test_partial_failure_still_allowed() {
        let failure = RuleFailure {
            source: source("broken", 1),
            error: RuleError::failed("no quota"),
        };
        let decision = build(vec![applied("ok", 0, "spec.x", json!(1))], vec![failure]);

        assert!(decision.allowed);
        assert_eq!(decision.patch.len(), 1);
        assert_eq!(
            decision.reason.as_deref(),
            Some("1 rule(s) failed: [c/broken (#1): no quota]")
        );
        assert_eq!(decision.warnings(), vec!["rule c/broken (#1) failed: no quota".to_string()]);
    }

    #[test]
    fn test_all_failed_fails_open() {
        let failures = vec![
            RuleFailure { source: source("a", 0), error: RuleError::failed("x") },
            RuleFailure { source: source("b", 1), error: RuleError::Panicked("y".to_string()) },
        ];
        let decision = build(Vec::new(), failures);
        assert!(decision.allowed);
        assert!(decision.patch.is_empty());
        assert!(decision.reason.unwrap().starts_with("2 rule(s) failed"));
    }

    #[test]
    fn test_deny() {
        let decision = Decision::deny("malformed admission request: missing uid");
        assert!(!decision.allowed);
        assert!(decision.patch.is_empty());
        assert!(decision.reason.unwrap().contains("missing uid"));
        assert!(Decision::allow().allowed);
    }
}
