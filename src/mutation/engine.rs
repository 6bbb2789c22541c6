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

//! The mutation engine: one sequential pass of the matching rules over a
//! working copy of the object.

use super::matcher;
use super::registry::{RegisteredRule, RuleRef};
use super::rule::{FieldAssignment, Mutation};
use crate::admission::{AdmissionRequest, RuleError};
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, warn};

/// An assignment tagged with the rule that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedAssignment {
    pub source: RuleRef,
    pub assignment: FieldAssignment,
}

/// RuleFailure records which rule failed and why.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleFailure {
    pub source: RuleRef,
    pub error: RuleError,
}

impl fmt::Display for RuleFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.source, self.error)
    }
}

/// Evaluation is the outcome of one pass.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Evaluation {
    /// Assignments in the order they were applied.
    pub assignments: Vec<AppliedAssignment>,
    pub failures: Vec<RuleFailure>,
    /// Rules whose predicate matched, whether or not they succeeded.
    pub matched: Vec<RuleRef>,
    /// The working copy after the last rule.
    pub object: Value,
}

/// Run every matching rule, in the given order, against a working copy of
/// the request's object.
///
/// Matching always looks at the original request. A rule that fails leaves
/// the working copy as it was before the rule ran; the pass continues.
pub fn evaluate<'r, I>(rules: I, request: &AdmissionRequest) -> Evaluation
where
    I: IntoIterator<Item = &'r RegisteredRule>,
{
    let mut evaluation = Evaluation {
        object: request.object().clone(),
        ..Default::default()
    };

    for registered in rules {
        let source = registered.reference();

        if let Err(mismatch) = matcher::check(registered.rule(), request) {
            debug!(rule = %source, %mismatch, "rule skipped");
            continue;
        }
        evaluation.matched.push(source.clone());

        match run_rule(registered, request, &evaluation.object) {
            Ok((object, assignments)) => {
                for assignment in &assignments {
                    debug!(rule = %source, path = %assignment.path, "field assigned");
                }
                evaluation.object = object;
                evaluation
                    .assignments
                    .extend(assignments.into_iter().map(|assignment| AppliedAssignment {
                        source: source.clone(),
                        assignment,
                    }));
            }
            Err(error) => {
                warn!(rule = %source, %error, "rule failed, contribution discarded");
                evaluation.failures.push(RuleFailure {
                    source: source.clone(),
                    error,
                });
            }
        }
    }

    evaluation
}

fn run_rule(
    registered: &RegisteredRule,
    request: &AdmissionRequest,
    working: &Value,
) -> Result<(Value, Vec<FieldAssignment>), RuleError> {
    let mut mutation = Mutation::new(request, working.clone());
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| registered.rule().apply(&mut mutation)));

    match outcome {
        Ok(Ok(())) => Ok(mutation.into_parts()),
        Ok(Err(error)) => Err(error),
        Err(payload) => Err(RuleError::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
