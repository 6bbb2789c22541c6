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

//! Rule predicates.

use super::rule::Rule;
use crate::admission::attributes::LabelSet;
use crate::admission::AdmissionRequest;
use std::fmt;

/// Mismatch names the first criterion a request failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mismatch {
    Kind,
    Operation,
    Namespace,
    Label(String),
    Annotation(String),
    Name,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mismatch::Kind => f.write_str("kind"),
            Mismatch::Operation => f.write_str("operation"),
            Mismatch::Namespace => f.write_str("namespace"),
            Mismatch::Label(key) => write!(f, "label {}", key),
            Mismatch::Annotation(key) => write!(f, "annotation {}", key),
            Mismatch::Name => f.write_str("name"),
        }
    }
}

/// Evaluate the rule's predicate, criterion by criterion: kind, operation,
/// namespace, labels, then annotations and name.
pub fn check(rule: &Rule, request: &AdmissionRequest) -> Result<(), Mismatch> {
    if !rule.match_kind.matches(request.kind()) {
        return Err(Mismatch::Kind);
    }

    if !rule.match_operation.handles(request.operation()) {
        return Err(Mismatch::Operation);
    }

    if let Some(namespace) = &rule.match_namespace {
        if namespace != request.namespace() {
            return Err(Mismatch::Namespace);
        }
    }

    if let Some(key) = first_missing(&rule.match_labels, request.labels()) {
        return Err(Mismatch::Label(key.to_string()));
    }

    if let Some(key) = first_missing(&rule.match_annotations, request.annotations()) {
        return Err(Mismatch::Annotation(key.to_string()));
    }

    if let Some(name) = &rule.match_name {
        if name != request.name() {
            return Err(Mismatch::Name);
        }
    }

    Ok(())
}

/// Whether the rule applies to the request.
pub fn matches(rule: &Rule, request: &AdmissionRequest) -> bool {
    check(rule, request).is_ok()
}

/// First wanted key that is absent from `have` or has a different value.
fn first_missing<'a>(want: &'a LabelSet, have: &LabelSet) -> Option<&'a str> {
    want.iter()
        .find(|(key, value)| have.get(*key) != Some(*value))
        .map(|(key, _)| key.as_str())
}
