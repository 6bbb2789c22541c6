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

//! Rules: a match predicate plus a mutation function.

use super::path::FieldPath;
use crate::admission::attributes::{GroupVersionKind, LabelSet};
use crate::admission::{AdmissionRequest, Handler, RuleError};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// FieldAssignment sets one field of the object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldAssignment {
    pub path: FieldPath,
    pub value: Value,
}

impl FieldAssignment {
    pub fn new(path: FieldPath, value: Value) -> Self {
        Self { path, value }
    }
}

/// MutateFn is the mutation half of a rule.
///
/// It must be computed from the object and captured constants only; it runs
/// synchronously inside the admission pass.
pub type MutateFn = Arc<dyn Fn(&mut Mutation<'_>) -> Result<(), RuleError> + Send + Sync>;

/// Mutation is the read/write view a rule's mutate function works on.
///
/// Reads observe the working copy, which already carries the edits of
/// earlier rules and of this rule's own earlier `set` calls. Every write is
/// recorded as a FieldAssignment.
pub struct Mutation<'a> {
    request: &'a AdmissionRequest,
    object: Value,
    assignments: Vec<FieldAssignment>,
}

impl<'a> Mutation<'a> {
    pub(crate) fn new(request: &'a AdmissionRequest, object: Value) -> Self {
        Self {
            request,
            object,
            assignments: Vec::new(),
        }
    }

    /// The original, unmodified request.
    pub fn request(&self) -> &AdmissionRequest {
        self.request
    }

    /// The current working copy.
    pub fn object(&self) -> &Value {
        &self.object
    }

    /// Look up a field of the working copy.
    ///
    /// An unparseable path yields None, the same as a missing field. Use
    /// [`Mutation::try_get`] to tell the two apart.
    pub fn get(&self, path: &str) -> Option<&Value> {
        FieldPath::parse(path).ok()?.get(&self.object)
    }

    /// Look up a field of the working copy, failing on an unparseable path.
    pub fn try_get(&self, path: &str) -> Result<Option<&Value>, RuleError> {
        Ok(FieldPath::parse(path)?.get(&self.object))
    }

    /// String form of [`Mutation::get`]. Non-string values yield None.
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    /// Assign `value` at `path`.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) -> Result<(), RuleError> {
        let path = FieldPath::parse(path)?;
        self.set_path(path, value.into())
    }

    /// Assign a serializable value at `path`.
    pub fn set_serialized<T: Serialize>(&mut self, path: &str, value: &T) -> Result<(), RuleError> {
        let value = serde_json::to_value(value).map_err(|e| RuleError::failed(e.to_string()))?;
        self.set(path, value)
    }

    pub fn set_path(&mut self, path: FieldPath, value: Value) -> Result<(), RuleError> {
        path.set(&mut self.object, value.clone())?;
        self.assignments.push(FieldAssignment::new(path, value));
        Ok(())
    }

    pub fn set_annotation(&mut self, key: &str, value: &str) -> Result<(), RuleError> {
        self.set_path(FieldPath::annotation(key), Value::String(value.to_string()))
    }

    pub fn set_label(&mut self, key: &str, value: &str) -> Result<(), RuleError> {
        self.set_path(FieldPath::label(key), Value::String(value.to_string()))
    }

    pub(crate) fn into_parts(self) -> (Value, Vec<FieldAssignment>) {
        (self.object, self.assignments)
    }
}

/// KindSelector matches request kinds. Unset group or version match any.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KindSelector {
    pub group: Option<String>,
    pub version: Option<String>,
    pub kind: String,
}

impl KindSelector {
    /// Match a kind name in any group and version.
    pub fn kind(kind: &str) -> Self {
        Self {
            group: None,
            version: None,
            kind: kind.to_string(),
        }
    }

    /// Match a kind of the core ("") group at v1.
    pub fn core(kind: &str) -> Self {
        Self::exact(&GroupVersionKind::new("", "v1", kind))
    }

    pub fn exact(gvk: &GroupVersionKind) -> Self {
        Self {
            group: Some(gvk.group.clone()),
            version: Some(gvk.version.clone()),
            kind: gvk.kind.clone(),
        }
    }

    /// Parse `Kind`, `version/Kind` or `group/version/Kind`.
    pub fn parse(s: &str) -> Option<Self> {
        let parts: Vec<&str> = s.split('/').collect();
        let selector = match parts.as_slice() {
            [kind] => Self::kind(kind),
            [version, kind] => Self::exact(&GroupVersionKind::new("", version, kind)),
            [group, version, kind] => Self::exact(&GroupVersionKind::new(group, version, kind)),
            _ => return None,
        };
        GroupVersionKind::new("", "v1", &selector.kind)
            .validate()
            .ok()
            .map(|_| selector)
    }

    pub fn matches(&self, gvk: &GroupVersionKind) -> bool {
        self.kind == gvk.kind
            && self.group.as_ref().map_or(true, |g| *g == gvk.group)
            && self.version.as_ref().map_or(true, |v| *v == gvk.version)
    }
}

impl fmt::Display for KindSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let group = self.group.as_deref().unwrap_or("*");
        let version = self.version.as_deref().unwrap_or("*");
        if group.is_empty() {
            write!(f, "{}/{}", version, self.kind)
        } else {
            write!(f, "{}/{}/{}", group, version, self.kind)
        }
    }
}

/// Rule is a declarative match predicate plus a mutation function.
#[derive(Clone)]
pub struct Rule {
    /// Name is unique within the owning capability.
    pub name: String,
    pub match_kind: KindSelector,
    pub match_operation: Handler,
    /// Exact namespace to match; None matches every namespace.
    pub match_namespace: Option<String>,
    /// Every entry must be present on the request with an equal value.
    pub match_labels: LabelSet,
    pub match_annotations: LabelSet,
    pub match_name: Option<String>,
    mutate: MutateFn,
}

impl Rule {
    /// Create a rule reacting to CREATE of `kind` in any namespace.
    pub fn new<F>(name: &str, kind: KindSelector, mutate: F) -> Self
    where
        F: Fn(&mut Mutation<'_>) -> Result<(), RuleError> + Send + Sync + 'static,
    {
        Self::with_mutate_fn(name, kind, Arc::new(mutate))
    }

    pub fn with_mutate_fn(name: &str, kind: KindSelector, mutate: MutateFn) -> Self {
        Self {
            name: name.to_string(),
            match_kind: kind,
            match_operation: Handler::default(),
            match_namespace: None,
            match_labels: LabelSet::new(),
            match_annotations: LabelSet::new(),
            match_name: None,
            mutate,
        }
    }

    pub fn with_operation(mut self, operation: Handler) -> Self {
        self.match_operation = operation;
        self
    }

    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.match_namespace = Some(namespace.to_string());
        self
    }

    pub fn with_label(mut self, key: &str, value: &str) -> Self {
        self.match_labels.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_annotation(mut self, key: &str, value: &str) -> Self {
        self.match_annotations.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.match_name = Some(name.to_string());
        self
    }

    /// Run the mutate function against a view.
    pub fn apply(&self, mutation: &mut Mutation<'_>) -> Result<(), RuleError> {
        (self.mutate)(mutation)
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("match_kind", &self.match_kind)
            .field("match_operation", &self.match_operation)
            .field("match_namespace", &self.match_namespace)
            .field("match_labels", &self.match_labels)
            .field("match_annotations", &self.match_annotations)
            .field("match_name", &self.match_name)
            .finish_non_exhaustive()
    }
}
