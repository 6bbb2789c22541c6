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

//! The normalized view of an admission request that rules are matched against.

use super::errors::{AdmissionError, AdmissionResult};
use super::interfaces::Operation;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Label and annotation maps. Ordered so evaluation is deterministic.
pub type LabelSet = BTreeMap<String, String>;

/// GroupVersionResource identifies a resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct GroupVersionResource {
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub resource: String,
}

impl GroupVersionResource {
    pub fn new(group: &str, version: &str, resource: &str) -> Self {
        Self {
            group: group.to_string(),
            version: version.to_string(),
            resource: resource.to_string(),
        }
    }
}

/// GroupVersionKind identifies a kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct GroupVersionKind {
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub kind: String,
}

impl GroupVersionKind {
    pub fn new(group: &str, version: &str, kind: &str) -> Self {
        Self {
            group: group.to_string(),
            version: version.to_string(),
            kind: kind.to_string(),
        }
    }

    /// Check that the kind is a recognizable Kubernetes kind name.
    pub fn validate(&self) -> AdmissionResult<()> {
        if self.version.is_empty() {
            return Err(AdmissionError::malformed(format!(
                "kind \"{}\" has no version",
                self.kind
            )));
        }
        if !is_kind_name(&self.kind) {
            return Err(AdmissionError::malformed(format!(
                "unrecognized kind \"{}\"",
                self.kind
            )));
        }
        Ok(())
    }
}

impl fmt::Display for GroupVersionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}/{}", self.version, self.kind)
        } else {
            write!(f, "{}/{}/{}", self.group, self.version, self.kind)
        }
    }
}

/// Kind names are CamelCase identifiers.
fn is_kind_name(kind: &str) -> bool {
    let mut chars = kind.chars();
    match chars.next() {
        Some(c) if c.is_ascii_uppercase() => chars.all(|c| c.is_ascii_alphanumeric()),
        _ => false,
    }
}

/// AdmissionRequest is the immutable, normalized view of one admission call.
///
/// Labels and annotations are lifted out of `metadata` once, so matching
/// never has to walk the object tree. For DELETE requests the object is
/// usually absent and the metadata is read from the old object instead.
#[derive(Debug, Clone, PartialEq)]
pub struct AdmissionRequest {
    uid: String,
    kind: GroupVersionKind,
    resource: GroupVersionResource,
    sub_resource: String,
    operation: Operation,
    name: String,
    namespace: String,
    labels: LabelSet,
    annotations: LabelSet,
    object: Value,
    old_object: Option<Value>,
    dry_run: bool,
}

impl AdmissionRequest {
    /// Create a request for the given object. Labels and annotations are read
    /// from `object.metadata`; the name falls back to `metadata.name`.
    pub fn new(
        uid: &str,
        kind: GroupVersionKind,
        operation: Operation,
        namespace: &str,
        object: Value,
    ) -> AdmissionResult<Self> {
        kind.validate()?;
        if !(object.is_object() || object.is_null()) {
            return Err(AdmissionError::malformed("object must be a JSON object"));
        }

        let labels = string_map(&object, "labels")?;
        let annotations = string_map(&object, "annotations")?;
        let name = metadata_str(&object, "name").unwrap_or_default().to_string();

        Ok(Self {
            uid: uid.to_string(),
            kind,
            resource: GroupVersionResource::default(),
            sub_resource: String::new(),
            operation,
            name,
            namespace: namespace.to_string(),
            labels,
            annotations,
            object,
            old_object: None,
            dry_run: false,
        })
    }

    /// Helper to create a request for a core/v1 object.
    pub fn new_core(kind: &str, operation: Operation, namespace: &str, object: Value) -> AdmissionResult<Self> {
        Self::new("", GroupVersionKind::new("", "v1", kind), operation, namespace, object)
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_resource(mut self, resource: GroupVersionResource, sub_resource: &str) -> Self {
        self.resource = resource;
        self.sub_resource = sub_resource.to_string();
        self
    }

    /// Attach the previous version of the object. When the request carries no
    /// object of its own, labels and annotations are taken from it.
    pub fn with_old_object(mut self, old_object: Value) -> AdmissionResult<Self> {
        if self.object.is_null() {
            self.labels = string_map(&old_object, "labels")?;
            self.annotations = string_map(&old_object, "annotations")?;
            if self.name.is_empty() {
                self.name = metadata_str(&old_object, "name").unwrap_or_default().to_string();
            }
        }
        self.old_object = Some(old_object);
        Ok(self)
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn kind(&self) -> &GroupVersionKind {
        &self.kind
    }

    pub fn resource(&self) -> &GroupVersionResource {
        &self.resource
    }

    pub fn sub_resource(&self) -> &str {
        &self.sub_resource
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn annotations(&self) -> &LabelSet {
        &self.annotations
    }

    pub fn object(&self) -> &Value {
        &self.object
    }

    pub fn old_object(&self) -> Option<&Value> {
        self.old_object.as_ref()
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }
}

fn metadata_str<'a>(object: &'a Value, field: &str) -> Option<&'a str> {
    object.get("metadata")?.get(field)?.as_str()
}

/// Read `metadata.<field>` as a string map. Absent or null maps are empty.
fn string_map(object: &Value, field: &str) -> AdmissionResult<LabelSet> {
    let raw = match object.get("metadata").and_then(|m| m.get(field)) {
        None | Some(Value::Null) => return Ok(LabelSet::new()),
        Some(raw) => raw,
    };

    let map = raw
        .as_object()
        .ok_or_else(|| AdmissionError::malformed(format!("metadata.{} must be a map", field)))?;

    map.iter()
        .map(|(key, value)| match value.as_str() {
            Some(s) => Ok((key.clone(), s.to_string())),
            None => Err(AdmissionError::malformed(format!(
                "metadata.{}[{:?}] must be a string",
                field, key
            ))),
        })
        .collect()
}
