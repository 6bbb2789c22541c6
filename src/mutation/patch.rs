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

//! Rendering of winning assignments as an RFC 6902 JSON Patch.

use super::path::{pointer, PathSegment};
use super::rule::FieldAssignment;
use crate::admission::{AdmissionError, AdmissionResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JsonPatchOperation represents a single JSON Patch operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonPatchOperation {
    /// Operation type (add or replace).
    pub op: String,
    /// JSON pointer to the target location.
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl JsonPatchOperation {
    pub fn add(path: &str, value: Value) -> Self {
        Self {
            op: "add".to_string(),
            path: path.to_string(),
            value: Some(value),
        }
    }

    pub fn replace(path: &str, value: Value) -> Self {
        Self {
            op: "replace".to_string(),
            path: path.to_string(),
            value: Some(value),
        }
    }
}

/// Render `patch` against `original`.
///
/// Each assignment becomes one operation. A path whose parents do not exist
/// yet is written as a single `add` of the first missing key carrying the
/// remaining keys as nested maps. Applying the result to `original` yields
/// the same object as applying the assignments in order.
pub fn to_json_patch(original: &Value, patch: &[FieldAssignment]) -> AdmissionResult<Vec<JsonPatchOperation>> {
    let mut scratch = original.clone();
    let mut operations = Vec::with_capacity(patch.len());
    for assignment in patch {
        operations.push(operation_for(&scratch, assignment)?);
        assignment.path.set(&mut scratch, assignment.value.clone())?;
    }
    Ok(operations)
}

fn operation_for(current: &Value, assignment: &FieldAssignment) -> AdmissionResult<JsonPatchOperation> {
    let segments = assignment.path.segments();
    let mut node = current;
    for (depth, segment) in segments.iter().enumerate() {
        let child = match (segment, node) {
            (PathSegment::Key(key), Value::Object(map)) => map.get(key).filter(|v| !v.is_null()),
            (PathSegment::Key(_), Value::Null) => None,
            (PathSegment::Index(index), Value::Array(items)) => match items.get(*index) {
                Some(item) => Some(item),
                None => return Err(unresolvable(assignment, "index out of bounds")),
            },
            (PathSegment::Key(_), _) => return Err(unresolvable(assignment, "not a map")),
            (PathSegment::Index(_), _) => return Err(unresolvable(assignment, "not an array")),
        };
        match child {
            Some(next) => node = next,
            None => {
                let value = nest(&segments[depth + 1..], assignment.value.clone())
                    .ok_or_else(|| unresolvable(assignment, "array does not exist"))?;
                return Ok(JsonPatchOperation::add(&pointer(&segments[..=depth]), value));
            }
        }
    }
    Ok(JsonPatchOperation::replace(
        &assignment.path.to_json_pointer(),
        assignment.value.clone(),
    ))
}

/// Wrap `value` in one map per remaining key. Fails if an index remains.
fn nest(rest: &[PathSegment], value: Value) -> Option<Value> {
    rest.iter().rev().try_fold(value, |inner, segment| match segment {
        PathSegment::Key(key) => {
            let mut map = Map::new();
            map.insert(key.clone(), inner);
            Some(Value::Object(map))
        }
        PathSegment::Index(_) => None,
    })
}

fn unresolvable(assignment: &FieldAssignment, reason: &str) -> AdmissionError {
    AdmissionError::invalid_path(assignment.path.to_string(), reason)
}

/// Encode operations as the base64 JSON document carried in a response.
pub fn encode(operations: &[JsonPatchOperation]) -> AdmissionResult<String> {
    let bytes = serde_json::to_vec(operations)?;
    Ok(STANDARD.encode(bytes))
}
