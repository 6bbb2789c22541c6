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

//! Field paths into an object tree.
//!
//! A path is written the way a reader would point at a field of a manifest:
//! `spec.containers[0].resources`. Keys that contain `.`, `[`, `]`, `"` or
//! `\` are quoted: `metadata.annotations["service.beta.kubernetes.io/aws-load-balancer-type"]`.

use crate::admission::{AdmissionError, AdmissionResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// One step of a FieldPath.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathSegment {
    /// A map key.
    Key(String),
    /// An array index.
    Index(usize),
}

/// FieldPath is an ordered sequence of keys and indices. It is never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldPath {
    segments: Vec<PathSegment>,
}

impl FieldPath {
    /// Start a path at a top-level key.
    pub fn root(key: &str) -> Self {
        Self {
            segments: vec![PathSegment::Key(key.to_string())],
        }
    }

    /// Build a path from segments. Fails on an empty sequence.
    pub fn from_segments(segments: Vec<PathSegment>) -> AdmissionResult<Self> {
        if segments.is_empty() {
            return Err(AdmissionError::invalid_path("", "path is empty"));
        }
        Ok(Self { segments })
    }

    /// Append a map key.
    pub fn key(mut self, key: &str) -> Self {
        self.segments.push(PathSegment::Key(key.to_string()));
        self
    }

    /// Append an array index.
    pub fn index(mut self, index: usize) -> Self {
        self.segments.push(PathSegment::Index(index));
        self
    }

    /// Path of `metadata.annotations[key]`.
    pub fn annotation(key: &str) -> Self {
        Self::root("metadata").key("annotations").key(key)
    }

    /// Path of `metadata.labels[key]`.
    pub fn label(key: &str) -> Self {
        Self::root("metadata").key("labels").key(key)
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Whether `self` equals `other` or is one of its ancestors.
    pub fn is_prefix_of(&self, other: &FieldPath) -> bool {
        other.segments.starts_with(&self.segments)
    }

    /// Render as an RFC 6901 JSON pointer.
    pub fn to_json_pointer(&self) -> String {
        pointer(&self.segments)
    }

    /// Parse the dotted form.
    pub fn parse(input: &str) -> AdmissionResult<Self> {
        let err = |reason: &str| AdmissionError::invalid_path(input, reason);
        let mut segments = Vec::new();
        let mut chars = input.chars().peekable();
        // True at the start and right after a '.'.
        let mut expect_key = true;

        loop {
            match chars.peek().copied() {
                None => {
                    if expect_key {
                        return Err(err("expected a field name"));
                    }
                    break;
                }
                Some('[') => {
                    chars.next();
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        let mut key = String::new();
                        loop {
                            match chars.next() {
                                Some('\\') => match chars.next() {
                                    Some(c) => key.push(c),
                                    None => return Err(err("unterminated escape")),
                                },
                                Some('"') => break,
                                Some(c) => key.push(c),
                                None => return Err(err("unterminated quoted key")),
                            }
                        }
                        if chars.next() != Some(']') {
                            return Err(err("expected ']' after quoted key"));
                        }
                        segments.push(PathSegment::Key(key));
                    } else {
                        let mut digits = String::new();
                        loop {
                            match chars.next() {
                                Some(']') => break,
                                Some(c) if c.is_ascii_digit() => digits.push(c),
                                Some(_) => return Err(err("array index must be a non-negative integer")),
                                None => return Err(err("unterminated index")),
                            }
                        }
                        let index = digits
                            .parse::<usize>()
                            .map_err(|_| err("array index must be a non-negative integer"))?;
                        segments.push(PathSegment::Index(index));
                    }
                    expect_key = false;
                }
                Some('.') => {
                    if expect_key {
                        return Err(err("empty field name"));
                    }
                    chars.next();
                    if matches!(chars.peek(), None | Some('.') | Some('[')) {
                        return Err(err("empty field name"));
                    }
                    expect_key = true;
                }
                Some(_) => {
                    if !expect_key {
                        return Err(err("expected '.' or '[' between segments"));
                    }
                    let mut key = String::new();
                    while let Some(&c) = chars.peek() {
                        match c {
                            '.' | '[' => break,
                            ']' | '"' | '\\' => return Err(err("unexpected character in field name")),
                            _ => {
                                key.push(c);
                                chars.next();
                            }
                        }
                    }
                    segments.push(PathSegment::Key(key));
                    expect_key = false;
                }
            }
        }

        Ok(Self { segments })
    }

    /// Look up the value at this path.
    pub fn get<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        self.segments.iter().try_fold(root, |node, segment| match segment {
            PathSegment::Key(key) => node.get(key.as_str()),
            PathSegment::Index(index) => node.get(*index),
        })
    }

    /// Assign `value` at this path.
    ///
    /// Missing (or null) intermediate maps are created. Array indices must
    /// already exist. The tree is left untouched when the assignment fails.
    pub fn set(&self, root: &mut Value, value: Value) -> AdmissionResult<()> {
        self.check_assignable(root)?;

        let mut current = root;
        for segment in &self.segments {
            current = match segment {
                PathSegment::Key(key) => {
                    if current.is_null() {
                        *current = Value::Object(Map::new());
                    }
                    match current {
                        Value::Object(map) => map.entry(key.clone()).or_insert(Value::Null),
                        _ => return Err(self.error("not a map")),
                    }
                }
                PathSegment::Index(index) => current
                    .get_mut(*index)
                    .ok_or_else(|| self.error("index out of bounds"))?,
            };
        }
        *current = value;
        Ok(())
    }

    /// Read-only dry run of `set`.
    fn check_assignable(&self, root: &Value) -> AdmissionResult<()> {
        let mut current = Some(root);
        for (depth, segment) in self.segments.iter().enumerate() {
            let node = current.filter(|v| !v.is_null());
            current = match (segment, node) {
                (PathSegment::Key(_), None) => None,
                (PathSegment::Key(key), Some(Value::Object(map))) => map.get(key),
                (PathSegment::Key(_), Some(_)) => {
                    return Err(self.error_at(depth, "not a map"));
                }
                (PathSegment::Index(_), None) => {
                    return Err(self.error_at(depth, "array does not exist"));
                }
                (PathSegment::Index(index), Some(Value::Array(items))) => match items.get(*index) {
                    Some(item) => Some(item),
                    None => return Err(self.error_at(depth, "index out of bounds")),
                },
                (PathSegment::Index(_), Some(_)) => {
                    return Err(self.error_at(depth, "not an array"));
                }
            };
        }
        Ok(())
    }

    fn error(&self, reason: &str) -> AdmissionError {
        AdmissionError::invalid_path(self.to_string(), reason)
    }

    fn error_at(&self, depth: usize, reason: &str) -> AdmissionError {
        let at = FieldPath {
            segments: self.segments[..depth].to_vec(),
        };
        if at.segments.is_empty() {
            return self.error(&format!("{} at the object root", reason));
        }
        self.error(&format!("{} at {}", reason, at))
    }
}

pub(crate) fn pointer(segments: &[PathSegment]) -> String {
    let mut out = String::new();
    for segment in segments {
        out.push('/');
        match segment {
            PathSegment::Key(key) => out.push_str(&key.replace('~', "~0").replace('/', "~1")),
            PathSegment::Index(index) => out.push_str(&index.to_string()),
        }
    }
    out
}

fn is_plain_key(key: &str) -> bool {
    !key.is_empty() && !key.contains(['.', '[', ']', '"', '\\'])
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::Key(key) if is_plain_key(key) => {
                    if i > 0 {
                        f.write_str(".")?;
                    }
                    f.write_str(key)?;
                }
                PathSegment::Key(key) => {
                    let escaped = key.replace('\\', "\\\\").replace('"', "\\\"");
                    write!(f, "[\"{}\"]", escaped)?;
                }
                PathSegment::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}

impl FromStr for FieldPath {
    type Err = AdmissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for FieldPath {
    type Error = AdmissionError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<FieldPath> for String {
    fn from(path: FieldPath) -> Self {
        path.to_string()
    }
}
