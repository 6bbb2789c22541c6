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

//! Admission error types.

use thiserror::Error;

/// Result type for admission operations.
pub type AdmissionResult<T> = Result<T, AdmissionError>;

/// AdmissionError represents errors that reach the caller of the engine.
#[derive(Debug, Error)]
pub enum AdmissionError {
    /// The incoming request could not be interpreted. The request is denied.
    #[error("malformed admission request: {0}")]
    MalformedRequest(String),

    /// Two rules of the same capability share a name.
    #[error("duplicate rule name \"{rule}\" in capability \"{capability}\"")]
    DuplicateRuleName { capability: String, rule: String },

    /// The declarative module configuration is invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A field path could not be parsed or resolved.
    #[error("invalid field path \"{path}\": {reason}")]
    InvalidPath { path: String, reason: String },

    /// A response could not be encoded.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AdmissionError {
    /// Create a new MalformedRequest error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        AdmissionError::MalformedRequest(msg.into())
    }

    /// Create a new InvalidConfig error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        AdmissionError::InvalidConfig(msg.into())
    }

    /// Create a DuplicateRuleName error.
    pub fn duplicate_rule(capability: impl Into<String>, rule: impl Into<String>) -> Self {
        AdmissionError::DuplicateRuleName {
            capability: capability.into(),
            rule: rule.into(),
        }
    }

    /// Create an InvalidPath error.
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        AdmissionError::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether the boundary must deny the request because of this error.
    pub fn is_denial(&self) -> bool {
        matches!(self, AdmissionError::MalformedRequest(_))
    }
}

/// RuleError is raised by a single rule's mutation. It never aborts the pass.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuleError {
    /// The mutate function reported a failure.
    #[error("{0}")]
    Failed(String),

    /// The mutate function wrote through a path that does not resolve.
    #[error("cannot assign \"{path}\": {reason}")]
    InvalidPath { path: String, reason: String },

    /// The mutate function panicked.
    #[error("rule panicked: {0}")]
    Panicked(String),
}

impl RuleError {
    pub fn failed(msg: impl Into<String>) -> Self {
        RuleError::Failed(msg.into())
    }
}

impl From<AdmissionError> for RuleError {
    fn from(err: AdmissionError) -> Self {
        match err {
            AdmissionError::InvalidPath { path, reason } => RuleError::InvalidPath { path, reason },
            other => RuleError::Failed(other.to_string()),
        }
    }
}
