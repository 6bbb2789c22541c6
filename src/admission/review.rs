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

//! The `admission.k8s.io/v1` AdmissionReview document.
//!
//! This is the only code that knows the wire format. Inbound documents are
//! normalized into an [`AdmissionRequest`]; decisions are rendered back as an
//! [`AdmissionResponse`] carrying a base64 JSON Patch.

use super::attributes::{AdmissionRequest, GroupVersionKind, GroupVersionResource};
use super::errors::{AdmissionError, AdmissionResult};
use super::interfaces::Operation;
use crate::mutation::decision::Decision;
use crate::mutation::patch;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

pub const API_VERSION: &str = "admission.k8s.io/v1";
pub const KIND: &str = "AdmissionReview";
pub const PATCH_TYPE_JSON_PATCH: &str = "JSONPatch";

fn default_api_version() -> String {
    API_VERSION.to_string()
}

fn default_kind() -> String {
    KIND.to_string()
}

/// AdmissionReview wraps a request from the API server or our response to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReview {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<RawAdmissionRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<AdmissionResponse>,
}

impl AdmissionReview {
    /// Parse a review document. Unparseable input is a malformed request.
    pub fn from_slice(bytes: &[u8]) -> AdmissionResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| AdmissionError::malformed(e.to_string()))
    }

    /// Wrap a response in a review with this document's apiVersion and kind.
    pub fn respond(&self, response: AdmissionResponse) -> Self {
        Self {
            api_version: self.api_version.clone(),
            kind: self.kind.clone(),
            request: None,
            response: Some(response),
        }
    }

    /// A response review for input that could not be parsed at all.
    pub fn from_response(response: AdmissionResponse) -> Self {
        Self {
            api_version: default_api_version(),
            kind: default_kind(),
            request: None,
            response: Some(response),
        }
    }

    pub fn to_vec(&self) -> AdmissionResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// RawAdmissionRequest is the request exactly as sent. Every field is
/// optional here; [`normalize`] decides what is required.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAdmissionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<GroupVersionKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<GroupVersionResource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_resource: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_object: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<bool>,
}

/// Normalize a raw request.
///
/// A uid, kind and operation are required; CREATE and UPDATE must carry an
/// object. The namespace falls back to `metadata.namespace` of the object.
pub fn normalize(raw: &RawAdmissionRequest) -> AdmissionResult<AdmissionRequest> {
    let uid = raw
        .uid
        .as_deref()
        .filter(|uid| !uid.is_empty())
        .ok_or_else(|| AdmissionError::malformed("missing uid"))?;
    let kind = raw
        .kind
        .clone()
        .ok_or_else(|| AdmissionError::malformed("missing kind"))?;
    let operation = match raw.operation.as_deref() {
        None | Some("") => return Err(AdmissionError::malformed("missing operation")),
        Some(op) => Operation::parse(op)
            .ok_or_else(|| AdmissionError::malformed(format!("unknown operation {:?}", op)))?,
    };

    let object = match (&raw.object, operation) {
        (Some(object), _) => object.clone(),
        (None, Operation::Create | Operation::Update) => {
            return Err(AdmissionError::malformed(format!("{} request without an object", operation)));
        }
        (None, _) => Value::Null,
    };

    let namespace = raw
        .namespace
        .clone()
        .filter(|ns| !ns.is_empty())
        .or_else(|| metadata_namespace(&object))
        .or_else(|| raw.old_object.as_ref().and_then(metadata_namespace))
        .unwrap_or_default();

    let mut request = AdmissionRequest::new(uid, kind, operation, &namespace, object)?
        .with_dry_run(raw.dry_run.unwrap_or(false));
    if let Some(resource) = &raw.resource {
        request = request.with_resource(resource.clone(), raw.sub_resource.as_deref().unwrap_or(""));
    }
    if let Some(old_object) = &raw.old_object {
        request = request.with_old_object(old_object.clone())?;
    }
    if let Some(name) = raw.name.as_deref().filter(|n| !n.is_empty()) {
        request = request.with_name(name);
    }
    Ok(request)
}

fn metadata_namespace(object: &Value) -> Option<String> {
    object
        .pointer("/metadata/namespace")
        .and_then(Value::as_str)
        .filter(|ns| !ns.is_empty())
        .map(str::to_string)
}

/// Status carries a human-readable message with the response.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Status {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
    #[serde(default)]
    pub message: String,
}

/// AdmissionResponse is the answer to one AdmissionReview request.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionResponse {
    pub uid: String,
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl AdmissionResponse {
    /// Deny with HTTP 400 semantics.
    pub fn deny(uid: &str, message: impl Into<String>) -> Self {
        Self {
            uid: uid.to_string(),
            allowed: false,
            status: Some(Status {
                code: Some(400),
                message: message.into(),
            }),
            ..Default::default()
        }
    }

    /// Render a decision against the object it was computed for.
    ///
    /// A patch that cannot be rendered is dropped and the request is allowed
    /// unmodified with a warning.
    pub fn from_decision(uid: &str, decision: &Decision, original: &Value) -> Self {
        if !decision.allowed {
            return Self::deny(uid, decision.reason.clone().unwrap_or_default());
        }

        let mut response = Self {
            uid: uid.to_string(),
            allowed: true,
            status: decision.reason.clone().map(|message| Status { code: None, message }),
            warnings: decision.warnings(),
            ..Default::default()
        };
        if decision.patch.is_empty() {
            return response;
        }

        match patch::to_json_patch(original, &decision.patch).and_then(|ops| patch::encode(&ops)) {
            Ok(encoded) => {
                response.patch = Some(encoded);
                response.patch_type = Some(PATCH_TYPE_JSON_PATCH.to_string());
            }
            Err(err) => {
                warn!(uid, error = %err, "dropping patch that could not be rendered");
                response.warnings.push(format!("patch could not be rendered: {}", err));
            }
        }
        response
    }
}
