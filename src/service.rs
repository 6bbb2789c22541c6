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

//! The request boundary: one AdmissionReview in, one AdmissionReview out.

use crate::admission::review::{self, AdmissionResponse, AdmissionReview};
use crate::admission::{AdmissionRequest, AdmissionResult};
use crate::mutation::decision::{self, Decision};
use crate::mutation::engine;
use crate::mutation::registry::Registry;
use std::sync::Arc;
use tracing::{info, info_span, warn};

/// MutationService evaluates requests against a shared, read-only registry.
/// It is cheap to clone and safe to use from many workers at once.
#[derive(Debug, Clone)]
pub struct MutationService {
    registry: Arc<Registry>,
}

impl MutationService {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub fn from_shared(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Run every applicable rule over a normalized request.
    pub fn mutate(&self, request: &AdmissionRequest) -> Decision {
        let rules = self.registry.rules_for(request);
        let evaluation = engine::evaluate(rules, request);
        decision::build(evaluation.assignments, evaluation.failures)
    }

    /// Answer one review document.
    pub fn review(&self, review: &AdmissionReview) -> AdmissionReview {
        let Some(raw) = &review.request else {
            warn!("admission review without a request");
            return review.respond(AdmissionResponse::deny("", "malformed admission request: missing request"));
        };
        let uid = raw.uid.clone().unwrap_or_default();
        let span = info_span!("admission", uid = %uid);
        let _enter = span.enter();

        let request = match review::normalize(raw) {
            Ok(request) => request,
            Err(err) => {
                warn!(error = %err, "denying malformed request");
                return review.respond(AdmissionResponse::deny(&uid, err.to_string()));
            }
        };

        let decision = self.mutate(&request);
        let response = AdmissionResponse::from_decision(request.uid(), &decision, request.object());
        info!(
            kind = %request.kind(),
            operation = %request.operation(),
            namespace = request.namespace(),
            name = request.name(),
            allowed = response.allowed,
            assignments = decision.patch.len(),
            conflicts = decision.conflicts.len(),
            failures = decision.failures.len(),
            "admission decided"
        );
        review.respond(response)
    }

    /// Answer raw AdmissionReview bytes. Input that is not a review document
    /// is denied with an empty uid; only encoding the answer can fail.
    pub fn handle(&self, body: &[u8]) -> AdmissionResult<Vec<u8>> {
        let out = match AdmissionReview::from_slice(body) {
            Ok(review) => self.review(&review),
            Err(err) => {
                warn!(error = %err, "denying unparseable admission review");
                AdmissionReview::from_response(AdmissionResponse::deny("", err.to_string()))
            }
        };
        out.to_vec()
    }
}
