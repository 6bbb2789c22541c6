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

//! Provision LoadBalancer Services with an AWS NLB instead of a classic ELB.

use crate::admission::AdmissionResult;
use crate::api::core::{ServiceType, ANNOTATION_AWS_LOAD_BALANCER_TYPE, KIND_SERVICE};
use crate::mutation::{Capability, KindSelector, Registry};

/// Capability name for the load balancer annotation.
pub const CAPABILITY_NAME: &str = "annotate-lb";

pub const NLB: &str = "nlb";

/// Register the capability.
pub fn register(registry: &mut Registry) -> AdmissionResult<()> {
    registry.register(capability())
}

pub fn capability() -> Capability {
    let mut capability = Capability::new(
        CAPABILITY_NAME,
        "Add annotation to all services of type loadbalancer so that they are provisioned with NLB instead of ELB",
    );
    capability
        .when(KindSelector::core(KIND_SERVICE))
        .named("nlb")
        .is_created()
        .mutate(|svc| {
            if svc.get_str("spec.type").and_then(ServiceType::parse) != Some(ServiceType::LoadBalancer) {
                return Ok(());
            }
            svc.set_annotation(ANNOTATION_AWS_LOAD_BALANCER_TYPE, NLB)
        });
    capability
}
