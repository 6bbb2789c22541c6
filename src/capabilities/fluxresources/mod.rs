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

//! Burstable resources for the Flux controllers.
//!
//! Pods of the source, helm and kustomize controllers in `flux-system` get
//! their first container's resources replaced on creation.

use crate::admission::AdmissionResult;
use crate::api::core::{ResourceRequirements, KIND_POD, RESOURCE_CPU, RESOURCE_MEMORY};
use crate::mutation::{Capability, KindSelector, Registry};

/// Capability name for the Flux resource bump.
pub const CAPABILITY_NAME: &str = "flux-resources-bump";

pub const FLUX_NAMESPACE: &str = "flux-system";

/// The `app` label values of the controllers that are bumped.
pub const CONTROLLERS: &[&str] = &["source-controller", "helm-controller", "kustomize-controller"];

/// Register the capability.
pub fn register(registry: &mut Registry) -> AdmissionResult<()> {
    registry.register(capability())
}

/// Resources applied to every bumped controller.
pub fn burstable() -> ResourceRequirements {
    ResourceRequirements::new()
        .with_request(RESOURCE_CPU, "1000m")
        .with_request(RESOURCE_MEMORY, "512Mi")
        .with_limit(RESOURCE_CPU, "3000m")
        .with_limit(RESOURCE_MEMORY, "3Gi")
}

pub fn capability() -> Capability {
    let mut capability = Capability::new(
        CAPABILITY_NAME,
        "Raise the resources of the Flux controllers to a burstable profile",
    );
    let resources = burstable();

    for controller in CONTROLLERS {
        let resources = resources.clone();
        capability
            .when(KindSelector::core(KIND_POD))
            .named(controller)
            .is_created()
            .in_namespace(FLUX_NAMESPACE)
            .with_label("app", controller)
            .mutate(move |pod| pod.set_serialized("spec.containers[0].resources", &resources));
    }
    capability
}
