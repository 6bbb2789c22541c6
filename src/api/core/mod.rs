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

//! Core Kubernetes API types (resources, services, well-known keys).
//!
//! Objects travel through the engine as JSON trees. These types only cover
//! the fragments that rules write or inspect.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// ResourceList is a map of resource names to quantity strings.
pub type ResourceList = BTreeMap<String, String>;

// ============================================================================
// Constants
// ============================================================================

pub const KIND_POD: &str = "Pod";
pub const KIND_SERVICE: &str = "Service";

/// CPU, in cores or millicores.
pub const RESOURCE_CPU: &str = "cpu";

/// Memory, in bytes.
pub const RESOURCE_MEMORY: &str = "memory";

/// Annotation selecting the AWS load balancer implementation for a Service.
pub const ANNOTATION_AWS_LOAD_BALANCER_TYPE: &str = "service.beta.kubernetes.io/aws-load-balancer-type";

// ============================================================================
// Resource Types
// ============================================================================

/// ResourceRequirements describes the compute resource requirements.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourceRequirements {
    /// Requests describes the minimum amount of compute resources required.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub requests: ResourceList,
    /// Limits describes the maximum amount of compute resources allowed.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub limits: ResourceList,
}

impl ResourceRequirements {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_request(mut self, name: &str, quantity: &str) -> Self {
        self.requests.insert(name.to_string(), quantity.to_string());
        self
    }

    pub fn with_limit(mut self, name: &str, quantity: &str) -> Self {
        self.limits.insert(name.to_string(), quantity.to_string());
        self
    }
}

// ============================================================================
// Service
// ============================================================================

/// ServiceType is the value of a Service's `spec.type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ServiceType {
    #[default]
    ClusterIP,
    NodePort,
    LoadBalancer,
    ExternalName,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::ClusterIP => "ClusterIP",
            ServiceType::NodePort => "NodePort",
            ServiceType::LoadBalancer => "LoadBalancer",
            ServiceType::ExternalName => "ExternalName",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ClusterIP" => Some(ServiceType::ClusterIP),
            "NodePort" => Some(ServiceType::NodePort),
            "LoadBalancer" => Some(ServiceType::LoadBalancer),
            "ExternalName" => Some(ServiceType::ExternalName),
            _ => None,
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_service_type() {
        assert_eq!(ServiceType::LoadBalancer.as_str(), "LoadBalancer");
        assert_eq!(ServiceType::parse("NodePort"), Some(ServiceType::NodePort));
        assert_eq!(ServiceType::parse("loadbalancer"), None);
        assert_eq!(ServiceType::default(), ServiceType::ClusterIP);
    }

    #[test]
    fn test_resource_requirements_serialize() {
        let resources = ResourceRequirements::new()
            .with_request(RESOURCE_CPU, "100m")
            .with_limit(RESOURCE_MEMORY, "1Gi");
        assert_eq!(
            serde_json::to_value(&resources).unwrap(),
            json!({"requests": {"cpu": "100m"}, "limits": {"memory": "1Gi"}})
        );
        assert_eq!(serde_json::to_value(ResourceRequirements::new()).unwrap(), json!({}));
    }
}
