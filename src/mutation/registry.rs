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

//! The rule registry.
//!
//! Capabilities are registered once at startup. After that the registry is
//! only read, so one instance can be shared by every worker through an `Arc`.

use super::capability::Capability;
use super::rule::Rule;
use crate::admission::{AdmissionError, AdmissionRequest, AdmissionResult};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::ops::Range;
use tracing::info;

/// RuleRef identifies a registered rule in logs and decisions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct RuleRef {
    pub capability: String,
    pub rule: String,
    /// Position in registration order across the whole registry.
    pub index: usize,
}

impl fmt::Display for RuleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} (#{})", self.capability, self.rule, self.index)
    }
}

/// A rule together with its owning capability and registration index.
#[derive(Debug)]
pub struct RegisteredRule {
    reference: RuleRef,
    rule: Rule,
}

impl RegisteredRule {
    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    pub fn reference(&self) -> &RuleRef {
        &self.reference
    }

    pub fn index(&self) -> usize {
        self.reference.index
    }

    pub fn capability(&self) -> &str {
        &self.reference.capability
    }

    pub fn name(&self) -> &str {
        &self.reference.rule
    }
}

#[derive(Debug)]
struct CapabilityEntry {
    name: String,
    description: String,
    namespaces: BTreeSet<String>,
    rules: Range<usize>,
}

impl CapabilityEntry {
    fn admits_namespace(&self, namespace: &str) -> bool {
        self.namespaces.is_empty() || self.namespaces.contains(namespace)
    }
}

/// Registry is the ordered collection of every registered rule.
#[derive(Debug, Default)]
pub struct Registry {
    capabilities: Vec<CapabilityEntry>,
    rules: Vec<RegisteredRule>,
}

impl Registry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a capability's rules. Nothing is added when two of its rules
    /// share a name.
    pub fn register(&mut self, capability: Capability) -> AdmissionResult<()> {
        let mut seen = HashSet::new();
        for rule in capability.rules() {
            if !seen.insert(rule.name.as_str()) {
                return Err(AdmissionError::duplicate_rule(&capability.name, &rule.name));
            }
        }

        let name = capability.name.clone();
        let description = capability.description.clone();
        let namespaces = capability.namespaces.clone();
        let start = self.rules.len();

        for rule in capability.into_rules() {
            let index = self.rules.len();
            self.rules.push(RegisteredRule {
                reference: RuleRef {
                    capability: name.clone(),
                    rule: rule.name.clone(),
                    index,
                },
                rule,
            });
        }

        let end = self.rules.len();
        info!(
            capability = %name,
            rules = end - start,
            namespaces = ?namespaces,
            "registered capability"
        );

        self.capabilities.push(CapabilityEntry {
            name,
            description,
            namespaces,
            rules: start..end,
        });
        Ok(())
    }

    /// Every rule whose capability admits the request's namespace, in
    /// registration order.
    pub fn rules_for(&self, request: &AdmissionRequest) -> Vec<&RegisteredRule> {
        self.capabilities
            .iter()
            .filter(|c| c.admits_namespace(request.namespace()))
            .flat_map(|c| &self.rules[c.rules.clone()])
            .collect()
    }

    /// Every registered rule, in registration order.
    pub fn rules(&self) -> &[RegisteredRule] {
        &self.rules
    }

    /// Names of the registered capabilities, in registration order.
    pub fn capability_names(&self) -> Vec<&str> {
        self.capabilities.iter().map(|c| c.name.as_str()).collect()
    }

    /// Description of the first capability registered under `name`.
    pub fn description(&self, name: &str) -> Option<&str> {
        self.capabilities
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.description.as_str())
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.capabilities.iter().any(|c| c.name == name)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::Operation;
    use crate::mutation::rule::KindSelector;
    use serde_json::json;

    fn capability(name: &str, namespaces: &[&str], rules: &[&str]) -> Capability {
        let mut capability = Capability::new(name, "test").with_namespaces(namespaces.iter().copied());
        for rule in rules {
            capability.when(KindSelector::core("Pod")).named(rule).mutate(|_| Ok(()));
        }
        capability
    }

    fn pod_in(namespace: &str) -> AdmissionRequest {
        AdmissionRequest::new_core("Pod", Operation::Create, namespace, json!({})).unwrap()
    }

    fn names(rules: Vec<&RegisteredRule>) -> Vec<String> {
        rules.iter().map(|r| r.reference().to_string()).collect()
    }

    #[test]
    fn test_register_assigns_global_indices() {
        let mut registry = Registry::new();
        registry.register(capability("a", &[], &["one", "two"])).unwrap();
        registry.register(capability("b", &[], &["one"])).unwrap();

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.capability_names(), vec!["a", "b"]);
        assert_eq!(
            names(registry.rules().iter().collect()),
            vec!["a/one (#0)", "a/two (#1)", "b/one (#2)"]
        );
        let last = &registry.rules()[2];
        assert_eq!((last.capability(), last.name(), last.index()), ("b", "one", 2));
        assert_eq!(registry.description("a"), Some("test"));
        assert!(registry.is_registered("b"));
        assert!(!registry.is_registered("c"));
    }

    #[test]
    fn test_duplicate_rule_name_rejected() {
        let mut registry = Registry::new();
        let err = registry.register(capability("a", &[], &["one", "one"])).unwrap_err();
        assert!(matches!(
            err,
            AdmissionError::DuplicateRuleName { ref capability, ref rule } if capability == "a" && rule == "one"
        ));
        assert!(registry.is_empty());
        assert!(!registry.is_registered("a"));
    }

    #[test]
    fn test_same_rule_name_in_different_capabilities() {
        let mut registry = Registry::new();
        registry.register(capability("a", &[], &["one"])).unwrap();
        registry.register(capability("b", &[], &["one"])).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_rules_for_filters_by_allow_list() {
        let mut registry = Registry::new();
        registry.register(capability("anywhere", &[], &["x"])).unwrap();
        registry.register(capability("flux", &["flux-system"], &["y", "z"])).unwrap();
        registry.register(capability("tail", &[], &["w"])).unwrap();

        assert_eq!(
            names(registry.rules_for(&pod_in("flux-system"))),
            vec!["anywhere/x (#0)", "flux/y (#1)", "flux/z (#2)", "tail/w (#3)"]
        );
        assert_eq!(
            names(registry.rules_for(&pod_in("default"))),
            vec!["anywhere/x (#0)", "tail/w (#3)"]
        );
    }

    #[test]
    fn test_registry_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Registry>();
    }
}
