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

//! Declarative module configuration.
//!
//! A module file lists built-in capabilities to enable and capabilities
//! declared inline. YAML and JSON are both accepted:
//!
//! ```yaml
//! values:
//!   burstable:
//!     requests: {cpu: 1000m, memory: 512Mi}
//! builtins: [annotate-lb]
//! capabilities:
//!   - name: flux-resources-bump
//!     rules:
//!       - name: source-controller
//!         kind: Pod
//!         namespace: flux-system
//!         labels: {app: source-controller}
//!         set:
//!           - path: spec.containers[0].resources
//!             valueFrom: burstable
//! ```

use crate::admission::attributes::LabelSet;
use crate::admission::{AdmissionError, AdmissionResult, Handler, Operation};
use crate::capabilities;
use crate::mutation::{Capability, FieldPath, KindSelector, Registry, Rule};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Read;
use tracing::debug;

/// Operation keyword that matches every operation.
pub const ANY_OPERATION: &str = "ANY";

/// ModuleConfig is the root of a module file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ModuleConfig {
    /// Named constants shared by rules through `valueFrom`.
    #[serde(default)]
    pub values: BTreeMap<String, Value>,
    /// Built-in capabilities to enable, registered before inline ones.
    #[serde(default)]
    pub builtins: Vec<String>,
    #[serde(default)]
    pub capabilities: Vec<CapabilityConfig>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CapabilityConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Namespace allow-list. Empty admits every namespace.
    #[serde(default)]
    pub namespaces: Vec<String>,
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RuleConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// `Kind`, `version/Kind` or `group/version/Kind`.
    pub kind: String,
    /// CREATE, UPDATE, DELETE, CONNECT or ANY. Defaults to CREATE.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default)]
    pub labels: LabelSet,
    /// Every condition must hold for the rule to write anything.
    #[serde(default)]
    pub when: Vec<ConditionConfig>,
    #[serde(default)]
    pub set: Vec<SetConfig>,
    #[serde(default)]
    pub annotations: LabelSet,
    #[serde(default)]
    pub set_labels: LabelSet,
}

/// A condition on the object. A missing field compares equal to null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConditionConfig {
    pub path: FieldPath,
    pub equals: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SetConfig {
    pub path: FieldPath,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_from: Option<String>,
}

impl ModuleConfig {
    pub fn from_str(input: &str) -> AdmissionResult<Self> {
        serde_yaml::from_str(input).map_err(|e| AdmissionError::invalid_config(e.to_string()))
    }

    pub fn from_reader<R: Read>(reader: R) -> AdmissionResult<Self> {
        serde_yaml::from_reader(reader).map_err(|e| AdmissionError::invalid_config(e.to_string()))
    }

    /// Build the registry: built-ins first, in the order listed, then the
    /// inline capabilities.
    pub fn into_registry(self) -> AdmissionResult<Registry> {
        let mut registry = Registry::new();
        for name in &self.builtins {
            capabilities::register_builtin(&mut registry, name)?;
        }
        for config in &self.capabilities {
            registry.register(config.build(&self.values)?)?;
        }
        Ok(registry)
    }
}

impl CapabilityConfig {
    /// Compile into a capability, resolving `valueFrom` against `values`.
    pub fn build(&self, values: &BTreeMap<String, Value>) -> AdmissionResult<Capability> {
        if self.name.is_empty() {
            return Err(AdmissionError::invalid_config("capability without a name"));
        }
        let mut capability =
            Capability::new(&self.name, &self.description).with_namespaces(self.namespaces.iter().cloned());
        for config in &self.rules {
            let position = capability.rules().len();
            let rule = config
                .build(position, values)
                .map_err(|e| AdmissionError::invalid_config(format!("capability {}: {}", self.name, e)))?;
            debug!(capability = %self.name, rule = %rule.name, "compiled rule");
            capability.add_rule(rule);
        }
        Ok(capability)
    }
}

impl RuleConfig {
    fn build(&self, position: usize, values: &BTreeMap<String, Value>) -> Result<Rule, String> {
        let kind = KindSelector::parse(&self.kind).ok_or_else(|| format!("invalid kind {:?}", self.kind))?;
        let name = self
            .name
            .clone()
            .unwrap_or_else(|| format!("{}-{}", kind.kind.to_lowercase(), position));
        let operation = parse_operation(self.operation.as_deref())
            .ok_or_else(|| format!("rule {}: unknown operation {:?}", name, self.operation.as_deref().unwrap_or("")))?;

        let mut writes = Vec::with_capacity(self.set.len());
        for set in &self.set {
            let value = match (&set.value, &set.value_from) {
                (Some(value), None) => value.clone(),
                (None, Some(from)) => values
                    .get(from)
                    .cloned()
                    .ok_or_else(|| format!("rule {}: unknown value {:?}", name, from))?,
                _ => return Err(format!("rule {}: {} needs exactly one of value or valueFrom", name, set.path)),
            };
            writes.push((set.path.clone(), value));
        }
        writes.extend(
            self.annotations
                .iter()
                .map(|(k, v)| (FieldPath::annotation(k), Value::String(v.clone()))),
        );
        writes.extend(
            self.set_labels
                .iter()
                .map(|(k, v)| (FieldPath::label(k), Value::String(v.clone()))),
        );
        if writes.is_empty() {
            return Err(format!("rule {}: nothing to set", name));
        }

        let conditions: Vec<(FieldPath, Value)> =
            self.when.iter().map(|c| (c.path.clone(), c.equals.clone())).collect();
        let mut rule = Rule::new(&name, kind, move |m| {
            let holds = conditions
                .iter()
                .all(|(path, expected)| path.get(m.object()).unwrap_or(&Value::Null) == expected);
            if !holds {
                return Ok(());
            }
            for (path, value) in &writes {
                m.set_path(path.clone(), value.clone())?;
            }
            Ok(())
        })
        .with_operation(operation);
        if let Some(namespace) = &self.namespace {
            rule = rule.with_namespace(namespace);
        }
        rule.match_labels = self.labels.clone();
        Ok(rule)
    }
}

fn parse_operation(operation: Option<&str>) -> Option<Handler> {
    match operation {
        None => Some(Handler::default()),
        Some(op) if op.eq_ignore_ascii_case(ANY_OPERATION) => Some(Handler::new_all()),
        Some(op) => Operation::parse(op).map(|op| Handler::new(&[op])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::AdmissionRequest;
    use crate::service::MutationService;
    use serde_json::json;

    const FLUX_MODULE: &str = r#"
values:
  burstable:
    requests: {cpu: 1000m, memory: 512Mi}
    limits: {cpu: 3000m, memory: 3Gi}
capabilities:
  - name: flux-resources-bump
    description: bump flux controllers
    rules:
      - name: source-controller
        kind: Pod
        namespace: flux-system
        labels: {app: source-controller}
        set:
          - path: spec.containers[0].resources
            valueFrom: burstable
  - name: annotate-lb
    rules:
      - kind: v1/Service
        when:
          - path: spec.type
            equals: LoadBalancer
        annotations:
          service.beta.kubernetes.io/aws-load-balancer-type: nlb
"#;

    fn pod(namespace: &str) -> AdmissionRequest {
        AdmissionRequest::new_core(
            "Pod",
            Operation::Create,
            namespace,
            json!({
                "metadata": {"labels": {"app": "source-controller"}},
                "spec": {"containers": [{"name": "manager"}]}
            }),
        )
        .unwrap()
    }

    #[test]
    fn test_declared_module_matches_builtin_behavior() {
        let registry = ModuleConfig::from_str(FLUX_MODULE).unwrap().into_registry().unwrap();
        assert_eq!(registry.capability_names(), vec!["flux-resources-bump", "annotate-lb"]);
        assert_eq!(registry.description("flux-resources-bump"), Some("bump flux controllers"));
        assert_eq!(registry.rules()[1].name(), "service-0");

        let service = MutationService::new(registry);
        let decision = service.mutate(&pod("flux-system"));
        assert_eq!(decision.patch.len(), 1);
        assert_eq!(
            decision.patch[0].value,
            json!({"requests": {"cpu": "1000m", "memory": "512Mi"}, "limits": {"cpu": "3000m", "memory": "3Gi"}})
        );
        assert!(service.mutate(&pod("default")).patch.is_empty());
    }

    #[test]
    fn test_when_conditions() {
        let service = MutationService::new(ModuleConfig::from_str(FLUX_MODULE).unwrap().into_registry().unwrap());
        let svc = |service_type: &str| {
            AdmissionRequest::new_core("Service", Operation::Create, "default", json!({"spec": {"type": service_type}}))
                .unwrap()
        };
        assert_eq!(service.mutate(&svc("LoadBalancer")).patch.len(), 1);
        assert!(service.mutate(&svc("ClusterIP")).patch.is_empty());
    }

    #[test]
    fn test_json_module_with_builtins() {
        let config = ModuleConfig::from_reader(
            r#"{"builtins": ["annotate-lb", "flux-resources-bump"], "capabilities": [
                {"name": "labels", "namespaces": ["web"], "rules": [
                    {"kind": "Pod", "operation": "any", "setLabels": {"managed": "yes"}}
                ]}
            ]}"#
            .as_bytes(),
        )
        .unwrap();
        let registry = config.into_registry().unwrap();
        assert_eq!(
            registry.capability_names(),
            vec!["annotate-lb", "flux-resources-bump", "labels"]
        );
        assert!(registry.rules().last().unwrap().rule().match_operation.is_any());
    }

    #[test]
    fn test_invalid_modules() {
        let cases = [
            ("builtins: [hello-pepr]", "unknown built-in"),
            ("capabilities: [{name: c, rules: [{kind: pod, setLabels: {a: b}}]}]", "invalid kind"),
            ("capabilities: [{name: c, rules: [{kind: Pod, operation: PATCH, setLabels: {a: b}}]}]", "unknown operation"),
            ("capabilities: [{name: c, rules: [{kind: Pod}]}]", "nothing to set"),
            ("capabilities: [{name: c, rules: [{kind: Pod, set: [{path: a, valueFrom: nope}]}]}]", "unknown value"),
            ("capabilities: [{name: c, rules: [{kind: Pod, set: [{path: a}]}]}]", "exactly one"),
            ("capabilities: [{name: c, rules: [{kind: Pod, set: [{path: 'a[', value: 1}]}]}]", "invalid field path"),
            ("capabilitys: []", "unknown field"),
            ("capabilities: [{name: '', rules: []}]", "without a name"),
        ];
        for (input, expected) in cases {
            let err = ModuleConfig::from_str(input)
                .and_then(ModuleConfig::into_registry)
                .unwrap_err();
            assert!(matches!(err, AdmissionError::InvalidConfig(_)), "{}: {}", input, err);
            assert!(err.to_string().contains(expected), "{}: {}", input, err);
        }
    }

    #[test]
    fn test_duplicate_rule_names_rejected() {
        let err = ModuleConfig::from_str(
            "capabilities: [{name: c, rules: [{name: r, kind: Pod, setLabels: {a: b}}, {name: r, kind: Pod, setLabels: {c: d}}]}]",
        )
        .and_then(ModuleConfig::into_registry)
        .unwrap_err();
        assert!(matches!(err, AdmissionError::DuplicateRuleName { .. }));
    }
}
