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

//! Capabilities: named, namespace-scoped bundles of rules.

use super::rule::{KindSelector, Mutation, Rule};
use crate::admission::attributes::LabelSet;
use crate::admission::{Handler, Operation, RuleError};
use std::collections::BTreeSet;

/// Capability groups rules behind a namespace allow-list.
#[derive(Debug, Clone)]
pub struct Capability {
    pub name: String,
    pub description: String,
    /// Namespaces the capability applies to. Empty means every namespace.
    pub namespaces: BTreeSet<String>,
    rules: Vec<Rule>,
}

impl Capability {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            namespaces: BTreeSet::new(),
            rules: Vec::new(),
        }
    }

    pub fn with_namespaces<I, S>(mut self, namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.namespaces = namespaces.into_iter().map(Into::into).collect();
        self
    }

    /// Check the namespace allow-list.
    pub fn admits_namespace(&self, namespace: &str) -> bool {
        self.namespaces.is_empty() || self.namespaces.contains(namespace)
    }

    /// Start declaring a rule for `kind`.
    pub fn when(&mut self, kind: KindSelector) -> When<'_> {
        When {
            capability: self,
            name: None,
            kind,
            operation: Handler::default(),
            namespace: None,
            labels: LabelSet::new(),
            annotations: LabelSet::new(),
            object_name: None,
        }
    }

    pub fn add_rule(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub(crate) fn into_rules(self) -> Vec<Rule> {
        self.rules
    }
}

/// When is the fluent form of a rule declaration:
///
/// ```
/// use k8s_mutation::{Capability, KindSelector};
///
/// let mut capability = Capability::new("annotate-lb", "Provision load balancers as NLB");
/// capability
///     .when(KindSelector::core("Service"))
///     .is_created()
///     .mutate(|svc| {
///         if svc.get_str("spec.type") == Some("LoadBalancer") {
///             svc.set_annotation("service.beta.kubernetes.io/aws-load-balancer-type", "nlb")?;
///         }
///         Ok(())
///     });
/// assert_eq!(capability.rules().len(), 1);
/// ```
///
/// Rules react to CREATE unless another operation is chosen. Unnamed rules
/// are named after their kind and position in the capability.
pub struct When<'c> {
    capability: &'c mut Capability,
    name: Option<String>,
    kind: KindSelector,
    operation: Handler,
    namespace: Option<String>,
    labels: LabelSet,
    annotations: LabelSet,
    object_name: Option<String>,
}

impl<'c> When<'c> {
    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn is_created(mut self) -> Self {
        self.operation = Handler::new(&[Operation::Create]);
        self
    }

    pub fn is_updated(mut self) -> Self {
        self.operation = Handler::new(&[Operation::Update]);
        self
    }

    pub fn is_deleted(mut self) -> Self {
        self.operation = Handler::new(&[Operation::Delete]);
        self
    }

    pub fn is_created_or_updated(mut self) -> Self {
        self.operation = Handler::new_create_update();
        self
    }

    pub fn on_any_operation(mut self) -> Self {
        self.operation = Handler::new_all();
        self
    }

    pub fn in_namespace(mut self, namespace: &str) -> Self {
        self.namespace = Some(namespace.to_string());
        self
    }

    pub fn with_label(mut self, key: &str, value: &str) -> Self {
        self.labels.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_annotation(mut self, key: &str, value: &str) -> Self {
        self.annotations.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.object_name = Some(name.to_string());
        self
    }

    /// Finish the declaration and add the rule to the capability.
    pub fn mutate<F>(self, mutate: F)
    where
        F: Fn(&mut Mutation<'_>) -> Result<(), RuleError> + Send + Sync + 'static,
    {
        let position = self.capability.rules.len();
        let name = self
            .name
            .unwrap_or_else(|| format!("{}-{}", self.kind.kind.to_lowercase(), position));

        let mut rule = Rule::new(&name, self.kind, mutate).with_operation(self.operation);
        rule.match_namespace = self.namespace;
        rule.match_labels = self.labels;
        rule.match_annotations = self.annotations;
        rule.match_name = self.object_name;

        self.capability.add_rule(rule);
    }
}
