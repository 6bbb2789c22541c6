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

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use k8s_mutation::capabilities;
use k8s_mutation::{Capability, KindSelector, MutationService, Registry};
use serde_json::{json, Value};

fn builtin_service() -> MutationService {
    let mut registry = Registry::new();
    capabilities::register_all_builtin(&mut registry).unwrap();
    MutationService::new(registry)
}

fn review(uid: &str, kind: &str, namespace: &str, object: Value) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "apiVersion": "admission.k8s.io/v1",
        "kind": "AdmissionReview",
        "request": {
            "uid": uid,
            "kind": {"group": "", "version": "v1", "kind": kind},
            "resource": {"group": "", "version": "v1", "resource": format!("{}s", kind.to_lowercase())},
            "namespace": namespace,
            "operation": "CREATE",
            "object": object
        }
    }))
    .unwrap()
}

fn respond(service: &MutationService, body: &[u8]) -> Value {
    let out = service.handle(body).unwrap();
    let review: Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(review["apiVersion"], "admission.k8s.io/v1");
    assert_eq!(review["kind"], "AdmissionReview");
    review["response"].clone()
}

fn decoded_patch(response: &Value) -> Value {
    assert_eq!(response["patchType"], "JSONPatch");
    let bytes = STANDARD.decode(response["patch"].as_str().unwrap()).unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn flux_pod(app: &str) -> Value {
    json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": {"name": app, "labels": {"app": app}},
        "spec": {"containers": [{"name": "manager", "image": "ghcr.io/fluxcd/source-controller:v1"}]}
    })
}

#[test]
fn source_controller_in_flux_system_is_bumped() {
    let response = respond(&builtin_service(), &review("a", "Pod", "flux-system", flux_pod("source-controller")));

    assert_eq!(response["uid"], "a");
    assert_eq!(response["allowed"], true);
    assert!(response.get("warnings").is_none());
    assert_eq!(
        decoded_patch(&response),
        json!([{
            "op": "add",
            "path": "/spec/containers/0/resources",
            "value": {
                "requests": {"cpu": "1000m", "memory": "512Mi"},
                "limits": {"cpu": "3000m", "memory": "3Gi"}
            }
        }])
    );
}

#[test]
fn source_controller_elsewhere_is_untouched() {
    let response = respond(&builtin_service(), &review("b", "Pod", "default", flux_pod("source-controller")));
    assert_eq!(response["allowed"], true);
    assert!(response.get("patch").is_none());
    assert!(response.get("status").is_none());
}

#[test]
fn cluster_ip_service_is_untouched() {
    let service = json!({"metadata": {"name": "web"}, "spec": {"type": "ClusterIP"}});
    let response = respond(&builtin_service(), &review("c", "Service", "default", service));
    assert_eq!(response["allowed"], true);
    assert!(response.get("patch").is_none());
}

#[test]
fn load_balancer_service_gets_nlb_annotation() {
    let service = json!({"metadata": {"name": "web"}, "spec": {"type": "LoadBalancer"}});
    let response = respond(&builtin_service(), &review("lb", "Service", "default", service));
    assert_eq!(
        decoded_patch(&response),
        json!([{
            "op": "add",
            "path": "/metadata/annotations",
            "value": {"service.beta.kubernetes.io/aws-load-balancer-type": "nlb"}
        }])
    );
}

#[test]
fn two_capabilities_on_one_pod_are_combined() {
    let mut labels = Capability::new("team-labels", "label flux pods with their owner");
    labels
        .when(KindSelector::core("Pod"))
        .in_namespace("flux-system")
        .mutate(|pod| pod.set_label("team", "platform"));

    let mut registry = Registry::new();
    capabilities::register_all_builtin(&mut registry).unwrap();
    registry.register(labels).unwrap();
    let service = MutationService::new(registry);

    let response = respond(&service, &review("d", "Pod", "flux-system", flux_pod("helm-controller")));
    let patch = decoded_patch(&response);
    let paths: Vec<&str> = patch
        .as_array()
        .unwrap()
        .iter()
        .map(|op| op["path"].as_str().unwrap())
        .collect();
    assert_eq!(paths, vec!["/spec/containers/0/resources", "/metadata/labels/team"]);
    assert!(response.get("warnings").is_none());
}

#[test]
fn conflicting_writes_are_reported() {
    let mut first = Capability::new("first", "");
    first
        .when(KindSelector::core("Pod"))
        .named("owner")
        .mutate(|pod| pod.set_label("owner", "first"));
    let mut second = Capability::new("second", "");
    second
        .when(KindSelector::core("Pod"))
        .named("owner")
        .mutate(|pod| pod.set_label("owner", "second"));

    let mut registry = Registry::new();
    registry.register(first).unwrap();
    registry.register(second).unwrap();
    let service = MutationService::new(registry);

    let response = respond(&service, &review("e", "Pod", "default", json!({"metadata": {"name": "p"}})));
    assert_eq!(response["allowed"], true);
    assert_eq!(
        decoded_patch(&response),
        json!([{"op": "add", "path": "/metadata/labels", "value": {"owner": "second"}}])
    );
    let warnings = response["warnings"].as_array().unwrap();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].as_str().unwrap().contains("first/owner (#0) overwritten by second/owner (#1)"));
}

#[test]
fn failing_rule_does_not_block_admission() {
    let mut broken = Capability::new("broken", "");
    broken
        .when(KindSelector::core("Pod"))
        .named("explodes")
        .mutate(|_| panic!("boom"));
    let mut registry = Registry::new();
    registry.register(broken).unwrap();
    capabilities::register_all_builtin(&mut registry).unwrap();
    let service = MutationService::new(registry);

    let response = respond(&service, &review("f", "Pod", "flux-system", flux_pod("kustomize-controller")));
    assert_eq!(response["allowed"], true);
    assert_eq!(decoded_patch(&response).as_array().unwrap().len(), 1);
    assert!(response["status"]["message"]
        .as_str()
        .unwrap()
        .starts_with("1 rule(s) failed"));
    assert!(response["warnings"][0].as_str().unwrap().contains("broken/explodes"));
}

#[test]
fn malformed_input_is_denied() {
    let service = builtin_service();

    let response = respond(&service, b"definitely not json");
    assert_eq!(response["allowed"], false);
    assert_eq!(response["uid"], "");
    assert_eq!(response["status"]["code"], 400);

    let missing_operation = serde_json::to_vec(&json!({
        "apiVersion": "admission.k8s.io/v1",
        "kind": "AdmissionReview",
        "request": {"uid": "g", "kind": {"version": "v1", "kind": "Pod"}, "object": {}}
    }))
    .unwrap();
    let response = respond(&service, &missing_operation);
    assert_eq!(response["uid"], "g");
    assert_eq!(response["allowed"], false);
    assert!(response["status"]["message"].as_str().unwrap().contains("missing operation"));
}
