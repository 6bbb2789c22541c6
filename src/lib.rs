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

//! Declarative Kubernetes admission mutation.
//!
//! Capabilities bundle rules of the form "when a matching object is admitted,
//! mutate it". The [`MutationService`] normalizes an `AdmissionReview`,
//! selects the rules whose capability admits the namespace, applies every
//! matching rule in registration order to a working copy of the object and
//! answers with a JSON Patch of the winning writes. A failing rule never
//! blocks admission; only a request that cannot be interpreted is denied.

pub mod admission;
pub mod api;
pub mod capabilities;
pub mod config;
pub mod mutation;
pub mod service;

// Re-export commonly used types
pub use admission::{
    AdmissionError, AdmissionRequest, AdmissionResult, AdmissionReview, GroupVersionKind, Handler, Operation,
    RuleError,
};
pub use config::ModuleConfig;
pub use mutation::{Capability, Decision, FieldPath, KindSelector, Mutation, Registry, Rule};
pub use service::MutationService;
