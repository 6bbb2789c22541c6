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

//! Capabilities, rules and the mutation pass.

pub mod capability;
pub mod decision;
pub mod engine;
pub mod matcher;
pub mod patch;
pub mod path;
pub mod registry;
pub mod rule;

pub use capability::{Capability, When};
pub use decision::{Decision, PatchConflict};
pub use engine::{evaluate, AppliedAssignment, Evaluation, RuleFailure};
pub use patch::JsonPatchOperation;
pub use path::{FieldPath, PathSegment};
pub use registry::{RegisteredRule, Registry, RuleRef};
pub use rule::{FieldAssignment, KindSelector, MutateFn, Mutation, Rule};
