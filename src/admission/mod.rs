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

//! Admission request types and the AdmissionReview wire adapter.
//!
//! Everything the engine knows about an incoming call lives here: the
//! normalized request, the operations it can carry, and the errors that
//! reach the caller.

pub mod attributes;
pub mod errors;
mod handler;
mod interfaces;
pub mod review;

pub use attributes::{AdmissionRequest, GroupVersionKind, GroupVersionResource, LabelSet};
pub use errors::{AdmissionError, AdmissionResult, RuleError};
pub use handler::Handler;
pub use interfaces::Operation;
pub use review::{AdmissionResponse, AdmissionReview, RawAdmissionRequest};
