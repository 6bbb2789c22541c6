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

//! Built-in capabilities.

pub mod fluxresources;
pub mod lbannotation;

use crate::admission::{AdmissionError, AdmissionResult};
use crate::mutation::{Capability, Registry};

/// Factory builds a fresh instance of a built-in capability.
pub type Factory = fn() -> Capability;

/// All built-in capabilities in registration order.
pub const BUILTIN_CAPABILITIES: &[(&str, Factory)] = &[
    (fluxresources::CAPABILITY_NAME, fluxresources::capability),
    (lbannotation::CAPABILITY_NAME, lbannotation::capability),
];

/// Get the factory for the named built-in capability.
pub fn factory(name: &str) -> Option<Factory> {
    BUILTIN_CAPABILITIES
        .iter()
        .find(|(builtin, _)| *builtin == name)
        .map(|(_, factory)| *factory)
}

pub fn builtin_names() -> Vec<&'static str> {
    BUILTIN_CAPABILITIES.iter().map(|(name, _)| *name).collect()
}

/// Register one built-in capability by name.
pub fn register_builtin(registry: &mut Registry, name: &str) -> AdmissionResult<()> {
    let factory = factory(name)
        .ok_or_else(|| AdmissionError::invalid_config(format!("unknown built-in capability: {}", name)))?;
    registry.register(factory())
}

/// Register every built-in capability.
pub fn register_all_builtin(registry: &mut Registry) -> AdmissionResult<()> {
    fluxresources::register(registry)?;
    lbannotation::register(registry)?;
    Ok(())
}
