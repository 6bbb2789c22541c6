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

//! Operation filter shared by rules.

use super::interfaces::Operation;
use std::collections::BTreeSet;
use std::fmt;

/// Handler is the set of operations a rule reacts to.
/// An empty set is never constructed; `new_all` is the "any" wildcard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handler {
    operations: BTreeSet<Operation>,
}

impl Handler {
    /// Create a new Handler that handles the given operations.
    /// Passing no operations yields a handler for every operation.
    pub fn new(operations: &[Operation]) -> Self {
        if operations.is_empty() {
            return Self::new_all();
        }
        Self {
            operations: operations.iter().copied().collect(),
        }
    }

    /// Create a new Handler that only handles Create.
    pub fn new_create() -> Self {
        Self::new(&[Operation::Create])
    }

    /// Create a new Handler that handles Create and Update operations.
    pub fn new_create_update() -> Self {
        Self::new(&[Operation::Create, Operation::Update])
    }

    /// Create a new Handler that handles all operations.
    pub fn new_all() -> Self {
        Self {
            operations: Operation::ALL.into_iter().collect(),
        }
    }

    /// Whether this handler matches any operation.
    pub fn is_any(&self) -> bool {
        self.operations.len() == Operation::ALL.len()
    }

    pub fn handles(&self, operation: Operation) -> bool {
        self.operations.contains(&operation)
    }
}

impl Default for Handler {
    fn default() -> Self {
        Self::new_create()
    }
}

impl fmt::Display for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_any() {
            return f.write_str("ANY");
        }
        let names: Vec<&str> = self.operations.iter().map(|op| op.as_str()).collect();
        f.write_str(&names.join("|"))
    }
}
