// Copyright 2025 zwire Authors
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

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use zwire_common::Result;

use crate::error::NodeError;

/// A natively bound call handler
pub type NativeFn = Arc<dyn Fn(Value) -> Result<Value> + Send + Sync>;

/// Exact-match table of native handlers.
#[derive(Clone, Default)]
pub struct FunctionTable {
    functions: HashMap<String, NativeFn>,
}

impl FunctionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `function` under `name`, replacing any previous binding.
    ///
    /// # Errors
    /// Returns `NodeError::EmptyName` for an empty `name`.
    pub fn bind(&mut self, name: impl Into<String>, function: NativeFn) -> std::result::Result<(), NodeError> {
        let name = name.into();
        if name.is_empty() {
            return Err(NodeError::EmptyName);
        }
        if self.functions.insert(name.clone(), function).is_some() {
            tracing::debug!(name = %name, "Replaced native handler");
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<NativeFn> {
        self.functions.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn constant(value: Value) -> NativeFn {
        Arc::new(move |_params: Value| -> Result<Value> { Ok(value.clone()) })
    }

    #[test]
    fn test_bind_and_get() {
        let mut table = FunctionTable::new();
        table.bind("ping", constant(json!("pong"))).unwrap();

        assert!(table.contains("ping"));
        assert!(!table.contains("Ping"));
        let f = table.get("ping").unwrap();
        assert_eq!(f(json!(null)).unwrap(), json!("pong"));
    }

    #[test]
    fn test_rebind_replaces() {
        let mut table = FunctionTable::new();
        table.bind("v", constant(json!(1))).unwrap();
        table.bind("v", constant(json!(2))).unwrap();

        assert_eq!(table.len(), 1);
        assert_eq!(table.get("v").unwrap()(json!(null)).unwrap(), json!(2));
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut table = FunctionTable::new();
        assert!(matches!(table.bind("", constant(json!(null))), Err(NodeError::EmptyName)));
        assert!(table.is_empty());
    }
}
