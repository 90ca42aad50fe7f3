// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Methods available in this runtime, by name.

use crate::method::Method;
use ax_core::MethodSpec;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("method {0} registered twice")]
    Duplicate(String),
}

#[derive(Default, Clone)]
pub struct MethodRegistry {
    methods: BTreeMap<String, Arc<dyn Method>>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, method: impl Method) -> Result<(), RegistryError> {
        let name = method.spec().name;
        if self.methods.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        self.methods.insert(name, Arc::new(method));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Method>> {
        self.methods.get(name).cloned()
    }

    pub fn specs(&self) -> Vec<MethodSpec> {
        self.methods.values().map(|m| m.spec()).collect()
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

impl std::fmt::Debug for MethodRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.methods.keys()).finish()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
