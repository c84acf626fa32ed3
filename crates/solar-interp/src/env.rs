//! Environment for variable bindings.

use std::collections::HashMap;

use crate::value::Value;

/// A single map from name to value.
///
/// Function calls run against a fresh environment cloned from the caller's,
/// so callees can read globals while their own bindings vanish on return.
/// The `para` init clause deliberately binds into the enclosing environment.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: HashMap<String, Value>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }
}
