use std::collections::BTreeMap;

use super::value::Value;

/// The single mutable binding table every snippet of a session runs against.
///
/// Owned by the session and passed explicitly into each evaluation; a binding
/// created by one snippet is visible to every later one.
#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    bindings: BTreeMap<String, Value>,
}

impl EvalContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Binds `name` to `value`, returning true if the name did not exist before.
    pub fn set(&mut self, name: impl Into<String>, value: Value) -> bool {
        self.bindings.insert(name.into(), value).is_none()
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.bindings.remove(name)
    }

    /// Binding names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Independent copy for evaluating reference solutions without touching
    /// the learner's bindings.
    #[must_use]
    pub fn fork(&self) -> Self {
        self.clone()
    }
}
