// src/macros/variables.rs
// Two-scope variable store backing the {{setvar}} macro family

use std::collections::HashMap;

/// Variable scope. Local variables live for the process only; global
/// variables have a persistence contract delegated to an external store
/// the core does not manage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Local,
    Global,
}

/// Name-to-string storage with numeric-aware arithmetic. An explicit,
/// injectable state object: callers own one (usually via `PromptContext`)
/// and pass it by reference into the pipeline.
#[derive(Debug, Default)]
pub struct VariableStore {
    local: HashMap<String, String>,
    global: HashMap<String, String>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self, scope: Scope) -> &HashMap<String, String> {
        match scope {
            Scope::Local => &self.local,
            Scope::Global => &self.global,
        }
    }

    fn map_mut(&mut self, scope: Scope) -> &mut HashMap<String, String> {
        match scope {
            Scope::Local => &mut self.local,
            Scope::Global => &mut self.global,
        }
    }

    pub fn set(&mut self, scope: Scope, name: &str, value: impl Into<String>) {
        self.map_mut(scope).insert(name.to_string(), value.into());
    }

    /// Returns the stored value, or the empty string when absent.
    pub fn get(&self, scope: Scope, name: &str) -> String {
        self.map(scope).get(name).cloned().unwrap_or_default()
    }

    /// Numeric-aware add: when both the current value and the operand read
    /// as numbers the result is their sum, otherwise the operand is
    /// appended as a string.
    pub fn add(&mut self, scope: Scope, name: &str, value: &str) {
        let current = self.get(scope, name);
        match (as_number(&current), as_number(value)) {
            (Some(a), Some(b)) => self.set(scope, name, format_number(a + b)),
            _ => self.set(scope, name, format!("{current}{value}")),
        }
    }

    /// Adds one, coercing a non-numeric current value to 0. Returns the
    /// new value.
    pub fn increment(&mut self, scope: Scope, name: &str) -> String {
        self.shift(scope, name, 1.0)
    }

    /// Subtracts one, coercing a non-numeric current value to 0. Returns
    /// the new value.
    pub fn decrement(&mut self, scope: Scope, name: &str) -> String {
        self.shift(scope, name, -1.0)
    }

    fn shift(&mut self, scope: Scope, name: &str, delta: f64) -> String {
        let current = as_number(&self.get(scope, name)).unwrap_or(0.0);
        let value = format_number(current + delta);
        self.set(scope, name, value.clone());
        value
    }

    pub fn clear(&mut self, scope: Scope) {
        self.map_mut(scope).clear();
    }

    // Directly callable helpers mirroring the macro family.

    pub fn set_local(&mut self, name: &str, value: impl Into<String>) {
        self.set(Scope::Local, name, value);
    }

    pub fn get_local(&self, name: &str) -> String {
        self.get(Scope::Local, name)
    }

    pub fn set_global(&mut self, name: &str, value: impl Into<String>) {
        self.set(Scope::Global, name, value);
    }

    pub fn get_global(&self, name: &str) -> String {
        self.get(Scope::Global, name)
    }
}

/// Reads a string as a number the way the original host did: surrounding
/// whitespace is ignored and the empty string counts as zero.
pub(crate) fn as_number(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Some(0.0);
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Renders a number without a trailing `.0` when it is integral.
pub(crate) fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}
