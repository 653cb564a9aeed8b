// src/macros/mod.rs
// Macro registry, macro values, and the evaluation pipeline entry point

pub mod engine;
pub mod variables;

pub use engine::{evaluate_macros, EvaluateOptions, HistoryMessage};
pub use variables::{Scope, VariableStore};

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use crate::error::PromptError;

/// A dynamic macro body. It receives the per-evaluation nonce, so one
/// random choice can be referenced consistently by several occurrences of
/// the same macro within a single render. A failing body skips only its
/// own substitution; the pipeline keeps going.
pub type MacroFn = Arc<dyn Fn(&str) -> Result<String, PromptError> + Send + Sync>;

/// The value bound to a macro key: a literal, a structured value sanitized
/// at substitution time, or a nonce-aware function.
#[derive(Clone)]
pub enum MacroValue {
    Text(String),
    Json(Value),
    Timestamp(DateTime<Utc>),
    Dynamic(MacroFn),
}

impl MacroValue {
    pub fn text(value: impl Into<String>) -> Self {
        MacroValue::Text(value.into())
    }

    pub fn dynamic(f: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        MacroValue::Dynamic(Arc::new(move |nonce| Ok(f(nonce))))
    }

    pub fn try_dynamic(
        f: impl Fn(&str) -> Result<String, PromptError> + Send + Sync + 'static,
    ) -> Self {
        MacroValue::Dynamic(Arc::new(f))
    }

    /// Resolves the value for one occurrence, sanitizing structured forms.
    pub fn resolve(&self, nonce: &str) -> Result<String, PromptError> {
        match self {
            MacroValue::Text(s) => Ok(s.clone()),
            MacroValue::Json(v) => Ok(sanitize_json(v)),
            MacroValue::Timestamp(t) => Ok(t.to_rfc3339_opts(SecondsFormat::Millis, true)),
            MacroValue::Dynamic(f) => f(nonce),
        }
    }
}

impl fmt::Debug for MacroValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MacroValue::Text(s) => f.debug_tuple("Text").field(s).finish(),
            MacroValue::Json(v) => f.debug_tuple("Json").field(v).finish(),
            MacroValue::Timestamp(t) => f.debug_tuple("Timestamp").field(t).finish(),
            MacroValue::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

impl From<&str> for MacroValue {
    fn from(value: &str) -> Self {
        MacroValue::Text(value.to_string())
    }
}

impl From<String> for MacroValue {
    fn from(value: String) -> Self {
        MacroValue::Text(value)
    }
}

/// Sanitizes a structured value into replacement text: strings pass
/// through, null becomes empty, objects and arrays serialize as JSON,
/// scalars coerce to their display form.
pub fn sanitize_json(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Per-evaluation macro environment: name to value, assembled fresh for
/// each pipeline invocation and never persisted.
pub type MacroEnv = HashMap<String, MacroValue>;

/// Pluggable macro table. Third-party callers register extra macros here;
/// the pipeline merges the table into every evaluation environment.
/// Re-registering a key overwrites it (last write wins).
#[derive(Debug, Default)]
pub struct MacroRegistry {
    macros: HashMap<String, MacroValue>,
    descriptions: HashMap<String, String>,
}

impl MacroRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a macro. The key must be non-empty and must not carry the
    /// `{{`/`}}` delimiters itself.
    pub fn register(
        &mut self,
        key: &str,
        value: impl Into<MacroValue>,
        description: Option<&str>,
    ) -> Result<(), PromptError> {
        let key = key.trim();
        if key.is_empty() {
            return Err(PromptError::EmptyMacroKey);
        }
        if key.starts_with("{{") || key.ends_with("}}") {
            return Err(PromptError::BracedMacroKey(key.to_string()));
        }
        self.macros.insert(key.to_string(), value.into());
        // A registration without a description leaves any prior one alone.
        if let Some(d) = description.filter(|d| !d.is_empty()) {
            self.descriptions.insert(key.to_string(), d.to_string());
        }
        Ok(())
    }

    pub fn unregister(&mut self, key: &str) -> Result<(), PromptError> {
        let key = key.trim();
        if key.is_empty() {
            return Err(PromptError::EmptyMacroKey);
        }
        self.macros.remove(key);
        self.descriptions.remove(key);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&MacroValue> {
        self.macros.get(key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.macros.contains_key(key)
    }

    /// Live view of the registered keys and their descriptions.
    pub fn enumerate(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.macros
            .keys()
            .map(|key| (key.as_str(), self.descriptions.get(key).map(String::as_str)))
    }

    /// Copies every registered entry into a caller-supplied environment,
    /// overwriting colliding keys.
    pub fn populate(&self, env: &mut MacroEnv) {
        for (key, value) in &self.macros {
            env.insert(key.clone(), value.clone());
        }
    }
}

/// Shared evaluation state for one chat session: the macro registry and
/// the variable store. The original host kept both as process-wide
/// singletons; here an explicit owner carries them, and a multi-threaded
/// host adds its own locking around mutation.
#[derive(Debug, Default)]
pub struct PromptContext {
    pub registry: MacroRegistry,
    pub variables: VariableStore,
}

impl PromptContext {
    pub fn new() -> Self {
        Self::default()
    }
}
