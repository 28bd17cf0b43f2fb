use crate::{Error, Result};
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// Input bindings substituted into a flow's `${name}` placeholders.
#[derive(Debug, Clone, Default)]
pub struct Inputs {
    values: Map<String, Value>,
}

impl Inputs {
    /// Create empty inputs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an input value.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Get an input value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Parse from CLI args like "key=value". Values are bound as strings.
    pub fn from_args(args: &[String]) -> Result<Self> {
        let mut inputs = Self::new();
        for arg in args {
            let (key, value) = arg.split_once('=').ok_or_else(|| {
                Error::Config(format!("invalid input '{}', expected key=value", arg))
            })?;
            inputs
                .values
                .insert(key.to_string(), Value::String(value.to_string()));
        }
        Ok(inputs)
    }

    /// Parse from a JSON object.
    pub fn from_json(json: &str) -> Result<Self> {
        match serde_json::from_str(json)? {
            Value::Object(values) => Ok(Self { values }),
            other => Err(Error::Config(format!(
                "inputs must be a JSON object, got {}",
                other
            ))),
        }
    }

    /// Merge `other` into `self`; keys in `other` win.
    pub fn merge(mut self, other: Inputs) -> Self {
        self.values.extend(other.values);
        self
    }
}

impl From<Map<String, Value>> for Inputs {
    fn from(values: Map<String, Value>) -> Self {
        Self { values }
    }
}

fn placeholder() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| Regex::new(r"\$\{(\w+)\}").expect("placeholder pattern is valid"))
}

/// Replace `${name}` placeholders in raw flow text.
///
/// Substitution happens on the text before it is parsed: string values are injected
/// verbatim (no quoting or escaping), other values as their JSON text. Placeholders
/// without a binding are left untouched.
pub fn preprocess(content: &str, inputs: &Inputs) -> String {
    placeholder()
        .replace_all(content, |caps: &Captures| match inputs.get(&caps[1]) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}
