use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{CoreError, CoreResult};

// ---------------------------------------------------------------------------
// Context: attribute map handed to predicates and rules
// ---------------------------------------------------------------------------

/// Named request attributes (acting user, requested operation, ...).
///
/// There is no fixed schema: predicates and rules agree out-of-band on the
/// keys they read. Rules only ever borrow a context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context {
    attributes: BTreeMap<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Context::insert`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Set an attribute, returning the previous value if there was one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.attributes.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// The attribute as a string slice, if it is a JSON string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// True when the attribute exists and is not `null`.
    pub fn contains(&self, key: &str) -> bool {
        matches!(self.get(key), Some(v) if !v.is_null())
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.attributes.iter()
    }

    /// Shallow merge of `self` over `base`: on a key collision the value
    /// from `self` wins.
    pub fn merged_over(&self, base: &Context) -> Context {
        let mut merged = base.clone();
        for (key, value) in &self.attributes {
            merged.attributes.insert(key.clone(), value.clone());
        }
        merged
    }

    /// Merge contexts in order; later contexts override earlier ones.
    pub fn merge_all<'a>(contexts: impl IntoIterator<Item = &'a Context>) -> Context {
        contexts
            .into_iter()
            .fold(Context::new(), |acc, next| next.merged_over(&acc))
    }

    /// Parse a `key=value` assignment.
    ///
    /// The value is read as JSON when it parses (`42`, `true`, `null`,
    /// `{"a":1}`), otherwise it is kept as a plain string.
    pub fn parse_assignment(assignment: &str) -> CoreResult<(String, Value)> {
        let (key, raw) = assignment
            .split_once('=')
            .ok_or_else(|| CoreError::InvalidAssignment(assignment.to_string()))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(CoreError::InvalidAttribute(
                "attribute name must not be empty".into(),
            ));
        }
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        Ok((key.to_string(), value))
    }

    /// Build a context from a list of `key=value` assignments.
    pub fn from_assignments<S: AsRef<str>>(assignments: &[S]) -> CoreResult<Context> {
        let mut context = Context::new();
        for assignment in assignments {
            let (key, value) = Context::parse_assignment(assignment.as_ref())?;
            context.insert(key, value);
        }
        Ok(context)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Context {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut context = Context::new();
        for (key, value) in iter {
            context.insert(key, value);
        }
        context
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = serde_json::to_string(&self.attributes).map_err(|_| fmt::Error)?;
        f.write_str(&rendered)
    }
}
