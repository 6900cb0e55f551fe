//! # Redaction Serializer
//!
//! Turns captured runtime values into bounded, redacted JSON.
//!
//! [`VariableSerializer::serialize`] never panics: cycles become
//! `"[CIRCULAR]"`, sensitive keys become `"[FILTERED]"`, long strings are
//! cut, deep graphs stop at `"[MAX DEPTH EXCEEDED]"` and values whose `Debug`
//! impl fails become `"[UNSERIALIZABLE: <reason>]"`.

use config::SerializerConfig;
use parking_lot::RwLock;
use serde_json::{Map, Number, Value};
use std::collections::HashSet;
use std::fmt::{self, Debug, Write};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

pub const FILTERED: &str = "[FILTERED]";
pub const CIRCULAR: &str = "[CIRCULAR]";
pub const MAX_DEPTH_EXCEEDED: &str = "[MAX DEPTH EXCEEDED]";

/// A runtime value graph.
///
/// `Shared` nodes are the only way to alias a value, and therefore the only
/// way to build a cycle.
#[derive(Clone, Default)]
pub enum Variable {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Variable>),
    Map(Vec<(String, Variable)>),
    Shared(Arc<RwLock<Variable>>),
    Opaque(Arc<dyn Debug + Send + Sync>)
}

impl Variable {
    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Variable)>
    {
        Self::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn list(items: impl IntoIterator<Item = Variable>) -> Self {
        Self::List(items.into_iter().collect())
    }

    /// Wrap `value` in a shareable node. Clone the returned handle into other
    /// places to alias it.
    pub fn shared(value: Variable) -> Arc<RwLock<Variable>> {
        Arc::new(RwLock::new(value))
    }

    pub fn opaque<T: Debug + Send + Sync + 'static>(value: T) -> Self {
        Self::Opaque(Arc::new(value))
    }

    /// Render `value` through `Debug` right now.
    ///
    /// Used for borrowed locals that cannot be kept past the call site.
    pub fn debug_snapshot<T: Debug + ?Sized>(value: &T) -> Self {
        Self::Str(render_debug(value))
    }
}

impl Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => write!(f, "Bool({b})"),
            Self::Int(i) => write!(f, "Int({i})"),
            Self::Float(x) => write!(f, "Float({x})"),
            Self::Str(s) => write!(f, "Str({s:?})"),
            Self::List(items) => f.debug_tuple("List").field(&items.len()).finish(),
            Self::Map(entries) => f.debug_tuple("Map").field(&entries.len()).finish(),
            Self::Shared(node) => write!(f, "Shared({:p})", Arc::as_ptr(node)),
            Self::Opaque(_) => f.write_str("Opaque(..)")
        }
    }
}

impl From<bool> for Variable {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Variable {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Variable {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for Variable {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for Variable {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Variable {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Variable {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl<T: Into<Variable>> From<Option<T>> for Variable {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl<T: Into<Variable>> From<Vec<T>> for Variable {
    fn from(value: Vec<T>) -> Self {
        Self::List(value.into_iter().map(Into::into).collect())
    }
}

impl From<Value> for Variable {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN))
            },
            Value::String(s) => Self::Str(s),
            Value::Array(items) => Self::List(items.into_iter().map(Into::into).collect()),
            Value::Object(map) => Self::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect())
        }
    }
}

/// Format through `Debug`, degrading to a placeholder on error or panic.
pub fn render_debug<T: Debug + ?Sized>(value: &T) -> String {
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let mut out = String::new();
        write!(out, "{value:?}").map(|()| out)
    }));
    match outcome {
        Ok(Ok(rendered)) => rendered,
        Ok(Err(err)) => format!("[UNSERIALIZABLE: {err}]"),
        Err(payload) => format!("[UNSERIALIZABLE: {}]", panic_reason(payload.as_ref()))
    }
}

fn panic_reason(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "formatter panicked".to_string()
    }
}

/// Redacting, bounded serializer for captured values.
#[derive(Debug, Clone)]
pub struct VariableSerializer {
    sensitive_keys: Vec<String>,
    max_string_length: usize,
    max_depth: usize,
    max_collection_size: usize
}

impl Default for VariableSerializer {
    fn default() -> Self {
        Self::new(&SerializerConfig::default())
    }
}

impl VariableSerializer {
    pub fn new(config: &SerializerConfig) -> Self {
        Self {
            sensitive_keys: config
                .sensitive_keys
                .iter()
                .map(|k| k.to_lowercase())
                .collect(),
            max_string_length: config.max_string_length,
            max_depth: config.max_depth,
            max_collection_size: config.max_collection_size
        }
    }

    /// Serialize a value graph into a JSON object.
    ///
    /// `Null` and empty maps yield an empty object; any other non-map value
    /// is wrapped as `{"value": ...}`.
    pub fn serialize(&self, value: &Variable) -> Map<String, Value> {
        let mut visiting = HashSet::new();
        into_object(self.walk(value, 0, &mut visiting))
    }

    /// Apply the same redaction and limits to JSON input.
    pub fn serialize_json(&self, value: &Value) -> Map<String, Value> {
        into_object(self.walk_json(value, 0))
    }

    /// Case-insensitive substring match against the denylist.
    pub fn is_sensitive(&self, key: &str) -> bool {
        let key = key.to_lowercase();
        self.sensitive_keys.iter().any(|s| key.contains(s.as_str()))
    }

    /// Cut strings longer than the limit. The result is always strictly
    /// shorter than the input.
    pub fn truncate(&self, text: &str) -> String {
        let length = text.chars().count();
        if length <= self.max_string_length {
            return text.to_string();
        }
        let suffix = format!("...[truncated, original length {length}]");
        let suffix_len = suffix.chars().count();
        let keep = self
            .max_string_length
            .min(length.saturating_sub(suffix_len + 1));
        if keep == 0 {
            return utils::take_chars(text, length - 1);
        }
        let mut out = utils::take_chars(text, keep);
        out.push_str(&suffix);
        out
    }

    fn walk(&self, value: &Variable, depth: usize, visiting: &mut HashSet<usize>) -> Value {
        match value {
            Variable::Null => Value::Null,
            Variable::Bool(b) => Value::Bool(*b),
            Variable::Int(i) => Value::from(*i),
            Variable::Float(x) => float(*x),
            Variable::Str(s) => Value::String(self.truncate(s)),
            Variable::Opaque(inner) => Value::String(self.truncate(&render_debug(inner.as_ref()))),
            Variable::Shared(node) => {
                let id = Arc::as_ptr(node) as *const () as usize;
                if !visiting.insert(id) {
                    return Value::String(CIRCULAR.to_string());
                }
                let result = {
                    let guard = node.read_recursive();
                    self.walk(&guard, depth, visiting)
                };
                visiting.remove(&id);
                result
            }
            Variable::List(items) => {
                if depth >= self.max_depth {
                    return Value::String(MAX_DEPTH_EXCEEDED.to_string());
                }
                let mut out: Vec<Value> = items
                    .iter()
                    .take(self.max_collection_size)
                    .map(|item| self.walk(item, depth + 1, visiting))
                    .collect();
                if items.len() > self.max_collection_size {
                    out.push(more_marker(items.len() - self.max_collection_size));
                }
                Value::Array(out)
            }
            Variable::Map(entries) => {
                if depth >= self.max_depth {
                    return Value::String(MAX_DEPTH_EXCEEDED.to_string());
                }
                let mut out = Map::new();
                for (key, item) in entries.iter().take(self.max_collection_size) {
                    let rendered = if self.is_sensitive(key) {
                        Value::String(FILTERED.to_string())
                    } else {
                        self.walk(item, depth + 1, visiting)
                    };
                    out.insert(key.clone(), rendered);
                }
                if entries.len() > self.max_collection_size {
                    out.insert(
                        "...".to_string(),
                        more_marker(entries.len() - self.max_collection_size)
                    );
                }
                Value::Object(out)
            }
        }
    }

    fn walk_json(&self, value: &Value, depth: usize) -> Value {
        match value {
            Value::String(s) => Value::String(self.truncate(s)),
            Value::Array(items) => {
                if depth >= self.max_depth {
                    return Value::String(MAX_DEPTH_EXCEEDED.to_string());
                }
                let mut out: Vec<Value> = items
                    .iter()
                    .take(self.max_collection_size)
                    .map(|item| self.walk_json(item, depth + 1))
                    .collect();
                if items.len() > self.max_collection_size {
                    out.push(more_marker(items.len() - self.max_collection_size));
                }
                Value::Array(out)
            }
            Value::Object(map) => {
                if depth >= self.max_depth {
                    return Value::String(MAX_DEPTH_EXCEEDED.to_string());
                }
                let mut out = Map::new();
                for (key, item) in map.iter().take(self.max_collection_size) {
                    let rendered = if self.is_sensitive(key) {
                        Value::String(FILTERED.to_string())
                    } else {
                        self.walk_json(item, depth + 1)
                    };
                    out.insert(key.clone(), rendered);
                }
                if map.len() > self.max_collection_size {
                    out.insert(
                        "...".to_string(),
                        more_marker(map.len() - self.max_collection_size)
                    );
                }
                Value::Object(out)
            }
            scalar => scalar.clone()
        }
    }
}

fn into_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Null => Map::new(),
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            map
        }
    }
}

fn float(x: f64) -> Value {
    Number::from_f64(x).map_or_else(|| Value::String(x.to_string()), Value::Number)
}

fn more_marker(remaining: usize) -> Value {
    Value::String(format!("... {remaining} more"))
}
