//! Nested data values carried by directives.
//!
//! Template variables and structured-data payloads are arbitrary trees of
//! scalars, sequences and string-keyed tables. `Value` is the host-independent
//! representation of those trees; the Lua binding converts into it and the
//! template backends and serializers consume it through `serde`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A nested scalar / sequence / table value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
  Boolean(bool),
  Integer(i64),
  Float(f64),
  String(String),
  Array(Vec<Value>),
  Table(BTreeMap<String, Value>),
}

impl Value {
  /// An empty table, the default for `vars` and `values`.
  pub fn empty_table() -> Self {
    Value::Table(BTreeMap::new())
  }

  /// Human-readable type name used in shape errors.
  pub fn type_name(&self) -> &'static str {
    match self {
      Value::Boolean(_) => "boolean",
      Value::Integer(_) => "integer",
      Value::Float(_) => "number",
      Value::String(_) => "string",
      Value::Array(_) => "array",
      Value::Table(_) => "table",
    }
  }

  pub fn as_str(&self) -> Option<&str> {
    match self {
      Value::String(s) => Some(s),
      _ => None,
    }
  }

  pub fn as_bool(&self) -> Option<bool> {
    match self {
      Value::Boolean(b) => Some(*b),
      _ => None,
    }
  }

  pub fn as_integer(&self) -> Option<i64> {
    match self {
      Value::Integer(i) => Some(*i),
      // Lua 5.4 hands out floats for integral literals in some arithmetic paths.
      Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
      _ => None,
    }
  }

  pub fn as_table(&self) -> Option<&BTreeMap<String, Value>> {
    match self {
      Value::Table(t) => Some(t),
      _ => None,
    }
  }

  pub fn is_table(&self) -> bool {
    matches!(self, Value::Table(_))
  }
}

impl From<&str> for Value {
  fn from(s: &str) -> Self {
    Value::String(s.to_string())
  }
}

impl From<String> for Value {
  fn from(s: String) -> Self {
    Value::String(s)
  }
}

impl From<bool> for Value {
  fn from(b: bool) -> Self {
    Value::Boolean(b)
  }
}

impl From<i64> for Value {
  fn from(i: i64) -> Self {
    Value::Integer(i)
  }
}

impl From<f64> for Value {
  fn from(f: f64) -> Self {
    Value::Float(f)
  }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
  fn from(items: Vec<T>) -> Self {
    Value::Array(items.into_iter().map(Into::into).collect())
  }
}

impl From<BTreeMap<String, Value>> for Value {
  fn from(map: BTreeMap<String, Value>) -> Self {
    Value::Table(map)
  }
}
