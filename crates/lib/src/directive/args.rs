//! Argument shapes accepted by directives.
//!
//! A directive receives either one scalar, which stands in for its first
//! positional field, or a structured argument with positional fields by
//! index and named fields by key. [`Fields`] reads both shapes uniformly:
//! every lookup names a field and, optionally, the positional slot it may
//! also occupy.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use tracing::warn;

use super::{DirectiveError, DirectiveKind};
use crate::package::CallbackRef;
use crate::value::Value;

/// One argument slot: plain data or a host callback.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
  Value(Value),
  Callback(CallbackRef),
}

impl Arg {
  pub fn type_name(&self) -> &'static str {
    match self {
      Arg::Value(value) => value.type_name(),
      Arg::Callback(_) => "function",
    }
  }
}

impl From<Value> for Arg {
  fn from(value: Value) -> Self {
    Arg::Value(value)
  }
}

impl From<&str> for Arg {
  fn from(s: &str) -> Self {
    Arg::Value(Value::from(s))
  }
}

impl From<String> for Arg {
  fn from(s: String) -> Self {
    Arg::Value(Value::from(s))
  }
}

impl From<bool> for Arg {
  fn from(b: bool) -> Self {
    Arg::Value(Value::from(b))
  }
}

impl From<i64> for Arg {
  fn from(i: i64) -> Self {
    Arg::Value(Value::from(i))
  }
}

impl From<CallbackRef> for Arg {
  fn from(callback: CallbackRef) -> Self {
    Arg::Callback(callback)
  }
}

/// The two argument shapes, decided once at the host boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum DirectiveArgs {
  Scalar(Arg),
  Structured {
    positional: Vec<Arg>,
    named: BTreeMap<String, Arg>,
  },
}

impl DirectiveArgs {
  pub fn scalar(arg: impl Into<Arg>) -> Self {
    DirectiveArgs::Scalar(arg.into())
  }

  pub fn positional<I, A>(items: I) -> Self
  where
    I: IntoIterator<Item = A>,
    A: Into<Arg>,
  {
    DirectiveArgs::Structured {
      positional: items.into_iter().map(Into::into).collect(),
      named: BTreeMap::new(),
    }
  }

  /// Add a named field, promoting a scalar to a structured argument.
  pub fn with(self, key: impl Into<String>, arg: impl Into<Arg>) -> Self {
    let (positional, mut named) = match self {
      DirectiveArgs::Scalar(arg) => (vec![arg], BTreeMap::new()),
      DirectiveArgs::Structured { positional, named } => (positional, named),
    };
    named.insert(key.into(), arg.into());
    DirectiveArgs::Structured { positional, named }
  }
}

/// Field reader over a [`DirectiveArgs`] for one directive.
pub(crate) struct Fields<'a> {
  directive: DirectiveKind,
  positional: &'a [Arg],
  named: Option<&'a BTreeMap<String, Arg>>,
  consumed: BTreeSet<&'static str>,
  /// Number of leading positional slots some lookup asked for.
  slots_read: usize,
}

impl<'a> Fields<'a> {
  pub fn new(directive: DirectiveKind, args: &'a DirectiveArgs) -> Self {
    let (positional, named) = match args {
      DirectiveArgs::Scalar(arg) => (std::slice::from_ref(arg), None),
      DirectiveArgs::Structured { positional, named } => (positional.as_slice(), Some(named)),
    };

    Self {
      directive,
      positional,
      named,
      consumed: BTreeSet::new(),
      slots_read: 0,
    }
  }

  fn lookup(&mut self, index: Option<usize>, name: &'static str) -> Option<&'a Arg> {
    self.consumed.insert(name);
    if let Some(i) = index {
      self.slots_read = self.slots_read.max(i + 1);
    }
    let positional = self.positional;
    let named = self.named;
    index
      .and_then(|i| positional.get(i))
      .or_else(|| named.and_then(|n| n.get(name)))
  }

  fn shape(&self, field: &str, expected: &'static str, found: &Arg) -> DirectiveError {
    self.mismatch(field, expected, found.type_name())
  }

  pub fn mismatch(&self, field: &str, expected: &'static str, found: &'static str) -> DirectiveError {
    DirectiveError::TypeShape {
      directive: self.directive,
      field: field.to_string(),
      expected,
      found,
    }
  }

  pub fn missing(&self, field: &str) -> DirectiveError {
    DirectiveError::Validation {
      directive: self.directive,
      field: field.to_string(),
    }
  }

  pub fn invalid(&self, field: &str, message: impl Into<String>) -> DirectiveError {
    DirectiveError::InvalidValue {
      directive: self.directive,
      field: field.to_string(),
      message: message.into(),
    }
  }

  pub fn value(&mut self, index: Option<usize>, name: &'static str) -> Result<Option<&'a Value>, DirectiveError> {
    match self.lookup(index, name) {
      None => Ok(None),
      Some(Arg::Value(value)) => Ok(Some(value)),
      Some(other) => Err(self.shape(name, "a value", other)),
    }
  }

  pub fn optional_string(&mut self, index: Option<usize>, name: &'static str) -> Result<Option<String>, DirectiveError> {
    match self.lookup(index, name) {
      None => Ok(None),
      Some(Arg::Value(Value::String(s))) => Ok(Some(s.clone())),
      Some(other) => Err(self.shape(name, "string", other)),
    }
  }

  /// A required, non-empty string.
  pub fn required_string(&mut self, index: Option<usize>, name: &'static str) -> Result<String, DirectiveError> {
    let value = self.optional_string(index, name)?.ok_or_else(|| self.missing(name))?;
    if value.is_empty() {
      return Err(self.invalid(name, "must not be empty"));
    }
    Ok(value)
  }

  pub fn optional_path(&mut self, index: Option<usize>, name: &'static str) -> Result<Option<PathBuf>, DirectiveError> {
    match self.optional_string(index, name)? {
      Some(s) if s.is_empty() => Err(self.invalid(name, "must not be empty")),
      other => Ok(other.map(PathBuf::from)),
    }
  }

  pub fn required_path(&mut self, index: Option<usize>, name: &'static str) -> Result<PathBuf, DirectiveError> {
    self.required_string(index, name).map(PathBuf::from)
  }

  pub fn optional_bool(&mut self, name: &'static str) -> Result<Option<bool>, DirectiveError> {
    match self.lookup(None, name) {
      None => Ok(None),
      Some(Arg::Value(Value::Boolean(b))) => Ok(Some(*b)),
      Some(other) => Err(self.shape(name, "boolean", other)),
    }
  }

  pub fn flag(&mut self, name: &'static str) -> Result<bool, DirectiveError> {
    Ok(self.optional_bool(name)?.unwrap_or(false))
  }

  /// A string or a list of strings; a lone string becomes a one-element list.
  pub fn string_list(&mut self, index: Option<usize>, name: &'static str) -> Result<Vec<String>, DirectiveError> {
    let Some(arg) = self.lookup(index, name) else {
      return Ok(Vec::new());
    };

    match arg {
      Arg::Value(Value::String(s)) => Ok(vec![s.clone()]),
      Arg::Value(Value::Array(items)) => items
        .iter()
        .map(|item| match item {
          Value::String(s) => Ok(s.clone()),
          other => Err(self.mismatch(name, "list of strings", other.type_name())),
        })
        .collect(),
      // An empty Lua table arrives as an empty table.
      Arg::Value(Value::Table(t)) if t.is_empty() => Ok(Vec::new()),
      other => Err(self.shape(name, "string or list of strings", other)),
    }
  }

  /// A table value, defaulting to an empty table.
  pub fn table(&mut self, index: Option<usize>, name: &'static str) -> Result<Value, DirectiveError> {
    match self.lookup(index, name) {
      None => Ok(Value::empty_table()),
      Some(Arg::Value(value @ Value::Table(_))) => Ok(value.clone()),
      // `{}` and `{ "a", "b" }` are both valid payloads for serializers.
      Some(Arg::Value(value @ Value::Array(_))) => Ok(value.clone()),
      Some(other) => Err(self.shape(name, "table", other)),
    }
  }

  /// A required table that may not be the implicit default.
  pub fn required_table(&mut self, index: Option<usize>, name: &'static str) -> Result<Value, DirectiveError> {
    if self.lookup(index, name).is_none() {
      return Err(self.missing(name));
    }
    self.table(index, name)
  }

  pub fn string_map(&mut self, name: &'static str) -> Result<BTreeMap<String, String>, DirectiveError> {
    let Some(arg) = self.lookup(None, name) else {
      return Ok(BTreeMap::new());
    };
    let Arg::Value(Value::Table(table)) = arg else {
      return Err(self.shape(name, "table of strings", arg));
    };

    let mut map = BTreeMap::new();
    for (key, value) in table {
      let text = match value {
        Value::String(s) => s.clone(),
        Value::Integer(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Boolean(b) => b.to_string(),
        other => {
          return Err(DirectiveError::TypeShape {
            directive: self.directive,
            field: format!("{}.{}", name, key),
            expected: "string",
            found: other.type_name(),
          });
        }
      };
      map.insert(key.clone(), text);
    }
    Ok(map)
  }

  pub fn callback(&mut self, index: Option<usize>, name: &'static str) -> Result<CallbackRef, DirectiveError> {
    match self.lookup(index, name) {
      None => Err(self.missing(name)),
      Some(Arg::Callback(callback)) => Ok(callback.clone()),
      Some(other) => Err(self.shape(name, "function", other)),
    }
  }

  pub fn has_positional(&self) -> bool {
    !self.positional.is_empty()
  }

  /// Every positional argument as a string.
  pub fn positional_strings(&mut self, name: &str) -> Result<Vec<String>, DirectiveError> {
    self.slots_read = self.positional.len();
    self
      .positional
      .iter()
      .map(|arg| match arg {
        Arg::Value(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Arg::Value(Value::String(_)) => Err(self.invalid(name, "must not be empty")),
        other => Err(self.shape(name, "string", other)),
      })
      .collect()
  }

  /// Reject positional arguments past the last slot read and log named
  /// fields nothing asked for.
  pub fn finish(self) -> Result<(), DirectiveError> {
    if self.positional.len() > self.slots_read {
      return Err(self.invalid(
        &format!("argument {}", self.slots_read + 1),
        format!(
          "unexpected positional argument ({} given, at most {} accepted)",
          self.positional.len(),
          self.slots_read
        ),
      ));
    }

    if let Some(named) = self.named {
      for key in named.keys() {
        if !self.consumed.contains(key.as_str()) {
          warn!(directive = %self.directive, field = %key, "ignoring unknown field");
        }
      }
    }
    Ok(())
  }
}
