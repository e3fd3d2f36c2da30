//! Lua values into directive arguments.
//!
//! The argument shape is decided here, once: a table becomes a structured
//! argument (sequence part positional, string keys named), anything else a
//! scalar. Lua functions are parked in the registry and travel as
//! [`CallbackRef`]s.

use std::collections::BTreeMap;

use mlua::prelude::*;

use crate::directive::{Arg, DirectiveArgs, DirectiveError, DirectiveKind};
use crate::package::CallbackRef;
use crate::value::Value;

/// Registry table holding every function passed to a directive.
pub(crate) const CALLBACKS_KEY: &str = "__shelf_callbacks";
const COUNT_FIELD: &str = "__count";

/// Field name reported when the whole argument has the wrong shape.
pub const WHOLE_ARGUMENT: &str = "<argument>";

/// Convert a plain data value. `nil` yields `None`; functions are rejected.
pub fn to_value(value: LuaValue) -> LuaResult<Option<Value>> {
  let converted = match value {
    LuaValue::Nil => return Ok(None),
    LuaValue::Boolean(b) => Value::Boolean(b),
    LuaValue::Integer(i) => Value::Integer(i),
    LuaValue::Number(n) => Value::Float(n),
    LuaValue::String(s) => Value::String(s.to_str()?.to_string()),
    LuaValue::Table(t) => table_to_value(t)?,
    other => {
      return Err(LuaError::RuntimeError(format!(
        "expected a table, string, number or boolean, got {}",
        other.type_name()
      )));
    }
  };
  Ok(Some(converted))
}

/// Tables with a non-empty sequence part and nothing else become arrays;
/// everything else becomes a string-keyed table.
fn table_to_value(table: LuaTable) -> LuaResult<Value> {
  let len = table.raw_len();
  let mut map = BTreeMap::new();
  let mut sequence_only = len > 0;

  for pair in table.pairs::<LuaValue, LuaValue>() {
    let (key, value) = pair?;
    let Some(value) = to_value(value)? else {
      continue;
    };
    let key = match key {
      LuaValue::Integer(i) if (1..=len as i64).contains(&i) => i.to_string(),
      LuaValue::Integer(i) => {
        sequence_only = false;
        i.to_string()
      }
      LuaValue::String(s) => {
        sequence_only = false;
        s.to_str()?.to_string()
      }
      other => {
        return Err(LuaError::RuntimeError(format!(
          "table keys must be strings or integers, got {}",
          other.type_name()
        )));
      }
    };
    map.insert(key, value);
  }

  if !sequence_only {
    return Ok(Value::Table(map));
  }

  let mut items = Vec::with_capacity(len);
  for i in 1..=len {
    if let Some(item) = map.remove(&i.to_string()) {
      items.push(item);
    }
  }
  Ok(Value::Array(items))
}

/// Park `func` in the callback registry and return its handle.
pub fn store_callback(lua: &Lua, func: LuaFunction) -> LuaResult<CallbackRef> {
  let callbacks: LuaTable = lua.named_registry_value(CALLBACKS_KEY)?;
  let count = callbacks.raw_get::<Option<i64>>(COUNT_FIELD)?.unwrap_or(0) + 1;
  callbacks.raw_set(COUNT_FIELD, count)?;

  let key = format!("callback_{}", count);
  callbacks.raw_set(key.as_str(), func)?;
  Ok(CallbackRef(key))
}

/// Look up a previously stored callback.
pub fn stored_callback(lua: &Lua, callback: &CallbackRef) -> LuaResult<Option<LuaFunction>> {
  let callbacks: LuaTable = lua.named_registry_value(CALLBACKS_KEY)?;
  callbacks.raw_get(callback.0.as_str())
}

fn to_arg(lua: &Lua, value: LuaValue) -> LuaResult<Option<Arg>> {
  match value {
    LuaValue::Function(func) => store_callback(lua, func).map(|c| Some(Arg::Callback(c))),
    other => Ok(to_value(other)?.map(Arg::Value)),
  }
}

fn shape_error(kind: DirectiveKind, found: &'static str) -> LuaError {
  LuaError::external(DirectiveError::TypeShape {
    directive: kind,
    field: WHOLE_ARGUMENT.to_string(),
    expected: "a scalar or a table",
    found,
  })
}

/// Decide the argument shape of one directive call.
///
/// One argument is a scalar or a structured table; several bare arguments
/// (`file("a", "b")`) are read as positional fields.
pub fn to_args(lua: &Lua, kind: DirectiveKind, args: LuaMultiValue) -> LuaResult<DirectiveArgs> {
  let mut values: Vec<LuaValue> = args.into_iter().collect();
  while matches!(values.last(), Some(LuaValue::Nil)) {
    values.pop();
  }

  match values.len() {
    0 => Err(shape_error(kind, "nil")),
    1 => match values.remove(0) {
      LuaValue::Table(table) => table_args(lua, table),
      scalar => {
        let found = scalar.type_name();
        match to_arg(lua, scalar)? {
          Some(arg) => Ok(DirectiveArgs::Scalar(arg)),
          None => Err(shape_error(kind, found)),
        }
      }
    },
    _ => {
      let mut positional = Vec::with_capacity(values.len());
      for value in values {
        let found = value.type_name();
        positional.push(to_arg(lua, value)?.ok_or_else(|| shape_error(kind, found))?);
      }
      Ok(DirectiveArgs::Structured {
        positional,
        named: BTreeMap::new(),
      })
    }
  }
}

fn table_args(lua: &Lua, table: LuaTable) -> LuaResult<DirectiveArgs> {
  let mut positional = Vec::new();
  for value in table.sequence_values::<LuaValue>() {
    if let Some(arg) = to_arg(lua, value?)? {
      positional.push(arg);
    }
  }

  let mut named = BTreeMap::new();
  for pair in table.pairs::<LuaValue, LuaValue>() {
    let (key, value) = pair?;
    if let LuaValue::String(key) = key
      && let Some(arg) = to_arg(lua, value)?
    {
      named.insert(key.to_str()?.to_string(), arg);
    }
  }

  Ok(DirectiveArgs::Structured { positional, named })
}
