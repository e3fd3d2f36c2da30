use std::path::Path;

use mlua::prelude::*;

use super::convert::stored_callback;
use super::globals::{self, BuilderSlot};
use crate::package::CallbackRef;

/// Create a Lua runtime for one manifest.
///
/// `require` resolves `lua/` next to the manifest first. Directive globals
/// record into `slot`.
pub fn create_runtime(slot: BuilderSlot, manifest_dir: &Path) -> LuaResult<Lua> {
  let lua = Lua::new();

  let package: LuaTable = lua.globals().get("package")?;
  let search_path: String = package.get("path")?;
  let dir = manifest_dir.to_string_lossy();
  package.set("path", format!("{dir}/lua/?.lua;{dir}/lua/?/init.lua;{search_path}"))?;

  globals::register_callbacks(&lua)?;
  globals::register_directives(&lua, slot)?;
  globals::register_shelf_table(&lua, manifest_dir)?;

  Ok(lua)
}

/// Execute manifest source, naming the chunk after `path` for error messages.
pub fn exec_chunk(lua: &Lua, source: &str, path: &Path) -> LuaResult<()> {
  lua.load(source).set_name(format!("@{}", path.display())).exec()
}

/// Invoke a stored hook callback with no arguments.
///
/// A raised Lua error comes back as its message.
pub fn call_callback(lua: &Lua, callback: &CallbackRef) -> Result<(), String> {
  let func = stored_callback(lua, callback)
    .map_err(|e| e.to_string())?
    .ok_or_else(|| format!("unknown callback '{}'", callback))?;
  func.call::<()>(()).map_err(|e| e.to_string())
}
