//! Directive globals and the `shelf` table.
//!
//! Every directive name (`file`, `tree`, `cmd`, ...) becomes a global
//! function. A call converts its argument, normalizes it, and only on success
//! records the result in the package under construction. `dep` returns
//! itself so calls chain: `dep "a" "b"`.
//!
//! The builder slot is emptied when evaluation ends; directive calls after
//! that (for instance from inside a hook callback) fail instead of touching
//! the frozen package.

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use mlua::prelude::*;
use tracing::debug;

use super::convert::{CALLBACKS_KEY, to_args};
use crate::directive::{DirectiveKind, normalize};
use crate::package::PackageBuilder;

/// Package under construction, `None` once frozen.
pub type BuilderSlot = Rc<RefCell<Option<PackageBuilder>>>;

const DEP_KEY: &str = "__shelf_dep";

fn apply(kind: DirectiveKind, lua: &Lua, slot: &BuilderSlot, args: LuaMultiValue) -> LuaResult<()> {
  let args = to_args(lua, kind, args)?;
  let directive = normalize(kind, &args).map_err(LuaError::external)?;

  let mut slot = slot.borrow_mut();
  let Some(builder) = slot.as_mut() else {
    return Err(LuaError::external(format!(
      "{}: the package is frozen once its manifest has been evaluated",
      kind
    )));
  };
  debug!(package = builder.name().unwrap_or("<unnamed>"), directive = %kind, "recorded directive");
  directive.apply(builder);
  Ok(())
}

/// Register every directive as a global function recording into `slot`.
pub fn register_directives(lua: &Lua, slot: BuilderSlot) -> LuaResult<()> {
  let globals = lua.globals();

  for &kind in DirectiveKind::ALL {
    if kind == DirectiveKind::Dep {
      continue;
    }
    let slot = slot.clone();
    let func = lua.create_function(move |lua, args: LuaMultiValue| apply(kind, lua, &slot, args))?;
    globals.set(kind.as_str(), func)?;
  }

  let dep_slot = slot;
  let dep = lua.create_function(move |lua, args: LuaMultiValue| {
    apply(DirectiveKind::Dep, lua, &dep_slot, args)?;
    lua.named_registry_value::<LuaFunction>(DEP_KEY)
  })?;
  lua.set_named_registry_value(DEP_KEY, dep.clone())?;
  globals.set(DirectiveKind::Dep.as_str(), dep)?;

  Ok(())
}

/// Register the `shelf` table: `shelf.dir` (the manifest's directory) and `shelf.os`.
pub fn register_shelf_table(lua: &Lua, manifest_dir: &Path) -> LuaResult<()> {
  let shelf = lua.create_table()?;
  shelf.set("dir", manifest_dir.to_string_lossy().to_string())?;
  shelf.set("os", std::env::consts::OS)?;
  lua.globals().set("shelf", shelf)?;
  Ok(())
}

/// Fresh callback registry.
pub fn register_callbacks(lua: &Lua) -> LuaResult<()> {
  lua.set_named_registry_value(CALLBACKS_KEY, lua.create_table()?)
}
