//! Manifest evaluation.
//!
//! [`evaluate_manifest`] runs one Lua manifest against a fresh package
//! builder and freezes the result. The Lua state is kept alongside the
//! package so function hooks can be invoked later.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use mlua::prelude::*;
use tracing::{debug, info};

use crate::directive::DirectiveError;
use crate::lua::{self, BuilderSlot};
use crate::package::{BuildError, CallbackRef, Package, PackageBuilder};

#[derive(Debug, thiserror::Error)]
pub enum EvalError {
  /// A directive rejected its arguments.
  #[error("{}: {source}", .path.display())]
  Directive {
    path: PathBuf,
    #[source]
    source: DirectiveError,
  },

  /// The manifest ran but does not describe a complete package.
  #[error("{}: {source}", .path.display())]
  Build {
    path: PathBuf,
    #[source]
    source: BuildError,
  },

  #[error("cannot read '{}': {source}", .path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("lua error in '{}': {source}", .path.display())]
  Lua {
    path: PathBuf,
    #[source]
    source: LuaError,
  },
}

impl EvalError {
  fn from_lua(path: &Path, err: LuaError) -> Self {
    match find_directive_error(&err) {
      Some(source) => EvalError::Directive {
        path: path.to_path_buf(),
        source,
      },
      None => EvalError::Lua {
        path: path.to_path_buf(),
        source: err,
      },
    }
  }
}

/// Recover a [`DirectiveError`] raised by a directive global.
pub fn find_directive_error(err: &LuaError) -> Option<DirectiveError> {
  match err {
    LuaError::ExternalError(inner) => inner.downcast_ref::<DirectiveError>().cloned(),
    LuaError::CallbackError { cause, .. } => find_directive_error(cause),
    LuaError::WithContext { cause, .. } => find_directive_error(cause),
    _ => None,
  }
}

/// The Lua state a manifest's function hooks live in.
pub struct HookRuntime {
  lua: Lua,
}

impl std::fmt::Debug for HookRuntime {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("HookRuntime").finish_non_exhaustive()
  }
}

impl HookRuntime {
  /// Invoke a function hook callback recorded by this manifest.
  pub fn call(&self, callback: &CallbackRef) -> Result<(), String> {
    lua::call_callback(&self.lua, callback)
  }
}

/// A frozen package and the runtime of its callbacks.
#[derive(Debug)]
pub struct EvaluatedManifest {
  pub package: Package,
  pub path: PathBuf,
  pub hooks: HookRuntime,
}

impl EvaluatedManifest {
  pub fn call_hook(&self, callback: &CallbackRef) -> Result<(), String> {
    self.hooks.call(callback)
  }
}

/// Evaluate the Lua manifest at `path`.
pub fn evaluate_manifest(path: &Path) -> Result<EvaluatedManifest, EvalError> {
  let source = std::fs::read_to_string(path).map_err(|source| EvalError::Read {
    path: path.to_path_buf(),
    source,
  })?;
  evaluate_source(&source, path)
}

/// Evaluate manifest source held in memory, as if read from `path`.
pub fn evaluate_source(source: &str, path: &Path) -> Result<EvaluatedManifest, EvalError> {
  let dir = path.parent().unwrap_or(Path::new("."));
  let slot: BuilderSlot = Rc::new(RefCell::new(Some(PackageBuilder::new())));

  let lua = lua::create_runtime(slot.clone(), dir).map_err(|e| EvalError::from_lua(path, e))?;
  debug!(path = %path.display(), "evaluating manifest");
  lua::exec_chunk(&lua, source, path).map_err(|e| EvalError::from_lua(path, e))?;

  let package = freeze(path, &slot)?;
  info!(package = %package.name, entries = package.entry_count(), "evaluated manifest");
  Ok(EvaluatedManifest {
    package,
    path: path.to_path_buf(),
    hooks: HookRuntime { lua },
  })
}

/// Empty the builder slot and finish the package.
fn freeze(path: &Path, slot: &BuilderSlot) -> Result<Package, EvalError> {
  let builder = slot.borrow_mut().take().unwrap_or_default();
  builder.finish().map_err(|source| EvalError::Build {
    path: path.to_path_buf(),
    source,
  })
}
