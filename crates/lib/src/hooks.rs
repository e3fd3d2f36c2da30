//! Hook sequencing and exit policies.
//!
//! A package's hooks run in two phases around its filesystem entries:
//! every `before` hook in declared order, then the entries, then every
//! `after` hook in declared order. [`HookSequence`] is that ordered, typed
//! view. The `check_*` functions turn what a backend observed (an exit code,
//! a callback error) into success or a [`HookFailure`] according to the
//! hook's tolerance or error-exit policy.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::package::{CommandHook, ErrorExitPolicy, ExitTolerance, FunctionHook, Hook, HookPhase, Package};
use crate::value::Value;

/// A hook did not succeed under its policy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HookFailure {
  #[error("[{package}] command '{command}' exited with {}", describe_code(.code))]
  Command {
    package: String,
    command: String,
    code: Option<i32>,
  },

  #[error("[{package}] function hook '{callback}' failed: {message}")]
  Function {
    package: String,
    callback: String,
    message: String,
  },
}

fn describe_code(code: &Option<i32>) -> String {
  match code {
    Some(code) => format!("status {}", code),
    None => "no status (terminated by signal)".to_string(),
  }
}

/// Parse a `nonzero_exit` value.
///
/// Accepts an integer or a list of integers (tolerated in addition to `0`),
/// `"error"` (only `0`), or `"ignore"` (any code).
pub fn parse_exit_tolerance(value: &Value) -> Result<ExitTolerance, String> {
  match value {
    Value::String(s) => match s.to_ascii_lowercase().as_str() {
      "error" => Ok(ExitTolerance::default()),
      "ignore" | "any" => Ok(ExitTolerance::Any),
      other => Err(format!("unknown exit policy '{}' (expected 'error', 'ignore' or exit codes)", other)),
    },
    Value::Array(items) => {
      let mut codes = Vec::with_capacity(items.len());
      for item in items {
        codes.push(exit_code(item)?);
      }
      Ok(ExitTolerance::with_codes(codes))
    }
    other => Ok(ExitTolerance::with_codes([exit_code(other)?])),
  }
}

fn exit_code(value: &Value) -> Result<i32, String> {
  value
    .as_integer()
    .and_then(|i| i32::try_from(i).ok())
    .ok_or_else(|| format!("expected an exit code, found {}", value.type_name()))
}

/// Judge a finished command hook. `code` is `None` when the process died without a status.
pub fn check_command_exit(package: &str, hook: &CommandHook, code: Option<i32>) -> Result<(), HookFailure> {
  match code {
    Some(code) if hook.tolerated_exit.tolerates(code) => Ok(()),
    _ => Err(HookFailure::Command {
      package: package.to_string(),
      command: hook.command.clone(),
      code,
    }),
  }
}

/// Judge a finished function hook.
///
/// Under [`ErrorExitPolicy::Continue`] a failure is logged and treated as success.
pub fn check_function_result(package: &str, hook: &FunctionHook, result: Result<(), String>) -> Result<(), HookFailure> {
  let Err(message) = result else {
    return Ok(());
  };

  match hook.error_exit {
    ErrorExitPolicy::Abort => Err(HookFailure::Function {
      package: package.to_string(),
      callback: hook.callback.to_string(),
      message,
    }),
    ErrorExitPolicy::Continue => {
      warn!(package = %package, callback = %hook.callback, error = %message, "function hook failed, continuing");
      Ok(())
    }
  }
}

/// One step of a package's deployment, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step<'a> {
  Hook { phase: HookPhase, index: usize, hook: &'a Hook },
  /// Materialize every filesystem entry of the package. Entries are unordered among themselves.
  Materialize,
}

/// A package's hooks split by phase, each in declared order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HookSequence {
  pub before: Vec<Hook>,
  pub after: Vec<Hook>,
}

impl HookSequence {
  /// Copy a package's hooks, giving command hooks without a shell `default_shell`.
  pub fn from_package(package: &Package, default_shell: &str) -> Self {
    let resolve = |hooks: &[Hook]| -> Vec<Hook> {
      hooks
        .iter()
        .cloned()
        .map(|hook| match hook {
          Hook::Command(mut cmd) => {
            cmd.shell.get_or_insert_with(|| default_shell.to_string());
            Hook::Command(cmd)
          }
          other => other,
        })
        .collect()
    };

    Self {
      before: resolve(&package.before_hooks),
      after: resolve(&package.after_hooks),
    }
  }

  pub fn phase(&self, phase: HookPhase) -> &[Hook] {
    match phase {
      HookPhase::Before => &self.before,
      HookPhase::After => &self.after,
    }
  }

  pub fn is_empty(&self) -> bool {
    self.before.is_empty() && self.after.is_empty()
  }

  /// Before hooks, the materialization step, then after hooks.
  pub fn steps(&self) -> Vec<Step<'_>> {
    let before = self.before.iter().enumerate().map(|(index, hook)| Step::Hook {
      phase: HookPhase::Before,
      index,
      hook,
    });
    let after = self.after.iter().enumerate().map(|(index, hook)| Step::Hook {
      phase: HookPhase::After,
      index,
      hook,
    });

    before.chain(std::iter::once(Step::Materialize)).chain(after).collect()
  }
}
