//! Reference walk of a deployment plan over an abstract backend.
//!
//! The walk is the contract every execution backend follows:
//! - layers strictly in order, each layer finished before the next begins
//! - within a package: before hooks, then entries, then after hooks
//! - a missing source on an `optional` entry is skipped, otherwise fatal
//! - the first failure halts everything after it; completed work stays
//! - cancellation is honoured only between layers
//!
//! Packages within one layer are walked sequentially here. A backend that
//! wants parallelism may fan a layer out itself.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::hooks::{HookFailure, Step, check_command_exit, check_function_result};
use crate::package::{CommandHook, FunctionHook, Hook};
use crate::plan::{DeploymentPlan, PackagePlan, PlannedEntry};

/// A backend operation failed outright.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct BackendError(pub String);

/// The execution collaborator: filesystem effects and process spawning.
pub trait Backend {
  /// Whether `src` exists, relative to the package root when one is known.
  fn source_exists(&mut self, package: &PackagePlan, src: &Path) -> bool;

  fn materialize(&mut self, package: &PackagePlan, entry: &PlannedEntry) -> Result<(), BackendError>;

  /// Run a command hook, returning its exit code or `None` when killed by a signal.
  fn run_command(&mut self, package: &PackagePlan, hook: &CommandHook) -> Result<Option<i32>, BackendError>;

  /// Invoke a function hook. `Err` carries the callback's error message.
  fn call_function(&mut self, package: &PackagePlan, hook: &FunctionHook) -> Result<(), String>;
}

/// Cooperative cancellation flag, checked between layers.
#[derive(Debug, Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn cancel(&self) {
    self.0.store(true, Ordering::SeqCst);
  }

  pub fn is_cancelled(&self) -> bool {
    self.0.load(Ordering::SeqCst)
  }
}

#[derive(Debug, Error)]
pub enum DeployCause {
  #[error(transparent)]
  Hook(#[from] HookFailure),

  #[error("source '{}' does not exist", .0.display())]
  MissingSource(PathBuf),

  #[error("{kind} '{}' failed: {source}", .dest.display())]
  Entry {
    kind: &'static str,
    dest: PathBuf,
    #[source]
    source: BackendError,
  },

  #[error("hook '{hook}' could not run: {source}")]
  HookLaunch {
    hook: String,
    #[source]
    source: BackendError,
  },
}

/// Deployment halted. Packages in `completed` were fully deployed and are left in place.
#[derive(Debug, Error)]
#[error("deployment halted in package '{package}': {cause}")]
pub struct DeployError {
  pub package: String,
  pub completed: Vec<String>,
  #[source]
  pub cause: DeployCause,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployReport {
  /// Fully deployed packages, in deployment order.
  pub completed: Vec<String>,
  /// `(package, source)` of optional entries skipped for a missing source.
  pub skipped: Vec<(String, PathBuf)>,
  /// Set when the walk stopped at a layer boundary because of cancellation.
  pub cancelled: bool,
}

/// Walk `plan` against `backend`.
pub fn deploy(plan: &DeploymentPlan, backend: &mut dyn Backend, cancel: &Cancellation) -> Result<DeployReport, DeployError> {
  let mut report = DeployReport::default();

  for (index, layer) in plan.layers.iter().enumerate() {
    if cancel.is_cancelled() {
      info!(layer = index, "deployment cancelled before layer");
      report.cancelled = true;
      return Ok(report);
    }

    debug!(layer = index, packages = layer.len(), "deploying layer");
    for package in layer {
      if let Err(cause) = deploy_package(package, backend, &mut report) {
        return Err(DeployError {
          package: package.name.clone(),
          completed: report.completed,
          cause,
        });
      }
      report.completed.push(package.name.clone());
    }
  }

  info!(packages = report.completed.len(), skipped = report.skipped.len(), "deployment finished");
  Ok(report)
}

fn deploy_package(package: &PackagePlan, backend: &mut dyn Backend, report: &mut DeployReport) -> Result<(), DeployCause> {
  for step in package.hooks.steps() {
    match step {
      Step::Hook { phase, index, hook } => {
        debug!(package = %package.name, phase = %phase, index, hook = %hook.describe(), "running hook");
        run_hook(package, hook, backend)?;
      }
      Step::Materialize => {
        for entry in &package.entries {
          materialize(package, entry, backend, report)?;
        }
      }
    }
  }
  Ok(())
}

fn run_hook(package: &PackagePlan, hook: &Hook, backend: &mut dyn Backend) -> Result<(), DeployCause> {
  match hook {
    Hook::Command(cmd) => {
      let code = backend.run_command(package, cmd).map_err(|source| DeployCause::HookLaunch {
        hook: hook.describe(),
        source,
      })?;
      check_command_exit(&package.name, cmd, code)?;
    }
    Hook::Function(fun) => {
      let result = backend.call_function(package, fun);
      check_function_result(&package.name, fun, result)?;
    }
  }
  Ok(())
}

fn materialize(
  package: &PackagePlan,
  entry: &PlannedEntry,
  backend: &mut dyn Backend,
  report: &mut DeployReport,
) -> Result<(), DeployCause> {
  if let Some(src) = entry.source()
    && !backend.source_exists(package, src)
  {
    if entry.optional() {
      warn!(package = %package.name, src = %src.display(), "optional source missing, skipping");
      report.skipped.push((package.name.clone(), src.to_path_buf()));
      return Ok(());
    }
    return Err(DeployCause::MissingSource(src.to_path_buf()));
  }

  backend.materialize(package, entry).map_err(|source| DeployCause::Entry {
    kind: entry.kind(),
    dest: entry.dest().to_path_buf(),
    source,
  })
}

/// Backend that performs nothing and records each step it is asked to take.
///
/// Sources are checked on disk against the package root; without a root they
/// are assumed present. Function hooks are recorded, not invoked.
#[derive(Debug, Default)]
pub struct DryRunBackend {
  pub steps: Vec<String>,
}

impl DryRunBackend {
  pub fn new() -> Self {
    Self::default()
  }
}

impl Backend for DryRunBackend {
  fn source_exists(&mut self, package: &PackagePlan, src: &Path) -> bool {
    match &package.root {
      Some(root) => root.join(src).exists(),
      None => true,
    }
  }

  fn materialize(&mut self, package: &PackagePlan, entry: &PlannedEntry) -> Result<(), BackendError> {
    let line = match entry {
      PlannedEntry::File(f) => format!("{} {} -> {}", f.link_type, f.src.display(), f.dest.display()),
      PlannedEntry::Tree(t) => format!("tree {} {} -> {}", t.link_type, t.src.display(), t.dest.display()),
      PlannedEntry::Template(t) => format!("render {} {} -> {}", t.engine, t.src.display(), t.dest.display()),
      PlannedEntry::Generated(g) => format!("write {}", g.dest.display()),
      PlannedEntry::Mkdir(m) => format!("mkdir {}", m.dest.display()),
    };
    self.steps.push(format!("[{}] {}", package.name, line));
    Ok(())
  }

  fn run_command(&mut self, package: &PackagePlan, hook: &CommandHook) -> Result<Option<i32>, BackendError> {
    self.steps.push(format!("[{}] cmd {}", package.name, hook.command));
    Ok(Some(0))
  }

  fn call_function(&mut self, package: &PackagePlan, hook: &FunctionHook) -> Result<(), String> {
    self.steps.push(format!("[{}] fn {}", package.name, hook.callback));
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use std::collections::{HashMap, HashSet};

  use super::*;
  use crate::config::Settings;
  use crate::graph::DependencyGraph;
  use crate::package::{
    CallbackRef, ErrorExitPolicy, ExitTolerance, FileEntry, HookPhase, PackageBuilder, ReplaceOverride,
  };
  use crate::registry::Registry;

  /// Scripted backend: configurable exit codes, failing callbacks and missing sources.
  #[derive(Default)]
  struct ScriptedBackend {
    log: Vec<String>,
    exit_codes: HashMap<String, i32>,
    failing_callbacks: HashSet<String>,
    missing: HashSet<PathBuf>,
    cancel_after: Option<(String, Cancellation)>,
  }

  impl Backend for ScriptedBackend {
    fn source_exists(&mut self, _package: &PackagePlan, src: &Path) -> bool {
      !self.missing.contains(src)
    }

    fn materialize(&mut self, package: &PackagePlan, entry: &PlannedEntry) -> Result<(), BackendError> {
      self.log.push(format!("{}:entry:{}", package.name, entry.dest().display()));
      if let Some((name, cancel)) = &self.cancel_after
        && *name == package.name
      {
        cancel.cancel();
      }
      Ok(())
    }

    fn run_command(&mut self, package: &PackagePlan, hook: &CommandHook) -> Result<Option<i32>, BackendError> {
      self.log.push(format!("{}:cmd:{}", package.name, hook.command));
      Ok(Some(self.exit_codes.get(&hook.command).copied().unwrap_or(0)))
    }

    fn call_function(&mut self, package: &PackagePlan, hook: &FunctionHook) -> Result<(), String> {
      self.log.push(format!("{}:fn:{}", package.name, hook.callback));
      if self.failing_callbacks.contains(&hook.callback.0) {
        Err("callback raised".to_string())
      } else {
        Ok(())
      }
    }
  }

  fn file(src: &str, optional: bool) -> FileEntry {
    FileEntry {
      src: PathBuf::from(src),
      dest: PathBuf::from(format!("out/{}", src)),
      link_type: None,
      optional,
      replace: ReplaceOverride::default(),
    }
  }

  fn build_plan(builders: Vec<PackageBuilder>) -> DeploymentPlan {
    let mut registry = Registry::new();
    for builder in builders {
      registry.register(builder.finish().unwrap()).unwrap();
    }
    let graph = DependencyGraph::build(&registry).unwrap();
    DeploymentPlan::build(&registry, &graph, &Settings::default()).unwrap()
  }

  fn simple(name: &str, deps: &[&str], src: &str) -> PackageBuilder {
    let mut builder = PackageBuilder::new();
    builder.record_name(name);
    for dep in deps {
      builder.record_dependency(*dep);
    }
    builder
      .record_command_hook(HookPhase::Before, CommandHook::new(format!("pre-{}", name)))
      .record_file(file(src, false))
      .record_command_hook(HookPhase::After, CommandHook::new(format!("post-{}", name)));
    builder
  }

  mod ordering {
    use super::*;

    #[test]
    fn hooks_wrap_entries_and_dependencies_go_first() {
      let plan = build_plan(vec![simple("app", &["base"], "a"), simple("base", &[], "b")]);
      let mut backend = ScriptedBackend::default();
      let report = deploy(&plan, &mut backend, &Cancellation::new()).unwrap();

      assert_eq!(
        backend.log,
        vec![
          "base:cmd:pre-base",
          "base:entry:out/b",
          "base:cmd:post-base",
          "app:cmd:pre-app",
          "app:entry:out/a",
          "app:cmd:post-app",
        ]
      );
      assert_eq!(report.completed, vec!["base", "app"]);
      assert!(!report.cancelled);
    }
  }

  mod failures {
    use tracing_test::traced_test;

    use super::*;

    #[test]
    fn untolerated_exit_halts_and_keeps_completed_work() {
      let plan = build_plan(vec![simple("app", &["base"], "a"), simple("base", &[], "b")]);
      let mut backend = ScriptedBackend::default();
      backend.exit_codes.insert("post-app".to_string(), 3);

      let err = deploy(&plan, &mut backend, &Cancellation::new()).unwrap_err();
      assert_eq!(err.package, "app");
      assert_eq!(err.completed, vec!["base"]);
      assert!(matches!(err.cause, DeployCause::Hook(HookFailure::Command { code: Some(3), .. })));
      assert!(backend.log.contains(&"app:entry:out/a".to_string()));
    }

    #[test]
    fn tolerated_exit_code_passes() {
      let mut builder = PackageBuilder::new();
      let mut hook = CommandHook::new("grep -q x");
      hook.tolerated_exit = ExitTolerance::with_codes([1]);
      builder.record_name("a").record_command_hook(HookPhase::Before, hook);
      let plan = build_plan(vec![builder]);

      let mut backend = ScriptedBackend::default();
      backend.exit_codes.insert("grep -q x".to_string(), 1);
      assert!(deploy(&plan, &mut backend, &Cancellation::new()).is_ok());
    }

    #[test]
    fn function_hook_policies() {
      let hook = |key: &str, error_exit| FunctionHook {
        callback: CallbackRef(key.to_string()),
        start: None,
        error_exit,
      };
      let mut builder = PackageBuilder::new();
      builder
        .record_name("a")
        .record_function_hook(HookPhase::Before, hook("soft", ErrorExitPolicy::Continue))
        .record_function_hook(HookPhase::After, hook("hard", ErrorExitPolicy::Abort));
      let plan = build_plan(vec![builder]);

      let mut backend = ScriptedBackend::default();
      backend.failing_callbacks.insert("soft".to_string());
      assert!(deploy(&plan, &mut backend, &Cancellation::new()).is_ok());

      let mut backend = ScriptedBackend::default();
      backend.failing_callbacks.insert("hard".to_string());
      let err = deploy(&plan, &mut backend, &Cancellation::new()).unwrap_err();
      assert!(matches!(err.cause, DeployCause::Hook(HookFailure::Function { .. })));
    }

    #[test]
    #[traced_test]
    fn missing_optional_source_is_skipped() {
      let mut builder = PackageBuilder::new();
      builder
        .record_name("a")
        .record_file(file("maybe", true))
        .record_file(file("present", false));
      let plan = build_plan(vec![builder]);

      let mut backend = ScriptedBackend::default();
      backend.missing.insert(PathBuf::from("maybe"));
      let report = deploy(&plan, &mut backend, &Cancellation::new()).unwrap();
      assert_eq!(report.skipped, vec![("a".to_string(), PathBuf::from("maybe"))]);
      assert_eq!(backend.log, vec!["a:entry:out/present"]);
      assert!(logs_contain("optional source missing, skipping"));
    }

    #[test]
    fn missing_required_source_fails() {
      let mut builder = PackageBuilder::new();
      builder.record_name("a").record_file(file("gone", false));
      let plan = build_plan(vec![builder]);

      let mut backend = ScriptedBackend::default();
      backend.missing.insert(PathBuf::from("gone"));
      let err = deploy(&plan, &mut backend, &Cancellation::new()).unwrap_err();
      assert!(matches!(err.cause, DeployCause::MissingSource(_)));
    }
  }

  mod cancellation {
    use super::*;

    #[test]
    fn cancellation_stops_at_next_layer_boundary() {
      let plan = build_plan(vec![
        simple("base", &[], "b"),
        simple("side", &[], "s"),
        simple("app", &["base"], "a"),
      ]);
      let cancel = Cancellation::new();
      let mut backend = ScriptedBackend {
        cancel_after: Some(("base".to_string(), cancel.clone())),
        ..ScriptedBackend::default()
      };

      let report = deploy(&plan, &mut backend, &cancel).unwrap();
      // The first layer finishes even though cancellation arrived mid-layer.
      assert_eq!(report.completed, vec!["base", "side"]);
      assert!(report.cancelled);
    }
  }

  #[test]
  fn dry_run_records_steps() {
    let plan = build_plan(vec![simple("a", &[], "f")]);
    let mut backend = DryRunBackend::new();
    deploy(&plan, &mut backend, &Cancellation::new()).unwrap();
    assert_eq!(backend.steps, vec!["[a] cmd pre-a", "[a] link f -> out/f", "[a] cmd post-a"]);
  }
}
