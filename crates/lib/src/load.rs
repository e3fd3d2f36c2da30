//! Loading a set of packages.
//!
//! Manifests are evaluated one after another, each into its own package.
//! Every package is registered as soon as it is frozen; the dependency graph
//! is built only once the whole set is loaded, so forward references between
//! manifests resolve. Any manifest-time error aborts the load.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::config::Settings;
use crate::eval::{EvalError, HookRuntime, evaluate_manifest};
use crate::graph::{DependencyGraph, GraphError};
use crate::package::{CallbackRef, Package, PackageConfig, SchemaError};
use crate::plan::{DeploymentPlan, PlanError};
use crate::registry::{Registry, RegistryError};

/// File names looked up, in order, when a directory is given.
pub const MANIFEST_FILES: &[&str] = &[
  "package.lua",
  "package.toml",
  "package.yaml",
  "package.yml",
  "package.json",
];

#[derive(Debug, Error)]
pub enum LoadError {
  #[error("no package manifest in '{}' (looked for {})", .0.display(), MANIFEST_FILES.join(", "))]
  NotFound(PathBuf),

  #[error(transparent)]
  Eval(#[from] EvalError),

  #[error("{}: {source}", .path.display())]
  Schema {
    path: PathBuf,
    #[source]
    source: SchemaError,
  },

  #[error(transparent)]
  Registry(#[from] RegistryError),

  #[error(transparent)]
  Graph(#[from] GraphError),

  #[error(transparent)]
  Plan(#[from] PlanError),
}

/// Resolve `path` to a manifest file: a file is taken as is, a directory is
/// searched for [`MANIFEST_FILES`].
pub fn locate_manifest(path: &Path) -> Result<PathBuf, LoadError> {
  if path.is_file() {
    return Ok(path.to_path_buf());
  }
  if path.is_dir() {
    for name in MANIFEST_FILES {
      let candidate = path.join(name);
      if candidate.is_file() {
        return Ok(candidate);
      }
    }
  }
  Err(LoadError::NotFound(path.to_path_buf()))
}

fn is_lua(path: &Path) -> bool {
  path.extension().is_some_and(|ext| ext == "lua")
}

/// Sequential loader of manifests into one registry.
#[derive(Debug)]
pub struct Loader {
  settings: Settings,
  registry: Registry,
  hooks: HashMap<String, HookRuntime>,
}

impl Loader {
  pub fn new(settings: Settings) -> Self {
    Self {
      settings,
      registry: Registry::new(),
      hooks: HashMap::new(),
    }
  }

  /// Evaluate and register the package at `path` (a manifest or its directory).
  pub fn load(&mut self, path: &Path) -> Result<&Package, LoadError> {
    let manifest = locate_manifest(path)?;
    let root = manifest.parent().map(Path::to_path_buf).unwrap_or_default();
    debug!(manifest = %manifest.display(), "loading package");

    let (package, hooks) = if is_lua(&manifest) {
      let evaluated = evaluate_manifest(&manifest)?;
      (evaluated.package, Some(evaluated.hooks))
    } else {
      let config = PackageConfig::from_path(&manifest).map_err(|source| LoadError::Schema {
        path: manifest.clone(),
        source,
      })?;
      let package = config
        .into_package(&self.settings.tree_dir)
        .map_err(|source| LoadError::Schema {
          path: manifest.clone(),
          source,
        })?;
      (package, None)
    };

    let name = package.name.clone();
    let index = self.registry.register_at(package, root)?;
    if let Some(hooks) = hooks {
      self.hooks.insert(name, hooks);
    }
    Ok(&self.registry.packages()[index])
  }

  pub fn load_all<I, P>(&mut self, paths: I) -> Result<(), LoadError>
  where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
  {
    for path in paths {
      self.load(path.as_ref())?;
    }
    Ok(())
  }

  pub fn registry(&self) -> &Registry {
    &self.registry
  }

  /// Build the dependency graph over everything loaded.
  pub fn finish(self) -> Result<LoadedSet, LoadError> {
    let graph = DependencyGraph::build(&self.registry)?;
    info!(packages = self.registry.len(), edges = graph.edge_count(), "packages loaded");
    Ok(LoadedSet {
      settings: self.settings,
      registry: self.registry,
      graph,
      hooks: self.hooks,
    })
  }
}

/// A fully loaded, acyclic set of packages.
#[derive(Debug)]
pub struct LoadedSet {
  pub settings: Settings,
  pub registry: Registry,
  pub graph: DependencyGraph,
  hooks: HashMap<String, HookRuntime>,
}

impl LoadedSet {
  pub fn plan(&self) -> Result<DeploymentPlan, PlanError> {
    DeploymentPlan::build(&self.registry, &self.graph, &self.settings)
  }

  /// Invoke a function hook of `package`.
  pub fn call_hook(&self, package: &str, callback: &CallbackRef) -> Result<(), String> {
    match self.hooks.get(package) {
      Some(runtime) => runtime.call(callback),
      None => Err(format!("package '{}' has no function hooks", package)),
    }
  }
}

/// Load every path and build the graph.
pub fn load_packages<I, P>(paths: I, settings: Settings) -> Result<LoadedSet, LoadError>
where
  I: IntoIterator<Item = P>,
  P: AsRef<Path>,
{
  let mut loader = Loader::new(settings);
  loader.load_all(paths)?;
  loader.finish()
}
