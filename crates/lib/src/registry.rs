//! Global package registry.
//!
//! Frozen packages are registered by name in load order. The registration
//! index is what breaks ties in the topological order.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::package::Package;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
  #[error("package '{name}' is already defined")]
  Redefinition { name: String },
}

#[derive(Debug, Default)]
pub struct Registry {
  packages: Vec<Package>,
  /// Directory each package was loaded from, when known.
  roots: Vec<Option<PathBuf>>,
  index: HashMap<String, usize>,
}

impl Registry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a package, returning its registration index.
  pub fn register(&mut self, package: Package) -> Result<usize, RegistryError> {
    self.insert(package, None)
  }

  /// Register a package loaded from `root`.
  pub fn register_at(&mut self, package: Package, root: PathBuf) -> Result<usize, RegistryError> {
    self.insert(package, Some(root))
  }

  fn insert(&mut self, package: Package, root: Option<PathBuf>) -> Result<usize, RegistryError> {
    if self.index.contains_key(&package.name) {
      return Err(RegistryError::Redefinition { name: package.name });
    }

    let position = self.packages.len();
    debug!(package = %package.name, index = position, "registered package");
    self.index.insert(package.name.clone(), position);
    self.packages.push(package);
    self.roots.push(root);
    Ok(position)
  }

  pub fn get(&self, name: &str) -> Option<&Package> {
    self.index.get(name).map(|&i| &self.packages[i])
  }

  pub fn root(&self, name: &str) -> Option<&Path> {
    self.index.get(name).and_then(|&i| self.roots[i].as_deref())
  }

  pub fn position(&self, name: &str) -> Option<usize> {
    self.index.get(name).copied()
  }

  pub fn contains(&self, name: &str) -> bool {
    self.index.contains_key(name)
  }

  /// Packages in registration order.
  pub fn packages(&self) -> &[Package] {
    &self.packages
  }

  pub fn len(&self) -> usize {
    self.packages.len()
  }

  pub fn is_empty(&self) -> bool {
    self.packages.is_empty()
  }
}
