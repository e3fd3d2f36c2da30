//! Shared test helpers for CLI integration tests.

use std::path::PathBuf;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Path to a fixture file or directory.
pub fn fixture_path(name: &str) -> PathBuf {
  PathBuf::from(env!("CARGO_MANIFEST_DIR"))
    .join("tests")
    .join("fixtures")
    .join(name)
}

/// Package directories of the `dotfiles` fixture set.
pub fn dotfiles() -> Vec<PathBuf> {
  ["zsh", "git", "nvim"]
    .iter()
    .map(|name| fixture_path("dotfiles").join(name))
    .collect()
}

pub fn shelf_cmd() -> Command {
  cargo_bin_cmd!("shelf")
}

/// Isolated directory for packages written by a test.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  pub fn new() -> Self {
    Self {
      temp: TempDir::new().unwrap(),
    }
  }

  /// Write a file relative to the temp directory.
  pub fn write_file(&self, relative_path: &str, content: &str) -> PathBuf {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
  }

  /// Write `<name>/package.lua` and return the package directory.
  pub fn package(&self, name: &str, manifest: &str) -> PathBuf {
    self.write_file(&format!("{}/package.lua", name), manifest);
    self.temp.path().join(name)
  }
}
