use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// A temporary dotfiles directory holding one subdirectory per package.
pub struct Dotfiles {
  pub temp: TempDir,
}

impl Dotfiles {
  pub fn new() -> Self {
    Self {
      temp: TempDir::new().unwrap(),
    }
  }

  pub fn root(&self) -> &Path {
    self.temp.path()
  }

  /// Write a file below the dotfiles root, creating parents.
  pub fn write(&self, relative: &str, content: &str) -> PathBuf {
    let path = self.temp.path().join(relative);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
  }

  /// Write `<name>/<manifest>` and return the package directory.
  pub fn package(&self, name: &str, manifest: &str, content: &str) -> PathBuf {
    self.write(&format!("{}/{}", name, manifest), content);
    self.temp.path().join(name)
  }
}
