//! Engine-wide settings.
//!
//! Settings are read from a TOML file; every field is optional and falls back
//! to the documented default.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::package::LinkType;

/// What happens when two entries target the same destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
  /// Any shared destination is an error.
  #[default]
  Fatal,
  /// The later entry replaces the earlier one when both allow replacing files.
  LaterWins,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
  /// Global layer of link-type resolution.
  pub default_link_type: LinkType,
  pub conflict_policy: ConflictPolicy,
  /// Shell for command hooks that do not name one.
  pub default_shell: String,
  /// Conventional tree directory of declarative packages.
  pub tree_dir: PathBuf,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      default_link_type: LinkType::Link,
      conflict_policy: ConflictPolicy::Fatal,
      default_shell: "sh".to_string(),
      tree_dir: PathBuf::from("tree"),
    }
  }
}

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("cannot read settings '{}': {source}", .path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid settings '{}': {source}", .path.display())]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },
}

impl Settings {
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }
}
