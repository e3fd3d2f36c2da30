//! Canonical package records.
//!
//! These are the normalized shapes every directive call and every declarative
//! package file is reduced to. Optional policy fields stay `Option` here; the
//! effective values are computed by [`crate::policy`] when a plan is built.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::template::Engine;
use crate::value::Value;

/// Symbolic link vs. content copy materialization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkType {
  #[default]
  Link,
  Copy,
}

impl LinkType {
  pub fn as_str(&self) -> &'static str {
    match self {
      LinkType::Link => "link",
      LinkType::Copy => "copy",
    }
  }
}

impl fmt::Display for LinkType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for LinkType {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "link" => Ok(LinkType::Link),
      "copy" => Ok(LinkType::Copy),
      other => Err(format!("unknown link type '{}' (expected 'link' or 'copy')", other)),
    }
  }
}

/// Overwrite flags for an existing destination. `None` defers to the next layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaceOverride {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub files: Option<bool>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub dirs: Option<bool>,
}

impl ReplaceOverride {
  pub fn is_empty(&self) -> bool {
    self.files.is_none() && self.dirs.is_none()
  }
}

/// A single file linked or copied into place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
  pub src: PathBuf,
  pub dest: PathBuf,
  pub link_type: Option<LinkType>,
  pub optional: bool,
  #[serde(default, skip_serializing_if = "ReplaceOverride::is_empty")]
  pub replace: ReplaceOverride,
}

impl FileEntry {
  /// Destination used when none is given: the final component of `src`.
  pub fn default_dest(src: &Path) -> Option<PathBuf> {
    src.file_name().map(PathBuf::from)
  }
}

/// A directory subtree deployed as a unit.
///
/// An empty `include_globs` means everything under `src`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEntry {
  pub src: PathBuf,
  pub dest: PathBuf,
  pub link_type: Option<LinkType>,
  pub include_globs: Vec<String>,
  pub ignore_globs: Vec<String>,
  pub optional: bool,
  #[serde(default, skip_serializing_if = "ReplaceOverride::is_empty")]
  pub replace: ReplaceOverride,
}

/// A template rendered into `dest`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateEntry {
  pub src: PathBuf,
  pub dest: PathBuf,
  pub engine: Engine,
  pub vars: Value,
  /// Partial name to partial source path. Always empty for non-Handlebars engines.
  pub partials: BTreeMap<String, PathBuf>,
  pub optional: bool,
  #[serde(default, skip_serializing_if = "ReplaceOverride::is_empty")]
  pub replace: ReplaceOverride,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
  Yaml,
  Toml,
  Json,
}

impl DataFormat {
  pub fn as_str(&self) -> &'static str {
    match self {
      DataFormat::Yaml => "yaml",
      DataFormat::Toml => "toml",
      DataFormat::Json => "json",
    }
  }

  /// JSON has no comment syntax, so headers are dropped for it.
  pub fn supports_header(&self) -> bool {
    !matches!(self, DataFormat::Json)
  }
}

/// Serialized values written to a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredData {
  pub format: DataFormat,
  pub values: Value,
  pub header: Option<String>,
}

/// What a generated file contains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum GeneratedContent {
  Empty,
  Text { contents: String },
  Data(StructuredData),
}

/// A file whose contents come from the manifest rather than from a source path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedEntry {
  pub dest: PathBuf,
  pub content: GeneratedContent,
}

/// Directory creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MkdirEntry {
  pub dest: PathBuf,
  pub parents: bool,
}

/// Exit codes a command hook may return without failing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExitTolerance {
  /// Only these codes succeed. Always contains `0`.
  Codes(BTreeSet<i32>),
  /// Any exit code succeeds.
  Any,
}

impl Default for ExitTolerance {
  fn default() -> Self {
    ExitTolerance::Codes(BTreeSet::from([0]))
  }
}

impl ExitTolerance {
  /// Tolerate `0` plus every code in `extra`.
  pub fn with_codes(extra: impl IntoIterator<Item = i32>) -> Self {
    let mut codes = BTreeSet::from([0]);
    codes.extend(extra);
    ExitTolerance::Codes(codes)
  }

  pub fn tolerates(&self, code: i32) -> bool {
    match self {
      ExitTolerance::Codes(codes) => codes.contains(&code),
      ExitTolerance::Any => true,
    }
  }
}

/// What happens when a function hook raises.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorExitPolicy {
  /// The failure halts the remaining deployment.
  #[default]
  Abort,
  /// The failure is logged and the hook counts as successful.
  Continue,
}

impl FromStr for ErrorExitPolicy {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "abort" | "error" => Ok(ErrorExitPolicy::Abort),
      "continue" | "warn" | "ignore" => Ok(ErrorExitPolicy::Continue),
      other => Err(format!(
        "unknown error exit policy '{}' (expected 'abort' or 'continue')",
        other
      )),
    }
  }
}

/// Opaque handle to a host callback (for Lua, a registry key).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallbackRef(pub String);

impl fmt::Display for CallbackRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandHook {
  pub command: String,
  pub start: Option<PathBuf>,
  pub shell: Option<String>,
  /// Suppress the hook's console output.
  pub quiet: bool,
  pub stdout: Option<PathBuf>,
  pub stderr: Option<PathBuf>,
  pub clean_env: bool,
  pub env: BTreeMap<String, String>,
  pub tolerated_exit: ExitTolerance,
}

impl CommandHook {
  pub fn new(command: impl Into<String>) -> Self {
    Self {
      command: command.into(),
      start: None,
      shell: None,
      quiet: false,
      stdout: None,
      stderr: None,
      clean_env: false,
      env: BTreeMap::new(),
      tolerated_exit: ExitTolerance::default(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionHook {
  pub callback: CallbackRef,
  pub start: Option<PathBuf>,
  pub error_exit: ErrorExitPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Hook {
  Command(CommandHook),
  Function(FunctionHook),
}

impl Hook {
  /// Short label used in logs and plan output.
  pub fn describe(&self) -> String {
    match self {
      Hook::Command(cmd) => format!("cmd: {}", cmd.command),
      Hook::Function(fun) => format!("fn: {}", fun.callback),
    }
  }
}

/// When a hook runs relative to the package's filesystem entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookPhase {
  Before,
  After,
}

impl HookPhase {
  pub fn as_str(&self) -> &'static str {
    match self {
      HookPhase::Before => "before",
      HookPhase::After => "after",
    }
  }
}

impl fmt::Display for HookPhase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for HookPhase {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "before" | "pre" => Ok(HookPhase::Before),
      "after" | "post" => Ok(HookPhase::After),
      other => Err(format!("unknown hook phase '{}' (expected 'before' or 'after')", other)),
    }
  }
}

/// One frozen package: the product of evaluating exactly one manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
  pub name: String,
  pub dependencies: Vec<String>,
  /// Package layer of link-type resolution. `None` defers to the global default.
  pub default_link_type: Option<LinkType>,
  pub ignore_patterns: Vec<String>,
  pub replace: ReplaceOverride,
  pub files: Vec<FileEntry>,
  pub trees: Vec<TreeEntry>,
  pub templates: Vec<TemplateEntry>,
  pub generated: Vec<GeneratedEntry>,
  pub directories: Vec<MkdirEntry>,
  pub before_hooks: Vec<Hook>,
  pub after_hooks: Vec<Hook>,
}

impl Package {
  /// Count of filesystem entries, hooks excluded.
  pub fn entry_count(&self) -> usize {
    self.files.len() + self.trees.len() + self.templates.len() + self.generated.len() + self.directories.len()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn link_type_parses_case_insensitively() {
    assert_eq!("Link".parse::<LinkType>().unwrap(), LinkType::Link);
    assert_eq!("COPY".parse::<LinkType>().unwrap(), LinkType::Copy);
    assert!("hardlink".parse::<LinkType>().is_err());
  }

  #[test]
  fn link_type_defaults_to_link() {
    assert_eq!(LinkType::default(), LinkType::Link);
  }

  #[test]
  fn exit_tolerance_always_includes_zero() {
    let tolerance = ExitTolerance::with_codes([1, 2]);
    assert!(tolerance.tolerates(0));
    assert!(tolerance.tolerates(2));
    assert!(!tolerance.tolerates(3));
    assert!(ExitTolerance::Any.tolerates(127));
    assert!(!ExitTolerance::default().tolerates(1));
  }

  #[test]
  fn error_exit_policy_synonyms() {
    assert_eq!("error".parse::<ErrorExitPolicy>().unwrap(), ErrorExitPolicy::Abort);
    assert_eq!("warn".parse::<ErrorExitPolicy>().unwrap(), ErrorExitPolicy::Continue);
    assert_eq!(ErrorExitPolicy::default(), ErrorExitPolicy::Abort);
  }

  #[test]
  fn hook_phase_synonyms() {
    assert_eq!("pre".parse::<HookPhase>().unwrap(), HookPhase::Before);
    assert_eq!("After".parse::<HookPhase>().unwrap(), HookPhase::After);
  }

  #[test]
  fn file_dest_defaults_to_basename() {
    assert_eq!(FileEntry::default_dest(Path::new("a/b.txt")), Some(PathBuf::from("b.txt")));
    assert_eq!(FileEntry::default_dest(Path::new("..")), None);
  }

  #[test]
  fn generated_content_is_tagged() {
    let json = serde_json::to_string(&GeneratedContent::Text {
      contents: "hi".to_string(),
    })
    .unwrap();
    assert_eq!(json, r#"{"kind":"text","contents":"hi"}"#);
  }
}
