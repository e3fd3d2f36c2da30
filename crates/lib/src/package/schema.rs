//! Declarative package files.
//!
//! A package may be written as data instead of Lua: `package.toml`,
//! `package.yaml` or `package.json`. Every optional field has a published
//! default, and [`PackageConfig::into_package`] produces the same frozen
//! [`Package`] the directive path does.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use super::builder::{BuildError, PackageBuilder};
use super::types::*;
use crate::hooks::parse_exit_tolerance;
use crate::template::{Engine, EngineSelectionError};
use crate::value::Value;

#[derive(Debug, Error)]
pub enum SchemaError {
  #[error("cannot read '{}': {source}", .path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("unsupported package file '{}' (expected .toml, .yaml, .yml or .json)", .0.display())]
  UnsupportedFormat(PathBuf),

  #[error("invalid {format} in '{}': {message}", .path.display())]
  Parse {
    path: PathBuf,
    format: &'static str,
    message: String,
  },

  #[error("field '{field}': {message}")]
  InvalidValue { field: String, message: String },

  #[error(transparent)]
  EngineSelection(#[from] EngineSelectionError),

  #[error(transparent)]
  Build(#[from] BuildError),
}

/// Top-level declarative package record.
#[derive(Debug, Clone, Deserialize)]
pub struct PackageConfig {
  pub name: String,
  #[serde(default)]
  pub dependencies: Vec<String>,
  #[serde(default, rename = "link_type")]
  pub default_link_type: Option<LinkType>,
  #[serde(default)]
  pub ignore_patterns: Vec<String>,
  #[serde(default)]
  pub files: Vec<FileConfig>,
  #[serde(default, alias = "template_files")]
  pub templates: Vec<TemplateConfig>,
  /// Explicit trees. When absent, `tree_path` or the conventional directory is used.
  #[serde(default)]
  pub trees: Option<Vec<TreeConfig>>,
  #[serde(default)]
  pub tree_path: Option<PathBuf>,
  #[serde(default)]
  pub before_link: Vec<HookConfig>,
  #[serde(default)]
  pub after_link: Vec<HookConfig>,
  #[serde(default)]
  pub replace_files: Option<bool>,
  #[serde(default, alias = "replace_directories")]
  pub replace_dirs: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileConfig {
  pub src: PathBuf,
  #[serde(default)]
  pub dest: Option<PathBuf>,
  #[serde(default)]
  pub link_type: Option<LinkType>,
  #[serde(default)]
  pub optional: bool,
  #[serde(default)]
  pub replace_files: Option<bool>,
  #[serde(default, alias = "replace_directories")]
  pub replace_dirs: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TreeConfig {
  pub path: PathBuf,
  /// Where the tree root lands. Defaults to the destination root.
  #[serde(default)]
  pub dest: Option<PathBuf>,
  #[serde(default)]
  pub link_type: Option<LinkType>,
  #[serde(default)]
  pub globs: Vec<String>,
  #[serde(default)]
  pub ignore_patterns: Vec<String>,
  #[serde(default)]
  pub optional: bool,
  #[serde(default)]
  pub replace_files: Option<bool>,
  #[serde(default, alias = "replace_directories")]
  pub replace_dirs: Option<bool>,
}

impl TreeConfig {
  fn conventional(path: PathBuf) -> Self {
    Self {
      path,
      dest: None,
      link_type: None,
      globs: Vec::new(),
      ignore_patterns: Vec::new(),
      optional: true,
      replace_files: None,
      replace_dirs: None,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TemplateConfig {
  pub src: PathBuf,
  pub dest: PathBuf,
  #[serde(default = "TemplateConfig::default_engine")]
  pub engine: String,
  #[serde(default = "Value::empty_table")]
  pub vars: Value,
  #[serde(default)]
  pub partials: BTreeMap<String, PathBuf>,
  #[serde(default)]
  pub optional: bool,
  #[serde(default)]
  pub replace_files: Option<bool>,
  #[serde(default, alias = "replace_directories")]
  pub replace_dirs: Option<bool>,
}

impl TemplateConfig {
  fn default_engine() -> String {
    "hbs".to_string()
  }
}

/// A declarative hook is always a shell command: a bare string or a table.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum HookConfig {
  Command(String),
  Detailed(CommandConfig),
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandConfig {
  #[serde(alias = "string")]
  pub command: String,
  /// Label for logs only.
  #[serde(default)]
  pub name: Option<String>,
  #[serde(default)]
  pub start: Option<PathBuf>,
  #[serde(default)]
  pub shell: Option<String>,
  #[serde(default)]
  pub quiet: bool,
  #[serde(default)]
  pub stdout: Option<PathBuf>,
  #[serde(default)]
  pub stderr: Option<PathBuf>,
  #[serde(default)]
  pub clean_env: bool,
  #[serde(default)]
  pub env: BTreeMap<String, String>,
  #[serde(default)]
  pub nonzero_exit: Option<Value>,
}

impl HookConfig {
  fn into_hook(self) -> Result<CommandHook, SchemaError> {
    let config = match self {
      HookConfig::Command(command) => return Ok(CommandHook::new(command)),
      HookConfig::Detailed(config) => config,
    };

    if let Some(name) = &config.name {
      debug!(hook = %name, command = %config.command, "declared hook");
    }

    let tolerated_exit = match &config.nonzero_exit {
      Some(value) => parse_exit_tolerance(value).map_err(|message| SchemaError::InvalidValue {
        field: "nonzero_exit".to_string(),
        message,
      })?,
      None => ExitTolerance::default(),
    };

    Ok(CommandHook {
      command: config.command,
      start: config.start,
      shell: config.shell,
      quiet: config.quiet,
      stdout: config.stdout,
      stderr: config.stderr,
      clean_env: config.clean_env,
      env: config.env,
      tolerated_exit,
    })
  }
}

fn check_globs(field: &str, patterns: &[String]) -> Result<(), SchemaError> {
  for pattern in patterns {
    glob::Pattern::new(pattern).map_err(|e| SchemaError::InvalidValue {
      field: field.to_string(),
      message: format!("bad glob '{}': {}", pattern, e),
    })?;
  }
  Ok(())
}

fn replace_override(files: Option<bool>, dirs: Option<bool>) -> ReplaceOverride {
  ReplaceOverride { files, dirs }
}

impl PackageConfig {
  /// Read a declarative package file, choosing the format by extension.
  pub fn from_path(path: &Path) -> Result<Self, SchemaError> {
    let format = match path.extension().and_then(|e| e.to_str()) {
      Some("toml") => "toml",
      Some("yaml") | Some("yml") => "yaml",
      Some("json") => "json",
      _ => return Err(SchemaError::UnsupportedFormat(path.to_path_buf())),
    };

    let content = std::fs::read_to_string(path).map_err(|source| SchemaError::Io {
      path: path.to_path_buf(),
      source,
    })?;

    Self::parse(&content, format).map_err(|message| SchemaError::Parse {
      path: path.to_path_buf(),
      format,
      message,
    })
  }

  /// Parse declarative content. `format` is `toml`, `yaml` or `json`.
  pub fn parse(content: &str, format: &str) -> Result<Self, String> {
    match format {
      "toml" => toml::from_str(content).map_err(|e| e.to_string()),
      "yaml" => serde_yaml::from_str(content).map_err(|e| e.to_string()),
      "json" => serde_json::from_str(content).map_err(|e| e.to_string()),
      other => Err(format!("unknown format '{}'", other)),
    }
  }

  /// Convert into a frozen package. `tree_dir` is the conventional tree directory.
  pub fn into_package(self, tree_dir: &Path) -> Result<Package, SchemaError> {
    check_globs("ignore_patterns", &self.ignore_patterns)?;

    let mut builder = PackageBuilder::new();
    builder
      .record_name(self.name)
      .record_ignore(self.ignore_patterns)
      .record_replace(replace_override(self.replace_files, self.replace_dirs));
    if let Some(link_type) = self.default_link_type {
      builder.record_link_type(link_type);
    }
    for dependency in self.dependencies {
      builder.record_dependency(dependency);
    }

    for hook in self.before_link {
      builder.record_command_hook(HookPhase::Before, hook.into_hook()?);
    }

    for file in self.files {
      let dest = match file.dest {
        Some(dest) => dest,
        None => FileEntry::default_dest(&file.src).ok_or_else(|| SchemaError::InvalidValue {
          field: "files.dest".to_string(),
          message: format!("cannot derive a destination from '{}'", file.src.display()),
        })?,
      };
      builder.record_file(FileEntry {
        src: file.src,
        dest,
        link_type: file.link_type,
        optional: file.optional,
        replace: replace_override(file.replace_files, file.replace_dirs),
      });
    }

    let trees = match (self.trees, self.tree_path) {
      (Some(trees), _) => trees,
      (None, Some(path)) => vec![TreeConfig::conventional(path)],
      (None, None) => vec![TreeConfig::conventional(tree_dir.to_path_buf())],
    };
    for tree in trees {
      check_globs("trees.globs", &tree.globs)?;
      check_globs("trees.ignore_patterns", &tree.ignore_patterns)?;
      builder.record_tree(TreeEntry {
        dest: tree.dest.unwrap_or_else(|| PathBuf::from(".")),
        src: tree.path,
        link_type: tree.link_type,
        include_globs: tree.globs,
        ignore_globs: tree.ignore_patterns,
        optional: tree.optional,
        replace: replace_override(tree.replace_files, tree.replace_dirs),
      });
    }

    for template in self.templates {
      let engine = Engine::from_token(&template.engine)?;
      if !engine.supports_partials() && !template.partials.is_empty() {
        return Err(SchemaError::InvalidValue {
          field: "templates.partials".to_string(),
          message: format!("{} templates do not support partials", engine),
        });
      }
      builder.record_template(TemplateEntry {
        src: template.src,
        dest: template.dest,
        engine,
        vars: template.vars,
        partials: template.partials,
        optional: template.optional,
        replace: replace_override(template.replace_files, template.replace_dirs),
      });
    }

    for hook in self.after_link {
      builder.record_command_hook(HookPhase::After, hook.into_hook()?);
    }

    Ok(builder.finish()?)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn package_from(content: &str, format: &str) -> Package {
    PackageConfig::parse(content, format)
      .unwrap()
      .into_package(Path::new("tree"))
      .unwrap()
  }

  mod defaults {
    use super::*;

    #[test]
    fn minimal_toml_gets_published_defaults() {
      let package = package_from(r#"name = "zsh""#, "toml");
      assert_eq!(package.name, "zsh");
      assert!(package.dependencies.is_empty());
      assert_eq!(package.default_link_type, None);
      assert!(package.ignore_patterns.is_empty());
      assert_eq!(package.trees.len(), 1);
      assert_eq!(package.trees[0].src, PathBuf::from("tree"));
      assert_eq!(package.trees[0].dest, PathBuf::from("."));
      assert!(package.trees[0].optional);
    }

    #[test]
    fn tree_path_overrides_conventional_tree() {
      let package = package_from("name: vim\ntree_path: dotfiles\n", "yaml");
      assert_eq!(package.trees.len(), 1);
      assert_eq!(package.trees[0].src, PathBuf::from("dotfiles"));
    }

    #[test]
    fn explicit_empty_trees_means_none() {
      let package = package_from(r#"{"name": "git", "trees": []}"#, "json");
      assert!(package.trees.is_empty());
    }
  }

  mod entries {
    use super::*;

    #[test]
    fn full_toml_package() {
      let package = package_from(
        r#"
name = "nvim"
dependencies = ["fonts"]
link_type = "copy"
ignore_patterns = ["*.swp"]
replace_dirs = true
before_link = ["echo pre"]

[[files]]
src = "init.lua"
dest = ".config/nvim/init.lua"
link_type = "link"

[[templates]]
src = "gitconfig.hbs"
dest = ".gitconfig"
engine = "handlebars"
vars = { user = "me" }

[[after_link]]
name = "sync"
command = "nvim --headless +PackerSync +qa"
nonzero_exit = [1]
"#,
        "toml",
      );

      assert_eq!(package.dependencies, vec!["fonts"]);
      assert_eq!(package.default_link_type, Some(LinkType::Copy));
      assert_eq!(package.replace.dirs, Some(true));
      assert_eq!(package.files[0].link_type, Some(LinkType::Link));
      assert_eq!(package.templates[0].engine, Engine::Handlebars);
      assert_eq!(package.before_hooks, vec![Hook::Command(CommandHook::new("echo pre"))]);
      match &package.after_hooks[0] {
        Hook::Command(cmd) => assert!(cmd.tolerated_exit.tolerates(1)),
        other => panic!("unexpected hook {:?}", other),
      }
    }

    #[test]
    fn file_dest_defaults_to_basename() {
      let package = package_from("name: a\nfiles:\n  - src: conf/app.ini\n", "yaml");
      assert_eq!(package.files[0].dest, PathBuf::from("app.ini"));
    }

    #[test]
    fn unknown_engine_is_rejected() {
      let config = PackageConfig::parse(
        r#"{"name": "a", "templates": [{"src": "t", "dest": "d", "engine": "jinja"}]}"#,
        "json",
      )
      .unwrap();
      let err = config.into_package(Path::new("tree")).unwrap_err();
      assert!(matches!(err, SchemaError::EngineSelection(_)));
    }

    #[test]
    fn liquid_partials_are_rejected() {
      let config = PackageConfig::parse(
        "name: a\ntemplates:\n  - src: t\n    dest: d\n    engine: liquid\n    partials:\n      p: p.liquid\n",
        "yaml",
      )
      .unwrap();
      assert!(matches!(
        config.into_package(Path::new("tree")),
        Err(SchemaError::InvalidValue { .. })
      ));
    }
  }

  #[test]
  fn bad_ignore_glob_is_rejected() {
    let config = PackageConfig::parse("name = \"a\"\nignore_patterns = [\"[\"]\n", "toml").unwrap();
    assert!(matches!(
      config.into_package(Path::new("tree")),
      Err(SchemaError::InvalidValue { .. })
    ));
  }

  #[test]
  fn unsupported_extension() {
    let err = PackageConfig::from_path(Path::new("package.ini")).unwrap_err();
    assert!(matches!(err, SchemaError::UnsupportedFormat(_)));
  }
}
