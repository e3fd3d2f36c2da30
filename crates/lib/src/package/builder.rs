use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, trace};

use super::types::*;

/// Errors raised when freezing a package.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
  #[error("manifest did not declare a package name")]
  MissingName,

  #[error("package name declared twice: '{first}' then '{second}'")]
  NameRedeclared { first: String, second: String },
}

/// Accumulates normalized records for the package of one manifest.
///
/// Every `record_*` method takes an already validated record, so a directive
/// that fails normalization never reaches the builder. [`PackageBuilder::finish`]
/// consumes the builder and hands back the frozen [`Package`].
#[derive(Debug, Default)]
pub struct PackageBuilder {
  name: Option<String>,
  redeclared: Option<String>,
  dependencies: Vec<String>,
  default_link_type: Option<LinkType>,
  ignore_patterns: Vec<String>,
  replace: ReplaceOverride,
  files: Vec<FileEntry>,
  trees: Vec<TreeEntry>,
  templates: Vec<TemplateEntry>,
  generated: Vec<GeneratedEntry>,
  directories: Vec<MkdirEntry>,
  before_hooks: Vec<Hook>,
  after_hooks: Vec<Hook>,
}

impl PackageBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn name(&self) -> Option<&str> {
    self.name.as_deref()
  }

  pub fn record_name(&mut self, name: impl Into<String>) -> &mut Self {
    let name = name.into();
    match &self.name {
      Some(existing) if *existing != name => {
        self.redeclared = Some(name);
      }
      _ => {
        debug!(package = %name, "declared package");
        self.name = Some(name);
      }
    }
    self
  }

  /// Append one dependency name. Returns the builder so calls chain.
  pub fn record_dependency(&mut self, name: impl Into<String>) -> &mut Self {
    let name = name.into();
    trace!(dependency = %name, "recorded dependency");
    self.dependencies.push(name);
    self
  }

  pub fn record_link_type(&mut self, link_type: LinkType) -> &mut Self {
    self.default_link_type = Some(link_type);
    self
  }

  /// Add package-level ignore patterns, keeping the first occurrence of each.
  pub fn record_ignore<I, S>(&mut self, patterns: I) -> &mut Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    for pattern in patterns {
      let pattern = pattern.into();
      if !self.ignore_patterns.contains(&pattern) {
        self.ignore_patterns.push(pattern);
      }
    }
    self
  }

  pub fn record_replace(&mut self, replace: ReplaceOverride) -> &mut Self {
    if replace.files.is_some() {
      self.replace.files = replace.files;
    }
    if replace.dirs.is_some() {
      self.replace.dirs = replace.dirs;
    }
    self
  }

  pub fn record_file(&mut self, entry: FileEntry) -> &mut Self {
    trace!(src = %entry.src.display(), dest = %entry.dest.display(), "recorded file");
    self.files.push(entry);
    self
  }

  pub fn record_tree(&mut self, entry: TreeEntry) -> &mut Self {
    trace!(src = %entry.src.display(), dest = %entry.dest.display(), "recorded tree");
    self.trees.push(entry);
    self
  }

  pub fn record_template(&mut self, entry: TemplateEntry) -> &mut Self {
    trace!(src = %entry.src.display(), engine = %entry.engine, "recorded template");
    self.templates.push(entry);
    self
  }

  pub fn record_generated(&mut self, dest: PathBuf, content: GeneratedContent) -> &mut Self {
    trace!(dest = %dest.display(), "recorded generated file");
    self.generated.push(GeneratedEntry { dest, content });
    self
  }

  pub fn record_mkdir(&mut self, entry: MkdirEntry) -> &mut Self {
    trace!(dest = %entry.dest.display(), parents = entry.parents, "recorded mkdir");
    self.directories.push(entry);
    self
  }

  pub fn record_command_hook(&mut self, phase: HookPhase, hook: CommandHook) -> &mut Self {
    self.push_hook(phase, Hook::Command(hook))
  }

  pub fn record_function_hook(&mut self, phase: HookPhase, hook: FunctionHook) -> &mut Self {
    self.push_hook(phase, Hook::Function(hook))
  }

  /// Phase for a hook that did not name one: `before` until the first
  /// filesystem entry has been recorded, `after` from then on.
  pub fn implicit_hook_phase(&self) -> HookPhase {
    if self.entry_count() == 0 {
      HookPhase::Before
    } else {
      HookPhase::After
    }
  }

  pub fn entry_count(&self) -> usize {
    self.files.len() + self.trees.len() + self.templates.len() + self.generated.len() + self.directories.len()
  }

  pub fn template_count(&self) -> usize {
    self.templates.len()
  }

  fn push_hook(&mut self, phase: HookPhase, hook: Hook) -> &mut Self {
    trace!(phase = %phase, hook = %hook.describe(), "recorded hook");
    match phase {
      HookPhase::Before => self.before_hooks.push(hook),
      HookPhase::After => self.after_hooks.push(hook),
    }
    self
  }

  /// Freeze the accumulated records into a [`Package`].
  pub fn finish(self) -> Result<Package, BuildError> {
    let name = self.name.ok_or(BuildError::MissingName)?;
    if let Some(second) = self.redeclared {
      return Err(BuildError::NameRedeclared { first: name, second });
    }

    let package = Package {
      name,
      dependencies: self.dependencies,
      default_link_type: self.default_link_type,
      ignore_patterns: self.ignore_patterns,
      replace: self.replace,
      files: self.files,
      trees: self.trees,
      templates: self.templates,
      generated: self.generated,
      directories: self.directories,
      before_hooks: self.before_hooks,
      after_hooks: self.after_hooks,
    };

    debug!(
      package = %package.name,
      entries = package.entry_count(),
      before_hooks = package.before_hooks.len(),
      after_hooks = package.after_hooks.len(),
      "package frozen"
    );
    Ok(package)
  }
}
