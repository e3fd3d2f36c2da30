//! Default layering.
//!
//! Optional per-entry settings are resolved through a fixed precedence chain:
//! entry, then package, then the global default. A tree is the container of
//! the files under it: its resolved link type and replace policy are the ones
//! every file it deploys uses. The first level that says something wins; when
//! none does the documented default applies. Resolution never fails.
//!
//! Tree ignore sets are the exception to "first wins": a tree's own ignore
//! globs are unioned with the package's ignore patterns.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::package::{FileEntry, LinkType, Package, ReplaceOverride, TemplateEntry, TreeEntry};
use crate::template::Engine;
use crate::value::Value;

/// Include glob used when a tree names none.
pub const INCLUDE_ALL: &str = "**";

pub const DEFAULT_REPLACE_FILES: bool = true;
pub const DEFAULT_REPLACE_DIRS: bool = false;

/// The first `Some` across `levels`, most specific first, else `default`.
pub fn layer<T: Copy>(levels: &[Option<T>], default: T) -> T {
  levels.iter().find_map(|level| *level).unwrap_or(default)
}

/// Effective overwrite behavior for one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacePolicy {
  pub files: bool,
  pub dirs: bool,
}

impl Default for ReplacePolicy {
  fn default() -> Self {
    Self {
      files: DEFAULT_REPLACE_FILES,
      dirs: DEFAULT_REPLACE_DIRS,
    }
  }
}

/// Resolve replace flags field by field, most specific level first.
pub fn resolve_replace(levels: &[ReplaceOverride]) -> ReplacePolicy {
  let files: Vec<Option<bool>> = levels.iter().map(|l| l.files).collect();
  let dirs: Vec<Option<bool>> = levels.iter().map(|l| l.dirs).collect();
  ReplacePolicy {
    files: layer(&files, DEFAULT_REPLACE_FILES),
    dirs: layer(&dirs, DEFAULT_REPLACE_DIRS),
  }
}

/// Tree ignore globs followed by package ignore patterns, first occurrence kept.
pub fn effective_ignore(tree: &TreeEntry, package: &Package) -> Vec<String> {
  let mut combined: Vec<String> = Vec::with_capacity(tree.ignore_globs.len() + package.ignore_patterns.len());
  for pattern in tree.ignore_globs.iter().chain(&package.ignore_patterns) {
    if !combined.contains(pattern) {
      combined.push(pattern.clone());
    }
  }
  combined
}

pub fn effective_include(tree: &TreeEntry) -> Vec<String> {
  if tree.include_globs.is_empty() {
    vec![INCLUDE_ALL.to_string()]
  } else {
    tree.include_globs.clone()
  }
}

/// Compiled include/ignore globs of one tree, matched against paths relative to the tree root.
#[derive(Debug, Clone)]
pub struct TreeFilter {
  include: Vec<glob::Pattern>,
  ignore: Vec<glob::Pattern>,
}

impl TreeFilter {
  pub fn compile(include: &[String], ignore: &[String]) -> Result<Self, glob::PatternError> {
    let compile_all = |patterns: &[String]| -> Result<Vec<glob::Pattern>, glob::PatternError> {
      patterns.iter().map(|p| glob::Pattern::new(p)).collect()
    };

    Ok(Self {
      include: compile_all(include)?,
      ignore: compile_all(ignore)?,
    })
  }

  /// A path is deployed when some include glob matches and no ignore glob does.
  pub fn matches(&self, relative: &Path) -> bool {
    self.include.iter().any(|p| p.matches_path(relative)) && !self.ignore.iter().any(|p| p.matches_path(relative))
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedFile {
  pub src: PathBuf,
  pub dest: PathBuf,
  pub link_type: LinkType,
  pub optional: bool,
  pub replace: ReplacePolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedTree {
  pub src: PathBuf,
  pub dest: PathBuf,
  pub link_type: LinkType,
  pub include: Vec<String>,
  pub ignore: Vec<String>,
  pub optional: bool,
  pub replace: ReplacePolicy,
}

impl ResolvedTree {
  pub fn filter(&self) -> Result<TreeFilter, glob::PatternError> {
    TreeFilter::compile(&self.include, &self.ignore)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedTemplate {
  pub src: PathBuf,
  pub dest: PathBuf,
  pub engine: Engine,
  pub vars: Value,
  pub partials: std::collections::BTreeMap<String, PathBuf>,
  pub optional: bool,
  pub replace: ReplacePolicy,
}

/// Applies the precedence chains of one package against a global link type.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
  package: &'a Package,
  global_link_type: LinkType,
}

impl<'a> Resolver<'a> {
  pub fn new(package: &'a Package, global_link_type: LinkType) -> Self {
    Self {
      package,
      global_link_type,
    }
  }

  /// Entry, then container, then package, then global.
  pub fn link_type(&self, entry: Option<LinkType>) -> LinkType {
    layer(&[entry, self.package.default_link_type], self.global_link_type)
  }

  pub fn replace(&self, entry: ReplaceOverride) -> ReplacePolicy {
    resolve_replace(&[entry, self.package.replace])
  }

  /// Replace policy of entries that carry no override of their own.
  pub fn package_replace(&self) -> ReplacePolicy {
    resolve_replace(&[self.package.replace])
  }

  pub fn file(&self, entry: &FileEntry) -> ResolvedFile {
    ResolvedFile {
      src: entry.src.clone(),
      dest: entry.dest.clone(),
      link_type: self.link_type(entry.link_type),
      optional: entry.optional,
      replace: self.replace(entry.replace),
    }
  }

  pub fn tree(&self, entry: &TreeEntry) -> ResolvedTree {
    ResolvedTree {
      src: entry.src.clone(),
      dest: entry.dest.clone(),
      link_type: self.link_type(entry.link_type),
      include: effective_include(entry),
      ignore: effective_ignore(entry, self.package),
      optional: entry.optional,
      replace: self.replace(entry.replace),
    }
  }

  pub fn template(&self, entry: &TemplateEntry) -> ResolvedTemplate {
    ResolvedTemplate {
      src: entry.src.clone(),
      dest: entry.dest.clone(),
      engine: entry.engine,
      vars: entry.vars.clone(),
      partials: entry.partials.clone(),
      optional: entry.optional,
      replace: self.replace(entry.replace),
    }
  }
}
