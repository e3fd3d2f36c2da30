//! Deployment plans.
//!
//! A [`DeploymentPlan`] is what an execution backend consumes: packages
//! grouped into independence layers, each with its policy-resolved entries
//! and its hook sequence. Building the plan is also where destination
//! conflicts between entries are detected.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{ConflictPolicy, Settings};
use crate::graph::DependencyGraph;
use crate::hooks::HookSequence;
use crate::package::{GeneratedContent, MkdirEntry, Package};
use crate::policy::{ReplacePolicy, ResolvedFile, ResolvedTemplate, ResolvedTree, Resolver};
use crate::registry::Registry;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
  #[error(
    "destination '{}' is claimed by both '{first}' and '{second}'",
    .dest.display()
  )]
  DestinationConflict {
    dest: PathBuf,
    first: String,
    second: String,
  },

  #[error("[{package}] invalid glob '{pattern}': {message}")]
  InvalidGlob {
    package: String,
    pattern: String,
    message: String,
  },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedGenerated {
  pub dest: PathBuf,
  pub content: GeneratedContent,
  pub replace: ReplacePolicy,
}

/// One filesystem entry with every policy field resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PlannedEntry {
  File(ResolvedFile),
  Tree(ResolvedTree),
  Template(ResolvedTemplate),
  Generated(ResolvedGenerated),
  Mkdir(MkdirEntry),
}

impl PlannedEntry {
  pub fn kind(&self) -> &'static str {
    match self {
      PlannedEntry::File(_) => "file",
      PlannedEntry::Tree(_) => "tree",
      PlannedEntry::Template(_) => "template",
      PlannedEntry::Generated(_) => "generated",
      PlannedEntry::Mkdir(_) => "mkdir",
    }
  }

  pub fn dest(&self) -> &Path {
    match self {
      PlannedEntry::File(f) => &f.dest,
      PlannedEntry::Tree(t) => &t.dest,
      PlannedEntry::Template(t) => &t.dest,
      PlannedEntry::Generated(g) => &g.dest,
      PlannedEntry::Mkdir(m) => &m.dest,
    }
  }

  /// Source path read at deployment time, if the entry has one.
  pub fn source(&self) -> Option<&Path> {
    match self {
      PlannedEntry::File(f) => Some(&f.src),
      PlannedEntry::Tree(t) => Some(&t.src),
      PlannedEntry::Template(t) => Some(&t.src),
      PlannedEntry::Generated(_) | PlannedEntry::Mkdir(_) => None,
    }
  }

  pub fn optional(&self) -> bool {
    match self {
      PlannedEntry::File(f) => f.optional,
      PlannedEntry::Tree(t) => t.optional,
      PlannedEntry::Template(t) => t.optional,
      PlannedEntry::Generated(_) | PlannedEntry::Mkdir(_) => false,
    }
  }

  /// Replace policy of entries that write a single file at `dest`.
  ///
  /// Trees merge into their destination and directory creation is
  /// idempotent, so neither claims its destination exclusively.
  fn exclusive_replace(&self) -> Option<ReplacePolicy> {
    match self {
      PlannedEntry::File(f) => Some(f.replace),
      PlannedEntry::Template(t) => Some(t.replace),
      PlannedEntry::Generated(g) => Some(g.replace),
      PlannedEntry::Tree(_) | PlannedEntry::Mkdir(_) => None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackagePlan {
  pub name: String,
  /// Directory the package was loaded from; relative sources resolve against it.
  pub root: Option<PathBuf>,
  pub dependencies: Vec<String>,
  pub entries: Vec<PlannedEntry>,
  pub hooks: HookSequence,
}

impl PackagePlan {
  fn resolve(
    package: &Package,
    root: Option<&Path>,
    graph: &DependencyGraph,
    settings: &Settings,
  ) -> Result<Self, PlanError> {
    let resolver = Resolver::new(package, settings.default_link_type);
    let mut entries = Vec::with_capacity(package.entry_count());

    for dir in &package.directories {
      entries.push(PlannedEntry::Mkdir(dir.clone()));
    }
    for file in &package.files {
      entries.push(PlannedEntry::File(resolver.file(file)));
    }
    for tree in &package.trees {
      let resolved = resolver.tree(tree);
      if let Err(e) = resolved.filter() {
        let pattern = resolved
          .include
          .iter()
          .chain(&resolved.ignore)
          .find(|p| glob::Pattern::new(p).is_err())
          .cloned()
          .unwrap_or_default();
        return Err(PlanError::InvalidGlob {
          package: package.name.clone(),
          pattern,
          message: e.to_string(),
        });
      }
      entries.push(PlannedEntry::Tree(resolved));
    }
    for template in &package.templates {
      entries.push(PlannedEntry::Template(resolver.template(template)));
    }
    for generated in &package.generated {
      entries.push(PlannedEntry::Generated(ResolvedGenerated {
        dest: generated.dest.clone(),
        content: generated.content.clone(),
        replace: resolver.package_replace(),
      }));
    }

    Ok(Self {
      name: package.name.clone(),
      root: root.map(Path::to_path_buf),
      dependencies: graph.dependencies_of(&package.name),
      entries,
      hooks: HookSequence::from_package(package, &settings.default_shell),
    })
  }
}

/// Packages in independence layers. Every package of layer `n` depends only
/// on packages of layers before `n`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentPlan {
  pub layers: Vec<Vec<PackagePlan>>,
}

/// Lexically normalized destination used as the conflict key.
pub fn normalize_dest(path: &Path) -> PathBuf {
  let mut out = PathBuf::new();
  for component in path.components() {
    match component {
      Component::CurDir => {}
      Component::ParentDir => {
        let at_root = matches!(out.components().next_back(), None | Some(Component::ParentDir));
        if at_root {
          out.push("..");
        } else {
          out.pop();
        }
      }
      other => out.push(other.as_os_str()),
    }
  }
  out
}

struct Claim {
  package: usize,
  entry: usize,
  replace: ReplacePolicy,
}

impl DeploymentPlan {
  /// Resolve every registered package and lay them out by `graph`.
  pub fn build(registry: &Registry, graph: &DependencyGraph, settings: &Settings) -> Result<Self, PlanError> {
    let layer_names = graph.layers();

    let mut flat: Vec<(usize, PackagePlan)> = Vec::with_capacity(registry.len());
    for (layer, names) in layer_names.iter().enumerate() {
      for name in names {
        let Some(package) = registry.get(name) else {
          continue;
        };
        flat.push((layer, PackagePlan::resolve(package, registry.root(name), graph, settings)?));
      }
    }

    let superseded = detect_conflicts(&flat, settings.conflict_policy)?;
    for (package, entry) in superseded.iter().rev() {
      flat[*package].1.entries.remove(*entry);
    }

    let mut layers: Vec<Vec<PackagePlan>> = vec![Vec::new(); layer_names.len()];
    for (layer, plan) in flat {
      layers[layer].push(plan);
    }

    let plan = Self { layers };
    info!(
      layers = plan.layers.len(),
      packages = plan.package_count(),
      entries = plan.entry_count(),
      "deployment plan ready"
    );
    Ok(plan)
  }

  /// Packages in deployment order.
  pub fn packages(&self) -> impl Iterator<Item = &PackagePlan> {
    self.layers.iter().flatten()
  }

  pub fn package(&self, name: &str) -> Option<&PackagePlan> {
    self.packages().find(|p| p.name == name)
  }

  pub fn package_count(&self) -> usize {
    self.layers.iter().map(Vec::len).sum()
  }

  pub fn entry_count(&self) -> usize {
    self.packages().map(|p| p.entries.len()).sum()
  }

  /// SHA-256 of the plan's JSON form.
  pub fn compute_hash(&self) -> Result<String, serde_json::Error> {
    let serialized = serde_json::to_string(self)?;
    let mut hasher = Sha256::new();
    hasher.update(serialized.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
  }
}

/// Walk entries in plan order and find shared destinations. Returns the
/// `(package, entry)` positions displaced under later-wins, sorted.
fn detect_conflicts(flat: &[(usize, PackagePlan)], policy: ConflictPolicy) -> Result<Vec<(usize, usize)>, PlanError> {
  let mut claims: HashMap<PathBuf, Claim> = HashMap::new();
  let mut superseded = Vec::new();

  for (package_idx, (_, plan)) in flat.iter().enumerate() {
    for (entry_idx, entry) in plan.entries.iter().enumerate() {
      let Some(replace) = entry.exclusive_replace() else {
        continue;
      };
      let key = normalize_dest(entry.dest());

      if let Some(previous) = claims.get(&key) {
        let first = &flat[previous.package].1.name;
        let permitted = policy == ConflictPolicy::LaterWins && previous.replace.files && replace.files;
        if !permitted {
          return Err(PlanError::DestinationConflict {
            dest: key,
            first: first.clone(),
            second: plan.name.clone(),
          });
        }

        warn!(
          dest = %key.display(),
          replaced = %first,
          by = %plan.name,
          "later entry replaces earlier one"
        );
        superseded.push((previous.package, previous.entry));
      } else {
        debug!(dest = %key.display(), package = %plan.name, kind = entry.kind(), "claimed destination");
      }

      claims.insert(
        key,
        Claim {
          package: package_idx,
          entry: entry_idx,
          replace,
        },
      );
    }
  }

  superseded.sort_unstable();
  Ok(superseded)
}
