mod check;
mod order;
mod plan;

use std::path::PathBuf;

use anyhow::{Context, Result};

use shelf_lib::config::Settings;
use shelf_lib::load::{LoadedSet, load_packages};

pub use check::cmd_check;
pub use order::cmd_order;
pub use plan::cmd_plan;

/// Load every manifest under `paths` and build the dependency graph.
fn load(paths: &[PathBuf], settings: Settings) -> Result<LoadedSet> {
  load_packages(paths, settings).context("Failed to load packages")
}
