//! Implementation of the `shelf check` command.
//!
//! Loads packages and builds the plan, reporting the first manifest-time or
//! plan-time error. Prints nothing else on success but a summary line.

use std::path::PathBuf;

use anyhow::{Context, Result};

use shelf_lib::config::Settings;

use crate::output::print_success;

pub fn cmd_check(paths: &[PathBuf], settings: Settings) -> Result<()> {
  let set = super::load(paths, settings)?;
  let plan = set.plan().context("Failed to build deployment plan")?;

  print_success(&format!(
    "{} package(s), {} entr{} OK",
    plan.package_count(),
    plan.entry_count(),
    if plan.entry_count() == 1 { "y" } else { "ies" }
  ));
  Ok(())
}
