//! Implementation of the `shelf plan` command.
//!
//! Loads packages, builds the deployment plan and prints it, either as a
//! layered listing or as JSON. With `--steps` the plan is also walked with a
//! dry-run backend, printing each action a deployment would take.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;

use shelf_lib::config::Settings;
use shelf_lib::deploy::{Cancellation, DryRunBackend, deploy};
use shelf_lib::plan::DeploymentPlan;

use crate::output::{OutputFormat, print_info, print_json, print_package, print_stat, print_warning, truncate_hash};

#[derive(Serialize)]
struct PlanOutput<'a> {
  hash: String,
  plan: &'a DeploymentPlan,
}

pub fn cmd_plan(paths: &[PathBuf], settings: Settings, output: OutputFormat, steps: bool) -> Result<()> {
  let set = super::load(paths, settings)?;
  let plan = set.plan().context("Failed to build deployment plan")?;
  let hash = plan.compute_hash().context("Failed to compute plan hash")?;

  if output.is_json() {
    return print_json(&PlanOutput { hash, plan: &plan });
  }

  print_info(&format!("Plan {}", truncate_hash(&hash)));
  for (index, layer) in plan.layers.iter().enumerate() {
    println!("Layer {}:", index);
    for package in layer {
      print_package(package);
    }
  }
  print_stat("Packages", &plan.package_count().to_string());
  print_stat("Entries", &plan.entry_count().to_string());

  if steps {
    let mut backend = DryRunBackend::new();
    let report = deploy(&plan, &mut backend, &Cancellation::new()).context("Dry run failed")?;

    println!();
    println!("Steps:");
    for step in &backend.steps {
      println!("  {}", step);
    }
    for (package, src) in &report.skipped {
      print_warning(&format!("[{}] optional source '{}' is missing", package, src.display()));
    }
  }

  Ok(())
}
