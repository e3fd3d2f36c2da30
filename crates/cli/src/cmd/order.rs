//! Implementation of the `shelf order` command.

use std::path::PathBuf;

use anyhow::Result;

use shelf_lib::config::Settings;

pub fn cmd_order(paths: &[PathBuf], settings: Settings, layers: bool) -> Result<()> {
  let set = super::load(paths, settings)?;

  if layers {
    for (index, layer) in set.graph.layers().iter().enumerate() {
      println!("{}: {}", index, layer.join(" "));
    }
  } else {
    for name in set.graph.topological_order() {
      println!("{}", name);
    }
  }
  Ok(())
}
