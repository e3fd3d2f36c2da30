mod cmd;
mod output;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use shelf_lib::config::Settings;

use crate::output::OutputFormat;

/// shelf - declarative dotfile packages
#[derive(Parser)]
#[command(name = "shelf", author, version, about, long_about = None)]
struct Cli {
  /// Enable debug logging
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Engine settings file (TOML)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Load packages and print the deployment plan
  Plan {
    /// Package manifests or directories containing one
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t)]
    output: OutputFormat,

    /// Walk the plan and print every step a deployment would take
    #[arg(long)]
    steps: bool,
  },

  /// Print the dependency order of packages
  Order {
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Group packages into independence layers
    #[arg(long)]
    layers: bool,
  },

  /// Validate packages without printing the plan
  Check {
    #[arg(required = true)]
    paths: Vec<PathBuf>,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let settings = match &cli.config {
    Some(path) => Settings::load(path).with_context(|| format!("Failed to load settings: {}", path.display()))?,
    None => Settings::default(),
  };
  debug!(?settings, "settings");

  let result = match cli.command {
    Commands::Plan { paths, output, steps } => cmd::cmd_plan(&paths, settings, output, steps),
    Commands::Order { paths, layers } => cmd::cmd_order(&paths, settings, layers),
    Commands::Check { paths } => cmd::cmd_check(&paths, settings),
  };

  if let Err(err) = result {
    output::print_error(&format!("{:#}", err));
    std::process::exit(1);
  }
  Ok(())
}
