//! CLI output formatting.
//!
//! Colored status lines and plan rendering. Colors are only emitted when
//! the target stream supports them.

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};

use shelf_lib::hooks::Step;
use shelf_lib::package::HookPhase;
use shelf_lib::plan::{PackagePlan, PlannedEntry};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const WARNING: &str = "⚠";
  pub const INFO: &str = "•";
  pub const ARROW: &str = "→";
  pub const BEFORE: &str = "↱";
  pub const AFTER: &str = "↳";
}

pub fn truncate_hash(hash: &str) -> &str {
  let len = hash.len().min(12);
  &hash[..len]
}

pub fn print_success(message: &str) {
  println!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

pub fn print_warning(message: &str) {
  eprintln!(
    "{} {}",
    symbols::WARNING.if_supports_color(Stream::Stderr, |s| s.yellow()),
    message.if_supports_color(Stream::Stderr, |s| s.yellow())
  );
}

pub fn print_info(message: &str) {
  println!(
    "{} {}",
    symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()),
    message
  );
}

pub fn print_stat(label: &str, value: &str) {
  println!("  {}: {}", label.if_supports_color(Stream::Stdout, |s| s.dimmed()), value);
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}

/// One line describing a planned entry.
pub fn describe_entry(entry: &PlannedEntry) -> String {
  let detail = match entry {
    PlannedEntry::File(f) => format!("{} {}", f.link_type, f.src.display()),
    PlannedEntry::Tree(t) => format!("tree {} {}", t.link_type, t.src.display()),
    PlannedEntry::Template(t) => format!("{} {}", t.engine, t.src.display()),
    PlannedEntry::Generated(_) => "generated".to_string(),
    PlannedEntry::Mkdir(_) => "mkdir".to_string(),
  };
  let optional = if entry.optional() { " (optional)" } else { "" };
  format!("{} {} {}{}", entry.dest().display(), symbols::ARROW, detail, optional)
}

/// Print one package of a plan: hooks around its entries.
pub fn print_package(package: &PackagePlan) {
  let header = if package.dependencies.is_empty() {
    package.name.clone()
  } else {
    format!("{} (after {})", package.name, package.dependencies.join(", "))
  };
  println!("  {}", header.if_supports_color(Stream::Stdout, |s| s.bold()));

  for step in package.hooks.steps() {
    match step {
      Step::Hook { phase, hook, .. } => {
        let symbol = match phase {
          HookPhase::Before => symbols::BEFORE,
          HookPhase::After => symbols::AFTER,
        };
        println!(
          "    {} {}",
          symbol.if_supports_color(Stream::Stdout, |s| s.cyan()),
          hook.describe()
        );
      }
      Step::Materialize => {
        for entry in &package.entries {
          println!(
            "    {} {}",
            "+".if_supports_color(Stream::Stdout, |s| s.green()),
            describe_entry(entry)
          );
        }
      }
    }
  }
}
