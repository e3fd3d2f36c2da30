//! `shelf plan` over fixture packages.

use predicates::prelude::*;

use super::common::{TestEnv, dotfiles, shelf_cmd};

#[test]
fn plan_lists_layers_in_dependency_order() {
  let output = shelf_cmd().arg("plan").args(dotfiles()).assert().success();
  let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();

  let git = stdout.find("  git").unwrap();
  let zsh = stdout.find("  zsh (after git)").unwrap();
  assert!(git < zsh, "{}", stdout);
  assert!(stdout.contains("Layer 1:"));
  assert!(stdout.contains(".gitconfig → copy gitconfig"));
  assert!(stdout.contains("cmd: mkdir -p ~/.cache/zsh"));
}

#[test]
fn plan_json_carries_hash_and_layers() {
  let output = shelf_cmd()
    .args(["plan", "--output", "json"])
    .args(dotfiles())
    .assert()
    .success();

  let json: serde_json::Value = serde_json::from_slice(&output.get_output().stdout).unwrap();
  assert_eq!(json["hash"].as_str().unwrap().len(), 64);
  let layers = json["plan"]["layers"].as_array().unwrap();
  assert_eq!(layers.len(), 2);
  assert_eq!(layers[0][0]["name"], "git");
  assert_eq!(layers[0][0]["entries"][0]["kind"], "file");
  assert_eq!(layers[0][0]["entries"][0]["link_type"], "copy");
}

#[test]
fn plan_hash_is_stable() {
  let hash = || {
    let output = shelf_cmd()
      .args(["plan", "--output", "json"])
      .args(dotfiles())
      .assert()
      .success();
    let json: serde_json::Value = serde_json::from_slice(&output.get_output().stdout).unwrap();
    json["hash"].as_str().unwrap().to_string()
  };
  assert_eq!(hash(), hash());
}

#[test]
fn plan_steps_walk_hooks_around_entries() {
  let output = shelf_cmd()
    .args(["plan", "--steps"])
    .args(dotfiles())
    .assert()
    .success()
    .stderr(predicate::str::contains("optional source 'missing.vim' is missing"));
  let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();

  let hook = stdout.find("[zsh] cmd mkdir -p ~/.cache/zsh").unwrap();
  let link = stdout.find("[zsh] link zshrc -> .zshrc").unwrap();
  assert!(hook < link, "{}", stdout);
  assert!(stdout.contains("[nvim] write .config/nvim/settings.yaml"));
}

#[test]
fn plan_reports_destination_conflict() {
  let env = TestEnv::new();
  let a = env.package("a", "name 'a'\nfile { 'x', '.bashrc' }\n");
  let b = env.package("b", "name 'b'\nfile { 'y', '.bashrc' }\n");

  shelf_cmd()
    .arg("plan")
    .args([a, b])
    .assert()
    .failure()
    .stderr(predicate::str::contains("destination '.bashrc' is claimed by both 'a' and 'b'"));
}

#[test]
fn later_wins_settings_resolve_conflict() {
  let env = TestEnv::new();
  let a = env.package("a", "name 'a'\nfile { 'x', '.bashrc' }\n");
  let b = env.package("b", "name 'b'\nfile { 'y', '.bashrc' }\n");
  let settings = env.write_file("shelf.toml", "conflict_policy = \"later-wins\"\n");

  shelf_cmd()
    .arg("--config")
    .arg(settings)
    .arg("plan")
    .args([a, b])
    .assert()
    .success()
    .stdout(predicate::str::contains(".bashrc → link y"))
    .stdout(predicate::str::contains(".bashrc → link x").not());
}
