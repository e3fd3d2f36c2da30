//! `shelf order` over fixture packages.

use predicates::prelude::*;

use super::common::{TestEnv, dotfiles, fixture_path, shelf_cmd};

#[test]
fn order_is_flat_topological() {
  shelf_cmd()
    .arg("order")
    .args(dotfiles())
    .assert()
    .success()
    .stdout("git\nzsh\nnvim\n");
}

#[test]
fn order_layers_group_independent_packages() {
  shelf_cmd()
    .args(["order", "--layers"])
    .args(dotfiles())
    .assert()
    .success()
    .stdout("0: git\n1: zsh nvim\n");
}

#[test]
fn diamond_layers() {
  let env = TestEnv::new();
  let paths = vec![
    env.package("d", "name 'd'\ndep 'b' 'c'\n"),
    env.package("b", "name 'b'\ndep 'a'\n"),
    env.package("c", "name 'c'\ndep 'a'\n"),
    env.package("a", "name 'a'\n"),
  ];

  shelf_cmd()
    .args(["order", "--layers"])
    .args(paths)
    .assert()
    .success()
    .stdout("0: a\n1: b c\n2: d\n");
}

#[test]
fn cycle_is_reported() {
  shelf_cmd()
    .arg("order")
    .arg(fixture_path("cycle/a"))
    .arg(fixture_path("cycle/b"))
    .assert()
    .failure()
    .stderr(predicate::str::contains("cyclic dependency: a -> b -> a"));
}
