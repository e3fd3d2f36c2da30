//! `shelf check` over fixture packages.

use predicates::prelude::*;

use super::common::{TestEnv, dotfiles, shelf_cmd};

#[test]
fn check_accepts_fixture_set() {
  shelf_cmd()
    .arg("check")
    .args(dotfiles())
    .assert()
    .success()
    .stdout(predicate::str::contains("3 package(s)"));
}

#[test]
fn check_reports_directive_errors() {
  let env = TestEnv::new();
  let dir = env.package("bad", "name 'bad'\nhbs { 'only_src' }\n");

  shelf_cmd()
    .arg("check")
    .arg(dir)
    .assert()
    .failure()
    .stderr(predicate::str::contains("hbs: missing required field 'dest'"));
}

#[test]
fn check_reports_unknown_engine() {
  let env = TestEnv::new();
  let dir = env.package("bad", "name 'bad'\ntemplate { 'a', 'b', {}, engine = 'jinja' }\n");

  shelf_cmd()
    .arg("check")
    .arg(dir)
    .assert()
    .failure()
    .stderr(predicate::str::contains("jinja"));
}

#[test]
fn check_reports_missing_dependency() {
  let env = TestEnv::new();
  let dir = env.package("app", "name 'app'\ndep 'ghost'\n");

  shelf_cmd()
    .arg("check")
    .arg(dir)
    .assert()
    .failure()
    .stderr(predicate::str::contains("unknown package 'ghost'"));
}

#[test]
fn check_reports_missing_manifest() {
  let env = TestEnv::new();
  shelf_cmd()
    .arg("check")
    .arg(env.temp.path())
    .assert()
    .failure()
    .stderr(predicate::str::contains("no package manifest"));
}
