//! Dry-run deployments of loaded packages.

use shelf_lib::config::Settings;
use shelf_lib::deploy::{Cancellation, DeployCause, DryRunBackend, deploy};
use shelf_lib::load::load_packages;

use super::common::Dotfiles;

#[test]
fn dependencies_deploy_first() {
  let dotfiles = Dotfiles::new();
  dotfiles.write("zsh/zshrc", "# zsh\n");
  dotfiles.write("git/gitconfig", "[user]\n");
  let zsh = dotfiles.package(
    "zsh",
    "package.lua",
    "name 'zsh'\ndep 'git'\ncmd 'pre'\nfile { 'zshrc', '.zshrc' }\ncmd 'post'\n",
  );
  let git = dotfiles.package("git", "package.lua", "name 'git'\nfile { 'gitconfig', '.gitconfig' }\n");

  let set = load_packages([zsh, git], Settings::default()).unwrap();
  let plan = set.plan().unwrap();
  let mut backend = DryRunBackend::new();
  let report = deploy(&plan, &mut backend, &Cancellation::new()).unwrap();

  assert_eq!(report.completed, vec!["git", "zsh"]);
  assert_eq!(
    backend.steps,
    vec![
      "[git] link gitconfig -> .gitconfig",
      "[zsh] cmd pre",
      "[zsh] link zshrc -> .zshrc",
      "[zsh] cmd post",
    ]
  );
}

#[test]
fn missing_required_source_stops_deployment() {
  let dotfiles = Dotfiles::new();
  let a = dotfiles.package("a", "package.lua", "name 'a'\nfile { 'absent', '.absent' }\n");

  let set = load_packages([a], Settings::default()).unwrap();
  let plan = set.plan().unwrap();
  let mut backend = DryRunBackend::new();
  let err = deploy(&plan, &mut backend, &Cancellation::new()).unwrap_err();

  assert_eq!(err.package, "a");
  assert!(err.completed.is_empty());
  assert!(matches!(err.cause, DeployCause::MissingSource(_)));
}

#[test]
fn cancelled_before_start_deploys_nothing() {
  let dotfiles = Dotfiles::new();
  let a = dotfiles.package("a", "package.lua", "name 'a'\nmkdir '.a'\n");

  let set = load_packages([a], Settings::default()).unwrap();
  let plan = set.plan().unwrap();
  let cancel = Cancellation::new();
  cancel.cancel();

  let mut backend = DryRunBackend::new();
  let report = deploy(&plan, &mut backend, &cancel).unwrap();
  assert!(report.cancelled);
  assert!(backend.steps.is_empty());
}

#[test]
fn function_hooks_run_through_loaded_set() {
  let dotfiles = Dotfiles::new();
  let a = dotfiles.package(
    "a",
    "package.lua",
    "name 'a'\nran = false\nfn(function() ran = true end)\nfn { function() error('boom') end, when = 'after' }\n",
  );

  let set = load_packages([a], Settings::default()).unwrap();
  let package = set.registry.get("a").unwrap();
  let shelf_lib::package::Hook::Function(before) = &package.before_hooks[0] else {
    panic!("expected a function hook");
  };
  let shelf_lib::package::Hook::Function(after) = &package.after_hooks[0] else {
    panic!("expected a function hook");
  };

  assert_eq!(set.call_hook("a", &before.callback), Ok(()));
  let message = set.call_hook("a", &after.callback).unwrap_err();
  assert!(message.contains("boom"), "{}", message);
}
