//! Loading manifests of every supported format.

use std::path::{Path, PathBuf};

use shelf_lib::config::{ConflictPolicy, Settings};
use shelf_lib::load::{LoadError, load_packages};
use shelf_lib::package::{GeneratedContent, LinkType};
use shelf_lib::plan::{PlanError, PlannedEntry};
use shelf_lib::template::Engine;

use super::common::Dotfiles;

mod formats {
  use super::*;

  #[test]
  fn declarative_formats_agree() {
    let dotfiles = Dotfiles::new();
    let toml = dotfiles.package(
      "t",
      "package.toml",
      "name = \"t\"\n[[files]]\nsrc = \"rc\"\ndest = \".trc\"\n",
    );
    let yaml = dotfiles.package(
      "y",
      "package.yaml",
      "name: y\nfiles:\n  - src: rc\n    dest: .yrc\n",
    );
    let json = dotfiles.package(
      "j",
      "package.json",
      r#"{"name": "j", "files": [{"src": "rc", "dest": ".jrc"}]}"#,
    );

    let set = load_packages([toml, yaml, json], Settings::default()).unwrap();
    let plan = set.plan().unwrap();
    for (name, dest) in [("t", ".trc"), ("y", ".yrc"), ("j", ".jrc")] {
      let package = plan.package(name).unwrap();
      let PlannedEntry::File(file) = &package.entries[0] else {
        panic!("expected a file entry for {}", name);
      };
      assert_eq!(file.dest, PathBuf::from(dest));
      assert_eq!(file.link_type, LinkType::Link);
    }
  }

  #[test]
  fn manifest_file_may_be_given_directly() {
    let dotfiles = Dotfiles::new();
    let path = dotfiles.write("custom/zsh.lua", "name 'zsh'\n");
    let set = load_packages([&path], Settings::default()).unwrap();
    assert_eq!(set.registry.root("zsh"), Some(dotfiles.root().join("custom").as_path()));
  }

  #[test]
  fn invalid_declarative_manifest_names_field() {
    let dotfiles = Dotfiles::new();
    let dir = dotfiles.package("bad", "package.toml", "name = \"bad\"\nlink_type = \"hardlink\"\n");
    let err = load_packages([dir], Settings::default()).unwrap_err();
    assert!(matches!(err, LoadError::Schema { .. }), "{}", err);
  }
}

mod lua_manifests {
  use super::*;

  #[test]
  fn every_entry_kind() {
    let dotfiles = Dotfiles::new();
    let dir = dotfiles.package(
      "all",
      "package.lua",
      r#"
      name "all"
      file { "a", ".a" }
      tree { "t", ".config/t" }
      hbs { "h.hbs", ".h", { x = 1 } }
      liquid { "l.liquid", ".l", { y = "z" } }
      empty ".hushlogin"
      str { ".s", "text" }
      toml { ".t.toml", { k = "v" } }
      json { ".j.json", { 1, 2 } }
      mkdir ".cache/all"
      "#,
    );

    let set = load_packages([dir], Settings::default()).unwrap();
    let plan = set.plan().unwrap();
    let package = plan.package("all").unwrap();
    let kinds: Vec<&str> = package.entries.iter().map(|e| e.kind()).collect();
    assert_eq!(
      kinds,
      vec!["mkdir", "file", "tree", "template", "template", "generated", "generated", "generated", "generated"]
    );

    let engines: Vec<Engine> = package
      .entries
      .iter()
      .filter_map(|e| match e {
        PlannedEntry::Template(t) => Some(t.engine),
        _ => None,
      })
      .collect();
    assert_eq!(engines, vec![Engine::Handlebars, Engine::Liquid]);

    let PlannedEntry::Generated(empty) = &package.entries[5] else {
      panic!("expected a generated entry");
    };
    assert_eq!(empty.content, GeneratedContent::Empty);
  }

  #[test]
  fn manifests_can_require_local_modules() {
    let dotfiles = Dotfiles::new();
    dotfiles.write("mods/lua/common.lua", "return { dest = '.shared' }\n");
    let dir = dotfiles.package(
      "mods",
      "package.lua",
      "local common = require('common')\nname 'mods'\nfile { 'shared', common.dest }\n",
    );

    let set = load_packages([dir], Settings::default()).unwrap();
    let plan = set.plan().unwrap();
    assert_eq!(plan.package("mods").unwrap().entries[0].dest(), Path::new(".shared"));
  }

  #[test]
  fn shelf_table_exposes_manifest_dir() {
    let dotfiles = Dotfiles::new();
    let dir = dotfiles.package(
      "where",
      "package.lua",
      "name 'where'\nstr { '.where', shelf.dir }\n",
    );

    let set = load_packages([&dir], Settings::default()).unwrap();
    let package = set.registry.get("where").unwrap();
    assert_eq!(
      package.generated[0].content,
      GeneratedContent::Text {
        contents: dir.to_string_lossy().to_string(),
      }
    );
  }
}

mod policies {
  use super::*;

  #[test]
  fn link_type_layers_resolve_most_specific_first() {
    let dotfiles = Dotfiles::new();
    let dir = dotfiles.package(
      "p",
      "package.lua",
      r#"
      name "p"
      link_type "copy"
      file { "a", ".a" }
      file { "b", ".b", type = "link" }
      "#,
    );

    let settings = Settings {
      default_link_type: LinkType::Link,
      ..Settings::default()
    };
    let set = load_packages([dir], settings).unwrap();
    let plan = set.plan().unwrap();
    let link_types: Vec<LinkType> = plan
      .package("p")
      .unwrap()
      .entries
      .iter()
      .filter_map(|e| match e {
        PlannedEntry::File(f) => Some(f.link_type),
        _ => None,
      })
      .collect();
    assert_eq!(link_types, vec![LinkType::Copy, LinkType::Link]);
  }

  #[test]
  fn later_wins_across_packages() {
    let dotfiles = Dotfiles::new();
    let base = dotfiles.package("base", "package.lua", "name 'base'\nfile { 'rc', '.rc' }\n");
    let work = dotfiles.package("work", "package.lua", "name 'work'\ndep 'base'\nfile { 'rc', '.rc' }\n");

    let fatal = load_packages([&base, &work], Settings::default()).unwrap();
    assert!(matches!(fatal.plan(), Err(PlanError::DestinationConflict { .. })));

    let settings = Settings {
      conflict_policy: ConflictPolicy::LaterWins,
      ..Settings::default()
    };
    let set = load_packages([&base, &work], settings).unwrap();
    let plan = set.plan().unwrap();
    assert!(plan.package("base").unwrap().entries.is_empty());
    assert_eq!(plan.package("work").unwrap().entries.len(), 1);
  }
}
