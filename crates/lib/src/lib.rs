//! shelf-lib: package manifests and deployment plans for shelf
//!
//! Packages describe files, directory trees, rendered templates, generated
//! files and lifecycle hooks to place into a target filesystem:
//! - `directive`: author-facing calls normalized into canonical records
//! - `package`: the package model, its builder and the declarative schema
//! - `policy`: layered defaults for link type, overwrite and ignore globs
//! - `graph`: cross-package dependency ordering and cycle detection
//! - `plan`: the layered deployment plan an execution backend consumes
//! - `deploy`: the reference walk of a plan over a backend

pub mod config;
pub mod deploy;
pub mod directive;
pub mod eval;
pub mod graph;
pub mod hooks;
pub mod load;
pub mod lua;
pub mod package;
pub mod plan;
pub mod policy;
pub mod registry;
pub mod template;
pub mod value;
