//! Package data model.
//!
//! - [`types`]: the canonical records every directive normalizes into
//! - [`builder`]: per-manifest accumulation and freezing
//! - [`schema`]: declarative package files (TOML / YAML / JSON)
//! - [`render`]: file bodies of generated entries

mod builder;
mod render;
mod schema;
mod types;

pub use builder::{BuildError, PackageBuilder};
pub use render::DataRenderError;
pub use schema::{CommandConfig, FileConfig, HookConfig, PackageConfig, SchemaError, TemplateConfig, TreeConfig};
pub use types::*;
