//! Lua host binding.
//!
//! Manifests are Lua scripts calling directive globals. This module owns the
//! VM setup, the conversion of Lua arguments into directive arguments, and
//! the callback registry used by function hooks.
//!
//! - [`convert`] - Lua values into [`DirectiveArgs`](crate::directive::DirectiveArgs)
//! - [`globals`] - directive globals and the `shelf` table
//! - [`runtime`] - VM creation, manifest execution, callback invocation

pub mod convert;
pub mod globals;
pub mod runtime;

pub use globals::BuilderSlot;
pub use runtime::{call_callback, create_runtime, exec_chunk};
