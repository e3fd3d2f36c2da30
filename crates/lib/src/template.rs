//! Template engine dispatch.
//!
//! An engine token written by a manifest author (`"hbs"`, `"handlebars"`,
//! `"liquid"`) resolves to exactly one [`Engine`]. Each engine is served by a
//! [`TemplateBackend`], which turns `(source, vars, partials)` into rendered
//! text or a [`TemplateRenderError`] carrying the backend's own diagnostic.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::value::Value;

/// Closed set of supported template engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
  Handlebars,
  Liquid,
}

/// Accepted spellings, lowercase, mapped to their engine.
const ENGINE_TOKENS: &[(&str, Engine)] = &[
  ("hbs", Engine::Handlebars),
  ("handlebars", Engine::Handlebars),
  ("liquid", Engine::Liquid),
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown template engine '{token}' (expected one of: hbs, handlebars, liquid)")]
pub struct EngineSelectionError {
  pub token: String,
}

/// A backend failed to render. `diagnostic` is the backend's message verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{engine} render failed: {diagnostic}")]
pub struct TemplateRenderError {
  pub engine: Engine,
  pub diagnostic: String,
}

impl Engine {
  /// Resolve an author-facing token. Matching ignores ASCII case.
  pub fn from_token(token: &str) -> Result<Self, EngineSelectionError> {
    let lowered = token.trim().to_ascii_lowercase();
    ENGINE_TOKENS
      .iter()
      .find(|(t, _)| *t == lowered)
      .map(|(_, engine)| *engine)
      .ok_or_else(|| EngineSelectionError {
        token: token.to_string(),
      })
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Engine::Handlebars => "handlebars",
      Engine::Liquid => "liquid",
    }
  }

  /// Only the Handlebars family understands named partials.
  pub fn supports_partials(&self) -> bool {
    matches!(self, Engine::Handlebars)
  }

  /// The rendering backend serving this engine.
  pub fn backend(&self) -> Box<dyn TemplateBackend> {
    match self {
      Engine::Handlebars => Box::new(HandlebarsBackend),
      Engine::Liquid => Box::new(LiquidBackend),
    }
  }
}

impl fmt::Display for Engine {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Engine {
  type Err = EngineSelectionError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Engine::from_token(s)
  }
}

/// Contract every rendering backend satisfies.
///
/// `partials` maps partial names to their source text. Backends that have no
/// notion of partials ignore it.
pub trait TemplateBackend {
  fn engine(&self) -> Engine;

  fn render(
    &self,
    source: &str,
    vars: &Value,
    partials: &BTreeMap<String, String>,
  ) -> Result<String, TemplateRenderError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct HandlebarsBackend;

impl TemplateBackend for HandlebarsBackend {
  fn engine(&self) -> Engine {
    Engine::Handlebars
  }

  fn render(
    &self,
    source: &str,
    vars: &Value,
    partials: &BTreeMap<String, String>,
  ) -> Result<String, TemplateRenderError> {
    let mut registry = handlebars::Handlebars::new();
    for (name, partial) in partials {
      registry
        .register_partial(name, partial)
        .map_err(|e| render_error(Engine::Handlebars, e))?;
    }

    registry
      .render_template(source, vars)
      .map_err(|e| render_error(Engine::Handlebars, e))
  }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LiquidBackend;

impl TemplateBackend for LiquidBackend {
  fn engine(&self) -> Engine {
    Engine::Liquid
  }

  fn render(
    &self,
    source: &str,
    vars: &Value,
    _partials: &BTreeMap<String, String>,
  ) -> Result<String, TemplateRenderError> {
    let parser = liquid::ParserBuilder::with_stdlib()
      .build()
      .map_err(|e| render_error(Engine::Liquid, e))?;
    let template = parser.parse(source).map_err(|e| render_error(Engine::Liquid, e))?;
    let globals = liquid::to_object(vars).map_err(|e| render_error(Engine::Liquid, e))?;

    template.render(&globals).map_err(|e| render_error(Engine::Liquid, e))
  }
}

fn render_error(engine: Engine, err: impl fmt::Display) -> TemplateRenderError {
  TemplateRenderError {
    engine,
    diagnostic: err.to_string(),
  }
}
