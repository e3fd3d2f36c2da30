//! Directive normalization.
//!
//! Each author-facing call (`file`, `tree`, `cmd`, ...) is reduced here to one
//! canonical [`Directive`] record, or rejected with a [`DirectiveError`]
//! naming the directive and the offending field. Normalization is a pure
//! function of the directive kind and its arguments; recording the result in
//! a package is a separate step ([`Directive::apply`]), so a rejected call
//! never touches the package under construction.

mod args;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

pub use args::{Arg, DirectiveArgs};
use args::Fields;

use crate::hooks::parse_exit_tolerance;
use crate::package::*;
use crate::template::{Engine, EngineSelectionError};
use crate::value::Value;

/// Every directive name the authoring surface exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectiveKind {
  Name,
  Dep,
  File,
  Link,
  Copy,
  Tree,
  Template,
  Hbs,
  Liquid,
  Empty,
  Str,
  Yaml,
  Toml,
  Json,
  Mkdir,
  Cmd,
  Fn,
  LinkType,
  Ignore,
  Replace,
}

impl DirectiveKind {
  pub const ALL: &'static [DirectiveKind] = &[
    DirectiveKind::Name,
    DirectiveKind::Dep,
    DirectiveKind::File,
    DirectiveKind::Link,
    DirectiveKind::Copy,
    DirectiveKind::Tree,
    DirectiveKind::Template,
    DirectiveKind::Hbs,
    DirectiveKind::Liquid,
    DirectiveKind::Empty,
    DirectiveKind::Str,
    DirectiveKind::Yaml,
    DirectiveKind::Toml,
    DirectiveKind::Json,
    DirectiveKind::Mkdir,
    DirectiveKind::Cmd,
    DirectiveKind::Fn,
    DirectiveKind::LinkType,
    DirectiveKind::Ignore,
    DirectiveKind::Replace,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      DirectiveKind::Name => "name",
      DirectiveKind::Dep => "dep",
      DirectiveKind::File => "file",
      DirectiveKind::Link => "link",
      DirectiveKind::Copy => "copy",
      DirectiveKind::Tree => "tree",
      DirectiveKind::Template => "template",
      DirectiveKind::Hbs => "hbs",
      DirectiveKind::Liquid => "liquid",
      DirectiveKind::Empty => "empty",
      DirectiveKind::Str => "str",
      DirectiveKind::Yaml => "yaml",
      DirectiveKind::Toml => "toml",
      DirectiveKind::Json => "json",
      DirectiveKind::Mkdir => "mkdir",
      DirectiveKind::Cmd => "cmd",
      DirectiveKind::Fn => "fn",
      DirectiveKind::LinkType => "link_type",
      DirectiveKind::Ignore => "ignore",
      DirectiveKind::Replace => "replace",
    }
  }
}

impl fmt::Display for DirectiveKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for DirectiveKind {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    DirectiveKind::ALL
      .iter()
      .find(|kind| kind.as_str() == s)
      .copied()
      .ok_or_else(|| format!("unknown directive '{}'", s))
  }
}

/// Manifest-time failure of a single directive.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectiveError {
  #[error("{directive}: missing required field '{field}'")]
  Validation { directive: DirectiveKind, field: String },

  #[error("{directive}: '{field}' must be {expected}, got {found}")]
  TypeShape {
    directive: DirectiveKind,
    field: String,
    expected: &'static str,
    found: &'static str,
  },

  #[error("{directive}: invalid '{field}': {message}")]
  InvalidValue {
    directive: DirectiveKind,
    field: String,
    message: String,
  },

  #[error(transparent)]
  EngineSelection(#[from] EngineSelectionError),
}

impl DirectiveError {
  pub fn directive(&self) -> Option<DirectiveKind> {
    match self {
      DirectiveError::Validation { directive, .. }
      | DirectiveError::TypeShape { directive, .. }
      | DirectiveError::InvalidValue { directive, .. } => Some(*directive),
      DirectiveError::EngineSelection(_) => None,
    }
  }
}

/// The canonical record one directive call normalizes into.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
  Name(String),
  Dependencies(Vec<String>),
  File(FileEntry),
  Tree(TreeEntry),
  Template(TemplateEntry),
  Generated { dest: PathBuf, content: GeneratedContent },
  Mkdir(MkdirEntry),
  /// `phase` is `None` when the author left placement to position.
  CommandHook { phase: Option<HookPhase>, hook: CommandHook },
  FunctionHook { phase: Option<HookPhase>, hook: FunctionHook },
  LinkType(LinkType),
  Ignore(Vec<String>),
  Replace(ReplaceOverride),
}

impl Directive {
  /// Record this directive in the package under construction.
  pub fn apply(self, builder: &mut PackageBuilder) {
    match self {
      Directive::Name(name) => {
        builder.record_name(name);
      }
      Directive::Dependencies(names) => {
        for name in names {
          builder.record_dependency(name);
        }
      }
      Directive::File(entry) => {
        builder.record_file(entry);
      }
      Directive::Tree(entry) => {
        builder.record_tree(entry);
      }
      Directive::Template(entry) => {
        builder.record_template(entry);
      }
      Directive::Generated { dest, content } => {
        builder.record_generated(dest, content);
      }
      Directive::Mkdir(entry) => {
        builder.record_mkdir(entry);
      }
      Directive::CommandHook { phase, hook } => {
        let phase = phase.unwrap_or_else(|| builder.implicit_hook_phase());
        builder.record_command_hook(phase, hook);
      }
      Directive::FunctionHook { phase, hook } => {
        let phase = phase.unwrap_or_else(|| builder.implicit_hook_phase());
        builder.record_function_hook(phase, hook);
      }
      Directive::LinkType(link_type) => {
        builder.record_link_type(link_type);
      }
      Directive::Ignore(patterns) => {
        builder.record_ignore(patterns);
      }
      Directive::Replace(replace) => {
        builder.record_replace(replace);
      }
    }
  }
}

/// Normalize one directive call.
pub fn normalize(kind: DirectiveKind, args: &DirectiveArgs) -> Result<Directive, DirectiveError> {
  let mut fields = Fields::new(kind, args);

  let directive = match kind {
    DirectiveKind::Name => Directive::Name(fields.required_string(Some(0), "name")?),
    DirectiveKind::Dep => normalize_dep(&mut fields)?,
    DirectiveKind::File => Directive::File(normalize_file(&mut fields, None)?),
    DirectiveKind::Link => Directive::File(normalize_file(&mut fields, Some(LinkType::Link))?),
    DirectiveKind::Copy => Directive::File(normalize_file(&mut fields, Some(LinkType::Copy))?),
    DirectiveKind::Tree => Directive::Tree(normalize_tree(&mut fields)?),
    DirectiveKind::Template => {
      let token = fields.required_string(None, "engine")?;
      let engine = Engine::from_token(&token)?;
      Directive::Template(normalize_template(&mut fields, engine)?)
    }
    DirectiveKind::Hbs => Directive::Template(normalize_template(&mut fields, Engine::Handlebars)?),
    DirectiveKind::Liquid => Directive::Template(normalize_template(&mut fields, Engine::Liquid)?),
    DirectiveKind::Empty => Directive::Generated {
      dest: fields.required_path(Some(0), "dest")?,
      content: GeneratedContent::Empty,
    },
    DirectiveKind::Str => {
      let dest = fields.required_path(Some(0), "dest")?;
      let contents = fields.optional_string(Some(1), "contents")?.ok_or_else(|| fields.missing("contents"))?;
      Directive::Generated {
        dest,
        content: GeneratedContent::Text { contents },
      }
    }
    DirectiveKind::Yaml => normalize_data(&mut fields, DataFormat::Yaml)?,
    DirectiveKind::Toml => normalize_data(&mut fields, DataFormat::Toml)?,
    DirectiveKind::Json => normalize_data(&mut fields, DataFormat::Json)?,
    DirectiveKind::Mkdir => Directive::Mkdir(MkdirEntry {
      dest: fields.required_path(Some(0), "dest")?,
      parents: fields.optional_bool("parents")?.unwrap_or(true),
    }),
    DirectiveKind::Cmd => normalize_cmd(&mut fields)?,
    DirectiveKind::Fn => normalize_fn(&mut fields)?,
    DirectiveKind::LinkType => {
      let token = fields.required_string(Some(0), "type")?;
      Directive::LinkType(parse_link_type(&fields, &token)?)
    }
    DirectiveKind::Ignore => {
      let patterns = if fields.has_positional() {
        fields.positional_strings("patterns")?
      } else {
        fields.string_list(None, "patterns")?
      };
      if patterns.is_empty() {
        return Err(fields.missing("patterns"));
      }
      validate_globs(&fields, "patterns", &patterns)?;
      Directive::Ignore(patterns)
    }
    DirectiveKind::Replace => Directive::Replace(ReplaceOverride {
      files: fields.optional_bool("files")?,
      dirs: fields.optional_bool("dirs")?,
    }),
  };

  fields.finish()?;
  Ok(directive)
}

fn normalize_dep(fields: &mut Fields<'_>) -> Result<Directive, DirectiveError> {
  let names = fields.positional_strings("name")?;
  if names.is_empty() {
    return Err(fields.missing("name"));
  }
  Ok(Directive::Dependencies(names))
}

fn parse_link_type(fields: &Fields<'_>, token: &str) -> Result<LinkType, DirectiveError> {
  token.parse().map_err(|message: String| fields.invalid("type", message))
}

fn optional_link_type(fields: &mut Fields<'_>) -> Result<Option<LinkType>, DirectiveError> {
  match fields.optional_string(None, "type")? {
    Some(token) => parse_link_type(fields, &token).map(Some),
    None => Ok(None),
  }
}

fn replace_fields(fields: &mut Fields<'_>) -> Result<ReplaceOverride, DirectiveError> {
  Ok(ReplaceOverride {
    files: fields.optional_bool("replace_files")?,
    dirs: fields.optional_bool("replace_dirs")?,
  })
}

fn validate_globs(fields: &Fields<'_>, field: &str, patterns: &[String]) -> Result<(), DirectiveError> {
  for pattern in patterns {
    glob::Pattern::new(pattern).map_err(|e| fields.invalid(field, format!("bad glob '{}': {}", pattern, e)))?;
  }
  Ok(())
}

/// `forced` is the link type implied by `link` / `copy`; it beats any `type` field.
fn normalize_file(fields: &mut Fields<'_>, forced: Option<LinkType>) -> Result<FileEntry, DirectiveError> {
  let src = fields.required_path(Some(0), "src")?;
  let dest = match fields.optional_path(Some(1), "dest")? {
    Some(dest) => dest,
    None => FileEntry::default_dest(&src)
      .ok_or_else(|| fields.invalid("dest", format!("cannot derive a destination from '{}'", src.display())))?,
  };
  let declared = optional_link_type(fields)?;

  Ok(FileEntry {
    src,
    dest,
    link_type: forced.or(declared),
    optional: fields.flag("optional")?,
    replace: replace_fields(fields)?,
  })
}

fn normalize_tree(fields: &mut Fields<'_>) -> Result<TreeEntry, DirectiveError> {
  let src = fields.required_path(Some(0), "src")?;
  let dest = fields.optional_path(Some(1), "dest")?.unwrap_or_else(|| src.clone());
  let link_type = optional_link_type(fields)?;

  let include_globs = fields.string_list(None, "globs")?;
  validate_globs(fields, "globs", &include_globs)?;
  let ignore_globs = fields.string_list(None, "ignore")?;
  validate_globs(fields, "ignore", &ignore_globs)?;

  Ok(TreeEntry {
    src,
    dest,
    link_type,
    include_globs,
    ignore_globs,
    optional: fields.flag("optional")?,
    replace: replace_fields(fields)?,
  })
}

fn normalize_template(fields: &mut Fields<'_>, engine: Engine) -> Result<TemplateEntry, DirectiveError> {
  let src = fields.required_path(Some(0), "src")?;
  let dest = fields.required_path(Some(1), "dest")?;
  let vars = fields.required_table(Some(2), "vars")?;
  if !vars.is_table() {
    return Err(fields.mismatch("vars", "table", vars.type_name()));
  }

  // Handlebars partials may also sit in the fourth positional slot.
  let partials_slot = (engine == Engine::Handlebars).then_some(3);
  let partials = match fields.value(partials_slot, "partials")? {
    None => Default::default(),
    Some(_) if !engine.supports_partials() => {
      return Err(fields.invalid("partials", format!("{} templates do not support partials", engine)));
    }
    Some(Value::Table(table)) => {
      let mut partials = std::collections::BTreeMap::new();
      for (name, path) in table {
        let Some(path) = path.as_str().filter(|p| !p.is_empty()) else {
          return Err(fields.invalid("partials", format!("partial '{}' must be a non-empty path", name)));
        };
        partials.insert(name.clone(), PathBuf::from(path));
      }
      partials
    }
    Some(other) => {
      return Err(fields.invalid("partials", format!("expected a table of paths, got {}", other.type_name())));
    }
  };

  Ok(TemplateEntry {
    src,
    dest,
    engine,
    vars,
    partials,
    optional: fields.flag("optional")?,
    replace: replace_fields(fields)?,
  })
}

fn normalize_data(fields: &mut Fields<'_>, format: DataFormat) -> Result<Directive, DirectiveError> {
  let dest = fields.required_path(Some(0), "dest")?;
  let values = fields.required_table(Some(1), "values")?;
  let header = fields
    .optional_string(Some(2), "header")?
    .filter(|_| format.supports_header());

  Ok(Directive::Generated {
    dest,
    content: GeneratedContent::Data(StructuredData { format, values, header }),
  })
}

fn hook_phase(fields: &mut Fields<'_>) -> Result<Option<HookPhase>, DirectiveError> {
  match fields.optional_string(None, "when")? {
    Some(token) => token.parse().map(Some).map_err(|message: String| fields.invalid("when", message)),
    None => Ok(None),
  }
}

fn normalize_cmd(fields: &mut Fields<'_>) -> Result<Directive, DirectiveError> {
  let command = fields.required_string(Some(0), "command")?;
  let tolerated_exit = match fields.value(None, "nonzero_exit")? {
    Some(value) => parse_exit_tolerance(value).map_err(|message| fields.invalid("nonzero_exit", message))?,
    None => ExitTolerance::default(),
  };

  let hook = CommandHook {
    command,
    start: fields.optional_path(None, "start")?,
    shell: fields.optional_string(None, "shell")?,
    quiet: fields.flag("quiet")?,
    stdout: fields.optional_path(None, "stdout")?,
    stderr: fields.optional_path(None, "stderr")?,
    clean_env: fields.flag("clean_env")?,
    env: fields.string_map("env")?,
    tolerated_exit,
  };

  Ok(Directive::CommandHook {
    phase: hook_phase(fields)?,
    hook,
  })
}

fn normalize_fn(fields: &mut Fields<'_>) -> Result<Directive, DirectiveError> {
  let callback = fields.callback(Some(0), "callback")?;
  let error_exit = match fields.optional_string(None, "error_exit")? {
    Some(token) => token.parse().map_err(|message: String| fields.invalid("error_exit", message))?,
    None => ErrorExitPolicy::default(),
  };

  Ok(Directive::FunctionHook {
    phase: hook_phase(fields)?,
    hook: FunctionHook {
      callback,
      start: fields.optional_path(None, "start")?,
      error_exit,
    },
  })
}
