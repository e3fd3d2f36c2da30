use thiserror::Error;

use super::types::{DataFormat, GeneratedContent, StructuredData};

#[derive(Debug, Error)]
#[error("cannot serialize {format} data: {message}")]
pub struct DataRenderError {
  pub format: &'static str,
  pub message: String,
}

impl StructuredData {
  /// Serialize `values` into file contents. YAML and TOML headers become
  /// leading `#` comment lines.
  pub fn render(&self) -> Result<String, DataRenderError> {
    let fail = |message: String| DataRenderError {
      format: self.format.as_str(),
      message,
    };

    let body = match self.format {
      DataFormat::Yaml => serde_yaml::to_string(&self.values).map_err(|e| fail(e.to_string()))?,
      DataFormat::Toml => toml::to_string(&self.values).map_err(|e| fail(e.to_string()))?,
      DataFormat::Json => {
        let mut json = serde_json::to_string_pretty(&self.values).map_err(|e| fail(e.to_string()))?;
        json.push('\n');
        json
      }
    };

    match &self.header {
      Some(header) if self.format.supports_header() => {
        let mut out = String::new();
        for line in header.lines() {
          out.push_str("# ");
          out.push_str(line);
          out.push('\n');
        }
        out.push_str(&body);
        Ok(out)
      }
      _ => Ok(body),
    }
  }
}

impl GeneratedContent {
  pub fn render(&self) -> Result<String, DataRenderError> {
    match self {
      GeneratedContent::Empty => Ok(String::new()),
      GeneratedContent::Text { contents } => Ok(contents.clone()),
      GeneratedContent::Data(data) => data.render(),
    }
  }
}
