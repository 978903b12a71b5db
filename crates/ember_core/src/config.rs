use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{LoaderError, Result};

/// Which import scanner runs during graph construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// Walk the oxc AST. Ignores comments and string contents exactly.
    #[default]
    Ast,
    /// Pattern match the raw text. Cheaper, less precise.
    Regex,
}

/// JSX compilation settings for the automatic runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsxConfig {
    /// Package the `jsx-runtime` import is taken from (default: react)
    #[serde(default = "default_import_source")]
    pub import_source: String,

    /// Emit the development runtime (`jsxDEV`) (default: false)
    #[serde(default)]
    pub development: bool,
}

impl Default for JsxConfig {
    fn default() -> Self {
        Self {
            import_source: default_import_source(),
            development: false,
        }
    }
}

/// Loader options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoaderConfig {
    /// Extensions probed, in order, for an extensionless specifier
    #[serde(default = "default_probe_extensions")]
    pub probe_extensions: Vec<String>,

    /// Per-candidate probe timeout in milliseconds (default: 2000)
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Extension assumed when every probe fails (default: .js)
    #[serde(default = "default_fallback_extension")]
    pub fallback_extension: String,

    /// MIME type of compiled module blobs
    #[serde(default = "default_blob_mime_type")]
    pub blob_mime_type: String,

    /// Origin embedded in blob URLs issued by the in-memory blob store
    #[serde(default = "default_blob_origin")]
    pub blob_origin: String,

    #[serde(default)]
    pub scan_mode: ScanMode,

    #[serde(default)]
    pub jsx: JsxConfig,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            probe_extensions: default_probe_extensions(),
            probe_timeout_ms: default_probe_timeout_ms(),
            fallback_extension: default_fallback_extension(),
            blob_mime_type: default_blob_mime_type(),
            blob_origin: default_blob_origin(),
            scan_mode: ScanMode::default(),
            jsx: JsxConfig::default(),
        }
    }
}

impl LoaderConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: LoaderConfig =
            serde_json::from_str(json).map_err(|e| LoaderError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    fn validate(&self) -> Result<()> {
        if let Some(bad) = self
            .probe_extensions
            .iter()
            .chain(std::iter::once(&self.fallback_extension))
            .find(|ext| !ext.starts_with('.') || ext.len() < 2)
        {
            return Err(LoaderError::Config(format!(
                "extension `{bad}` must start with a dot"
            )));
        }
        if self.blob_mime_type.trim().is_empty() {
            return Err(LoaderError::Config("blobMimeType must not be empty".into()));
        }
        Ok(())
    }
}

fn default_probe_extensions() -> Vec<String> {
    [".jsx", ".js", ".tsx", ".ts"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_probe_timeout_ms() -> u64 {
    2000
}

fn default_fallback_extension() -> String {
    ".js".to_string()
}

fn default_blob_mime_type() -> String {
    "application/javascript".to_string()
}

fn default_blob_origin() -> String {
    "null".to_string()
}

fn default_import_source() -> String {
    "react".to_string()
}
