//! Error taxonomy for the loader pipeline

use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, Error)]
pub enum LoaderError {
    #[error("invalid module url `{input}`: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: Url, reason: String },

    #[error("failed to fetch {url}: HTTP {status}")]
    Status { url: Url, status: u16 },

    /// A 2xx answer with an HTML body: the server's SPA fallback page, not a module.
    #[error("module not found: {url} (server answered with an HTML fallback page)")]
    HtmlFallback { url: Url },

    #[error("failed to transform {url}: {message}")]
    Transform { url: Url, message: String },

    #[error("circular dependency detected at {url}: {}", format_path(path))]
    CircularDependency { url: Url, path: Vec<Url> },

    #[error("failed to import {url}: {reason}")]
    Import { url: Url, reason: String },

    /// A module that failed in an earlier phase and is now being consumed.
    #[error("module {url} failed to load: {cause}")]
    Failed { url: Url, cause: Box<LoaderError> },

    #[error("invalid loader configuration: {0}")]
    Config(String),
}

impl LoaderError {
    /// The module URL the error is about, when there is one.
    pub fn url(&self) -> Option<&Url> {
        match self {
            LoaderError::Fetch { url, .. }
            | LoaderError::Status { url, .. }
            | LoaderError::HtmlFallback { url }
            | LoaderError::Transform { url, .. }
            | LoaderError::CircularDependency { url, .. }
            | LoaderError::Import { url, .. }
            | LoaderError::Failed { url, .. } => Some(url),
            LoaderError::InvalidUrl { .. } | LoaderError::Config(_) => None,
        }
    }

    /// True for the "the file is not there" family of fetch failures.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            LoaderError::HtmlFallback { .. } | LoaderError::Status { status: 404, .. }
        )
    }
}

fn format_path(path: &[Url]) -> String {
    path.iter()
        .map(Url::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

pub type Result<T> = std::result::Result<T, LoaderError>;
