use std::rc::Rc;
use std::time::Duration;
use url::Url;

use crate::config::LoaderConfig;
use crate::fetch::{FetchRequest, Fetcher};

/// Bare specifiers (`react`, `@scope/pkg`) belong to the host's import map.
pub fn is_bare(specifier: &str) -> bool {
    !specifier.starts_with('.') && !specifier.starts_with('/')
}

/// Joins a relative or absolute-path specifier onto `base`. `None` for bare
/// specifiers and for specifiers the URL parser rejects.
pub fn resolve_url(specifier: &str, base: &Url) -> Option<Url> {
    if is_bare(specifier) {
        return None;
    }
    base.join(specifier).ok()
}

/// True when the last path segment carries a file extension.
pub fn has_extension(url: &Url) -> bool {
    let last = url.path().rsplit('/').next().unwrap_or("");
    match last.rsplit_once('.') {
        Some((stem, ext)) => !stem.is_empty() && !ext.is_empty(),
        None => false,
    }
}

/// `url` with `ext` appended to its path. Query and fragment are kept.
pub fn with_extension(url: &Url, ext: &str) -> Url {
    let mut candidate = url.clone();
    candidate.set_path(&format!("{}{}", url.path(), ext));
    candidate
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub url: Url,
    /// The module body, when a probe already downloaded it.
    pub probed_source: Option<String>,
    /// True when the URL came from probing (or its fallback) rather than the specifier.
    pub inferred: bool,
}

/// Resolves specifiers to module URLs, probing the server for a missing extension.
#[derive(Clone)]
pub struct ModuleResolver {
    fetcher: Rc<dyn Fetcher>,
    extensions: Vec<String>,
    fallback_extension: String,
    probe_timeout: Duration,
}

impl ModuleResolver {
    pub fn new(fetcher: Rc<dyn Fetcher>, config: &LoaderConfig) -> Self {
        Self {
            fetcher,
            extensions: config.probe_extensions.clone(),
            fallback_extension: config.fallback_extension.clone(),
            probe_timeout: config.probe_timeout(),
        }
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// `None` for a bare specifier, which the caller skips.
    pub async fn resolve(&self, specifier: &str, base: &Url) -> Option<Resolution> {
        let url = resolve_url(specifier, base)?;
        Some(self.resolve_absolute(url).await)
    }

    /// Extension inference for an already joined URL.
    pub async fn resolve_absolute(&self, url: Url) -> Resolution {
        if has_extension(&url) {
            return Resolution {
                url,
                probed_source: None,
                inferred: false,
            };
        }
        self.infer_extension(&url).await
    }

    /// Probes each configured extension in order with a GET. The first 2xx
    /// non-HTML answer wins; if none does, the fallback extension is assumed
    /// so the miss is reported later by the source fetch.
    pub async fn infer_extension(&self, url: &Url) -> Resolution {
        for ext in &self.extensions {
            let candidate = with_extension(url, ext);
            match self
                .fetcher
                .fetch(&candidate, FetchRequest::probe(self.probe_timeout))
                .await
            {
                Ok(response) if response.is_module() => {
                    tracing::debug!(from = %url, to = %candidate, "extension inferred");
                    return Resolution {
                        url: candidate,
                        probed_source: Some(response.body),
                        inferred: true,
                    };
                }
                Ok(response) => {
                    tracing::trace!(candidate = %candidate, status = response.status, "probe miss");
                }
                Err(err) => {
                    tracing::trace!(candidate = %candidate, error = %err, "probe failed");
                }
            }
        }

        let fallback = with_extension(url, &self.fallback_extension);
        tracing::warn!(
            specifier = %url,
            assumed = %fallback,
            "no candidate extension answered, assuming fallback"
        );
        Resolution {
            url: fallback,
            probed_source: None,
            inferred: true,
        }
    }
}
