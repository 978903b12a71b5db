//! Per-loader module caches
//!
//! Every cache is keyed by absolute module URL and written at most once per
//! key. Nothing expires; [`ModuleCache::cleanup`] revokes every blob URL and
//! empties everything at once. The `RefCell`s are never borrowed across an
//! `.await`, so single-threaded cooperative scheduling needs no locks.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use url::Url;

use crate::blob::BlobStore;
use crate::error::{LoaderError, Result};
use crate::graph::DependencyGraph;

/// Outcome of compiling one module.
#[derive(Clone, Debug)]
pub enum CompiledModule {
    Ready { blob_url: String },
    /// Kept so the failure is reported when, and only when, the module is consumed.
    Failed { url: Url, cause: LoaderError },
}

impl CompiledModule {
    pub fn blob_url(&self) -> Option<&str> {
        match self {
            CompiledModule::Ready { blob_url } => Some(blob_url),
            CompiledModule::Failed { .. } => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, CompiledModule::Failed { .. })
    }

    /// The blob URL, or the deferred failure.
    pub fn consume(&self) -> Result<&str> {
        match self {
            CompiledModule::Ready { blob_url } => Ok(blob_url),
            CompiledModule::Failed { url, cause } => Err(LoaderError::Failed {
                url: url.clone(),
                cause: Box::new(cause.clone()),
            }),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub sources: usize,
    pub compiled: usize,
    pub failed: usize,
    pub modules: usize,
    pub graphs: usize,
    pub resolutions: usize,
}

pub struct ModuleCache<M> {
    sources: RefCell<HashMap<Url, Rc<str>>>,
    compiled: RefCell<HashMap<Url, CompiledModule>>,
    modules: RefCell<HashMap<Url, M>>,
    graphs: RefCell<HashMap<Url, Rc<DependencyGraph>>>,
    resolutions: RefCell<HashMap<Url, Url>>,
}

impl<M: Clone> ModuleCache<M> {
    pub fn new() -> Self {
        Self {
            sources: RefCell::new(HashMap::new()),
            compiled: RefCell::new(HashMap::new()),
            modules: RefCell::new(HashMap::new()),
            graphs: RefCell::new(HashMap::new()),
            resolutions: RefCell::new(HashMap::new()),
        }
    }

    pub fn source(&self, url: &Url) -> Option<Rc<str>> {
        self.sources.borrow().get(url).cloned()
    }

    /// Stores `text` unless the URL already has a source; returns the cached text either way.
    pub fn insert_source(&self, url: &Url, text: &str) -> Rc<str> {
        self.sources
            .borrow_mut()
            .entry(url.clone())
            .or_insert_with(|| Rc::from(text))
            .clone()
    }

    pub fn compiled(&self, url: &Url) -> Option<CompiledModule> {
        self.compiled.borrow().get(url).cloned()
    }

    pub fn is_compiled(&self, url: &Url) -> bool {
        self.compiled.borrow().contains_key(url)
    }

    pub fn blob_url(&self, url: &Url) -> Option<String> {
        self.compiled
            .borrow()
            .get(url)
            .and_then(|c| c.blob_url().map(str::to_owned))
    }

    pub fn insert_compiled(&self, url: &Url, compiled: CompiledModule) {
        self.compiled
            .borrow_mut()
            .entry(url.clone())
            .or_insert(compiled);
    }

    pub fn module(&self, url: &Url) -> Option<M> {
        self.modules.borrow().get(url).cloned()
    }

    pub fn insert_module(&self, url: &Url, module: M) -> M {
        self.modules
            .borrow_mut()
            .entry(url.clone())
            .or_insert(module)
            .clone()
    }

    pub fn graph(&self, entry: &Url) -> Option<Rc<DependencyGraph>> {
        self.graphs.borrow().get(entry).cloned()
    }

    /// Some cached graph with a node for `url`. Every graph that reaches a
    /// module records the same edges for it, so any one will do.
    pub fn graph_containing(&self, url: &Url) -> Option<Rc<DependencyGraph>> {
        let graphs = self.graphs.borrow();
        graphs
            .get(url)
            .or_else(|| graphs.values().find(|g| g.contains(url)))
            .cloned()
    }

    pub fn insert_graph(&self, entry: &Url, graph: DependencyGraph) -> Rc<DependencyGraph> {
        self.graphs
            .borrow_mut()
            .entry(entry.clone())
            .or_insert_with(|| Rc::new(graph))
            .clone()
    }

    /// Probed URL for an extensionless one.
    pub fn resolution(&self, requested: &Url) -> Option<Url> {
        self.resolutions.borrow().get(requested).cloned()
    }

    pub fn insert_resolution(&self, requested: &Url, resolved: &Url) {
        self.resolutions
            .borrow_mut()
            .entry(requested.clone())
            .or_insert_with(|| resolved.clone());
    }

    pub fn stats(&self) -> CacheStats {
        let compiled = self.compiled.borrow();
        CacheStats {
            sources: self.sources.borrow().len(),
            compiled: compiled.len(),
            failed: compiled.values().filter(|c| c.is_failed()).count(),
            modules: self.modules.borrow().len(),
            graphs: self.graphs.borrow().len(),
            resolutions: self.resolutions.borrow().len(),
        }
    }

    /// Revokes every blob URL and clears all caches. Returns how many blob
    /// URLs were revoked.
    pub fn cleanup(&self, blobs: &dyn BlobStore) -> usize {
        let compiled = std::mem::take(&mut *self.compiled.borrow_mut());
        let mut revoked = 0;
        for blob_url in compiled.values().filter_map(CompiledModule::blob_url) {
            blobs.revoke_object_url(blob_url);
            revoked += 1;
        }

        self.sources.borrow_mut().clear();
        self.modules.borrow_mut().clear();
        self.graphs.borrow_mut().clear();
        self.resolutions.borrow_mut().clear();
        revoked
    }
}

impl<M: Clone> Default for ModuleCache<M> {
    fn default() -> Self {
        Self::new()
    }
}
