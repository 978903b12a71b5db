//! The loader pipeline: build the graph, compile every module
//! dependencies-first, import the entry.

use futures::future::join_all;
use indexmap::{IndexMap, IndexSet};
use std::collections::HashSet;
use std::rc::Rc;
use url::Url;

use crate::blob::BlobStore;
use crate::cache::{CompiledModule, ModuleCache};
use crate::compiler::{OxcTransformer, Transformer};
use crate::config::LoaderConfig;
use crate::error::{LoaderError, Result};
use crate::fetch::{FetchRequest, Fetcher};
use crate::graph::DependencyGraph;
use crate::parser;
use crate::resolver::{has_extension, is_bare, resolve_url, with_extension, ModuleResolver};
use crate::runtime::ModuleExecutor;

pub struct Loader<E: ModuleExecutor> {
    config: LoaderConfig,
    fetcher: Rc<dyn Fetcher>,
    resolver: ModuleResolver,
    transformer: Box<dyn Transformer>,
    blobs: Rc<dyn BlobStore>,
    executor: E,
    cache: ModuleCache<E::Module>,
}

impl<E: ModuleExecutor> Loader<E> {
    pub fn new(
        config: LoaderConfig,
        fetcher: Rc<dyn Fetcher>,
        blobs: Rc<dyn BlobStore>,
        executor: E,
    ) -> Self {
        let resolver = ModuleResolver::new(fetcher.clone(), &config);
        let transformer = Box::new(OxcTransformer::new(&config.jsx));
        Self {
            config,
            fetcher,
            resolver,
            transformer,
            blobs,
            executor,
            cache: ModuleCache::new(),
        }
    }

    pub fn with_transformer(mut self, transformer: Box<dyn Transformer>) -> Self {
        self.transformer = transformer;
        self
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn cache(&self) -> &ModuleCache<E::Module> {
        &self.cache
    }

    /// Loads the module graph rooted at `entry` and returns the entry's exports.
    pub async fn load_module(&self, entry: &str) -> Result<E::Module> {
        let url = Url::parse(entry).map_err(|e| LoaderError::InvalidUrl {
            input: entry.to_string(),
            reason: e.to_string(),
        })?;
        self.load_single_module(&url).await
    }

    /// Same as [`Loader::load_module`].
    pub async fn jsx_import(&self, url: &str) -> Result<E::Module> {
        self.load_module(url).await
    }

    /// Runs all three phases for any module URL, reusing whatever earlier
    /// loads already fetched and compiled.
    pub async fn load_single_module(&self, url: &Url) -> Result<E::Module> {
        if let Some(module) = self.cache.module(url) {
            tracing::debug!(url = %url, "module cache hit");
            return Ok(module);
        }

        let graph = self.build_graph(url).await;
        self.transform_graph(&graph).await?;
        self.execute(url, &graph).await
    }

    /// Compiled state of `url`, if it has been through the transform phase.
    pub fn compiled(&self, url: &Url) -> Option<CompiledModule> {
        self.cache.compiled(url)
    }

    /// Imports an already compiled module. This is where a module that failed
    /// to fetch or compile reports its error, as does one whose static
    /// imports reach such a module.
    pub async fn import_compiled(&self, url: &Url) -> Result<E::Module> {
        if let Some(module) = self.cache.module(url) {
            return Ok(module);
        }
        let compiled = self.cache.compiled(url).ok_or_else(|| LoaderError::Import {
            url: url.clone(),
            reason: "module has not been compiled".to_string(),
        })?;
        let blob_url = consume(url, &compiled)?.to_string();
        if let Some(graph) = self.cache.graph_containing(url) {
            self.check_eager_closure(url, &graph)?;
        }
        self.import_blob(url, &blob_url).await
    }

    /// Revokes every blob URL this loader created and clears its caches.
    /// Meant for teardown of the hosting page, not for use between loads.
    pub fn cleanup(&self) -> usize {
        let stats = self.cache.stats();
        let revoked = self.cache.cleanup(self.blobs.as_ref());
        tracing::info!(
            revoked,
            sources = stats.sources,
            modules = stats.modules,
            graphs = stats.graphs,
            "loader caches cleared"
        );
        revoked
    }

    /// Phase 1: breadth-first discovery. Each wave fetches, scans and
    /// resolves all of its URLs concurrently; a module that fails here
    /// becomes a leaf and reports its error in phase 2.
    pub async fn build_graph(&self, entry: &Url) -> Rc<DependencyGraph> {
        if let Some(graph) = self.cache.graph(entry) {
            tracing::debug!(entry = %entry, "graph cache hit");
            return graph;
        }

        let mut graph = DependencyGraph::new();
        let mut processed: HashSet<Url> = HashSet::new();
        let mut pending: IndexSet<Url> = IndexSet::new();
        pending.insert(entry.clone());

        let mut wave = 0;
        while !pending.is_empty() {
            let batch: Vec<Url> = std::mem::take(&mut pending).into_iter().collect();
            processed.extend(batch.iter().cloned());
            wave += 1;
            tracing::debug!(wave, modules = batch.len(), "discovering imports");

            let scans = join_all(batch.iter().map(|url| self.scan_module(url))).await;

            // each extensionless target is probed once per wave, however
            // many modules of the wave import it
            let unresolved: IndexSet<&Url> = scans
                .iter()
                .flatten()
                .map(|(requested, _)| requested)
                .filter(|requested| {
                    !has_extension(requested) && self.cache.resolution(requested).is_none()
                })
                .collect();
            join_all(unresolved.into_iter().map(|requested| self.infer(requested))).await;

            for (url, imports) in batch.iter().zip(scans) {
                let deps = self.local_dependencies(url, imports);
                for dep in deps.keys() {
                    if !processed.contains(dep) {
                        pending.insert(dep.clone());
                    }
                }
                graph.add_node(url, deps.keys().cloned());
                for (dep, _) in deps.iter().filter(|(_, lazy)| **lazy) {
                    graph.mark_lazy(url, dep);
                }
            }
        }

        tracing::info!(entry = %entry, modules = graph.len(), waves = wave, "module graph built");
        self.cache.insert_graph(entry, graph)
    }

    /// Absolute URLs `url` imports, each flagged when it is only imported
    /// through `import()`. Bare specifiers are left to the import map.
    async fn scan_module(&self, url: &Url) -> Vec<(Url, bool)> {
        let source = match self.fetch_source(url).await {
            Ok(source) => source,
            Err(err) => {
                tracing::warn!(url = %url, error = %err, "fetch failed during discovery");
                return Vec::new();
            }
        };

        parser::scan_refs(&source, url.path(), self.config.scan_mode)
            .into_iter()
            .filter_map(|import| {
                resolve_url(&import.specifier, url).map(|requested| (requested, import.dynamic))
            })
            .collect()
    }

    /// Probes for the extension of `requested`, recording the result and
    /// seeding the source cache with the probed body.
    async fn infer(&self, requested: &Url) {
        let resolution = self.resolver.infer_extension(requested).await;
        self.cache.insert_resolution(requested, &resolution.url);
        if let Some(body) = &resolution.probed_source {
            self.cache.insert_source(&resolution.url, body);
        }
    }

    fn local_dependencies(&self, url: &Url, imports: Vec<(Url, bool)>) -> IndexMap<Url, bool> {
        let mut deps: IndexMap<Url, bool> = IndexMap::with_capacity(imports.len());
        for (requested, dynamic) in &imports {
            deps.entry(self.lookup_target(requested))
                .and_modify(|lazy| *lazy = *lazy && *dynamic)
                .or_insert(*dynamic);
        }
        tracing::debug!(url = %url, imports = imports.len(), local = deps.len(), "imports resolved");
        deps
    }

    /// Source text for `url`, fetched at most once per loader. The request
    /// bypasses HTTP caches; an HTML answer is a missing module.
    pub async fn fetch_source(&self, url: &Url) -> Result<Rc<str>> {
        if let Some(source) = self.cache.source(url) {
            return Ok(source);
        }

        let response = self
            .fetcher
            .fetch(url, FetchRequest::source())
            .await
            .map_err(|e| LoaderError::Fetch {
                url: url.clone(),
                reason: format!("{e:#}"),
            })?;
        let text = response.into_source(url)?;
        Ok(self.cache.insert_source(url, &text))
    }

    /// Phase 2: compile in topological order, one module at a time. Each
    /// module's specifiers are rewritten to its dependencies' blob URLs, so
    /// the order is what makes those URLs exist in time.
    async fn transform_graph(&self, graph: &DependencyGraph) -> Result<()> {
        let order = graph.topological_sort()?;
        self.compile_modules(&order).await;
        Ok(())
    }

    /// Compiles and registers each module of `order` in turn, skipping those
    /// already compiled. The order is taken as given: a dependency compiled
    /// after its importer leaves the importer's specifier unrewritten.
    pub async fn compile_modules(&self, order: &[Url]) {
        for url in order {
            if self.cache.is_compiled(url) {
                continue;
            }
            let compiled = match self.compile(url).await {
                Ok(code) => {
                    let blob_url = self
                        .blobs
                        .create_object_url(&code, &self.config.blob_mime_type);
                    tracing::debug!(url = %url, blob = %blob_url, "module registered");
                    CompiledModule::Ready { blob_url }
                }
                Err(cause) => {
                    tracing::error!(url = %url, error = %cause, "module failed to compile");
                    CompiledModule::Failed {
                        url: url.clone(),
                        cause,
                    }
                }
            };
            self.cache.insert_compiled(url, compiled);
        }
    }

    async fn compile(&self, url: &Url) -> Result<String> {
        let source = self.fetch_source(url).await?;
        let rewrite = |specifier: &str| self.rewrite_specifier(url, specifier);
        let result = self.transformer.transform(url, &source, &rewrite)?;
        Ok(result.code)
    }

    /// Blob URL replacing `specifier` in `importer`'s code. Bare specifiers
    /// stay for the host's import map.
    fn rewrite_specifier(&self, importer: &Url, specifier: &str) -> Option<String> {
        if is_bare(specifier) {
            return None;
        }
        let requested = resolve_url(specifier, importer)?;
        let target = self.lookup_target(&requested);

        match self.cache.compiled(&target) {
            Some(CompiledModule::Ready { blob_url }) => Some(blob_url),
            Some(CompiledModule::Failed { .. }) => {
                tracing::debug!(importer = %importer, dependency = %target, "dependency failed, specifier left as is");
                None
            }
            None => {
                tracing::warn!(
                    importer = %importer,
                    specifier,
                    dependency = %target,
                    "missing blob URL for dependency"
                );
                None
            }
        }
    }

    fn lookup_target(&self, requested: &Url) -> Url {
        if has_extension(requested) {
            return requested.clone();
        }
        if let Some(resolved) = self.cache.resolution(requested) {
            return resolved;
        }
        self.resolver
            .extensions()
            .iter()
            .map(|ext| with_extension(requested, ext))
            .find(|candidate| self.cache.is_compiled(candidate))
            .unwrap_or_else(|| with_extension(requested, &self.config.fallback_extension))
    }

    /// Phase 3: import the entry's blob URL. A failure anywhere in the
    /// entry's static dependency closure is reported here; modules behind
    /// `import()` report theirs when they are imported.
    async fn execute(&self, entry: &Url, graph: &DependencyGraph) -> Result<E::Module> {
        let compiled = self.cache.compiled(entry).ok_or_else(|| LoaderError::Import {
            url: entry.clone(),
            reason: "entry was not compiled".to_string(),
        })?;
        let blob_url = consume(entry, &compiled)?.to_string();
        self.check_eager_closure(entry, graph)?;
        self.import_blob(entry, &blob_url).await
    }

    /// First failed module among those evaluated along with `url`.
    fn check_eager_closure(&self, url: &Url, graph: &DependencyGraph) -> Result<()> {
        for dep in graph.eager_dependencies(url) {
            if let Some(failed) = self.cache.compiled(&dep).filter(CompiledModule::is_failed) {
                consume(&dep, &failed)?;
            }
        }
        Ok(())
    }

    async fn import_blob(&self, url: &Url, blob_url: &str) -> Result<E::Module> {
        let module = self
            .executor
            .import(blob_url)
            .await
            .map_err(|e| LoaderError::Import {
                url: url.clone(),
                reason: format!("{e:#}"),
            })?;
        tracing::debug!(url = %url, "module imported");
        Ok(self.cache.insert_module(url, module))
    }
}

/// Blob URL of a compiled module, logging the deferred failure when there is one.
fn consume<'c>(url: &Url, compiled: &'c CompiledModule) -> Result<&'c str> {
    compiled.consume().map_err(|err| {
        if let LoaderError::Failed { cause, .. } = &err {
            tracing::error!(url = %url, error = %cause, "importing a module that failed to load");
        }
        err
    })
}
