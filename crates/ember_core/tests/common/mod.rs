#![allow(dead_code)]

use ember_core::compiler::{CompileResult, RewriteFn};
use ember_core::fetch::FetchFuture;
use ember_core::{
    FetchRequest, FetchResponse, Fetcher, Loader, LoaderConfig, MemoryBlobStore, OxcTransformer,
    StaticExecutor, Transformer,
};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use url::Url;

pub const BASE: &str = "http://slides.test/";

/// fmt subscriber on the test writer, filtered by `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn url(path: &str) -> Url {
    Url::parse(BASE).unwrap().join(path).unwrap()
}

const INDEX_HTML: &str = "<!doctype html><html><body><div id=\"root\"></div></body></html>";

/// In-memory HTTP origin. Unknown paths answer 404, or the index page when
/// the SPA fallback is on.
#[derive(Default)]
pub struct StubFetcher {
    routes: RefCell<HashMap<String, FetchResponse>>,
    spa_fallback: bool,
    yielding: bool,
    requests: RefCell<HashMap<String, usize>>,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_spa_fallback() -> Self {
        Self {
            spa_fallback: true,
            ..Self::default()
        }
    }

    /// Suspends once before answering, the way a real network round trip does.
    pub fn yielding(mut self) -> Self {
        self.yielding = true;
        self
    }

    /// Serves `body` as JavaScript at `path` (relative to [`BASE`]).
    pub fn module(self, path: &str, body: &str) -> Self {
        self.route(path, 200, "text/javascript", body)
    }

    pub fn route(self, path: &str, status: u16, content_type: &str, body: &str) -> Self {
        self.routes.borrow_mut().insert(
            url(path).to_string(),
            FetchResponse {
                status,
                content_type: Some(content_type.to_string()),
                body: body.to_string(),
            },
        );
        self
    }

    /// Requests seen for `path`, probes included.
    pub fn requests(&self, path: &str) -> usize {
        self.requests
            .borrow()
            .get(url(path).as_str())
            .copied()
            .unwrap_or(0)
    }

    pub fn total_requests(&self) -> usize {
        self.requests.borrow().values().sum()
    }

    fn respond(&self, url: &Url) -> FetchResponse {
        if let Some(response) = self.routes.borrow().get(url.as_str()) {
            return response.clone();
        }
        if self.spa_fallback {
            return FetchResponse {
                status: 200,
                content_type: Some("text/html; charset=utf-8".to_string()),
                body: INDEX_HTML.to_string(),
            };
        }
        FetchResponse {
            status: 404,
            content_type: Some("text/plain".to_string()),
            body: "Not Found".to_string(),
        }
    }
}

impl Fetcher for StubFetcher {
    fn fetch(&self, url: &Url, _request: FetchRequest) -> FetchFuture<'_> {
        *self
            .requests
            .borrow_mut()
            .entry(url.to_string())
            .or_default() += 1;
        let response = self.respond(url);
        let yielding = self.yielding;
        Box::pin(async move {
            if yielding {
                tokio::task::yield_now().await;
            }
            Ok(response)
        })
    }
}

/// Oxc transformer that records the order modules are compiled in, and how
/// many specifiers each one had rewritten.
pub struct RecordingTransformer {
    inner: OxcTransformer,
    order: Rc<RefCell<Vec<Url>>>,
    rewritten: Rc<RefCell<HashMap<Url, usize>>>,
}

impl RecordingTransformer {
    pub fn new() -> (Self, Rc<RefCell<Vec<Url>>>) {
        let order = Rc::new(RefCell::new(Vec::new()));
        let transformer = Self {
            inner: OxcTransformer::default(),
            order: order.clone(),
            rewritten: Rc::default(),
        };
        (transformer, order)
    }

    pub fn rewritten(&self) -> Rc<RefCell<HashMap<Url, usize>>> {
        self.rewritten.clone()
    }
}

impl Transformer for RecordingTransformer {
    fn transform(
        &self,
        url: &Url,
        source: &str,
        rewrite: &RewriteFn<'_>,
    ) -> ember_core::error::Result<CompileResult> {
        self.order.borrow_mut().push(url.clone());
        let result = self.inner.transform(url, source, rewrite)?;
        self.rewritten.borrow_mut().insert(url.clone(), result.rewritten);
        Ok(result)
    }
}

pub struct Harness {
    pub fetcher: Rc<StubFetcher>,
    pub blobs: Rc<MemoryBlobStore>,
    pub loader: Loader<StaticExecutor>,
}

impl Harness {
    pub fn new(fetcher: StubFetcher) -> Self {
        Self::with_config(fetcher, LoaderConfig::default())
    }

    pub fn with_config(fetcher: StubFetcher, config: LoaderConfig) -> Self {
        let fetcher = Rc::new(fetcher);
        let blobs = Rc::new(MemoryBlobStore::from_config(&config));
        let loader = Loader::new(
            config,
            fetcher.clone(),
            blobs.clone(),
            StaticExecutor::new(blobs.clone()),
        );
        Self {
            fetcher,
            blobs,
            loader,
        }
    }

    /// Swaps in a [`RecordingTransformer`] and returns its log.
    pub fn recording(self) -> (Self, Rc<RefCell<Vec<Url>>>) {
        let (h, order, _) = self.recording_rewrites();
        (h, order)
    }

    /// Like [`Harness::recording`], also returning the per-module rewrite counts.
    pub fn recording_rewrites(
        mut self,
    ) -> (Self, Rc<RefCell<Vec<Url>>>, Rc<RefCell<HashMap<Url, usize>>>) {
        let (transformer, order) = RecordingTransformer::new();
        let rewritten = transformer.rewritten();
        self.loader = self.loader.with_transformer(Box::new(transformer));
        (self, order, rewritten)
    }

    /// Compiled code behind `path`'s blob URL.
    pub fn code(&self, path: &str) -> String {
        let blob_url = self
            .loader
            .cache()
            .blob_url(&url(path))
            .unwrap_or_else(|| panic!("{path} has no blob URL"));
        self.blobs
            .get(&blob_url)
            .map(|blob| blob.contents.to_string())
            .unwrap_or_else(|| panic!("{blob_url} is not registered"))
    }
}
