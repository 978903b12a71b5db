//! Ember - loads a graph of JSX/JS modules over HTTP, compiles each one into
//! a blob URL with its relative imports rewritten, and imports the entry.

pub mod blob;
pub mod cache;
pub mod compiler;
pub mod config;
pub mod error;
pub mod fetch;
pub mod graph;
pub mod loader;
pub mod parser;
pub mod resolver;
pub mod runtime;

pub use blob::{BlobStore, MemoryBlobStore};
pub use cache::{CompiledModule, ModuleCache};
pub use compiler::{OxcTransformer, Transformer};
pub use config::{LoaderConfig, ScanMode};
pub use error::LoaderError;
pub use fetch::{FetchRequest, FetchResponse, Fetcher, HttpFetcher};
pub use graph::DependencyGraph;
pub use loader::Loader;
pub use runtime::{ModuleExecutor, ModuleNamespace, StaticExecutor};
