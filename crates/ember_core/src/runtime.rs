use futures::future::LocalBoxFuture;
use oxc_allocator::Allocator;
use oxc_ast::ast::{BindingIdentifier, Declaration, Statement};
use oxc_ecmascript::BoundNames;
use oxc_parser::Parser;
use oxc_span::SourceType;
use std::rc::Rc;

use crate::blob::MemoryBlobStore;

pub type ImportFuture<'a, M> = LocalBoxFuture<'a, anyhow::Result<M>>;

/// Dynamic `import()` of a blob URL.
///
/// The host must already have its import map in place for the bare
/// specifiers left in compiled code.
pub trait ModuleExecutor {
    /// What an import evaluates to: the module namespace, or a handle to it.
    type Module: Clone;

    fn import<'a>(&'a self, blob_url: &'a str) -> ImportFuture<'a, Self::Module>;
}

/// Namespace of a module "executed" by [`StaticExecutor`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleNamespace {
    pub blob_url: String,
    pub exports: Vec<String>,
    pub code: Rc<str>,
}

impl ModuleNamespace {
    pub fn has_export(&self, name: &str) -> bool {
        self.exports.iter().any(|e| e == name)
    }
}

/// Executor that never runs code: it reads the blob back from a
/// [`MemoryBlobStore`] and reports the names the module exports. Enough for
/// hosts that only need the compiled artefacts, and for tests.
pub struct StaticExecutor {
    blobs: Rc<MemoryBlobStore>,
}

impl StaticExecutor {
    pub fn new(blobs: Rc<MemoryBlobStore>) -> Self {
        Self { blobs }
    }
}

impl ModuleExecutor for StaticExecutor {
    type Module = Rc<ModuleNamespace>;

    fn import<'a>(&'a self, blob_url: &'a str) -> ImportFuture<'a, Self::Module> {
        Box::pin(async move {
            let blob = self
                .blobs
                .get(blob_url)
                .ok_or_else(|| anyhow::anyhow!("unknown or revoked object URL {blob_url}"))?;
            let exports = exported_names(&blob.contents)?;
            Ok(Rc::new(ModuleNamespace {
                blob_url: blob_url.to_string(),
                exports,
                code: blob.contents,
            }))
        })
    }
}

/// Names a compiled ES module exports, in declaration order.
pub fn exported_names(code: &str) -> anyhow::Result<Vec<String>> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, code, SourceType::mjs()).parse();
    if ret.panicked || !ret.errors.is_empty() {
        anyhow::bail!("compiled module does not parse ({} errors)", ret.errors.len());
    }

    let mut names = Vec::new();
    for stmt in &ret.program.body {
        match stmt {
            Statement::ExportNamedDeclaration(decl) => {
                match &decl.declaration {
                    Some(Declaration::VariableDeclaration(var)) => {
                        for declarator in &var.declarations {
                            declarator.id.bound_names(&mut |ident: &BindingIdentifier| {
                                names.push(ident.name.to_string())
                            });
                        }
                    }
                    Some(Declaration::FunctionDeclaration(func)) => {
                        names.extend(func.id.as_ref().map(|id| id.name.to_string()));
                    }
                    Some(Declaration::ClassDeclaration(class)) => {
                        names.extend(class.id.as_ref().map(|id| id.name.to_string()));
                    }
                    _ => {}
                }
                for spec in &decl.specifiers {
                    names.push(spec.exported.name().to_string());
                }
            }
            Statement::ExportDefaultDeclaration(_) => names.push("default".to_string()),
            Statement::ExportAllDeclaration(decl) => {
                if let Some(exported) = &decl.exported {
                    names.push(exported.name().to_string());
                }
            }
            _ => {}
        }
    }
    Ok(names)
}
