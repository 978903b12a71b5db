use oxc_allocator::Allocator;
use oxc_ast::ast::{
    ExportAllDeclaration, ExportNamedDeclaration, Expression, ImportDeclaration, ImportExpression,
    StringLiteral,
};
use oxc_ast_visit::{walk_mut, VisitMut};
use oxc_codegen::Codegen;
use oxc_parser::Parser;
use oxc_semantic::SemanticBuilder;
use oxc_span::Atom;
use oxc_transformer::{JsxOptions, JsxRuntime, TransformOptions};
use std::fmt::Display;
use std::path::Path;
use url::Url;

use crate::config::JsxConfig;
use crate::error::{LoaderError, Result};
use crate::parser::source_type_for;

pub struct CompileResult {
    pub code: String,
    /// Specifiers replaced by the rewrite callback.
    pub rewritten: usize,
}

/// Maps an import specifier, as written, to its replacement. `None` leaves it alone.
pub type RewriteFn<'r> = dyn Fn(&str) -> Option<String> + 'r;

/// Compiles one module: JSX to plain JS plus specifier rewriting, in one pass
/// over one parse.
pub trait Transformer {
    fn transform(&self, url: &Url, source: &str, rewrite: &RewriteFn<'_>) -> Result<CompileResult>;
}

/// `Transformer` built on oxc: parse, semantic, transform (automatic JSX
/// runtime, TypeScript stripping), rewrite, codegen.
pub struct OxcTransformer {
    options: TransformOptions,
}

impl OxcTransformer {
    pub fn new(jsx: &JsxConfig) -> Self {
        let options = TransformOptions {
            jsx: JsxOptions {
                jsx_plugin: true,
                runtime: JsxRuntime::Automatic,
                development: jsx.development,
                import_source: Some(jsx.import_source.clone()),
                ..JsxOptions::default()
            },
            ..TransformOptions::default()
        };
        Self { options }
    }
}

impl Default for OxcTransformer {
    fn default() -> Self {
        Self::new(&JsxConfig::default())
    }
}

impl Transformer for OxcTransformer {
    fn transform(&self, url: &Url, source: &str, rewrite: &RewriteFn<'_>) -> Result<CompileResult> {
        let filename = url.path();
        let allocator = Allocator::default();

        let ret = Parser::new(&allocator, source, source_type_for(filename)).parse();
        if ret.panicked || !ret.errors.is_empty() {
            return Err(transform_error(url, "syntax error", &ret.errors));
        }
        let mut program = ret.program;

        let scoping = SemanticBuilder::new()
            .build(&program)
            .semantic
            .into_scoping();

        let ret = oxc_transformer::Transformer::new(&allocator, Path::new(filename), &self.options)
            .build_with_scoping(scoping, &mut program);
        if !ret.errors.is_empty() {
            return Err(transform_error(url, "transform error", &ret.errors));
        }

        let mut rewriter = SpecifierRewriter {
            allocator: &allocator,
            rewrite,
            rewritten: 0,
        };
        rewriter.visit_program(&mut program);
        let rewritten = rewriter.rewritten;

        let code = Codegen::new().build(&program).code;
        tracing::debug!(url = %url, rewritten, bytes = code.len(), "module compiled");

        Ok(CompileResult { code, rewritten })
    }
}

fn transform_error<E: Display>(url: &Url, kind: &str, errors: &[E]) -> LoaderError {
    let details = errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ");
    let message = if details.is_empty() {
        kind.to_string()
    } else {
        format!("{kind}: {details}")
    };
    LoaderError::Transform {
        url: url.clone(),
        message,
    }
}

struct SpecifierRewriter<'a, 'r> {
    allocator: &'a Allocator,
    rewrite: &'r RewriteFn<'r>,
    rewritten: usize,
}

impl<'a> SpecifierRewriter<'a, '_> {
    fn rewrite_literal(&mut self, lit: &mut StringLiteral<'a>) {
        let Some(target) = (self.rewrite)(lit.value.as_str()) else {
            return;
        };
        let value: &'a str = self.allocator.alloc_str(&target);
        lit.value = Atom::from(value);
        // codegen must print the new value, not the original token
        lit.raw = None;
        self.rewritten += 1;
    }
}

impl<'a> VisitMut<'a> for SpecifierRewriter<'a, '_> {
    fn visit_import_declaration(&mut self, it: &mut ImportDeclaration<'a>) {
        self.rewrite_literal(&mut it.source);
        walk_mut::walk_import_declaration(self, it);
    }

    fn visit_export_all_declaration(&mut self, it: &mut ExportAllDeclaration<'a>) {
        self.rewrite_literal(&mut it.source);
        walk_mut::walk_export_all_declaration(self, it);
    }

    fn visit_export_named_declaration(&mut self, it: &mut ExportNamedDeclaration<'a>) {
        if let Some(source) = it.source.as_mut() {
            self.rewrite_literal(source);
        }
        walk_mut::walk_export_named_declaration(self, it);
    }

    fn visit_import_expression(&mut self, it: &mut ImportExpression<'a>) {
        if let Expression::StringLiteral(lit) = &mut it.source {
            self.rewrite_literal(lit);
        }
        walk_mut::walk_import_expression(self, it);
    }
}
