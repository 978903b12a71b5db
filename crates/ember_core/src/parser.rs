use indexmap::IndexMap;
use once_cell::sync::Lazy;
use oxc_allocator::Allocator;
use oxc_ast::ast::{
    ExportAllDeclaration, ExportNamedDeclaration, Expression, ImportDeclaration, ImportExpression,
    StringLiteral,
};
use oxc_ast_visit::{walk, Visit};
use oxc_parser::Parser;
use oxc_span::SourceType;
use regex::Regex;

use crate::config::ScanMode;

/// Source type for a module path. `.js` files are parsed with JSX enabled,
/// since authored slides routinely put JSX in plain `.js` files.
pub fn source_type_for(path: &str) -> SourceType {
    match SourceType::from_path(path) {
        Ok(st) if st.is_typescript() => st.with_module(true),
        Ok(st) => st.with_module(true).with_jsx(true),
        Err(_) => SourceType::mjs().with_jsx(true),
    }
}

/// One import specifier found in a module.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportRef {
    pub specifier: String,
    /// Only ever reached through `import()`, so it is not evaluated with the importer.
    pub dynamic: bool,
}

/// Import specifiers referenced by `source`, deduplicated, in order of first appearance.
pub fn scan(source: &str, path: &str, mode: ScanMode) -> Vec<String> {
    scan_refs(source, path, mode)
        .into_iter()
        .map(|r| r.specifier)
        .collect()
}

/// Like [`scan`], keeping whether each specifier is only imported dynamically.
pub fn scan_refs(source: &str, path: &str, mode: ScanMode) -> Vec<ImportRef> {
    match mode {
        ScanMode::Ast => extract_imports(source, path),
        ScanMode::Regex => scan_refs_regex(source),
    }
}

/// AST scan returning specifiers only.
pub fn extract_dependencies(source: &str, path: &str) -> Vec<String> {
    extract_imports(source, path)
        .into_iter()
        .map(|r| r.specifier)
        .collect()
}

/// AST scan. A source that does not parse yields no specifiers; the failure
/// surfaces again when the module is compiled.
pub fn extract_imports(source: &str, path: &str) -> Vec<ImportRef> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, source_type_for(path)).parse();

    if ret.panicked || !ret.errors.is_empty() {
        tracing::warn!(
            path,
            errors = ret.errors.len(),
            "parse failed while scanning imports, treating module as a leaf"
        );
        return Vec::new();
    }

    let mut collector = ImportSpecCollector::default();
    collector.visit_program(&ret.program);
    into_refs(collector.specs)
}

fn record(specs: &mut IndexMap<String, bool>, specifier: &str, dynamic: bool) {
    specs
        .entry(specifier.to_string())
        .and_modify(|only_dynamic| *only_dynamic = *only_dynamic && dynamic)
        .or_insert(dynamic);
}

fn into_refs(specs: IndexMap<String, bool>) -> Vec<ImportRef> {
    specs
        .into_iter()
        .map(|(specifier, dynamic)| ImportRef { specifier, dynamic })
        .collect()
}

#[derive(Debug, Default)]
struct ImportSpecCollector {
    specs: IndexMap<String, bool>,
}

impl ImportSpecCollector {
    fn push(&mut self, lit: &StringLiteral<'_>) {
        record(&mut self.specs, lit.value.as_str(), false);
    }

    fn push_dynamic(&mut self, lit: &StringLiteral<'_>) {
        record(&mut self.specs, lit.value.as_str(), true);
    }
}

impl<'a> Visit<'a> for ImportSpecCollector {
    fn visit_import_declaration(&mut self, it: &ImportDeclaration<'a>) {
        self.push(&it.source);
        walk::walk_import_declaration(self, it);
    }

    fn visit_export_all_declaration(&mut self, it: &ExportAllDeclaration<'a>) {
        self.push(&it.source);
        walk::walk_export_all_declaration(self, it);
    }

    fn visit_export_named_declaration(&mut self, it: &ExportNamedDeclaration<'a>) {
        if let Some(source) = it.source.as_ref() {
            self.push(source);
        }
        walk::walk_export_named_declaration(self, it);
    }

    fn visit_import_expression(&mut self, it: &ImportExpression<'a>) {
        if let Expression::StringLiteral(lit) = &it.source {
            self.push_dynamic(lit);
        }
        walk::walk_import_expression(self, it);
    }
}

static BLOCK_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)/\*.*?\*/").unwrap());
static LINE_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)(^|[^:\\])//.*$").unwrap());

static STATIC_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:^|[;\s])import\s*(?:[\w$*{}\s,]+?\s*from\s*)?["']([^"'\n]+)["']"#).unwrap()
});
static DYNAMIC_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:^|[^\w$.])import\s*\(\s*["']([^"'\n]+)["']\s*\)"#).unwrap()
});
static EXPORT_FROM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?:^|[;\s])export\s*(?:\*(?:\s*as\s+[\w$]+)?|\{[^}]*\})\s*from\s*["']([^"'\n]+)["']"#,
    )
    .unwrap()
});

/// Text scan used when the AST scanner is switched off. Comments are stripped
/// first; an `import` keyword glued to a quote is not accepted, which keeps
/// most import-looking string literals out.
pub fn scan_imports_regex(source: &str) -> Vec<String> {
    scan_refs_regex(source)
        .into_iter()
        .map(|r| r.specifier)
        .collect()
}

pub fn scan_refs_regex(source: &str) -> Vec<ImportRef> {
    let without_blocks = BLOCK_COMMENT.replace_all(source, " ");
    let text = LINE_COMMENT.replace_all(&without_blocks, "$1");

    let mut found: Vec<(usize, String, bool)> = [
        (&*STATIC_IMPORT, false),
        (&*DYNAMIC_IMPORT, true),
        (&*EXPORT_FROM, false),
    ]
    .into_iter()
    .flat_map(|(re, dynamic)| {
        re.captures_iter(&text)
            .filter_map(|caps| caps.get(1))
            .map(move |m| (m.start(), m.as_str().to_string(), dynamic))
            .collect::<Vec<_>>()
    })
    .collect();
    found.sort_by_key(|(offset, _, _)| *offset);

    let mut specs = IndexMap::new();
    for (_, specifier, dynamic) in found {
        record(&mut specs, &specifier, dynamic);
    }
    into_refs(specs)
}
