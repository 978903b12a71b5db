use ember_core::parser::{extract_dependencies, scan, scan_imports_regex, scan_refs, ImportRef};
use ember_core::ScanMode;

#[test]
fn test_import_parsing() {
    let source = r#"
        import React from "react";
        import { greet } from "./util";
        import * as theme from '../shared/theme.js';
        import "./styles.js";
        export { Card } from "./Card.jsx";
        export * from "./helpers";
        const lazy = () => import("./Chart.jsx");

        export default function Main() {
            return <h1>{greet()}</h1>;
        }
    "#;

    let deps = extract_dependencies(source, "/deck/main.jsx");

    assert_eq!(
        deps,
        vec![
            "react",
            "./util",
            "../shared/theme.js",
            "./styles.js",
            "./Card.jsx",
            "./helpers",
            "./Chart.jsx",
        ]
    );
}

#[test]
fn test_duplicates_keep_first_position() {
    let source = r#"
        import { a } from "./util";
        import { b } from "./other";
        import { c } from "./util";
    "#;

    assert_eq!(extract_dependencies(source, "/x.js"), vec!["./util", "./other"]);
}

#[test]
fn test_ignores_comments_strings_and_computed_imports() {
    let source = r#"
        // import nope from "./commented";
        /* import { also } from "./block"; */
        const text = "import fake from './in-a-string'";
        const name = "./dynamic";
        const mod = import(name);
        import real from "./real";
    "#;

    assert_eq!(extract_dependencies(source, "/x.jsx"), vec!["./real"]);
}

#[test]
fn test_jsx_in_plain_js_file() {
    let source = r#"
        import Title from "./Title";
        export const Slide = () => <section><Title /></section>;
    "#;

    assert_eq!(extract_dependencies(source, "/deck/slide.js"), vec!["./Title"]);
}

#[test]
fn test_typescript_modules() {
    let source = r#"
        import type { Props } from "./types";
        import { Box } from "./Box";
        export const width: number = 3;
    "#;

    let deps = extract_dependencies(source, "/deck/layout.tsx");
    assert!(deps.contains(&"./Box".to_string()));
    assert!(deps.contains(&"./types".to_string()));
}

#[test]
fn test_parse_error_yields_no_dependencies() {
    let source = "import { broken from './util';\nexport default <div>";

    assert!(extract_dependencies(source, "/broken.jsx").is_empty());
}

#[test]
fn test_dynamic_flag() {
    let source = r#"
        import { eager } from "./eager";
        const later = () => import("./later");
        const both = () => import("./both");
        import "./both";
    "#;

    let refs = scan_refs(source, "/x.js", ScanMode::Ast);

    assert_eq!(
        refs,
        vec![
            ImportRef {
                specifier: "./eager".to_string(),
                dynamic: false
            },
            ImportRef {
                specifier: "./later".to_string(),
                dynamic: true
            },
            ImportRef {
                specifier: "./both".to_string(),
                dynamic: false
            },
        ]
    );
}

#[test]
fn test_regex_scanner() {
    let source = r#"
        import React from 'react';
        import { greet } from "./util";
        import "./side-effect.js";
        // import commented from "./commented";
        /* import block from "./block"; */
        export * from "./all";
        export { x as y } from "./named";
        const Chart = () => import("./Chart.jsx");
    "#;

    assert_eq!(
        scan_imports_regex(source),
        vec![
            "react",
            "./util",
            "./side-effect.js",
            "./all",
            "./named",
            "./Chart.jsx",
        ]
    );
}

#[test]
fn test_regex_scanner_keeps_urls_in_strings() {
    // a `//` inside a URL must not be taken for a comment
    let source = r#"
        const api = "https://example.test/api";
        import data from "./data.js";
    "#;

    assert_eq!(scan_imports_regex(source), vec!["./data.js"]);
}

#[test]
fn test_scan_dispatches_on_mode() {
    let source = "import a from './a';\nconst b = () => import('./b');";

    assert_eq!(scan(source, "/x.js", ScanMode::Ast), vec!["./a", "./b"]);
    assert_eq!(scan(source, "/x.js", ScanMode::Regex), vec!["./a", "./b"]);

    let refs = scan_refs(source, "/x.js", ScanMode::Regex);
    assert!(!refs[0].dynamic);
    assert!(refs[1].dynamic);
}
