mod common;

use ember_core::{HttpFetcher, Loader, LoaderConfig, LoaderError, MemoryBlobStore, StaticExecutor};
use kernel::{start_dev_server, DevServer, ServeOptions};
use std::fs;
use std::net::SocketAddr;
use std::rc::Rc;
use url::Url;

fn deck() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("components")).unwrap();
    fs::write(root.join("index.html"), "<!doctype html><div id=root></div>").unwrap();
    fs::write(
        root.join("main.jsx"),
        r#"import React from "react";
import { greet } from "./util";
import Card from "./components/Card";

export default function Main() {
  return <Card title={greet()} />;
}
"#,
    )
    .unwrap();
    fs::write(root.join("util.js"), "export const greet = () => \"hello\";\n").unwrap();
    fs::write(
        root.join("components/Card.jsx"),
        "export default ({ title }) => <section>{title}</section>;\n",
    )
    .unwrap();
    fs::write(
        root.join("broken.jsx"),
        "import { nope } from \"./does-not-exist.js\";\nexport default nope;\n",
    )
    .unwrap();
    dir
}

async fn serve(dir: &tempfile::TempDir, spa_fallback: bool) -> DevServer {
    common::init_tracing();
    let options = ServeOptions::new(dir.path()).with_spa_fallback(spa_fallback);
    start_dev_server(SocketAddr::from(([127, 0, 0, 1], 0)), options)
        .await
        .expect("dev server starts")
}

fn loader() -> (Loader<StaticExecutor>, Rc<MemoryBlobStore>) {
    let blobs = Rc::new(MemoryBlobStore::default());
    let loader = Loader::new(
        LoaderConfig::default(),
        Rc::new(HttpFetcher::new()),
        blobs.clone(),
        StaticExecutor::new(blobs.clone()),
    );
    (loader, blobs)
}

#[tokio::test]
async fn test_load_deck_over_http() {
    let dir = deck();
    let server = serve(&dir, false).await;
    let (loader, blobs) = loader();

    let module = loader
        .load_module(&server.url("main.jsx"))
        .await
        .expect("deck loads over http");

    assert!(module.has_export("default"));
    assert_eq!(blobs.len(), 3);

    let card = Url::parse(&server.url("components/Card.jsx")).unwrap();
    let util = Url::parse(&server.url("util.js")).unwrap();
    let main_code = &module.code;
    assert!(main_code.contains(&loader.cache().blob_url(&card).unwrap()));
    assert!(main_code.contains(&loader.cache().blob_url(&util).unwrap()));
    assert!(!main_code.contains("./components/Card"));

    server.shutdown().await;
}

#[tokio::test]
async fn test_probing_behind_spa_fallback() {
    let dir = deck();
    let server = serve(&dir, true).await;
    let (loader, _blobs) = loader();

    loader.load_module(&server.url("main.jsx")).await.unwrap();

    // util.jsx answers with index.html and must not be taken for the module
    let requested = Url::parse(&server.url("util")).unwrap();
    assert_eq!(
        loader.cache().resolution(&requested),
        Some(Url::parse(&server.url("util.js")).unwrap())
    );

    server.shutdown().await;
}

#[tokio::test]
async fn test_missing_file_behind_spa_fallback() {
    let dir = deck();
    let server = serve(&dir, true).await;
    let (loader, _blobs) = loader();

    let err = loader.load_module(&server.url("broken.jsx")).await.unwrap_err();

    match err {
        LoaderError::Failed { url, cause } => {
            assert!(url.path().ends_with("/does-not-exist.js"));
            assert!(matches!(*cause, LoaderError::HtmlFallback { .. }));
        }
        other => panic!("expected a deferred failure, got {other:?}"),
    }

    server.shutdown().await;
}

#[tokio::test]
async fn test_missing_file_without_fallback() {
    let dir = deck();
    let server = serve(&dir, false).await;
    let (loader, _blobs) = loader();

    let err = loader.load_module(&server.url("broken.jsx")).await.unwrap_err();

    assert!(err.to_string().contains("does-not-exist.js"));
    match err {
        LoaderError::Failed { cause, .. } => assert!(cause.is_not_found()),
        other => panic!("expected a deferred failure, got {other:?}"),
    }

    server.shutdown().await;
}
