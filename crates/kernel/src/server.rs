//! Static file server using Axum
//!
//! Serves a module tree the way the loader expects a static host to: raw
//! sources with their own content types, 404 for unknown paths, or, with
//! `spa_fallback`, `index.html` for unknown paths.

use axum::Router;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

#[derive(Clone, Debug)]
pub struct ServeOptions {
    pub root: PathBuf,
    /// Answer unknown paths with `root/index.html` instead of a 404.
    pub spa_fallback: bool,
}

impl ServeOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            spa_fallback: false,
        }
    }

    pub fn with_spa_fallback(mut self, enabled: bool) -> Self {
        self.spa_fallback = enabled;
        self
    }
}

pub fn router(options: &ServeOptions) -> Router {
    let serve_dir = ServeDir::new(&options.root);
    let app = if options.spa_fallback {
        let index = ServeFile::new(options.root.join("index.html"));
        Router::new().fallback_service(serve_dir.fallback(index))
    } else {
        Router::new().fallback_service(serve_dir)
    };
    app.layer(TraceLayer::new_for_http())
}

pub struct DevServer {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl DevServer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Absolute URL for `path` on this server.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}/{}", self.addr, path.trim_start_matches('/'))
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.handle.await {
            tracing::error!("server task failed: {}", e);
        }
    }
}

/// Binds `addr` (port 0 picks a free port) and serves in a background task.
pub async fn start_dev_server(addr: SocketAddr, options: ServeOptions) -> anyhow::Result<DevServer> {
    let listener = TcpListener::bind(addr).await?;
    let addr = listener.local_addr()?;
    let app = router(&options);

    tracing::info!("listening on {}", addr);
    tracing::info!("serving root: {}", options.root.display());

    let (shutdown, signal) = oneshot::channel::<()>();
    let handle = tokio::spawn(async move {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = signal.await;
            })
            .await;
        if let Err(e) = result {
            tracing::error!("server error: {}", e);
        }
    });

    Ok(DevServer {
        addr,
        shutdown,
        handle,
    })
}
