//! Kernel - development server for ember module trees

pub mod server;

pub use server::{router, start_dev_server, DevServer, ServeOptions};

use std::sync::Once;

static INIT: Once = Once::new();

/// Installs the fmt subscriber, filtered by `RUST_LOG`. Safe to call more than once.
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}
