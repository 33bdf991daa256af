//! WASI HTTP server entry point for the rendezvous relay
//!
//! This module provides the main entry point when running as a WASI HTTP component
//! using `wasmtime serve`.

use rendezvous_server_wasm::{ServerConfig, ServerState, handle_request};
use std::cell::RefCell;
use tracing_subscriber::EnvFilter;
use wstd::http::{Body, Request, Response};

// Thread-local state for the server (WASI is single-threaded)
thread_local! {
    static STATE: RefCell<Option<ServerState>> = const { RefCell::new(None) };
}

fn init_logging(config: &ServerConfig) {
    let filter = EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn get_or_init_state() -> ServerState {
    STATE.with(|s| {
        s.borrow_mut()
            .get_or_insert_with(|| {
                let loaded = ServerConfig::from_env();
                let config = loaded.clone().unwrap_or_default();
                init_logging(&config);
                if let Err(e) = loaded {
                    tracing::warn!("Invalid configuration, using defaults: {}", e);
                }
                tracing::info!("Rendezvous relay state initialized");
                ServerState::with_config(config)
            })
            .clone()
    })
}

/// The main HTTP handler for WASI
///
/// This function is called by the WASI runtime for each incoming HTTP request.
#[wstd::http_server]
async fn main(request: Request<Body>) -> Result<Response<Body>, wstd::http::Error> {
    let state = get_or_init_state();
    handle_request(request, &state).await
}
