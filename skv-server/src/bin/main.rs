//! # Server Bootstrap
//!
//! Parses `-p=`/`-n=`/`-s=` flags, stands up the shard pool and HTTP front
//! end, and shuts both down cleanly on `SIGINT`/`SIGTERM`.
//!
//! Flags are parsed by hand rather than with a strict argument-parsing
//! crate: unknown flags and unparsable values are silently ignored in
//! favor of their defaults, which a validating parser would instead reject.

use std::env;
use std::process::ExitCode;
use std::sync::Arc;

use skv_server::metrics::Metrics;
use skv_server::{build_router, AppState};
use tokio_util::sync::CancellationToken;

const DEFAULT_PORT: u16 = 8089;
const DEFAULT_SHARD_COUNT: usize = 3;
const DEFAULT_SHARD_CAPACITY: usize = 50;

struct ServerConfig {
    port: u16,
    shard_count: usize,
    shard_capacity: usize,
}

impl ServerConfig {
    fn from_args() -> Self {
        Self::from_iter(env::args().skip(1))
    }

    fn from_iter(args: impl Iterator<Item = String>) -> Self {
        let mut config = ServerConfig {
            port: DEFAULT_PORT,
            shard_count: DEFAULT_SHARD_COUNT,
            shard_capacity: DEFAULT_SHARD_CAPACITY,
        };

        for arg in args {
            if let Some(value) = arg.strip_prefix("-p=") {
                if let Ok(port) = value.parse() {
                    config.port = port;
                }
            } else if let Some(value) = arg.strip_prefix("-n=") {
                if let Ok(count) = value.parse::<usize>() {
                    if count >= 1 {
                        config.shard_count = count;
                    }
                }
            } else if let Some(value) = arg.strip_prefix("-s=") {
                if let Ok(capacity) = value.parse::<usize>() {
                    if capacity >= 1 {
                        config.shard_capacity = capacity;
                    }
                }
            }
            // Unrecognized flags are ignored rather than rejected.
        }

        config
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let config = ServerConfig::from_args();
    let cancel = CancellationToken::new();

    let dispatcher = skv_core::build_cache(config.shard_count, config.shard_capacity, cancel.clone());
    let state = AppState {
        dispatcher: Arc::new(dispatcher),
        metrics: Arc::new(Metrics::new()),
    };

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(%addr, error = %err, "failed to bind listener");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(%addr, shards = config.shard_count, capacity = config.shard_capacity, "cache server listening");

    let router = build_router(state);
    let shutdown_signal = shutdown_on_signal(cancel.clone());

    let serve_result = axum::serve(listener, router).with_graceful_shutdown(shutdown_signal).await;

    if let Err(err) = serve_result {
        tracing::error!(error = %err, "server exited with an error");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Resolves once `SIGINT` or `SIGTERM` is observed, firing `cancel` so that
/// every shard task exits along with the HTTP listener.
async fn shutdown_on_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        let mut signal = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).expect("failed to install SIGTERM handler");
        signal.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("shutdown signal received");
    cancel.cancel();
}
