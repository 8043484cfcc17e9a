//! Web dashboard for a distributed MAPE-K control loop.
//!
//! Reads execution state and node logs from Redis, keeps the timeline and
//! trust views current, and serves them to the browser over HTTP.

pub mod config;
pub mod control;
pub mod devices;
pub mod file_server;
pub mod logs;
pub mod monitor;
pub mod redis_store;
pub mod subscriber;

use tracing_subscriber::{fmt, EnvFilter};

pub use config::{ConfigOverrides, DashboardConfig};
pub use file_server::FileServer;
pub use redis_store::RedisStore;

/// Install the global fmt subscriber. `RUST_LOG` overrides the `info` default.
pub fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

/// Resolves on Ctrl-C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
