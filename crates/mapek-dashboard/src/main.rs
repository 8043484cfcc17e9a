use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::{watch, RwLock};

use mapek_dashboard::monitor::{run_monitor_loop, DashboardState};
use mapek_dashboard::subscriber::spawn_trust_listener;
use mapek_dashboard::{init_tracing, shutdown_signal, ConfigOverrides, DashboardConfig, FileServer, RedisStore};
use mapek_state::{TimelineAggregator, TrustBuffer};

/// Serve the MAPE-K monitoring dashboard.
#[derive(Debug, Parser)]
#[command(name = "mapek-dashboard", version, about)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, short, env = "MAPEK_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: ConfigOverrides,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = DashboardConfig::load(cli.config.as_deref()).context("failed to load config")?;
    cli.overrides.apply(&mut config).context("invalid configuration")?;

    let redis_url = config.redis.connection_url();
    let store = RedisStore::connect(&redis_url).await?;
    tracing::info!(
        redis = %redis_url,
        channel = %config.trust.channel,
        filter = ?config.timeline.status_filter,
        "Connected to redis"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let trust = Arc::new(TrustBuffer::new(config.trust.display_secs));
    let listener = spawn_trust_listener(
        store.client().clone(),
        config.trust.clone(),
        Arc::clone(&trust),
        shutdown_rx.clone(),
    );

    let state = Arc::new(RwLock::new(DashboardState::new()));
    let aggregator = Arc::new(TimelineAggregator::new(
        Arc::new(store.clone()),
        config.timeline.status_filter,
    ));
    let monitor = tokio::spawn(run_monitor_loop(
        aggregator,
        store.clone(),
        Arc::clone(&state),
        Duration::from_millis(config.timeline.tick_millis),
        Duration::from_millis(config.timeline.cards_millis),
        shutdown_rx.clone(),
    ));

    let server = FileServer::new(
        &config,
        state,
        trust,
        listener.alive_flag(),
        store,
        shutdown_rx.clone(),
    );
    let mut server_task = tokio::spawn(server.run());

    let server_result = tokio::select! {
        _ = shutdown_signal() => {
            tracing::info!("Shutdown requested");
            let _ = shutdown_tx.send(true);
            (&mut server_task).await
        }
        res = &mut server_task => res,
    };
    match server_result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "HTTP server failed"),
        Err(e) => tracing::error!(error = %e, "HTTP server task panicked"),
    }

    let _ = shutdown_tx.send(true);
    listener.join().await;
    if let Err(e) = monitor.await {
        tracing::error!(error = %e, "Monitor task panicked");
    }
    tracing::info!("Dashboard stopped");
    Ok(())
}
