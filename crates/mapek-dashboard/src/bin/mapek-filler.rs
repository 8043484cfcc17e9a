//! Demo producer: populates Redis with synthetic devices, executions, logs
//! and trust events so the dashboard has something to show.

use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use rand::seq::SliceRandom;
use rand::Rng;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use mapek_dashboard::{init_tracing, shutdown_signal};
use mapek_protocol::{keys, SubjectId, DEFAULT_TRUST_CHANNEL};

const DEVICES: [&str; 3] = ["Device1", "Device2", "Device3"];
const NODES: [&str; 5] = ["Monitor", "Execute", "Analysis", "Plan", "Legitimate"];
const NODE_LOG_RETAIN: isize = 200;

#[derive(Debug, Parser)]
#[command(name = "mapek-filler", version, about = "Populate Redis with demo MAPE-K data")]
struct Cli {
    #[arg(long, env = "REDIS_URL")]
    redis_url: Option<String>,

    #[arg(long, env = "REDIS_HOST", default_value = "localhost")]
    redis_host: String,

    #[arg(long, env = "REDIS_PORT", default_value_t = 6379)]
    redis_port: u16,

    #[arg(long, env = "REDIS_DB", default_value_t = 0)]
    redis_db: i64,

    #[arg(long, env = "TRUST_CHANNEL", default_value = DEFAULT_TRUST_CHANNEL)]
    trust_channel: String,

    /// Pause between iterations, in milliseconds
    #[arg(long, default_value_t = 2_000)]
    period_millis: u64,
}

impl Cli {
    fn connection_url(&self) -> String {
        match &self.redis_url {
            Some(url) if !url.trim().is_empty() => url.clone(),
            _ => format!("redis://{}:{}/{}", self.redis_host, self.redis_port, self.redis_db),
        }
    }
}

async fn seed(conn: &mut ConnectionManager) -> redis::RedisResult<()> {
    let _: () = conn.del(keys::DEVICES_LIST).await?;
    for device in DEVICES {
        let _: () = conn.rpush(keys::DEVICES_LIST, device).await?;
        let nodes_key = keys::device_nodes(device);
        let _: () = conn.del(&nodes_key).await?;
        for node in NODES {
            let _: () = conn.rpush(&nodes_key, node).await?;
            let _: () = conn.set(keys::status(&SubjectId::new(device, node)), "paused").await?;
        }
    }
    Ok(())
}

/// Keys written for one execution. Never the shared `{node}:*` pair.
fn execution_fields(subject: &SubjectId, now: f64, duration: f64) -> [(String, String); 3] {
    [
        (keys::status(subject), "running".to_string()),
        (keys::execution_time(subject), duration.to_string()),
        (keys::start_execution(subject), now.to_string()),
    ]
}

async fn write_execution(
    conn: &mut ConnectionManager,
    subject: &SubjectId,
    now: f64,
    duration: f64,
) -> redis::RedisResult<()> {
    let mut pipe = redis::pipe();
    pipe.atomic();
    for (key, value) in execution_fields(subject, now, duration) {
        pipe.set(key, value).ignore();
    }
    let _: () = pipe.query_async(conn).await?;

    let log_key = keys::node_logs(&subject.node);
    let line = format!(
        "Test log entry from {} at {}",
        subject.node,
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    let _: () = conn.rpush(&log_key, line).await?;
    let _: () = conn.ltrim(&log_key, -NODE_LOG_RETAIN, -1).await?;
    Ok(())
}

async fn run(cli: Cli, mut conn: ConnectionManager) -> anyhow::Result<()> {
    seed(&mut conn).await.context("failed to seed devices")?;
    tracing::info!(devices = DEVICES.len(), nodes = NODES.len(), "Seeded device list");

    let period = Duration::from_millis(cli.period_millis);
    let mut last_trust_pub = 0.0_f64;
    let mut next_trust_gap = rand::thread_rng().gen_range(2.0..4.0);

    loop {
        let now = mapek_protocol::unix_now_secs();
        let (device, node, duration, trust_value) = {
            let mut rng = rand::thread_rng();
            let device = *DEVICES.choose(&mut rng).unwrap_or(&DEVICES[0]);
            let node = *NODES.choose(&mut rng).unwrap_or(&NODES[0]);
            let duration = (rng.gen_range(0.3..1.5_f64) * 1000.0).round() / 1000.0;
            (device, node, duration, rng.gen_bool(0.5))
        };

        if let Err(e) = conn.set::<_, _, ()>(keys::device_heartbeat(device), now).await {
            tracing::warn!(device, error = %e, "Heartbeat write failed");
        }
        tokio::time::sleep(Duration::from_millis(100)).await;

        let subject = SubjectId::new(device, node);
        match write_execution(&mut conn, &subject, now, duration).await {
            Ok(()) => tracing::debug!(subject = %subject, duration, "Execution written"),
            Err(e) => tracing::warn!(subject = %subject, error = %e, "Execution write failed"),
        }

        if now - last_trust_pub >= next_trust_gap {
            let payload = serde_json::json!({ "Bool": trust_value }).to_string();
            match conn.publish::<_, _, i64>(&cli.trust_channel, &payload).await {
                Ok(receivers) => tracing::info!(
                    channel = %cli.trust_channel,
                    payload = %payload,
                    receivers,
                    "Published trust event"
                ),
                Err(e) => tracing::warn!(channel = %cli.trust_channel, error = %e, "Trust publish failed"),
            }
            last_trust_pub = now;
            next_trust_gap = rand::thread_rng().gen_range(2.0..4.0);
        }

        tokio::time::sleep(period).await;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let url = cli.connection_url();
    let client = redis::Client::open(url.clone()).with_context(|| format!("invalid redis url {url}"))?;
    let conn = client
        .get_connection_manager()
        .await
        .context("failed to connect to redis")?;
    tracing::info!(redis = %url, channel = %cli.trust_channel, "Filler started");

    tokio::select! {
        res = run(cli, conn) => res?,
        _ = shutdown_signal() => tracing::info!("Filler stopped"),
    }
    Ok(())
}
