//! Shared fixtures: a minimal RESP server standing in for Redis, and a
//! dashboard wired against it.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, RwLock};

use mapek_dashboard::monitor::DashboardState;
use mapek_dashboard::{DashboardConfig, FileServer, RedisStore};
use mapek_state::TrustBuffer;

pub const INDEX_MARKER: &str = "<!-- mapek test index -->";

fn read_line(buf: &[u8], pos: usize) -> Option<(&[u8], usize)> {
    let rest = buf.get(pos..)?;
    let end = rest.windows(2).position(|w| w == b"\r\n")?;
    Some((&rest[..end], pos + end + 2))
}

/// Parse one RESP array command. Returns the arguments and bytes consumed.
fn parse_command(buf: &[u8]) -> Option<(Vec<String>, usize)> {
    let (header, mut pos) = read_line(buf, 0)?;
    let count: usize = std::str::from_utf8(header.strip_prefix(b"*")?).ok()?.parse().ok()?;
    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        let (len_line, next) = read_line(buf, pos)?;
        let len: usize = std::str::from_utf8(len_line.strip_prefix(b"$")?).ok()?.parse().ok()?;
        let body = buf.get(next..next + len)?;
        if buf.len() < next + len + 2 {
            return None;
        }
        args.push(String::from_utf8_lossy(body).into_owned());
        pos = next + len + 2;
    }
    Some((args, pos))
}

fn bulk(s: &str) -> String {
    format!("${}\r\n{}\r\n", s.len(), s)
}

fn array(items: &[&str]) -> String {
    let mut out = format!("*{}\r\n", items.len());
    for item in items {
        out.push_str(&bulk(item));
    }
    out
}

fn reply(args: &[String]) -> String {
    let cmd = args.first().map(|c| c.to_ascii_uppercase()).unwrap_or_default();
    match cmd.as_str() {
        "PING" => "+PONG\r\n".to_string(),
        "PUBLISH" | "LREM" => ":1\r\n".to_string(),
        "GET" => "$-1\r\n".to_string(),
        "LRANGE" if args.get(1).is_some_and(|k| k.ends_with(":logs")) => array(&["line-1", "line-2"]),
        "LRANGE" => "*0\r\n".to_string(),
        "SCAN" => format!("*2\r\n{}{}", bulk("0"), array(&["devices:list", "devices:Device1:nodes"])),
        _ => "+OK\r\n".to_string(),
    }
}

async fn serve_connection(mut socket: TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        buf.extend_from_slice(&chunk[..n]);
        let mut out = String::new();
        while let Some((args, used)) = parse_command(&buf) {
            out.push_str(&reply(&args));
            buf.drain(..used);
        }
        if !out.is_empty() && socket.write_all(out.as_bytes()).await.is_err() {
            return;
        }
    }
}

/// Start the fake server and return its URL.
pub async fn spawn_fake_redis() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(serve_connection(socket));
        }
    });
    format!("redis://{addr}/0")
}

pub struct TestDashboard {
    pub server: FileServer,
    pub state: Arc<RwLock<DashboardState>>,
    pub trust: Arc<TrustBuffer>,
    pub listener_alive: Arc<AtomicBool>,
    pub shutdown: watch::Sender<bool>,
    pub dir: tempfile::TempDir,
}

pub async fn test_dashboard() -> TestDashboard {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("index.html"),
        format!("<html>{INDEX_MARKER}</html>"),
    )
    .unwrap();

    let mut config = DashboardConfig::default();
    config.server.webapp_dir = Some(dir.path().to_path_buf());
    config.logs.file = dir.path().join("MAPE_test.log");

    let store = RedisStore::connect(&spawn_fake_redis().await).await.unwrap();
    let state = Arc::new(RwLock::new(DashboardState::new()));
    let trust = Arc::new(TrustBuffer::default());
    let listener_alive = Arc::new(AtomicBool::new(true));
    let (shutdown, shutdown_rx) = watch::channel(false);

    let server = FileServer::new(
        &config,
        Arc::clone(&state),
        Arc::clone(&trust),
        Arc::clone(&listener_alive),
        store,
        shutdown_rx,
    );
    TestDashboard {
        server,
        state,
        trust,
        listener_alive,
        shutdown,
        dir,
    }
}
