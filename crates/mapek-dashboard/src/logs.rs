//! Tail of the MAPE-K log file for the live log panel.

use std::io::SeekFrom;
use std::path::Path;

use tokio::io::{AsyncReadExt, AsyncSeekExt};

pub const LOG_NOT_FOUND: &str = "Log file not found.";

const TAIL_CHUNK_BYTES: u64 = 8 * 1024;
const TAIL_MAX_BYTES: usize = 1024 * 1024;

/// Last `count` lines of `text`.
pub fn tail_lines(text: &str, count: usize) -> Vec<&str> {
    let lines: Vec<&str> = text.lines().collect();
    let skip = lines.len().saturating_sub(count);
    lines[skip..].to_vec()
}

/// Read chunks backwards from the end of the file until `count` full lines
/// are covered, the start of the file is reached, or `max_bytes` is read.
async fn read_tail_bytes(
    path: &Path,
    count: usize,
    chunk_bytes: u64,
    max_bytes: usize,
) -> std::io::Result<Vec<u8>> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut pos = file.metadata().await?.len();
    let mut buf: Vec<u8> = Vec::new();

    while pos > 0 && buf.len() < max_bytes {
        let step = chunk_bytes.max(1).min(pos);
        pos -= step;
        file.seek(SeekFrom::Start(pos)).await?;
        let mut chunk = vec![0u8; step as usize];
        file.read_exact(&mut chunk).await?;
        chunk.extend_from_slice(&buf);
        buf = chunk;

        if buf.iter().filter(|b| **b == b'\n').count() > count {
            break;
        }
    }

    // Drop the partial first line when reading stopped mid-file.
    if pos > 0 {
        if let Some(i) = buf.iter().position(|b| *b == b'\n') {
            buf.drain(..=i);
        }
    }
    Ok(buf)
}

/// Last `count` lines of the file joined for display.
///
/// A missing file yields [`LOG_NOT_FOUND`]; other read errors are returned.
pub async fn read_log_tail(path: &Path, count: usize) -> std::io::Result<String> {
    read_log_tail_with(path, count, TAIL_CHUNK_BYTES, TAIL_MAX_BYTES).await
}

async fn read_log_tail_with(
    path: &Path,
    count: usize,
    chunk_bytes: u64,
    max_bytes: usize,
) -> std::io::Result<String> {
    match read_tail_bytes(path, count, chunk_bytes, max_bytes).await {
        Ok(bytes) => {
            let text = String::from_utf8_lossy(&bytes);
            let mut out = tail_lines(&text, count).join("\n");
            if !out.is_empty() {
                out.push('\n');
            }
            Ok(out)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(LOG_NOT_FOUND.to_string()),
        Err(e) => Err(e),
    }
}
