//! Redis-backed store shared with the producer.

use anyhow::Context;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use mapek_protocol::{keys, ExecutionInterval, SubjectId};
use mapek_state::{CurrentExecutionRaw, ExecutionStore, StoreError};

fn transport(e: redis::RedisError) -> StoreError {
    StoreError::Transport(e.to_string())
}

#[derive(Clone)]
pub struct RedisStore {
    client: redis::Client,
    manager: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url.to_string())
            .with_context(|| format!("failed to open redis client for {redis_url}"))?;
        let manager = client
            .get_connection_manager()
            .await
            .context("failed to connect to redis")?;
        Ok(Self { client, manager })
    }

    /// Client used to open dedicated pub/sub connections.
    pub fn client(&self) -> &redis::Client {
        &self.client
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.manager.clone();
        conn.get(key).await.map_err(transport)
    }

    pub async fn list(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.manager.clone();
        conn.lrange(key, 0, -1).await.map_err(transport)
    }

    /// Last `count` elements of a list, oldest first.
    pub async fn list_tail(&self, key: &str, count: usize) -> Result<Vec<String>, StoreError> {
        let mut conn = self.manager.clone();
        let start = -(count.max(1) as isize);
        conn.lrange(key, start, -1).await.map_err(transport)
    }

    pub async fn devices(&self) -> Result<Vec<String>, StoreError> {
        self.list(keys::DEVICES_LIST).await
    }

    pub async fn nodes(&self, device: &str) -> Result<Vec<String>, StoreError> {
        self.list(&keys::device_nodes(device)).await
    }

    /// Keys matching `pattern`, collected with cursor-based SCAN.
    pub async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.manager.clone();
        let mut cursor: u64 = 0;
        let mut found = Vec::new();
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(200)
                .query_async(&mut conn)
                .await
                .map_err(transport)?;
            found.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        found.sort();
        found.dedup();
        Ok(found)
    }

    /// Publish and return the number of receiving subscribers.
    pub async fn publish(&self, channel: &str, payload: &str) -> Result<i64, StoreError> {
        let mut conn = self.manager.clone();
        conn.publish(channel, payload).await.map_err(transport)
    }

    /// Remove `node` from a device's node list. Returns the number removed.
    pub async fn remove_node(&self, device: &str, node: &str) -> Result<i64, StoreError> {
        let mut conn = self.manager.clone();
        conn.lrem(keys::device_nodes(device), 0, node)
            .await
            .map_err(transport)
    }
}

impl ExecutionStore for RedisStore {
    async fn subjects(&self) -> Result<Vec<SubjectId>, StoreError> {
        let mut subjects = Vec::new();
        for device in self.devices().await? {
            for node in self.nodes(&device).await? {
                subjects.push(SubjectId::new(device.clone(), node));
            }
        }
        Ok(subjects)
    }

    async fn execution_history(&self, subject: &SubjectId) -> Result<Vec<String>, StoreError> {
        self.list(&keys::execution_history(subject)).await
    }

    async fn current_execution(&self, subject: &SubjectId) -> Result<CurrentExecutionRaw, StoreError> {
        let status = self.get(&keys::status(subject)).await?;
        if let Some(start) = self.get(&keys::start_execution(subject)).await? {
            return Ok(CurrentExecutionRaw {
                execution_time: self.get(&keys::execution_time(subject)).await?,
                start_execution: Some(start),
                status,
            });
        }
        Ok(CurrentExecutionRaw {
            execution_time: self.get(&keys::legacy_execution_time(&subject.node)).await?,
            start_execution: self.get(&keys::legacy_start_execution(&subject.node)).await?,
            status,
        })
    }

    async fn push_history(&self, interval: &ExecutionInterval, cap: usize) -> Result<(), StoreError> {
        let entry = interval
            .encode_history_entry()
            .map_err(|e| StoreError::Encoding(e.to_string()))?;
        let key = keys::execution_history(&interval.subject);
        let stop = cap.max(1) as isize - 1;
        let mut conn = self.manager.clone();
        let _: () = redis::pipe()
            .atomic()
            .lpush(&key, entry)
            .ignore()
            .ltrim(&key, 0, stop)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(transport)?;
        Ok(())
    }
}
