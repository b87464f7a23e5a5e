use crate::SequenceAllocator;
use anyhow::{anyhow, Context, Result};
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use std::time::Duration;

/// `INCRBY` on a Redis key per counter.
#[derive(Clone)]
pub struct RedisAllocator {
    conn: MultiplexedConnection,
    timeout: Duration,
}

impl RedisAllocator {
    /// Connect and `PING` once so a bad endpoint fails before the run starts.
    /// `timeout` bounds each later `INCRBY`.
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self> {
        let client = redis::Client::open(url).context("invalid redis url")?;
        let mut conn = client
            .get_multiplexed_async_connection()
            .await
            .context("redis connect failed")?;
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .context("redis ping failed")?;
        tracing::debug!(reply = %pong, "redis allocator connected");
        Ok(Self { conn, timeout })
    }
}

#[async_trait::async_trait]
impl SequenceAllocator for RedisAllocator {
    fn backend(&self) -> &'static str {
        "redis"
    }

    async fn reserve(&self, counter: &str, count: u64) -> Result<i64> {
        let delta = i64::try_from(count).context("reservation size does not fit in i64")?;
        let mut conn = self.conn.clone();
        let end: i64 = tokio::time::timeout(self.timeout, conn.incr(counter, delta))
            .await
            .map_err(|_| anyhow!("redis INCRBY {counter} timed out after {}ms", self.timeout.as_millis()))?
            .with_context(|| format!("redis INCRBY {counter} failed"))?;
        Ok(end)
    }
}
