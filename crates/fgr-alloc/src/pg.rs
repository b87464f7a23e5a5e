use crate::SequenceAllocator;
use anyhow::{anyhow, Context, Result};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Counter table in Postgres (`sequence_counter(name, value)`).
///
/// Uses its own pool in autocommit mode, so a reservation is durable the moment
/// it returns and is not undone when a reconciliation transaction rolls back.
#[derive(Debug, Clone)]
pub struct PgAllocator {
    pool: PgPool,
    timeout: Duration,
}

impl PgAllocator {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Bound on one reservation, including waiting on another run's row lock.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Connect a small dedicated pool. `timeout` bounds both connection
    /// acquisition and each reservation; there is no retry.
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .acquire_timeout(timeout)
            .connect(url)
            .await
            .context("allocator failed to connect to Postgres")?;
        Ok(Self::new(pool).with_timeout(timeout))
    }
}

#[async_trait::async_trait]
impl SequenceAllocator for PgAllocator {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn reserve(&self, counter: &str, count: u64) -> Result<i64> {
        let delta = i64::try_from(count).context("reservation size does not fit in bigint")?;

        // Single statement: the row lock taken by the upsert serializes
        // concurrent reservations on the same counter.
        let increment = sqlx::query_as::<_, (i64,)>(
            r#"
            insert into sequence_counter (name, value)
            values ($1, $2)
            on conflict (name) do update
              set value = sequence_counter.value + excluded.value
            returning value
            "#,
        )
        .bind(counter)
        .bind(delta)
        .fetch_one(&self.pool);

        // Outcome unknown on timeout: the caller treats it as a failed run.
        let (end,) = tokio::time::timeout(self.timeout, increment)
            .await
            .map_err(|_| {
                anyhow!(
                    "sequence_counter increment timed out after {}ms",
                    self.timeout.as_millis()
                )
            })?
            .context("sequence_counter increment failed")?;

        Ok(end)
    }
}
