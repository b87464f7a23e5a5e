use super::{edge_scope_from_flags, parse_seed_strategy};
use anyhow::{bail, Context, Result};
use clap::Args;
use fgr_alloc::{PgAllocator, SequenceAllocator};
use fgr_config::{resolve_endpoints, AllocatorBackend, Settings};
use fgr_db::PgStore;
use fgr_reconcile::EdgeFilter;
use fgr_runtime::{run_reconciliation, CounterKeys, Provisioning, ReconcileOptions, RunReport};
use std::time::Duration;

#[derive(Args, Debug)]
pub struct ReconcileArgs {
    /// Compute and report, then roll back. No writes, no version reservations.
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    /// Name of the default group to provision
    #[arg(long)]
    pub default_name: Option<String>,

    /// Lock wait bound for the transaction, in seconds
    #[arg(long)]
    pub lock_wait_timeout: Option<u64>,

    /// Candidate owners for default groups: edges | registry | union
    #[arg(long)]
    pub seed_defaults_from: Option<String>,

    /// Use existing default groups only
    #[arg(long, default_value_t = false)]
    pub skip_provisioning: bool,

    /// Only reconcile soft-deleted edges
    #[arg(long, default_value_t = false, conflicts_with = "active_edges_only")]
    pub only_deleted_edges: bool,

    /// Only reconcile active edges
    #[arg(long, default_value_t = false)]
    pub active_edges_only: bool,

    /// Counterpart never regrouped (repeatable). Replaces the configured list.
    #[arg(long = "exclude-counterpart")]
    pub exclude_counterparts: Vec<String>,

    /// Sequence allocator backend: postgres | redis
    #[arg(long)]
    pub allocator: Option<String>,

    #[arg(long)]
    pub edge_counter: Option<String>,

    #[arg(long)]
    pub group_counter: Option<String>,

    /// Create missing lookup indexes before the run
    #[arg(long, default_value_t = false)]
    pub ensure_indexes: bool,

    /// Print the report as JSON instead of key=value lines
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

impl ReconcileArgs {
    /// Flags win over config values. Validates everything that can be checked
    /// without a connection.
    pub fn apply_overrides(&self, settings: &mut Settings) -> Result<()> {
        let r = &mut settings.reconcile;
        if let Some(name) = &self.default_name {
            if name.trim().is_empty() {
                bail!("--default-name must not be empty");
            }
            r.default_group_name = name.clone();
        }
        if let Some(secs) = self.lock_wait_timeout {
            r.lock_wait_timeout_secs = Some(secs);
        }
        if r.lock_wait_timeout_secs == Some(0) {
            bail!("lock wait timeout must be at least 1 second");
        }
        if let Some(seed) = &self.seed_defaults_from {
            r.seed_defaults_from = parse_seed_strategy(seed)?;
        }
        if self.skip_provisioning {
            r.skip_provisioning = true;
        }
        if let Some(scope) = edge_scope_from_flags(self.only_deleted_edges, self.active_edges_only) {
            r.edge_scope = scope;
        }
        if !self.exclude_counterparts.is_empty() {
            r.excluded_counterparts = self.exclude_counterparts.clone();
        }
        if self.ensure_indexes {
            r.ensure_indexes = true;
        }

        let seq = &mut settings.sequence;
        if let Some(backend) = &self.allocator {
            seq.backend = parse_backend(backend)?;
        }
        if let Some(c) = &self.edge_counter {
            seq.edge_counter = c.clone();
        }
        if let Some(c) = &self.group_counter {
            seq.group_counter = c.clone();
        }
        if seq.edge_counter == seq.group_counter {
            bail!(
                "edge and group counters must differ (both '{}')",
                seq.edge_counter
            );
        }
        Ok(())
    }
}

fn parse_backend(s: &str) -> Result<AllocatorBackend> {
    match s.trim().to_ascii_lowercase().as_str() {
        "postgres" | "pg" => Ok(AllocatorBackend::Postgres),
        "redis" => Ok(AllocatorBackend::Redis),
        other => bail!("invalid --allocator '{}'. expected one of: postgres | redis", other),
    }
}

pub fn options_from_settings(settings: &Settings, dry_run: bool) -> ReconcileOptions {
    let r = &settings.reconcile;
    ReconcileOptions {
        dry_run,
        default_group_name: r.default_group_name.clone(),
        lock_wait: r.lock_wait_timeout_secs.map(Duration::from_secs),
        provisioning: if r.skip_provisioning {
            Provisioning::Skip
        } else {
            Provisioning::Seed(r.seed_defaults_from)
        },
        edge_filter: EdgeFilter::new(r.edge_scope)
            .excluding(r.excluded_counterparts.iter().cloned()),
        counters: CounterKeys {
            edge: settings.sequence.edge_counter.clone(),
            group: settings.sequence.group_counter.clone(),
        },
    }
}

async fn connect_allocator(
    settings: &Settings,
    database_url: &str,
    redis_url: Option<&str>,
) -> Result<Box<dyn SequenceAllocator>> {
    let timeout = Duration::from_secs(settings.sequence.timeout_secs);
    match settings.sequence.backend {
        AllocatorBackend::Postgres => {
            Ok(Box::new(PgAllocator::connect(database_url, timeout).await?))
        }
        AllocatorBackend::Redis => connect_redis(redis_url, timeout).await,
    }
}

#[cfg(feature = "redis")]
async fn connect_redis(
    url: Option<&str>,
    timeout: Duration,
) -> Result<Box<dyn SequenceAllocator>> {
    let url = url.context("redis allocator selected without a redis url")?;
    let alloc = tokio::time::timeout(timeout, fgr_alloc::RedisAllocator::connect(url, timeout))
        .await
        .context("redis connect timed out")??;
    Ok(Box::new(alloc))
}

#[cfg(not(feature = "redis"))]
async fn connect_redis(
    _url: Option<&str>,
    _timeout: Duration,
) -> Result<Box<dyn SequenceAllocator>> {
    bail!("redis allocator not built in; rebuild fgr-cli with --features redis")
}

pub async fn run(
    settings: &Settings,
    dry_run: bool,
    config_hash: Option<String>,
) -> Result<RunReport> {
    let endpoints = resolve_endpoints(settings)?;
    let pool = fgr_db::connect(&endpoints.database_url, settings.store.max_connections)
        .await
        .context("store connect failed")?;

    if settings.reconcile.ensure_indexes {
        let names = fgr_db::ensure_indexes(&pool).await?;
        tracing::info!(count = names.len(), "lookup indexes ensured");
    }

    let alloc = connect_allocator(
        settings,
        &endpoints.database_url,
        endpoints.redis_url.as_deref(),
    )
    .await?;

    let store = PgStore::new(pool);
    let opts = options_from_settings(settings, dry_run);
    let report = run_reconciliation(&store, alloc.as_ref(), &opts).await?;

    Ok(match config_hash {
        Some(h) => report.with_config_hash(h),
        None => report,
    })
}
