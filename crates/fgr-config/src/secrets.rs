//! Runtime resolution of connection strings.
//!
//! Config carries only env var *names*; values are read once at startup and
//! passed to constructors. Values never appear in `Debug` output or errors.

use crate::{AllocatorBackend, Settings};
use anyhow::{bail, Result};

#[derive(Clone)]
pub struct ResolvedEndpoints {
    pub database_url: String,
    /// Present only when the redis allocator backend is selected.
    pub redis_url: Option<String>,
}

impl std::fmt::Debug for ResolvedEndpoints {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedEndpoints")
            .field("database_url", &"<REDACTED>")
            .field("redis_url", &self.redis_url.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

/// Resolve endpoints from the environment using the names in `settings`.
pub fn resolve_endpoints(settings: &Settings) -> Result<ResolvedEndpoints> {
    resolve_endpoints_with(settings, |name| std::env::var(name).ok())
}

/// Same as [`resolve_endpoints`] with an injectable lookup (tests).
pub fn resolve_endpoints_with<F>(settings: &Settings, lookup: F) -> Result<ResolvedEndpoints>
where
    F: Fn(&str) -> Option<String>,
{
    let db_env = settings.store.database_url_env.as_str();
    let database_url = match lookup(db_env).filter(|v| !v.trim().is_empty()) {
        Some(v) => v,
        None => bail!("missing env var {db_env} (database url)"),
    };

    let redis_url = match settings.sequence.backend {
        AllocatorBackend::Postgres => None,
        AllocatorBackend::Redis => {
            let redis_env = settings.sequence.redis_url_env.as_str();
            match lookup(redis_env).filter(|v| !v.trim().is_empty()) {
                Some(v) => Some(v),
                None => bail!("missing env var {redis_env} (redis url, sequence.backend=redis)"),
            }
        }
    };

    Ok(ResolvedEndpoints {
        database_url,
        redis_url,
    })
}
