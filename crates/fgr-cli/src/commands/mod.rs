//! Command handler modules for fgr-cli.
//!
//! Shared utilities used by multiple command paths live here.
//! Command-specific logic lives in the submodules.

pub mod reconcile;

use anyhow::{Context, Result};
use fgr_config::{resolve_endpoints, Settings, UnusedKeyPolicy};
use fgr_db::PgPool;
use fgr_reconcile::{EdgeScope, SeedStrategy};

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

pub struct LoadedSettings {
    pub settings: Settings,
    /// Present only when at least one config file was given.
    pub config_hash: Option<String>,
    pub unused_keys: Vec<String>,
}

/// Merge config files into typed settings. No files means all defaults.
pub fn load_settings(paths: &[String], strict: bool) -> Result<LoadedSettings> {
    if paths.is_empty() {
        return Ok(LoadedSettings {
            settings: Settings::default(),
            config_hash: None,
            unused_keys: Vec::new(),
        });
    }

    let refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
    let loaded = fgr_config::load_layered_yaml(&refs)?;
    let policy = if strict {
        UnusedKeyPolicy::Fail
    } else {
        UnusedKeyPolicy::Warn
    };
    let report = fgr_config::report_unused_keys(&loaded.config_json, policy)?;
    let settings = Settings::from_loaded(&loaded)?;

    Ok(LoadedSettings {
        settings,
        config_hash: Some(loaded.config_hash),
        unused_keys: report.unused_leaf_pointers,
    })
}

/// Called once tracing is up so the warning is structured like every other line.
pub fn warn_unused_keys(unused: &[String]) {
    if !unused.is_empty() {
        tracing::warn!(count = unused.len(), keys = ?unused, "config keys not read by fgr");
    }
}

pub async fn connect_store(settings: &Settings) -> Result<PgPool> {
    let endpoints = resolve_endpoints(settings)?;
    fgr_db::connect(&endpoints.database_url, settings.store.max_connections)
        .await
        .context("store connect failed")
}

/// Parse a CLI `--seed-defaults-from` value.
pub fn parse_seed_strategy(s: &str) -> Result<SeedStrategy> {
    match s.trim().to_ascii_lowercase().as_str() {
        "edges" | "friend" => Ok(SeedStrategy::Edges),
        "registry" | "user" => Ok(SeedStrategy::Registry),
        "union" | "both" => Ok(SeedStrategy::Union),
        other => anyhow::bail!(
            "invalid --seed-defaults-from '{}'. expected one of: edges | registry | union",
            other
        ),
    }
}

/// Edge scope from the two mutually exclusive repair flags.
pub fn edge_scope_from_flags(only_deleted: bool, active_only: bool) -> Option<EdgeScope> {
    match (only_deleted, active_only) {
        (true, _) => Some(EdgeScope::DeletedOnly),
        (_, true) => Some(EdgeScope::ActiveOnly),
        _ => None,
    }
}
