//! Layered YAML configuration for the reconciliation tool.
//!
//! Files merge in order (later overrides earlier), are converted to JSON,
//! hashed, checked for literal secrets and unknown keys, then deserialized
//! into [`Settings`].

mod secrets;
mod settings;

pub use secrets::{resolve_endpoints, resolve_endpoints_with, ResolvedEndpoints};
pub use settings::{
    AllocatorBackend, LogFormat, LoggingSection, ReconcileSection, SequenceSection, Settings,
    StoreSection, DEFAULT_GROUP_NAME, SYSTEM_COUNTERPARTS,
};

use anyhow::{bail, Context, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs;

/// Leaf string values starting with any of these abort the load.
/// Credentials belong in environment variables named by the config.
const SECRET_PREFIXES: &[&str] = &[
    "postgres://",
    "postgresql://",
    "redis://",
    "rediss://",
    "-----BEGIN",
    "AKIA",
    "ghp_",
    "glpat-",
];

/// Every leaf the tool actually reads. Anything outside these prefixes is unused.
const CONSUMED_POINTERS: &[&str] = &[
    "/reconcile/default_group_name",
    "/reconcile/lock_wait_timeout_secs",
    "/reconcile/seed_defaults_from",
    "/reconcile/skip_provisioning",
    "/reconcile/edge_scope",
    "/reconcile/excluded_counterparts",
    "/reconcile/ensure_indexes",
    "/store/database_url_env",
    "/store/max_connections",
    "/sequence/backend",
    "/sequence/edge_counter",
    "/sequence/group_counter",
    "/sequence/redis_url_env",
    "/sequence/timeout_secs",
    "/logging/level",
    "/logging/format",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnusedKeyReport {
    /// Sorted, unique.
    pub unused_leaf_pointers: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }
}

/// Report config leaves no code reads. `Fail` turns a dirty report into an error.
pub fn report_unused_keys(config_json: &Value, policy: UnusedKeyPolicy) -> Result<UnusedKeyReport> {
    let mut unused: BTreeSet<String> = BTreeSet::new();
    walk_leaves(config_json, String::new(), &mut |ptr, _| {
        if !CONSUMED_POINTERS.iter().any(|c| covers(c, &ptr)) {
            unused.insert(ptr);
        }
    });

    let report = UnusedKeyReport {
        unused_leaf_pointers: unused.into_iter().collect(),
    };

    if policy == UnusedKeyPolicy::Fail && !report.is_clean() {
        let first: Vec<&String> = report.unused_leaf_pointers.iter().take(12).collect();
        bail!(
            "CONFIG_UNUSED_KEYS: {} unused config leaf key(s) detected. First few: {:?}",
            report.unused_leaf_pointers.len(),
            first
        );
    }

    Ok(report)
}

/// "/a/b" covers "/a/b" and "/a/b/0", not "/a/bc".
fn covers(consumed: &str, leaf: &str) -> bool {
    leaf.strip_prefix(consumed)
        .map(|rest| rest.is_empty() || rest.starts_with('/'))
        .unwrap_or(false)
}

/// Visit every scalar leaf with its JSON pointer ("/" for a scalar root).
fn walk_leaves<F>(v: &Value, ptr: String, visit: &mut F)
where
    F: FnMut(String, &Value),
{
    match v {
        Value::Object(map) => {
            for (k, child) in map {
                let token = k.replace('~', "~0").replace('/', "~1");
                walk_leaves(child, format!("{ptr}/{token}"), visit);
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                walk_leaves(child, format!("{ptr}/{i}"), visit);
            }
        }
        leaf if ptr.is_empty() => visit("/".to_string(), leaf),
        leaf => visit(ptr, leaf),
    }
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let mut docs: Vec<String> = Vec::new();
    for p in paths {
        let raw =
            fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}"))?;
        docs.push(raw);
    }
    let doc_refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = serde_json::json!({});
    for raw in yaml_docs {
        let v_yaml: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid yaml")?;
        // An empty document parses as null; treat it as an empty layer.
        if v_yaml.is_null() {
            continue;
        }
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        merged = deep_merge(merged, v_json);
    }

    enforce_no_secret_literals(&merged)?;

    let canonical_json = serde_json::to_string(&merged).context("canonical json serialize failed")?;
    let config_hash = sha256_hex(canonical_json.as_bytes());
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn enforce_no_secret_literals(v: &Value) -> Result<()> {
    let mut hit: Option<String> = None;
    walk_leaves(v, String::new(), &mut |ptr, leaf| {
        if hit.is_none() && leaf.as_str().is_some_and(looks_like_secret) {
            hit = Some(ptr);
        }
    });
    match hit {
        Some(ptr) => bail!("CONFIG_SECRET_DETECTED leaf={} value=REDACTED", ptr),
        None => Ok(()),
    }
}

fn looks_like_secret(s: &str) -> bool {
    let t = s.trim();
    if t.len() < 4 {
        return false;
    }
    SECRET_PREFIXES.iter().any(|p| t.starts_with(p))
}
