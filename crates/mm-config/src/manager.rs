use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde_json::Value;

/// JSON-pointer prefixes read by [`ManagerConfig::from_config_json`]. Keep in
/// step with the reads below; anything else in the file is reported unused.
pub const CONSUMED_POINTERS: &[&str] = &[
    "/reconcile/suppression_ttl_ms",
    "/approval/timeout_secs",
    "/timer/warning_lead_secs",
    "/matches/single_match",
    "/matches/spectator_zone",
    "/matches/name_prefix",
    "/store/namespace",
    "/daemon/addr",
];

const DEFAULT_ADDR: &str = "127.0.0.1:8787";

/// Typed view of the match-manager configuration. Every field has a default,
/// so an empty document is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    pub suppression_ttl: Duration,
    pub approval_timeout: Duration,
    pub warning_lead: Duration,
    pub single_match: bool,
    pub spectator_zone: bool,
    pub name_prefix: String,
    pub store_namespace: String,
    pub daemon_addr: SocketAddr,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            suppression_ttl: Duration::from_millis(3000),
            approval_timeout: Duration::from_secs(600),
            warning_lead: Duration::from_secs(300),
            single_match: false,
            spectator_zone: false,
            name_prefix: "Match".to_string(),
            store_namespace: String::new(),
            daemon_addr: SocketAddr::from(([127, 0, 0, 1], 8787)),
        }
    }
}

impl ManagerConfig {
    /// Build from merged config JSON (see [`crate::load_layered_yaml`]).
    ///
    /// Numbers may be given as integers or numeric strings. A present but
    /// malformed value is an error rather than a silent default.
    pub fn from_config_json(cfg: &Value) -> Result<Self> {
        let d = Self::default();

        let suppression_ttl = read_u64(cfg, "/reconcile/suppression_ttl_ms")?
            .map(Duration::from_millis)
            .unwrap_or(d.suppression_ttl);
        if suppression_ttl.is_zero() {
            return Err(anyhow!("reconcile.suppression_ttl_ms must be positive"));
        }
        let approval_timeout = read_u64(cfg, "/approval/timeout_secs")?
            .map(Duration::from_secs)
            .unwrap_or(d.approval_timeout);
        if approval_timeout.is_zero() {
            return Err(anyhow!("approval.timeout_secs must be positive"));
        }
        let warning_lead = read_u64(cfg, "/timer/warning_lead_secs")?
            .map(Duration::from_secs)
            .unwrap_or(d.warning_lead);

        let name_prefix = read_str(cfg, "/matches/name_prefix")?
            .map(str::trim)
            .map(str::to_string)
            .unwrap_or(d.name_prefix);
        if name_prefix.is_empty() {
            return Err(anyhow!("matches.name_prefix must not be empty"));
        }

        let addr = read_str(cfg, "/daemon/addr")?.unwrap_or(DEFAULT_ADDR);
        let daemon_addr: SocketAddr = addr
            .parse()
            .with_context(|| format!("daemon.addr is not a socket address: '{addr}'"))?;

        Ok(Self {
            suppression_ttl,
            approval_timeout,
            warning_lead,
            single_match: read_bool(cfg, "/matches/single_match")?.unwrap_or(d.single_match),
            spectator_zone: read_bool(cfg, "/matches/spectator_zone")?.unwrap_or(d.spectator_zone),
            name_prefix,
            store_namespace: read_str(cfg, "/store/namespace")?
                .map(str::to_string)
                .unwrap_or(d.store_namespace),
            daemon_addr,
        })
    }
}

fn read_u64(cfg: &Value, ptr: &str) -> Result<Option<u64>> {
    match cfg.pointer(ptr) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(Some)
            .with_context(|| format!("{ptr} must be a non-negative integer (got {n})")),
        Some(Value::String(s)) => s
            .trim()
            .parse::<u64>()
            .map(Some)
            .with_context(|| format!("{ptr} must be a non-negative integer (got '{s}')")),
        Some(other) => Err(anyhow!("{ptr} must be a non-negative integer (got {other})")),
    }
}

fn read_bool(cfg: &Value, ptr: &str) -> Result<Option<bool>> {
    match cfg.pointer(ptr) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(other) => Err(anyhow!("{ptr} must be true or false (got {other})")),
    }
}

fn read_str<'a>(cfg: &'a Value, ptr: &str) -> Result<Option<&'a str>> {
    match cfg.pointer(ptr) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(anyhow!("{ptr} must be a string (got {other})")),
    }
}
