//! TOML configuration for the Depot daemon.
//!
//! Every key is optional; a missing file section falls back to its defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, ensure};
use depot_node::{NodeConfig, RestartPolicy, parse_trackers};
use serde::Deserialize;

/// Top-level configuration, parsed from TOML.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Node identity, storage location and upload port.
    pub node: NodeSection,
    /// Tracker registration.
    pub tracker: TrackerSection,
    /// Connection admission limits.
    pub pool: PoolSection,
    /// HTTP download passthrough.
    pub http: HttpSection,
    /// Logging configuration.
    pub log: LogSection,
}

/// `[node]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct NodeSection {
    /// Root of the blob store (`data/` and `tmp/` live below it).
    pub base_path: PathBuf,
    /// Upload port.
    pub port: u16,
    /// Address the upload port binds to, also advertised to trackers.
    pub bind_address: String,
    /// Storage group.
    pub group: String,
    /// Instance id, unique within the group.
    pub instance_id: String,
    /// Shared secret presented to trackers.
    pub secret: String,
}

impl Default for NodeSection {
    fn default() -> Self {
        let base_path = dirs::home_dir()
            .map(|h| h.join(".depot"))
            .unwrap_or_else(|| PathBuf::from(".depot"));
        Self {
            base_path,
            port: 4830,
            bind_address: "0.0.0.0".to_string(),
            group: "group1".to_string(),
            instance_id: "node1".to_string(),
            secret: String::new(),
        }
    }
}

/// `[tracker]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TrackerSection {
    /// Comma-separated `host:port` list.
    pub trackers: String,
    /// Seconds between registration attempts.
    pub interval_secs: u64,
}

impl Default for TrackerSection {
    fn default() -> Self {
        Self {
            trackers: String::new(),
            interval_secs: 5,
        }
    }
}

/// `[pool]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PoolSection {
    /// Connections served concurrently.
    pub workers: usize,
    /// Admitted connections allowed to wait for a worker.
    pub queue: usize,
}

impl Default for PoolSection {
    fn default() -> Self {
        Self {
            workers: 1000,
            queue: 100_000,
        }
    }
}

/// `[http]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HttpSection {
    /// Serve `GET /download/...` over HTTP.
    pub enabled: bool,
    /// HTTP port, bound on `node.bind_address`.
    pub port: u16,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 4831,
        }
    }
}

/// `[log]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// Log level filter (e.g. `"info"`, `"debug"`, `"warn"`).
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl CliConfig {
    /// Load config from a TOML file, or use defaults if no path given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(p) => {
                let content = std::fs::read_to_string(p)
                    .with_context(|| format!("failed to read {}", p.display()))?;
                Self::from_toml(&content)
            }
            None => Ok(Self::default()),
        }
    }

    /// Parse config from a TOML string.
    pub fn from_toml(s: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Reject settings the node cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        for (key, value) in [
            ("node.group", &self.node.group),
            ("node.instance_id", &self.node.instance_id),
        ] {
            ensure!(
                !value.is_empty()
                    && value.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_'),
                "{key} must be a non-empty run of letters, digits and underscores, got {value:?}"
            );
        }
        ensure!(self.pool.workers > 0, "pool.workers must be at least 1");
        ensure!(
            self.tracker.interval_secs > 0,
            "tracker.interval_secs must be at least 1"
        );
        ensure!(
            !self.http.enabled || self.http.port != self.node.port,
            "http.port and node.port must differ"
        );
        Ok(())
    }

    /// Tracker addresses, in configured order.
    pub fn trackers(&self) -> Vec<String> {
        parse_trackers(&self.tracker.trackers)
    }

    /// Address the HTTP passthrough binds to.
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.node.bind_address, self.http.port)
    }

    /// Settings handed to the connection engine.
    pub fn node_config(&self) -> NodeConfig {
        NodeConfig {
            group: self.node.group.clone(),
            instance_id: self.node.instance_id.clone(),
            bind_address: self.node.bind_address.clone(),
            port: self.node.port,
            secret: self.node.secret.clone(),
            workers: self.pool.workers,
            queue: self.pool.queue,
            registration_interval: Duration::from_secs(self.tracker.interval_secs),
            restart: RestartPolicy::default(),
        }
    }
}
