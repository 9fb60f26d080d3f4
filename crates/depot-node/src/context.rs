//! Shared, read-only node state.

use std::sync::Arc;
use std::time::Duration;

use depot_proto::RegisterStorageRequest;
use depot_store::FileStore;

use crate::acceptor::RestartPolicy;
use crate::admission::AdmissionPool;

/// Node settings, fixed after startup.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Storage group this node belongs to.
    pub group: String,
    /// Unique instance id, used as the segment of returned download paths.
    pub instance_id: String,
    /// Address advertised to trackers and the one the upload port binds to.
    pub bind_address: String,
    /// Upload port.
    pub port: u16,
    /// Shared cluster secret presented at registration.
    pub secret: String,
    /// Maximum connections served concurrently.
    pub workers: usize,
    /// Maximum admitted connections waiting for a worker.
    pub queue: usize,
    /// Fixed delay between tracker registration attempts.
    pub registration_interval: Duration,
    /// Restart behaviour of the accept loop.
    pub restart: RestartPolicy,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            group: "group1".to_string(),
            instance_id: "node1".to_string(),
            bind_address: "0.0.0.0".to_string(),
            port: 4830,
            secret: String::new(),
            workers: 1000,
            queue: 100_000,
            registration_interval: Duration::from_secs(5),
            restart: RestartPolicy::default(),
        }
    }
}

/// Everything a connection handler or registrar needs, built once.
#[derive(Debug)]
pub struct NodeContext {
    config: NodeConfig,
    store: FileStore,
    pool: Arc<AdmissionPool>,
}

impl NodeContext {
    /// Build the context and its admission pool.
    pub fn new(config: NodeConfig, store: FileStore) -> Arc<Self> {
        let pool = AdmissionPool::new(config.workers, config.queue);
        Arc::new(Self {
            config,
            store,
            pool,
        })
    }

    /// Node settings.
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Blob store.
    pub fn store(&self) -> &FileStore {
        &self.store
    }

    /// Connection admission pool.
    pub fn pool(&self) -> &Arc<AdmissionPool> {
        &self.pool
    }

    /// Registration record sent to every tracker.
    pub fn registration_request(&self) -> RegisterStorageRequest {
        RegisterStorageRequest {
            secret: self.config.secret.clone(),
            group: self.config.group.clone(),
            instance_id: self.config.instance_id.clone(),
            bind_addr: self.config.bind_address.clone(),
            port: self.config.port,
        }
    }
}
