//! Tracker registration.
//!
//! One [`Registrar`] per tracker address, each running forever in its own
//! task: dial, send the registration frame, read the tracker's verdict, then
//! hold the connection open. Any failure, including the tracker hanging up
//! during the hold, counts as a retry and is followed by a fixed pause.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use depot_proto::codec;
use depot_proto::{Operation, RegisterStorageResponse};
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::context::NodeContext;
use crate::error::NodeError;

/// Shortest time a tracker is given to answer a registration.
const MIN_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(1);

/// Split a comma-separated tracker list into trimmed, non-empty addresses,
/// preserving order.
pub fn parse_trackers(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Where a registrar currently is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrarState {
    /// Dialing or handshaking.
    Connecting,
    /// Registered; holding the idle connection.
    Holding,
    /// Sleeping before the next attempt.
    Waiting,
}

/// Keeps this node registered with one tracker.
///
/// Cloning yields another handle onto the same counters and state.
#[derive(Clone)]
pub struct Registrar {
    tracker: String,
    ctx: Arc<NodeContext>,
    retries: Arc<AtomicU64>,
    state: Arc<watch::Sender<RegistrarState>>,
}

impl Registrar {
    /// Create a registrar for `tracker` (`host:port`). Nothing runs until
    /// [`Registrar::spawn`].
    pub fn new(tracker: impl Into<String>, ctx: Arc<NodeContext>) -> Self {
        let (state, _) = watch::channel(RegistrarState::Connecting);
        Self {
            tracker: tracker.into(),
            ctx,
            retries: Arc::new(AtomicU64::new(0)),
            state: Arc::new(state),
        }
    }

    /// Tracker address.
    pub fn tracker(&self) -> &str {
        &self.tracker
    }

    /// Failed attempts so far.
    pub fn retries(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<RegistrarState> {
        self.state.subscribe()
    }

    /// Run the registration loop on its own task.
    pub fn spawn(&self) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move { this.run().await })
    }

    /// Register, hold, retry. Never returns.
    pub async fn run(&self) {
        let interval = self.ctx.config().registration_interval;
        loop {
            self.state.send_replace(RegistrarState::Connecting);
            let err = match self.attempt().await {
                Ok(()) => NodeError::TrackerClosed,
                Err(e) => e,
            };

            let retry = self.retries.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(tracker = %self.tracker, retry, %err, "tracker registration lost, retrying");

            self.state.send_replace(RegistrarState::Waiting);
            tokio::time::sleep(interval).await;
        }
    }

    /// One dial + handshake + hold cycle. Returns once the connection is
    /// over.
    async fn attempt(&self) -> Result<(), NodeError> {
        let mut conn = TcpStream::connect(&self.tracker).await?;
        conn.set_nodelay(true)?;
        self.handshake(&mut conn).await?;

        info!(tracker = %self.tracker, "registered with tracker");
        self.state.send_replace(RegistrarState::Holding);
        self.hold(&mut conn).await
    }

    async fn handshake(&self, conn: &mut TcpStream) -> Result<(), NodeError> {
        let request = self.ctx.registration_request();
        codec::write_frame(Operation::Register.code(), conn, &request, 0).await?;

        // An answer that does not arrive within one interval, or
        // MIN_HANDSHAKE_TIMEOUT if longer, counts as a failed attempt.
        let limit = self
            .ctx
            .config()
            .registration_interval
            .max(MIN_HANDSHAKE_TIMEOUT);
        let header = tokio::time::timeout(limit, codec::read_frame(conn))
            .await
            .map_err(|_| NodeError::TrackerTimeout(limit))??
            .ok_or(NodeError::TrackerClosed)?;
        if header.body_size > 0 {
            let mut buf = [0u8; 1024];
            codec::skip_body(conn, header.body_size, &mut buf).await?;
        }
        if header.operation != Operation::Response.code() {
            return Err(NodeError::UnexpectedResponse(header.operation));
        }

        let response: RegisterStorageResponse = header.decode_meta()?;
        if !response.status.is_ok() {
            return Err(NodeError::Rejected {
                status: response.status,
                message: response.message,
            });
        }
        Ok(())
    }

    /// Keep the registered connection open until the tracker drops it.
    ///
    /// No status updates are sent; the hold only logs each interval.
    /// Anything the tracker sends is discarded.
    async fn hold(&self, conn: &mut TcpStream) -> Result<(), NodeError> {
        let mut ticker = tokio::time::interval(self.ctx.config().registration_interval);
        ticker.tick().await;
        let mut buf = [0u8; 1024];
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    debug!(tracker = %self.tracker, "holding tracker connection");
                }
                read = conn.read(&mut buf) => match read? {
                    0 => return Err(NodeError::TrackerClosed),
                    n => trace!(tracker = %self.tracker, bytes = n, "discarding tracker bytes"),
                },
            }
        }
    }
}

/// Spawn one registrar per tracker address.
///
/// An empty list runs the node stand-alone.
pub fn start_registrars(ctx: &Arc<NodeContext>, trackers: &[String]) -> Vec<Registrar> {
    if trackers.is_empty() {
        warn!("no trackers configured, running stand-alone");
        return Vec::new();
    }
    trackers
        .iter()
        .map(|tracker| {
            info!(%tracker, "starting registrar");
            let registrar = Registrar::new(tracker.clone(), ctx.clone());
            registrar.spawn();
            registrar
        })
        .collect()
}
