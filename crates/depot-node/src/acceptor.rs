//! Upload-port listener.
//!
//! [`accept_loop`] offers every accepted socket to the [`AdmissionPool`];
//! [`serve`] binds the port and keeps the loop alive across listener faults.
//!
//! [`AdmissionPool`]: crate::AdmissionPool

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::context::NodeContext;
use crate::dispatcher;
use crate::error::NodeError;

/// Pause after a transient accept error before accepting again.
const ACCEPT_ERROR_PAUSE: Duration = Duration::from_millis(50);

/// Restart behaviour of the supervised accept loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicy {
    /// Delay before rebinding after a listener fault.
    pub restart_delay: Duration,
    /// Give up after this many restarts. `None` retries forever.
    pub max_restarts: Option<u32>,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            restart_delay: Duration::from_secs(10),
            max_restarts: None,
        }
    }
}

/// Run `task` until it succeeds, restarting after `policy.restart_delay`
/// each time it fails.
///
/// Returns the last error once `policy.max_restarts` is exceeded.
pub async fn supervise<F, Fut, T>(name: &str, policy: RestartPolicy, mut task: F) -> Result<T, NodeError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, NodeError>>,
{
    let mut restarts: u32 = 0;
    loop {
        match task().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if policy.max_restarts.is_some_and(|max| restarts >= max) {
                    error!(task = name, restarts, %e, "giving up");
                    return Err(e);
                }
                restarts += 1;
                error!(
                    task = name,
                    restart = restarts,
                    delay_secs = policy.restart_delay.as_secs_f64(),
                    %e,
                    "task failed, restarting"
                );
                tokio::time::sleep(policy.restart_delay).await;
            }
        }
    }
}

/// Accept connections forever, handing each admitted socket to a worker.
///
/// Sockets arriving while the pool is saturated are dropped without reading
/// from them. Accept errors are logged and do not end the loop.
pub async fn accept_loop(listener: TcpListener, ctx: Arc<NodeContext>) -> Result<(), NodeError> {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(%e, "accept failed");
                tokio::time::sleep(ACCEPT_ERROR_PAUSE).await;
                continue;
            }
        };

        let Some(admission) = ctx.pool().try_admit() else {
            warn!(
                %peer,
                limit = ctx.pool().limit(),
                "admission pool saturated, rejecting connection"
            );
            drop(stream);
            continue;
        };

        debug!(%peer, outstanding = ctx.pool().outstanding(), "connection admitted");
        admission.spawn(dispatcher::handle_connection(ctx.clone(), stream));
    }
}

/// Bind `bind_address:port` and serve uploads under the configured
/// [`RestartPolicy`].
pub async fn serve(ctx: Arc<NodeContext>) -> Result<(), NodeError> {
    let config = ctx.config();
    let addr = format!("{}:{}", config.bind_address, config.port);
    let policy = config.restart;

    supervise("upload-listener", policy, || {
        let ctx = ctx.clone();
        let addr = addr.clone();
        async move {
            let listener = TcpListener::bind(&addr).await?;
            info!(addr = %listener.local_addr()?, "upload port listening");
            accept_loop(listener, ctx).await
        }
    })
    .await
}
