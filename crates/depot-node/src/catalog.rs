//! Metadata catalog seam.

use tracing::debug;

use crate::error::NodeError;

/// Metadata backend initialised once before the node starts serving.
///
/// The connection engine never consults it after [`Catalog::init`].
#[async_trait::async_trait]
pub trait Catalog: Send + Sync {
    /// Prepare the backend. A failure aborts startup.
    async fn init(&self) -> Result<(), NodeError>;
}

/// Catalog with nothing to initialise.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCatalog;

#[async_trait::async_trait]
impl Catalog for NoopCatalog {
    async fn init(&self) -> Result<(), NodeError> {
        debug!("no catalog backend configured");
        Ok(())
    }
}
