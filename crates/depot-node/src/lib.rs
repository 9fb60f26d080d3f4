//! Connection engine for a Depot storage node.
//!
//! - [`NodeContext`]: configuration, blob store and admission pool, built
//!   once at startup and shared by `Arc`.
//! - [`AdmissionPool`]: bounded worker pool with a bounded wait queue.
//! - [`acceptor`]: supervised TCP accept loop feeding the pool.
//! - [`dispatcher`]: per-connection frame loop routing upload, query and
//!   download operations.
//! - [`registrar`]: per-tracker registration handshake and reconnect loop.
//! - [`Catalog`]: opaque metadata backend initialised at startup.

pub mod acceptor;
mod admission;
mod catalog;
mod context;
pub mod dispatcher;
mod error;
mod handlers;
pub mod registrar;

pub use acceptor::{RestartPolicy, serve};
pub use admission::{Admission, AdmissionPool};
pub use catalog::{Catalog, NoopCatalog};
pub use context::{NodeConfig, NodeContext};
pub use error::NodeError;
pub use registrar::{Registrar, RegistrarState, parse_trackers, start_registrars};
