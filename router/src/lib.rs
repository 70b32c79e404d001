//! Priority-ordered failover of requests across interchangeable data servers.

pub mod client;
pub mod config;
pub mod errors;
pub mod metrics_defs;
pub mod operation;
pub mod router;
pub mod transport;

#[cfg(test)]
mod testutils;

pub use client::Client;
pub use errors::{FailureKind, RouterError};
pub use operation::Operation;
pub use router::FailoverRouter;
pub use transport::{ReqwestTransport, Transport};
