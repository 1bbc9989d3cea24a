#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(docsrs, allow(unused_attributes))]

//! # Topology service client interceptors
//!
//! This crate is the client-side gatekeeper and observer for a cell-aware gRPC client.
//! Every outbound RPC passes through an ordered interceptor chain:
//!
//! 1. correlation propagation, which forwards the current correlation id,
//! 2. static metadata injection,
//! 3. concurrency limiting, which admits tracked RPCs against a fleet-wide budget
//!    kept in a shared store,
//! 4. RPC metrics, which records duration, payload sizes, calls and failures.
//!
//! Instrumentation never fails an RPC: store outages fail open and metric backend
//! faults are logged and dropped. The only error the chain originates is the
//! `RESOURCE_EXHAUSTED` rejection raised while enforcement is on.
//!
//! ## Add Dependency
//!
//! ```toml
//! [dependencies]
//! topology-interceptors = { version = "0.1.0" }
//! ```
//!
//! Optional features lists:
//! - store_redis (default): use Redis as the shared concurrency counter store.
//! - exporter: serve the Prometheus registry over HTTP.
//! - logger_env: Use `env_logger` to initialize logging.
//! - logger_log4rs: Use `log4rs` to initialize logging.
//!
//! ## Initialization
//!
//! ```rust
//! use topology_interceptors::{api, logging};
//! let components = api::init_default().unwrap_or_else(|err| panic!("{:?}", err));
//! let chain = api::build_interceptors(&components);
//! logging::info!("interceptors {:?}", chain.names());
//! ```
//!
//! The resulting [`base::InterceptorChain`] is handed to a
//! [`base::InterceptedClient`] together with a [`base::Transport`] that performs
//! the real network call.

#[macro_use]
#[doc(hidden)]
pub mod macros;

/// Client assembly and process initialization.
pub mod api;
/// The RPC seam, the concurrency limiter, the metrics recorder and the
/// metadata/correlation interceptors.
pub mod core;
/// Adapters for different logging crates.
pub mod logging;
cfg_exporter! {
    /// Serves the Prometheus registry for scraping.
    pub mod exporter;
}
// Utility functions.
pub mod utils;

// re-export precludes
pub use crate::core::*;
pub use api::*;

pub type Result<T> = anyhow::Result<T>;
pub type Error = anyhow::Error;
