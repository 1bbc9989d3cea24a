//! The seam between the interceptors and the host gRPC client.
//!
//! The host framework hands every outbound call to an [`InterceptorChain`],
//! which runs each [`ClientInterceptor`] around the next one and finally the
//! [`Transport`] that performs the network round-trip.

mod chain;
mod client;
mod constant;
mod interceptor;
mod message;
mod status;

pub use chain::*;
pub use client::*;
pub use constant::*;
pub use interceptor::*;
pub use message::*;
pub use status::*;
