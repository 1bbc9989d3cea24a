// rpc seam: messages, status codes, interceptor chain, client
pub mod base;
pub mod config;
// interceptors, in chain order
pub mod correlation;
pub mod metadata;
pub mod concurrency;
pub mod metrics;
