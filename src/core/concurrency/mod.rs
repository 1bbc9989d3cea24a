//! Fleet-wide concurrency limiting for a small set of write-path RPCs.
//!
//! Admission state lives in a shared [`CounterStore`] so that every client
//! process sees the same in-flight count. Store outages fail open.

mod counter;
mod interceptor;
mod policy;
mod settings;
mod store;

pub use counter::*;
pub use interceptor::*;
pub use policy::*;
pub use settings::*;
pub use store::*;

cfg_redis! {
    mod redis_store;
    pub use redis_store::*;
}
