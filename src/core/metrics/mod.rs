//! RPC metrics: latency, payload sizes, calls and failures per method.
//!
//! Recording never affects the call being measured. Backend errors and
//! panics are logged at debug level and dropped.

mod backend;
mod classify;
mod interceptor;
mod labels;
mod recorder;
mod size;

pub use backend::*;
pub use classify::*;
pub use interceptor::*;
pub use labels::*;
pub use recorder::*;
pub use size::*;
