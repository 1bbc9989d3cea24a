/// Returned whenever a method path or one of its segments cannot be resolved.
pub const UNKNOWN: &str = "unknown";
/// The value of the `rpc_system` metric label.
pub const RPC_SYSTEM: &str = "grpc";
pub const INTERCEPTOR_INIT: usize = 4;
