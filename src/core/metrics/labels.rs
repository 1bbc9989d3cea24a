use crate::base::{status_name, Code, RPC_SYSTEM};

pub const RPC_LABEL_NAMES: [&str; 6] = [
    "rpc_service",
    "rpc_method",
    "rpc_status",
    "rpc_system",
    "cell_id",
    "topology_service_address",
];

pub const ERROR_TYPE_LABEL: &str = "error_type";

/// The label set attached to every RPC observation. Absent values render as
/// empty label values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcLabels {
    pub rpc_service: Option<String>,
    pub rpc_method: Option<String>,
    pub rpc_status: &'static str,
    pub rpc_system: &'static str,
    pub cell_id: Option<String>,
    pub topology_service_address: Option<String>,
}

impl RpcLabels {
    pub fn new(
        service: Option<&str>,
        method: Option<&str>,
        status_code: Code,
        cell_id: Option<&str>,
        topology_service_address: Option<&str>,
    ) -> Self {
        Self {
            rpc_service: service.map(str::to_owned),
            rpc_method: method.map(str::to_owned),
            rpc_status: status_name(status_code),
            rpc_system: RPC_SYSTEM,
            cell_id: cell_id.map(str::to_owned),
            topology_service_address: topology_service_address.map(str::to_owned),
        }
    }

    /// Values in [`RPC_LABEL_NAMES`] order.
    pub fn values(&self) -> Vec<String> {
        fn or_empty(value: &Option<String>) -> String {
            value.clone().unwrap_or_default()
        }
        vec![
            or_empty(&self.rpc_service),
            or_empty(&self.rpc_method),
            self.rpc_status.to_owned(),
            self.rpc_system.to_owned(),
            or_empty(&self.cell_id),
            or_empty(&self.topology_service_address),
        ]
    }

    /// Values for the failure counter, which carries `error_type` last.
    pub fn values_with_error_type(&self, error_type: &str) -> Vec<String> {
        let mut values = self.values();
        values.push(error_type.to_owned());
        values
    }
}
