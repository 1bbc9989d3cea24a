use super::constant::*;
use crate::{utils, Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    // app_name represents the name of current running service.
    pub app_name: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            app_name: DEFAULT_APP_NAME.into(),
        }
    }
}

// LogConfig represent the configuration of logging.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    // config_file is only read by the log4rs adapter.
    pub config_file: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            config_file: LOG_CONFIG_FILE.into(),
        }
    }
}

// TopologyConfig describes the remote topology service and the static call metadata.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct TopologyConfig {
    pub address: Option<String>,
    pub cell_id: Option<String>,
    // metadata is merged into every outbound call.
    pub metadata: BTreeMap<String, String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ConcurrencyLimitConfig {
    // limit is the initial fleet-wide number of concurrent tracked RPCs.
    pub limit: u64,
    // enforce rejects calls over the limit, otherwise they are only logged.
    pub enforce: bool,
    // store_url points at the shared Redis store; absent means an in-process store.
    pub store_url: Option<String>,
    pub key: String,
    pub stale_ttl_secs: u64,
}

impl Default for ConcurrencyLimitConfig {
    fn default() -> Self {
        ConcurrencyLimitConfig {
            limit: DEFAULT_CONCURRENCY_LIMIT,
            enforce: DEFAULT_ENFORCE_MODE,
            store_url: None,
            key: CONCURRENCY_LIMIT_KEY.into(),
            stale_ttl_secs: STALE_REQUEST_TTL_SECS,
        }
    }
}

// ExporterConfig represents exporter settings
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ExporterConfig {
    pub addr: String,
    pub metrics_path: String,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        ExporterConfig {
            addr: EXPORTER_ADDR.into(),
            metrics_path: EXPORTER_METRICS_PATH.into(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    // enabled toggles the RPC metrics interceptor and the Prometheus backend.
    pub enabled: bool,
    pub exporter: ExporterConfig,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        MetricsConfig {
            enabled: true,
            exporter: ExporterConfig::default(),
        }
    }
}

// ClientConfig represent the general configuration of the topology client.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    pub app: AppConfig,
    pub log: LogConfig,
    pub topology: TopologyConfig,
    pub concurrency_limit: ConcurrencyLimitConfig,
    pub metrics: MetricsConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ConfigEntity {
    pub version: String,
    pub config: ClientConfig,
}

impl Default for ConfigEntity {
    fn default() -> Self {
        ConfigEntity {
            version: CONFIG_VERSION.into(),
            config: ClientConfig::default(),
        }
    }
}

impl ConfigEntity {
    pub fn new() -> Self {
        ConfigEntity::default()
    }

    pub fn check(&self) -> Result<()> {
        if self.version.is_empty() {
            return Err(Error::msg("empty version"));
        }
        if self.config.app.app_name.is_empty() {
            return Err(Error::msg("empty app name"));
        }
        let limit = &self.config.concurrency_limit;
        if utils::is_blank(&limit.key) {
            return Err(Error::msg(
                "illegal concurrency limit configuration: empty store key",
            ));
        }
        if limit.stale_ttl_secs == 0 {
            return Err(Error::msg(
                "illegal concurrency limit configuration: stale_ttl_secs must be positive",
            ));
        }
        if let Some(url) = &limit.store_url {
            if utils::is_blank(url) {
                return Err(Error::msg(
                    "illegal concurrency limit configuration: blank store_url",
                ));
            }
        }
        for key in self.config.topology.metadata.keys() {
            if key.is_empty() || key.chars().any(|c| c.is_ascii_uppercase()) {
                return Err(Error::msg(format!(
                    "illegal metadata key {:?}: keys must be non-empty and lower-case",
                    key
                )));
            }
        }
        Ok(())
    }
}
