// default app settings
pub const CONFIG_VERSION: &str = "v1";
pub const DEFAULT_APP_NAME: &str = "unknown_service";
pub const APP_NAME_ENV_KEY: &str = "TOPOLOGY_APP_NAME";
pub const CONF_FILE_PATH_ENV_KEY: &str = "TOPOLOGY_CONFIG_FILE_PATH";
pub const CONFIG_FILENAME: &str = "USE_DEFAULT_CONFIGURATION";

// default concurrency limit settings
pub const CONCURRENCY_LIMIT_ENV_KEY: &str = "TOPOLOGY_CONCURRENCY_LIMIT";
pub const CONCURRENCY_ENFORCE_ENV_KEY: &str = "TOPOLOGY_CONCURRENCY_ENFORCE";
pub const DEFAULT_CONCURRENCY_LIMIT: u64 = 100;
pub const DEFAULT_ENFORCE_MODE: bool = false;
pub const CONCURRENCY_LIMIT_KEY: &str = "topology_service:concurrency_limit:executing";
pub const STALE_REQUEST_TTL_SECS: u64 = 300;

// default metrics settings
pub const EXPORTER_ADDR: &str = "127.0.0.1:9091";
pub const EXPORTER_METRICS_PATH: &str = "/metrics";

// default log settings
pub const DEFAULT_LOG_LEVEL: &str = "warn";
pub const LOG_CONFIG_FILE: &str = "testdata/config/log4rs.yaml";
