use super::ClientComponents;
use crate::concurrency::{CounterStore, DistributedCounter, DynamicLimitSettings, MemoryStore};
use crate::config::{self, ConcurrencyLimitConfig, ConfigEntity};
use crate::metrics::{Metrics, MetricsBackend, NullBackend, PrometheusBackend};
use crate::{logging, Result};
use lazy_static::lazy_static;
use std::sync::Arc;

lazy_static! {
    // metric families are registered once per process, every client shares them
    static ref PROMETHEUS_BACKEND: Arc<PrometheusBackend> = Arc::new(PrometheusBackend::default());
}

/// `init_default` initializes with the default config, overridden by the
/// system environment. A YAML file named by `TOPOLOGY_CONFIG_FILE_PATH` is
/// loaded when present.
#[inline]
pub fn init_default() -> Result<ClientComponents> {
    init_with_config_file(&mut String::new())
}

/// `init_with_config_file` loads the general configuration from the YAML file
/// under the provided path, then applies the system environment on top.
pub fn init_with_config_file(config_path: &mut String) -> Result<ClientComponents> {
    let entity = config::load_config_with_yaml(config_path)?;
    init_with_config(entity)
}

/// `init_with_config` initializes from a customized config entity.
pub fn init_with_config(entity: ConfigEntity) -> Result<ClientComponents> {
    entity.check()?;
    config::init_log(&entity);
    let components = components_from_config(&entity)?;
    start_exporter(&entity)?;
    logging::info!(
        "[Init] Topology client components ready, appName {}, metricsEnabled {}",
        entity.config.app.app_name,
        components.metrics().enabled()
    );
    Ok(components)
}

/// Builds the shared components without touching logging or the exporter.
pub fn components_from_config(entity: &ConfigEntity) -> Result<ClientComponents> {
    let limit_config = &entity.config.concurrency_limit;
    let counter = DistributedCounter::new(
        open_store(limit_config)?,
        Arc::new(DynamicLimitSettings::from(limit_config)),
    )
    .with_key(limit_config.key.clone())
    .with_ttl_secs(limit_config.stale_ttl_secs);

    let topology = &entity.config.topology;
    let metrics = Metrics::new(
        metrics_backend(entity.config.metrics.enabled).as_ref(),
        topology.cell_id.clone(),
        topology.address.clone(),
    )?;

    Ok(
        ClientComponents::new(Arc::new(counter), Arc::new(metrics))
            .with_metadata(topology.metadata.clone()),
    )
}

#[cfg(feature = "exporter")]
fn start_exporter(entity: &ConfigEntity) -> Result<()> {
    if entity.config.metrics.enabled {
        crate::exporter::init(&entity.config.metrics.exporter)?;
    }
    Ok(())
}

#[cfg(not(feature = "exporter"))]
fn start_exporter(_: &ConfigEntity) -> Result<()> {
    Ok(())
}

fn metrics_backend(enabled: bool) -> Arc<dyn MetricsBackend> {
    if enabled {
        PROMETHEUS_BACKEND.clone()
    } else {
        Arc::new(NullBackend)
    }
}

fn open_store(limit_config: &ConcurrencyLimitConfig) -> Result<Arc<dyn CounterStore>> {
    match &limit_config.store_url {
        None => {
            logging::info!("[Init] No store_url configured, counting concurrency in process");
            Ok(Arc::new(MemoryStore::new()))
        }
        #[cfg(feature = "store_redis")]
        Some(url) => Ok(Arc::new(crate::concurrency::RedisStore::open(url)?)),
        #[cfg(not(feature = "store_redis"))]
        Some(_) => Err(crate::Error::msg(
            "store_url is configured but the store_redis feature is disabled",
        )),
    }
}
