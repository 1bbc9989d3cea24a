//! Serves the default Prometheus registry, which holds the RPC metric
//! families, for scraping.
use crate::config::ExporterConfig;
use crate::{logging, Result};
use lazy_static::lazy_static;
use prometheus_exporter::Builder;
use std::net::SocketAddr;
use std::sync::Mutex;

lazy_static! {
    static ref STARTED: Mutex<bool> = Mutex::new(false);
}

fn binding(config: &ExporterConfig) -> Result<SocketAddr> {
    Ok(config.addr.trim().parse()?)
}

/// Starts the exporter once per process; later calls are no-ops.
pub fn init(config: &ExporterConfig) -> Result<()> {
    let mut started = STARTED
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if *started {
        return Ok(());
    }
    // currently, `prometheus_exporter` crate only support global registry
    let mut builder = Builder::new(binding(config)?);
    builder.with_endpoint(&config.metrics_path)?;
    builder.start()?;
    *started = true;
    logging::info!(
        "[Exporter] Serving metrics, addr {}, path {}",
        config.addr,
        config.metrics_path
    );
    Ok(())
}
