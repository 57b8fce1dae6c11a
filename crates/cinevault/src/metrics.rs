use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use tracing::info;

use crate::{
    config::TelemetryConfig,
    error::{CineError, CineResult},
};

pub const CATALOG_LOOKUPS: &str = "cinevault_catalog_lookups_total";
pub const CATALOG_LATENCY: &str = "cinevault_catalog_lookup_seconds";
pub const MOVIES_WRITTEN: &str = "cinevault_movie_writes_total";

static RECORDER: OnceCell<PrometheusHandle> = OnceCell::new();

/// Process-wide Prometheus recorder; rendering is served over REST.
#[derive(Clone)]
pub struct MetricsService {
    handle: Option<PrometheusHandle>,
}

impl MetricsService {
    pub fn initialize(config: &TelemetryConfig) -> CineResult<Self> {
        if !config.enable_metrics {
            return Ok(Self::disabled());
        }
        let handle = RECORDER.get_or_try_init(|| {
            info!("installing Prometheus recorder");
            PrometheusBuilder::new()
                .install_recorder()
                .map_err(|err| CineError::Internal(err.to_string()))
        })?;
        Ok(Self {
            handle: Some(handle.clone()),
        })
    }

    pub fn disabled() -> Self {
        Self { handle: None }
    }

    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}
