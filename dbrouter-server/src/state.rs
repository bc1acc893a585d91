//! Application State
//!
//! Holds the shared router and the Prometheus handle used to render `/api/metrics`.

use dbrouter_core::DbRouter;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

pub struct AppStateInner {
    pub router: Arc<DbRouter>,
    pub metrics: PrometheusHandle,
}

impl AppState {
    pub fn new(router: Arc<DbRouter>, metrics: PrometheusHandle) -> Self {
        Self { inner: Arc::new(AppStateInner { router, metrics }) }
    }

    pub fn router(&self) -> &Arc<DbRouter> {
        &self.inner.router
    }

    pub fn render_metrics(&self) -> String {
        self.inner.metrics.render()
    }
}
