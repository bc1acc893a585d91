//! Test helpers for dbrouter-server unit tests.

use std::sync::Arc;

use dbrouter_core::provider::mock::MockProvider;
use dbrouter_core::DbRouter;
use dbrouter_types::RouterConfig;

use crate::state::AppState;

/// Mock master "m" and slave "s" behind an initialized router.
pub struct TestCluster {
    pub state: AppState,
    pub master: Arc<MockProvider>,
    pub slave: Arc<MockProvider>,
}

pub async fn test_cluster() -> TestCluster {
    let master = MockProvider::new("m");
    let slave = MockProvider::new("s");
    let router = DbRouter::builder(RouterConfig::default())
        .master(master.clone())
        .slave(slave.clone(), 1)
        .build()
        .expect("default config is valid");
    router.init().await.expect("router is open");

    let state = AppState::new(router, crate::metrics::detached_handle());
    TestCluster { state, master, slave }
}
