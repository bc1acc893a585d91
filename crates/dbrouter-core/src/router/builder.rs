use dbrouter_types::{ConfigError, ProviderRole, RouterConfig, RouterError};
use std::sync::Arc;
use validator::Validate;

use super::DbRouter;
use crate::config;
use crate::provider::Provider;

/// A backend plus the role and priority it is registered with on `init`.
#[derive(Clone)]
pub(crate) struct Registration {
    pub(crate) backend: Arc<dyn Provider>,
    pub(crate) role: ProviderRole,
    pub(crate) priority: i32,
}

/// Collects providers and configuration for a [`DbRouter`].
pub struct DbRouterBuilder {
    config: RouterConfig,
    registrations: Vec<Registration>,
}

impl DbRouterBuilder {
    pub fn new(config: RouterConfig) -> Self {
        Self { config, registrations: Vec::new() }
    }

    pub fn provider(
        mut self,
        backend: Arc<dyn Provider>,
        role: ProviderRole,
        priority: i32,
    ) -> Self {
        self.registrations.push(Registration { backend, role, priority });
        self
    }

    pub fn master(self, backend: Arc<dyn Provider>) -> Self {
        self.provider(backend, ProviderRole::Master, 0)
    }

    pub fn slave(self, backend: Arc<dyn Provider>, priority: i32) -> Self {
        self.provider(backend, ProviderRole::Slave, priority)
    }

    /// Validate the configuration and build the router. No provider is
    /// contacted until the first call (or an explicit `init`).
    ///
    /// Without an explicit master, the lowest-priority provider becomes master.
    pub fn build(mut self) -> Result<Arc<DbRouter>, RouterError> {
        self.config.validate().map_err(|e| ConfigError::from_validation(&e))?;

        if !self.registrations.iter().any(|r| r.role == ProviderRole::Master) {
            if let Some(first) = self.registrations.iter_mut().min_by_key(|r| r.priority) {
                tracing::info!(
                    provider = %first.backend.name(),
                    "No master configured, using lowest-priority provider"
                );
                first.role = ProviderRole::Master;
            }
        }

        Ok(DbRouter::assemble(self.config, self.registrations))
    }
}

impl DbRouter {
    pub fn builder(config: RouterConfig) -> DbRouterBuilder {
        DbRouterBuilder::new(config)
    }

    /// Build from `DB_*` environment variables.
    ///
    /// A bad primary configuration is fatal; a bad secondary is logged and
    /// left out, and the router runs on the primary alone.
    pub fn from_env() -> Result<Arc<Self>, RouterError> {
        let (router_config, settings) = config::from_env()?;
        let mut builder = Self::builder(router_config);

        for provider in settings {
            match config::build_provider(&provider) {
                Ok(backend) => {
                    builder = builder.provider(backend, provider.role, provider.priority);
                },
                Err(err) if provider.role == ProviderRole::Master => return Err(err.into()),
                Err(err) => {
                    tracing::warn!(
                        provider = %provider.name,
                        error = %err,
                        "Provider misconfigured, not registered"
                    );
                },
            }
        }

        builder.build()
    }
}
