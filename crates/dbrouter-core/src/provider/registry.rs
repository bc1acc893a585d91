//! Roster of registered providers.

use dashmap::DashMap;
use dbrouter_types::{ProviderRole, ProviderSnapshot};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::ManagedProvider;

/// Name → provider map plus the boot-time master.
///
/// Role changes go through [`ProviderRegistry::promote`] under `role_lock`, so
/// [`ProviderRegistry::master`] never observes zero or two masters mid-swap.
#[derive(Debug, Default)]
pub struct ProviderRegistry {
    providers: DashMap<String, Arc<ManagedProvider>>,
    original_master: RwLock<Option<String>>,
    role_lock: RwLock<()>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider. A second master is registered as a slave.
    pub fn register(&self, provider: Arc<ManagedProvider>) {
        let _roles = self.role_lock.write();
        let name = provider.name().to_string();

        if provider.is_master() {
            let existing = self
                .providers
                .iter()
                .find(|entry| entry.key() != &name && entry.value().is_master())
                .map(|entry| entry.key().clone());

            if let Some(existing) = existing {
                tracing::warn!(
                    provider = %name,
                    master = %existing,
                    "Master already registered, registering provider as slave"
                );
                provider.set_role(ProviderRole::Slave);
            } else {
                let mut original = self.original_master.write();
                if original.is_none() {
                    *original = Some(name.clone());
                }
            }
        }

        if self.providers.insert(name.clone(), provider).is_some() {
            tracing::warn!(provider = %name, "Provider re-registered, previous instance replaced");
        }
    }

    pub fn remove(&self, name: &str) -> Option<Arc<ManagedProvider>> {
        let _roles = self.role_lock.write();
        self.providers.remove(name).map(|(_, provider)| provider)
    }

    pub fn get(&self, name: &str) -> Option<Arc<ManagedProvider>> {
        self.providers.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// All providers, ordered by priority then name.
    pub fn all(&self) -> Vec<Arc<ManagedProvider>> {
        let mut providers: Vec<_> =
            self.providers.iter().map(|entry| Arc::clone(entry.value())).collect();
        providers.sort_by(|a, b| {
            a.priority().cmp(&b.priority()).then_with(|| a.name().cmp(b.name()))
        });
        providers
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn master(&self) -> Option<Arc<ManagedProvider>> {
        let _roles = self.role_lock.read();
        self.providers
            .iter()
            .find(|entry| entry.value().is_master())
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Provider registered as master at boot, if still registered.
    pub fn original_master(&self) -> Option<Arc<ManagedProvider>> {
        let name = self.original_master.read().clone()?;
        self.get(&name)
    }

    /// Healthy slaves, lowest priority first.
    pub fn healthy_slaves(&self) -> Vec<Arc<ManagedProvider>> {
        self.all()
            .into_iter()
            .filter(|p| p.role() == ProviderRole::Slave && p.is_healthy())
            .collect()
    }

    /// Healthy providers of any role, fastest first; priority breaks ties.
    pub fn healthy_by_latency(&self) -> Vec<Arc<ManagedProvider>> {
        let mut healthy: Vec<_> = self.all().into_iter().filter(|p| p.is_healthy()).collect();
        healthy.sort_by(|a, b| {
            a.latency_rank().cmp(&b.latency_rank()).then_with(|| a.priority().cmp(&b.priority()))
        });
        healthy
    }

    /// Make `provider` the sole master. Returns the previous master, if any.
    pub(crate) fn promote(&self, provider: &ManagedProvider) -> Option<Arc<ManagedProvider>> {
        let _roles = self.role_lock.write();
        let mut previous = None;
        for entry in &self.providers {
            let candidate = entry.value();
            if candidate.name() != provider.name() && candidate.is_master() {
                candidate.set_role(ProviderRole::Slave);
                previous = Some(Arc::clone(candidate));
            }
        }
        provider.set_role(ProviderRole::Master);
        previous
    }

    pub fn snapshot(&self) -> BTreeMap<String, ProviderSnapshot> {
        self.providers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().snapshot()))
            .collect()
    }

    /// Drop every provider and forget the boot-time master.
    pub fn clear(&self) {
        let _roles = self.role_lock.write();
        self.providers.clear();
        *self.original_master.write() = None;
    }
}
