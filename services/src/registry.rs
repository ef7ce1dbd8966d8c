use crate::ServiceClient;
use futures::future::join_all;
use mcc_config::{
    ServiceName,
    ServiceSettings,
};
use std::{
    collections::BTreeMap,
    sync::Arc,
};
use tokio_util::sync::CancellationToken;

/// One shared client per configured service. Several domains may hold the
/// same client and call it concurrently.
#[derive(Debug, Clone, Default)]
pub struct ServiceClients {
    clients: BTreeMap<ServiceName, Arc<ServiceClient>>,
}

impl ServiceClients {
    /// Each client gets a child of `cancel` so shutdown interrupts backoff sleeps.
    pub fn from_settings(settings: &[ServiceSettings], cancel: &CancellationToken) -> Self {
        let clients = settings
            .iter()
            .map(|settings| {
                debug!(service = %settings.name, url = %settings.base_url, "Creating service client");
                (
                    settings.name,
                    Arc::new(ServiceClient::from_settings(settings, cancel.child_token())),
                )
            })
            .collect();
        Self { clients }
    }

    pub fn insert(&mut self, client: ServiceClient) {
        self.clients.insert(client.name(), Arc::new(client));
    }

    pub fn get(&self, name: ServiceName) -> Option<Arc<ServiceClient>> {
        self.clients.get(&name).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ServiceName, &Arc<ServiceClient>)> {
        self.clients.iter().map(|(name, client)| (*name, client))
    }

    pub fn names(&self) -> Vec<ServiceName> {
        self.clients.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Probes every client concurrently.
    pub async fn probe_all(&self) -> Vec<(ServiceName, bool)> {
        join_all(
            self.clients
                .iter()
                .map(|(name, client)| async move { (*name, client.probe().await) }),
        )
        .await
    }

    pub fn close_all(&self) {
        for client in self.clients.values() {
            client.close();
        }
    }
}
