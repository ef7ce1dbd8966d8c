use crate::{
    Collector,
    Hub,
};
use eyre::Result;
use futures::future::join_all;
use mcc_config::{
    Domain,
    ServiceName,
};
use mcc_services::{
    ServiceClient,
    ServiceClients,
};
use serde::{
    Deserialize,
    Serialize,
};
use serde_json::Value;
use std::{
    future::Future,
    pin::Pin,
    time::Instant,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Online,
    Offline,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub name: ServiceName,
    pub status: ServiceStatus,
    pub version: String,
    pub response_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthPayload {
    pub services: Vec<ServiceHealth>,
}

/// Checks every configured service concurrently.
#[derive(Debug, Clone)]
pub struct HealthCollector {
    hub: Hub,
    clients: ServiceClients,
}

impl HealthCollector {
    pub fn new(hub: Hub, clients: ServiceClients) -> Self {
        Self { hub, clients }
    }

    pub async fn gather(&self) -> HealthPayload {
        let services = join_all(self.clients.iter().map(|(name, client)| check(name, client))).await;
        HealthPayload { services }
    }
}

async fn check(name: ServiceName, client: &ServiceClient) -> ServiceHealth {
    let start = Instant::now();
    let result = client.system_status().await;
    let response_ms = start.elapsed().as_millis() as u64;
    match result {
        Ok(status) => ServiceHealth {
            name,
            status: ServiceStatus::Online,
            version: extract_version(&status),
            response_ms,
        },
        Err(err) => {
            debug!(service = %name, "Service is offline: {err}");
            ServiceHealth {
                name,
                status: ServiceStatus::Offline,
                version: String::new(),
                response_ms,
            }
        }
    }
}

/// `version` or `Version` at the top level; Plex nests it in `MediaContainer`.
fn extract_version(status: &Value) -> String {
    ["version", "Version"]
        .iter()
        .find_map(|key| status.get(key))
        .or_else(|| status.pointer("/MediaContainer/version"))
        .map(|version| match version {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_default()
}

impl Collector for HealthCollector {
    fn domain(&self) -> Domain {
        Domain::Health
    }

    fn collect(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let payload = self.gather().await;
            self.hub.publish(Domain::Health, serde_json::to_value(payload)?).await;
            Ok(())
        })
    }
}
