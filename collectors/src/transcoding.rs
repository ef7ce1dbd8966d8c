use crate::{
    json::{
        number,
        text,
    },
    Collector,
    Hub,
};
use eyre::Result;
use mcc_config::{
    Domain,
    ServiceName,
};
use mcc_services::{
    ClientError,
    ServiceClient,
    ServiceClients,
};
use serde::{
    Deserialize,
    Serialize,
};
use serde_json::{
    Map,
    Number,
    Value,
};
use std::{
    future::Future,
    pin::Pin,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub name: String,
    pub workers: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscodingPayload {
    pub nodes: Vec<Node>,
    pub queue_size: usize,
    pub total_files: Number,
    pub total_transcodes: Number,
    pub size_diff_bytes: Number,
}

impl Default for TranscodingPayload {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            queue_size: 0,
            total_files: Number::from(0),
            total_transcodes: Number::from(0),
            size_diff_bytes: Number::from(0),
        }
    }
}

/// Tdarr node, queue and library statistics.
#[derive(Debug, Clone)]
pub struct TranscodingCollector {
    hub: Hub,
    clients: ServiceClients,
}

impl TranscodingCollector {
    pub fn new(hub: Hub, clients: ServiceClients) -> Self {
        Self { hub, clients }
    }

    pub async fn gather(&self) -> TranscodingPayload {
        let Some(tdarr) = self.clients.get(ServiceName::Tdarr) else {
            return TranscodingPayload::default();
        };
        match poll(&tdarr).await {
            Ok(payload) => payload,
            Err(err) => {
                debug!("Failed to poll Tdarr: {err}");
                TranscodingPayload::default()
            }
        }
    }
}

async fn poll(tdarr: &ServiceClient) -> Result<TranscodingPayload, ClientError> {
    let (nodes, staged, statistics) = tokio::try_join!(
        tdarr.tdarr_nodes(),
        tdarr.tdarr_staged_files(),
        tdarr.tdarr_statistics(),
    )?;
    Ok(build_payload(&nodes, &staged, &statistics))
}

fn build_payload(nodes: &Value, staged: &Value, statistics: &Value) -> TranscodingPayload {
    let nodes = nodes
        .as_object()
        .map(|nodes| {
            nodes
                .iter()
                .map(|(id, node)| Node {
                    id: id.clone(),
                    name: match text(&node["nodeName"]) {
                        name if name.is_empty() => id.clone(),
                        name => name,
                    },
                    workers: node
                        .get("workers")
                        .cloned()
                        .unwrap_or_else(|| Value::Object(Map::new())),
                })
                .collect()
        })
        .unwrap_or_default();

    // Newer Tdarr releases wrap the statistics document in a one-element list.
    let statistics = match statistics {
        Value::Array(list) => list.first().unwrap_or(&Value::Null),
        other => other,
    };

    TranscodingPayload {
        nodes,
        queue_size: staged.as_array().map_or(0, Vec::len),
        total_files: number(&statistics["totalFileCount"]),
        total_transcodes: number(&statistics["totalTranscodeCount"]),
        size_diff_bytes: number(&statistics["sizeDiff"]),
    }
}

impl Collector for TranscodingCollector {
    fn domain(&self) -> Domain {
        Domain::Transcoding
    }

    fn collect(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let payload = self.gather().await;
            self.hub.publish(Domain::Transcoding, serde_json::to_value(payload)?).await;
            Ok(())
        })
    }
}
