use crate::{
    json::{
        items,
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
use mcc_services::ServiceClients;
use serde::{
    Deserialize,
    Serialize,
};
use serde_json::{
    Number,
    Value,
};
use std::{
    future::Future,
    pin::Pin,
};

const QUEUE_PAGE_SIZE: u32 = 50;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SabnzbdItem {
    pub name: String,
    pub percentage: String,
    pub sizeleft: String,
    pub status: String,
    pub timeleft: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SabnzbdQueue {
    pub speed: String,
    pub sizeleft: String,
    pub timeleft: String,
    pub items: Vec<SabnzbdItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueRecord {
    pub title: String,
    pub status: String,
    pub sizeleft: Number,
    pub size: Number,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DownloadsPayload {
    pub sabnzbd: SabnzbdQueue,
    pub sonarr_queue: Vec<QueueRecord>,
    pub radarr_queue: Vec<QueueRecord>,
}

impl DownloadsPayload {
    /// Items downloading in SABnzbd plus everything in the *arr import queues.
    pub fn active(&self) -> usize {
        self.sabnzbd.items.len() + self.sonarr_queue.len() + self.radarr_queue.len()
    }
}

/// SABnzbd download queue plus the Sonarr and Radarr import queues.
#[derive(Debug, Clone)]
pub struct DownloadsCollector {
    hub: Hub,
    clients: ServiceClients,
}

impl DownloadsCollector {
    pub fn new(hub: Hub, clients: ServiceClients) -> Self {
        Self { hub, clients }
    }

    pub async fn gather(&self) -> DownloadsPayload {
        let (sabnzbd, sonarr_queue, radarr_queue) = tokio::join!(
            self.sabnzbd(),
            self.arr_queue(ServiceName::Sonarr),
            self.arr_queue(ServiceName::Radarr),
        );
        DownloadsPayload {
            sabnzbd,
            sonarr_queue,
            radarr_queue,
        }
    }

    async fn sabnzbd(&self) -> SabnzbdQueue {
        let Some(client) = self.clients.get(ServiceName::Sabnzbd) else {
            return SabnzbdQueue::default();
        };
        match client.sabnzbd_queue().await {
            Ok(response) => parse_sabnzbd(&response),
            Err(err) => {
                debug!("Failed to poll SABnzbd queue: {err}");
                SabnzbdQueue::default()
            }
        }
    }

    async fn arr_queue(&self, name: ServiceName) -> Vec<QueueRecord> {
        let Some(client) = self.clients.get(name) else {
            return Vec::new();
        };
        match client.queue(1, QUEUE_PAGE_SIZE).await {
            Ok(response) => parse_arr_queue(&response),
            Err(err) => {
                debug!(service = %name, "Failed to poll import queue: {err}");
                Vec::new()
            }
        }
    }
}

fn parse_sabnzbd(response: &Value) -> SabnzbdQueue {
    let queue = &response["queue"];
    SabnzbdQueue {
        speed: text(&queue["speed"]),
        sizeleft: text(&queue["sizeleft"]),
        timeleft: text(&queue["timeleft"]),
        items: items(&queue["slots"])
            .map(|slot| SabnzbdItem {
                name: text(&slot["filename"]),
                percentage: text(&slot["percentage"]),
                sizeleft: text(&slot["sizeleft"]),
                status: text(&slot["status"]),
                timeleft: text(&slot["timeleft"]),
            })
            .collect(),
    }
}

fn parse_arr_queue(response: &Value) -> Vec<QueueRecord> {
    items(&response["records"])
        .map(|record| QueueRecord {
            title: text(&record["title"]),
            status: text(&record["status"]),
            sizeleft: number(&record["sizeleft"]),
            size: number(&record["size"]),
        })
        .collect()
}

impl Collector for DownloadsCollector {
    fn domain(&self) -> Domain {
        Domain::Downloads
    }

    fn collect(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let payload = self.gather().await;
            self.hub.publish(Domain::Downloads, serde_json::to_value(payload)?).await;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;
    use axum::{
        extract::Query,
        routing::get,
        Json,
        Router,
    };
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn sabnzbd_queue_is_flattened() {
        let queue = parse_sabnzbd(&json!({
            "queue": {
                "speed": "10.5 MB/s",
                "sizeleft": "1.2 GB",
                "timeleft": "00:05:30",
                "slots": [{
                    "filename": "Movie.2024.mkv",
                    "percentage": "45",
                    "sizeleft": "800 MB",
                    "status": "Downloading",
                    "timeleft": "00:03:00",
                }],
            }
        }));
        assert_eq!(queue.speed, "10.5 MB/s");
        assert_eq!(queue.timeleft, "00:05:30");
        assert_eq!(
            queue.items,
            vec![SabnzbdItem {
                name: "Movie.2024.mkv".into(),
                percentage: "45".into(),
                sizeleft: "800 MB".into(),
                status: "Downloading".into(),
                timeleft: "00:03:00".into(),
            }]
        );
        assert_eq!(parse_sabnzbd(&json!({ "error": "API Key Incorrect" })), SabnzbdQueue::default());
    }

    #[test]
    fn arr_records_default_missing_sizes_to_zero() {
        let records = parse_arr_queue(&json!({
            "records": [
                { "title": "Show S01E01", "status": "downloading", "sizeleft": 500, "size": 1000.5 },
                { "title": "Show S01E02" },
            ]
        }));
        assert_eq!(records.len(), 2);
        assert_eq!(serde_json::to_value(&records[0]).unwrap()["size"], json!(1000.5));
        assert_eq!(
            serde_json::to_value(&records[1]).unwrap(),
            json!({ "title": "Show S01E02", "status": "", "sizeleft": 0, "size": 0 })
        );
    }

    #[tokio::test]
    async fn missing_services_publish_empty_defaults() {
        let hub = Hub::new();
        DownloadsCollector::new(hub.clone(), ServiceClients::default())
            .collect()
            .await
            .unwrap();
        assert_eq!(
            hub.snapshot(Domain::Downloads).unwrap().payload,
            json!({
                "sabnzbd": { "speed": "", "sizeleft": "", "timeleft": "", "items": [] },
                "sonarr_queue": [],
                "radarr_queue": [],
            })
        );
    }

    #[tokio::test]
    async fn polls_sabnzbd_and_sonarr() {
        let sab = Router::new().route(
            "/api",
            get(|Query(query): Query<HashMap<String, String>>| async move {
                assert_eq!(query.get("mode").map(String::as_str), Some("queue"));
                Json(json!({ "queue": { "speed": "1 MB/s", "slots": [{ "filename": "a.nzb" }] } }))
            }),
        );
        let sonarr = Router::new().route(
            "/api/v3/queue",
            get(|| async { Json(json!({ "records": [{ "title": "Show S01E01", "size": 10 }] })) }),
        );
        let sab = test_support::serve(sab).await;
        let sonarr = test_support::serve(sonarr).await;
        let clients = test_support::clients(&[(ServiceName::Sabnzbd, sab.as_str()), (ServiceName::Sonarr, sonarr.as_str())]);

        let payload = DownloadsCollector::new(Hub::new(), clients).gather().await;
        assert_eq!(payload.sabnzbd.speed, "1 MB/s");
        assert_eq!(payload.sabnzbd.items[0].name, "a.nzb");
        assert_eq!(payload.sonarr_queue[0].title, "Show S01E01");
        assert!(payload.radarr_queue.is_empty());
        assert_eq!(payload.active(), 2);
    }
}
