use crate::{
    json::text,
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
use serde_json::Value;
use std::{
    future::Future,
    pin::Pin,
};

const DIRECT_PLAY: &str = "directplay";
const TRANSCODE: &str = "transcode";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user: String,
    pub title: String,
    pub grandparent_title: String,
    pub parent_index: Value,
    pub index: Value,
    pub decision: String,
}

impl Session {
    fn from_plex(session: &Value) -> Self {
        let mut decision = session
            .pointer("/Media/0/Part/0/decision")
            .and_then(Value::as_str)
            .unwrap_or(DIRECT_PLAY)
            .to_string();
        if session
            .get("TranscodeSession")
            .is_some_and(|t| t.as_object().is_some_and(|o| !o.is_empty()))
        {
            decision = TRANSCODE.to_string();
        }

        Self {
            user: text(&session["User"]["title"]),
            title: text(&session["title"]),
            grandparent_title: text(&session["grandparentTitle"]),
            parent_index: session["parentIndex"].clone(),
            index: session["index"].clone(),
            decision,
        }
    }

    pub fn is_transcode(&self) -> bool {
        self.decision == TRANSCODE
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamingPayload {
    pub stream_count: usize,
    pub transcode_count: usize,
    pub sessions: Vec<Session>,
}

impl StreamingPayload {
    fn from_sessions(sessions: &[Value]) -> Self {
        let sessions = sessions.iter().map(Session::from_plex).collect::<Vec<_>>();
        Self {
            stream_count: sessions.len(),
            transcode_count: sessions.iter().filter(|s| s.is_transcode()).count(),
            sessions,
        }
    }
}

/// Active Plex sessions.
#[derive(Debug, Clone)]
pub struct StreamingCollector {
    hub: Hub,
    clients: ServiceClients,
}

impl StreamingCollector {
    pub fn new(hub: Hub, clients: ServiceClients) -> Self {
        Self { hub, clients }
    }

    pub async fn gather(&self) -> StreamingPayload {
        let Some(plex) = self.clients.get(ServiceName::Plex) else {
            return StreamingPayload::default();
        };
        match plex.plex_sessions().await {
            Ok(sessions) => StreamingPayload::from_sessions(&sessions),
            Err(err) => {
                debug!("Failed to poll Plex sessions: {err}");
                StreamingPayload::default()
            }
        }
    }
}

impl Collector for StreamingCollector {
    fn domain(&self) -> Domain {
        Domain::Streaming
    }

    fn collect(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let payload = self.gather().await;
            self.hub.publish(Domain::Streaming, serde_json::to_value(payload)?).await;
            Ok(())
        })
    }
}
