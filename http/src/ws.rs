use crate::router::AppState;
use axum::{
    extract::{
        ws::{
            Message,
            WebSocket,
            WebSocketUpgrade,
        },
        State,
    },
    response::Response,
};
use futures::{
    sink::SinkExt,
    stream::{
        SplitSink,
        SplitStream,
        StreamExt,
    },
};
use std::sync::Arc;
use tokio::sync::mpsc::{
    channel,
    Receiver,
};

/// Frames a connection may lag behind before the hub drops it.
pub const SUBSCRIBER_BUFFER: usize = 64;

pub async fn handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Registers the connection with the hub, which replays every cached envelope.
/// Outbound frames go through a bounded channel drained by a writer task; the
/// read side only watches for the client going away.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (sender, receiver) = socket.split();
    let (tx, rx) = channel::<Arc<str>>(SUBSCRIBER_BUFFER);

    let id = state.hub.register_with_replay(Arc::new(tx));
    info!(%id, "WebSocket client connected");

    let mut writer = tokio::spawn(write_loop(sender, rx));
    tokio::select! {
        _ = &mut writer => debug!(%id, "WebSocket writer finished"),
        _ = read_loop(receiver) => debug!(%id, "WebSocket reader finished"),
    }

    state.hub.remove(id);
    writer.abort();
    info!(%id, "WebSocket client disconnected");
}

async fn write_loop(mut sender: SplitSink<WebSocket, Message>, mut rx: Receiver<Arc<str>>) {
    while let Some(message) = rx.recv().await {
        if let Err(err) = sender.send(Message::Text(message.as_ref().into())).await {
            debug!("Failed to send to WebSocket client: {err}");
            return;
        }
    }
    let _ = sender.send(Message::Close(None)).await;
}

/// Inbound messages only keep the connection alive.
async fn read_loop(mut receiver: SplitStream<WebSocket>) {
    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Close(_)) => {
                debug!("WebSocket connection closed by client");
                return;
            }
            Ok(message) => trace!("Ignoring client message: {message:?}"),
            Err(err) => {
                debug!("WebSocket read failed: {err}");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::create_router;
    use futures::{
        SinkExt as _,
        StreamExt as _,
    };
    use mcc_collectors::Hub;
    use mcc_config::Domain;
    use pretty_assertions::assert_eq;
    use serde_json::{
        json,
        Value,
    };
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio_tungstenite::{
        connect_async,
        tungstenite::Message,
    };

    async fn serve(hub: Hub) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = create_router(hub).unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        format!("ws://{addr}/ws")
    }

    async fn wait_for_subscribers(hub: &Hub, expected: usize) {
        for _ in 0..200 {
            if hub.subscriber_count() == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {expected} subscribers, have {}", hub.subscriber_count());
    }

    fn parse(message: Message) -> Value {
        serde_json::from_str(message.to_text().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn replays_snapshots_then_streams_publishes() {
        let hub = Hub::new();
        hub.publish(Domain::Calendar, json!({ "episodes": [], "movies": [] })).await;
        hub.publish(Domain::Health, json!({ "services": [] })).await;

        let (mut socket, _) = connect_async(serve(hub.clone()).await).await.unwrap();

        let first = parse(socket.next().await.unwrap().unwrap());
        let second = parse(socket.next().await.unwrap().unwrap());
        assert_eq!(first["type"], "health");
        assert_eq!(second["type"], "calendar");

        wait_for_subscribers(&hub, 1).await;
        hub.publish(Domain::Streaming, json!({ "stream_count": 1 })).await;
        let pushed = parse(socket.next().await.unwrap().unwrap());
        assert_eq!(pushed["type"], "streaming");
        assert_eq!(pushed["data"], json!({ "stream_count": 1 }));

        socket.send(Message::Text("ping".into())).await.unwrap();
        socket.close(None).await.unwrap();
        wait_for_subscribers(&hub, 0).await;
    }

    #[tokio::test]
    async fn dropped_connection_is_removed() {
        let hub = Hub::new();
        let (socket, _) = connect_async(serve(hub.clone()).await).await.unwrap();
        wait_for_subscribers(&hub, 1).await;

        drop(socket);
        wait_for_subscribers(&hub, 0).await;
        hub.publish(Domain::Downloads, json!({})).await;
        assert_eq!(hub.subscriber_count(), 0);
    }
}
