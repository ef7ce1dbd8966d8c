use crate::{
    error::AppError,
    metrics::Gauges,
    ws::handler,
};
use axum::{
    extract::{
        Path,
        State,
    },
    http::header::CONTENT_TYPE,
    response::IntoResponse,
    routing::get,
    Json,
    Router,
};
use mcc_collectors::{
    empty_payload,
    Hub,
};
use mcc_config::Domain;
use serde_json::Value;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

#[derive(Clone, Debug)]
pub struct AppState {
    pub hub: Hub,
    pub gauges: Arc<Gauges>,
}

pub fn create_router(hub: Hub) -> Result<Router, prometheus::Error> {
    let state = AppState {
        hub,
        gauges: Arc::new(Gauges::new()?),
    };

    Ok(Router::new()
        .route("/healthz", get(healthz))
        .route("/api/{domain}", get(snapshot))
        .route("/ws", get(handler))
        .route("/metrics", get(metrics))
        .layer(CorsLayer::permissive())
        .with_state(state))
}

async fn healthz() -> &'static str {
    "OK"
}

/// The cached envelope, or the domain's empty payload if nothing was published yet.
async fn snapshot(State(state): State<AppState>, Path(domain): Path<String>) -> Result<Json<Value>, AppError> {
    let domain = domain
        .parse::<Domain>()
        .map_err(|_| AppError::UnknownDomain(domain))?;
    let body = match state.hub.snapshot(domain) {
        Some(envelope) => serde_json::to_value(&*envelope).unwrap_or_else(|_| empty_payload(domain)),
        None => empty_payload(domain),
    };
    Ok(Json(body))
}

async fn metrics(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    state.gauges.refresh(&state.hub);
    let body = state.gauges.render()?;
    Ok(([(CONTENT_TYPE, state.gauges.content_type())], body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{
            to_bytes,
            Body,
        },
        http::{
            Request,
            StatusCode,
        },
    };
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tower::ServiceExt as _;

    async fn get_json(router: Router, uri: &str) -> (StatusCode, Value) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn unpublished_domain_returns_empty_payload() {
        let router = create_router(Hub::new()).unwrap();
        let (status, body) = get_json(router, "/api/streaming").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "stream_count": 0, "transcode_count": 0, "sessions": [] }));
    }

    #[tokio::test]
    async fn published_domain_returns_the_envelope() {
        let hub = Hub::new();
        hub.publish(Domain::Calendar, json!({ "episodes": [], "movies": [{ "title": "Dune" }] }))
            .await;
        let (status, body) = get_json(create_router(hub).unwrap(), "/api/calendar").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["type"], "calendar");
        assert_eq!(body["data"]["movies"][0]["title"], "Dune");
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn unknown_domain_is_not_found() {
        let (status, body) = get_json(create_router(Hub::new()).unwrap(), "/api/weather").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "error": "Unknown domain: weather" }));
    }

    #[tokio::test]
    async fn metrics_are_plain_text() {
        let router = create_router(Hub::new()).unwrap();
        let response = router
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()[CONTENT_TYPE].to_str().unwrap().starts_with("text/plain"));
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&body).contains("mcc_downloads_active 0"));
    }

    #[tokio::test]
    async fn cors_headers_are_present() {
        let router = create_router(Hub::new()).unwrap();
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/healthz")
                    .header("Origin", "http://dashboard.lan")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
    }
}
