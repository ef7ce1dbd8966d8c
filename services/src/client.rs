use crate::{
    binding::{
        Binding,
        StatusCall,
    },
    ClientError,
    RetryPolicy,
};
use mcc_config::{
    ServiceName,
    ServiceSettings,
};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::{
    sync::Mutex,
    time::Duration,
};
use tokio_util::sync::CancellationToken;

/// Resilient HTTP client for one remote service.
///
/// The underlying `reqwest::Client` is created on first use and dropped by
/// [`ServiceClient::close`]; a later request creates a fresh one. Concurrent
/// requests share the transport but nothing else.
#[derive(Debug)]
pub struct ServiceClient {
    binding: Binding,
    policy: RetryPolicy,
    timeout: Duration,
    cancel: CancellationToken,
    transport: Mutex<Option<reqwest::Client>>,
}

impl ServiceClient {
    pub fn new(binding: Binding, policy: RetryPolicy, timeout: Duration, cancel: CancellationToken) -> Self {
        Self {
            binding,
            policy,
            timeout,
            cancel,
            transport: Mutex::new(None),
        }
    }

    pub fn from_settings(settings: &ServiceSettings, cancel: CancellationToken) -> Self {
        Self::new(
            Binding::from_settings(settings),
            RetryPolicy::new(settings.max_attempts, settings.retry_base_delay),
            settings.timeout,
            cancel,
        )
    }

    pub fn name(&self) -> ServiceName {
        self.binding.service()
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    fn transport(&self) -> Result<reqwest::Client, ClientError> {
        let mut transport = self.transport.lock().unwrap();
        if let Some(client) = transport.as_ref() {
            return Ok(client.clone());
        }
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| ClientError::from_transport(self.name(), "<client>", e))?;
        trace!(service = %self.name(), "Created HTTP transport");
        *transport = Some(client.clone());
        Ok(client)
    }

    /// Drops the transport. Requests still in flight finish on their own clone.
    pub fn close(&self) {
        if self.transport.lock().unwrap().take().is_some() {
            debug!(service = %self.name(), "Closed HTTP transport");
        }
    }

    pub fn is_open(&self) -> bool {
        self.transport.lock().unwrap().is_some()
    }

    /// Performs one logical call, retrying connection failures per the policy
    /// and returning the raw body of a successful response.
    pub async fn request(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<String, ClientError> {
        let url = self.binding.url(endpoint).map_err(|source| ClientError::Endpoint {
            service: self.name(),
            endpoint: endpoint.to_string(),
            source,
        })?;

        self.policy
            .run(self.name(), &self.cancel, |_| self.send_once(&method, &url, query, body))
            .await
    }

    async fn send_once(
        &self,
        method: &Method,
        url: &url::Url,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<String, ClientError> {
        let service = self.name();
        let mut request = self.binding.apply(self.transport()?.request(method.clone(), url.clone()));
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ClientError::from_transport(service, url.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status {
                service,
                url: url.to_string(),
                status,
            });
        }

        response
            .text()
            .await
            .map_err(|e| ClientError::from_transport(service, url.as_str(), e))
    }

    fn decode<T: DeserializeOwned>(&self, endpoint: &str, body: &str) -> Result<T, ClientError> {
        serde_json::from_str(body).map_err(|source| ClientError::Decode {
            service: self.name(),
            url: self
                .binding
                .url(endpoint)
                .map(|u| u.to_string())
                .unwrap_or_else(|_| endpoint.to_string()),
            source,
        })
    }

    pub async fn get_json<T: DeserializeOwned>(&self, endpoint: &str, query: &[(&str, String)]) -> Result<T, ClientError> {
        let body = self.request(Method::GET, endpoint, query, None).await?;
        self.decode(endpoint, &body)
    }

    pub async fn post_json<T: DeserializeOwned>(&self, endpoint: &str, payload: &Value) -> Result<T, ClientError> {
        let body = self.request(Method::POST, endpoint, &[], Some(payload)).await?;
        self.decode(endpoint, &body)
    }

    pub async fn get_text(&self, endpoint: &str) -> Result<String, ClientError> {
        self.request(Method::GET, endpoint, &[], None).await
    }

    /// The service's status document, as used for health reporting.
    pub async fn system_status(&self) -> Result<Value, ClientError> {
        match self.binding.status_call() {
            StatusCall::Json { endpoint, query } => {
                let query = query.iter().map(|(k, v)| (*k, v.to_string())).collect::<Vec<_>>();
                self.get_json(endpoint, &query).await
            }
            StatusCall::Text { .. } => {
                let metrics = self.unpackerr_metrics().await?;
                Ok(serde_json::json!({ "service": "Unpackerr", "metrics_count": metrics.len() }))
            }
        }
    }

    /// Reachability check. Never fails; any error, including a status body
    /// that does not decode, means unreachable.
    pub async fn probe(&self) -> bool {
        let result = match self.binding.status_call() {
            StatusCall::Json { endpoint, query } => {
                let query = query.iter().map(|(k, v)| (*k, v.to_string())).collect::<Vec<_>>();
                self.get_json::<Value>(endpoint, &query).await.map(drop)
            }
            StatusCall::Text { endpoint } => self.get_text(endpoint).await.map(drop),
        };
        match result {
            Ok(()) => true,
            Err(err) => {
                debug!(service = %self.name(), "Probe failed: {err}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server;
    use axum::{
        extract::Query,
        http::{
            HeaderMap,
            StatusCode,
        },
        routing::{
            get,
            post,
        },
        Json,
        Router,
    };
    use pretty_assertions::assert_eq;
    use std::{
        collections::HashMap,
        sync::{
            atomic::{
                AtomicUsize,
                Ordering,
            },
            Arc,
        },
    };

    fn client(service: ServiceName, base: &str, key: Option<&str>, attempts: u32) -> ServiceClient {
        ServiceClient::new(
            Binding::new(service, &base.parse().unwrap(), key.map(String::from)),
            RetryPolicy::new(attempts, Duration::from_millis(10)),
            Duration::from_secs(5),
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn get_json_uses_prefix_and_key_header() {
        let app = Router::new().route(
            "/api/v3/queue",
            get(|headers: HeaderMap, Query(query): Query<HashMap<String, String>>| async move {
                Json(serde_json::json!({
                    "key": headers.get("X-Api-Key").and_then(|v| v.to_str().ok()),
                    "page": query.get("page"),
                }))
            }),
        );
        let base = test_server::serve(app).await;
        let sonarr = client(ServiceName::Sonarr, &base, Some("secret"), 3);

        let value: Value = sonarr.get_json("queue", &[("page", "1".into())]).await.unwrap();
        assert_eq!(value, serde_json::json!({ "key": "secret", "page": "1" }));
        assert!(sonarr.is_open());
    }

    #[tokio::test]
    async fn error_status_fails_fast_with_one_attempt() {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new().route(
            "/api/v3/system/status",
            get({
                let hits = hits.clone();
                move || async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    StatusCode::UNAUTHORIZED
                }
            }),
        );
        let base = test_server::serve(app).await;
        let radarr = client(ServiceName::Radarr, &base, Some("wrong"), 3);

        let err = radarr.system_status().await.unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unreachable_host_exhausts_retries() {
        let base = test_server::refused_url().await;
        let sonarr = client(ServiceName::Sonarr, &base, Some("k"), 3);

        let start = std::time::Instant::now();
        let err = sonarr.get_text("system/status").await.unwrap_err();
        assert!(err.is_retryable(), "{err}");
        // 10ms + 20ms of backoff between the three attempts
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn malformed_body_is_a_decode_error() {
        let app = Router::new().route("/api/v1/status", get(|| async { "not json" }));
        let base = test_server::serve(app).await;
        let overseerr = client(ServiceName::Overseerr, &base, Some("k"), 3);

        let err = overseerr.system_status().await.unwrap_err();
        assert!(matches!(err, ClientError::Decode { .. }), "{err}");
    }

    #[tokio::test]
    async fn post_sends_json_body() {
        let app = Router::new().route(
            "/api/v2/cruddb",
            post(|Json(body): Json<Value>| async move { Json(body["data"]["collection"].clone()) }),
        );
        let base = test_server::serve(app).await;
        let tdarr = client(ServiceName::Tdarr, &base, None, 1);

        let collection: String = tdarr
            .post_json("cruddb", &serde_json::json!({ "data": { "collection": "NodeJSONDB" } }))
            .await
            .unwrap();
        assert_eq!(collection, "NodeJSONDB");
    }

    #[tokio::test]
    async fn probe_reports_reachability() {
        let app = Router::new().route("/identity", get(|| async { Json(serde_json::json!({ "version": "1.40" })) }));
        let base = test_server::serve(app).await;
        assert!(client(ServiceName::Plex, &base, Some("tok"), 1).probe().await);

        let app = Router::new().route("/api", get(|| async { StatusCode::FORBIDDEN }));
        let base = test_server::serve(app).await;
        assert!(!client(ServiceName::Sabnzbd, &base, Some("k"), 1).probe().await);

        let base = test_server::refused_url().await;
        assert!(!client(ServiceName::Unpackerr, &base, None, 2).probe().await);
    }

    #[tokio::test]
    async fn probe_rejects_a_status_page_that_is_not_json() {
        let app = Router::new().route("/api/v1/status", get(|| async { "<html>login</html>" }));
        let base = test_server::serve(app).await;
        let overseerr = client(ServiceName::Overseerr, &base, Some("k"), 1);

        assert!(overseerr.system_status().await.is_err());
        assert!(!overseerr.probe().await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_requests_survive_repeated_close() {
        let app = Router::new().route("/metrics", get(|| async { "up 1\n" }));
        let base = test_server::serve(app).await;
        let unpackerr = Arc::new(client(ServiceName::Unpackerr, &base, None, 1));

        let closer = tokio::spawn({
            let unpackerr = unpackerr.clone();
            async move {
                for _ in 0..200 {
                    unpackerr.close();
                    tokio::task::yield_now().await;
                }
            }
        });
        let requests = (0..32)
            .map(|_| {
                let unpackerr = unpackerr.clone();
                tokio::spawn(async move {
                    let mut bodies = Vec::new();
                    for _ in 0..5 {
                        bodies.push(unpackerr.get_text("metrics").await);
                    }
                    bodies
                })
            })
            .collect::<Vec<_>>();

        closer.await.unwrap();
        for request in requests {
            for body in request.await.unwrap() {
                assert_eq!(body.unwrap(), "up 1\n");
            }
        }

        assert_eq!(unpackerr.get_text("metrics").await.unwrap(), "up 1\n");
        assert!(unpackerr.is_open());
    }

    #[tokio::test]
    async fn transport_is_recreated_after_close() {
        let app = Router::new().route("/metrics", get(|| async { "up 1\n" }));
        let base = test_server::serve(app).await;
        let unpackerr = client(ServiceName::Unpackerr, &base, None, 1);

        assert!(!unpackerr.is_open());
        unpackerr.get_text("metrics").await.unwrap();
        unpackerr.close();
        assert!(!unpackerr.is_open());
        assert_eq!(unpackerr.get_text("metrics").await.unwrap(), "up 1\n");
        assert!(unpackerr.is_open());
    }
}
