use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::{Value, json};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::ServerConfig;
use crate::error::MockServerError;
use crate::statsd;
use crate::store::{CaptureStore, Captures, Snapshot, truncate_chars};

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// A mock Datadog server: the Events API over HTTP and DogStatsD over UDP,
/// both writing into one [`CaptureStore`].
#[derive(Debug)]
pub struct MockServer {
    store: CaptureStore,
    http_addr: SocketAddr,
    statsd_addr: SocketAddr,
}

/// Builder for [`MockServer`].
///
/// Both listeners bind to `127.0.0.1:0` unless configured otherwise, so tests
/// can run in parallel on OS-assigned ports.
#[derive(Debug)]
pub struct MockServerBuilder {
    store: Option<CaptureStore>,
    http_addr: SocketAddr,
    statsd_addr: SocketAddr,
}

impl Default for MockServerBuilder {
    fn default() -> Self {
        let localhost = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0);
        Self {
            store: None,
            http_addr: localhost,
            statsd_addr: localhost,
        }
    }
}

impl MockServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the address for the Events API listener.
    #[must_use]
    pub fn http_addr(mut self, addr: SocketAddr) -> Self {
        self.http_addr = addr;
        self
    }

    /// Sets the address for the DogStatsD listener.
    #[must_use]
    pub fn statsd_addr(mut self, addr: SocketAddr) -> Self {
        self.statsd_addr = addr;
        self
    }

    /// Takes both listen addresses from a [`ServerConfig`].
    #[must_use]
    pub fn config(self, config: &ServerConfig) -> Self {
        self.http_addr(config.http_addr())
            .statsd_addr(config.statsd_addr())
    }

    /// Uses an existing store instead of a fresh one.
    ///
    /// This allows sharing captured history between servers, or keeping it
    /// after a server has shut down.
    #[must_use]
    pub fn store(mut self, store: CaptureStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn build(self) -> MockServer {
        MockServer {
            store: self.store.unwrap_or_default(),
            http_addr: self.http_addr,
            statsd_addr: self.statsd_addr,
        }
    }

    /// Builds and starts the server.
    ///
    /// # Errors
    ///
    /// Returns an error if either listener fails to bind.
    pub async fn start(self) -> Result<ServerHandle, MockServerError> {
        self.build().start().await
    }
}

impl MockServer {
    /// Creates a server with a fresh store on OS-assigned localhost ports.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use mock_datadog::MockServer;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let server = MockServer::new().start().await?;
    /// println!("DD_API_URL=http://{}", server.http_addr());
    /// println!("DD_DOGSTATSD_URL=udp://{}", server.statsd_addr());
    /// # Ok(())
    /// # }
    /// ```
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> MockServerBuilder {
        MockServerBuilder::new()
    }

    /// Binds both listeners and spawns them onto the current runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if either listener fails to bind.
    pub async fn start(self) -> Result<ServerHandle, MockServerError> {
        let addr = self.http_addr;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| MockServerError::BindError { addr, source })?;
        let http_addr = listener
            .local_addr()
            .map_err(|source| MockServerError::BindError { addr, source })?;

        let addr = self.statsd_addr;
        let socket = statsd::bind(addr).await?;
        let statsd_addr = socket
            .local_addr()
            .map_err(|source| MockServerError::BindError { addr, source })?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let statsd_task = tokio::spawn(statsd::serve(
            socket,
            self.store.clone(),
            shutdown_rx.clone(),
        ));

        let app = router(self.store.clone());
        let mut http_shutdown = shutdown_rx;
        let http_task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    http_shutdown.changed().await.ok();
                })
                .await
                .map_err(|e| MockServerError::ServerError(e.to_string()))
        });

        tracing::debug!(%http_addr, %statsd_addr, "mock Datadog server started");

        Ok(ServerHandle {
            store: self.store,
            http_addr,
            statsd_addr,
            shutdown_tx: Some(shutdown_tx),
            tasks: vec![http_task, statsd_task],
        })
    }
}

impl Default for MockServer {
    fn default() -> Self {
        Self::new()
    }
}

/// A handle to a running mock server.
///
/// Use this to access captured data, get the bound addresses, or shut the
/// server down. Dropping the handle also stops both listeners.
pub struct ServerHandle {
    store: CaptureStore,
    http_addr: SocketAddr,
    statsd_addr: SocketAddr,
    shutdown_tx: Option<watch::Sender<bool>>,
    tasks: Vec<JoinHandle<Result<(), MockServerError>>>,
}

impl std::fmt::Debug for ServerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerHandle")
            .field("http_addr", &self.http_addr)
            .field("statsd_addr", &self.statsd_addr)
            .field("store", &"<CaptureStore>")
            .finish()
    }
}

impl ServerHandle {
    /// Returns a clone of the store shared by both listeners.
    pub fn store(&self) -> CaptureStore {
        self.store.clone()
    }

    /// Runs a closure with read access to the captured history.
    pub async fn with_captures<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&Captures) -> R,
    {
        self.store.with_captures(f).await
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.store.snapshot().await
    }

    /// Returns the bound Events API address.
    ///
    /// This is useful when using port 0 for OS-assigned ports.
    pub fn http_addr(&self) -> SocketAddr {
        self.http_addr
    }

    /// Returns the bound DogStatsD address.
    pub fn statsd_addr(&self) -> SocketAddr {
        self.statsd_addr
    }

    /// Waits until at least `count` events have been captured.
    ///
    /// # Errors
    ///
    /// Returns [`MockServerError::Timeout`] if `timeout` elapses first.
    pub async fn wait_for_events(
        &self,
        count: usize,
        timeout: Duration,
    ) -> Result<(), MockServerError> {
        self.wait_for("events", count, timeout, Captures::event_count)
            .await
    }

    /// Waits until at least `count` metric datagrams have been captured.
    ///
    /// UDP delivery is asynchronous, so tests should wait before asserting on
    /// metrics.
    ///
    /// # Errors
    ///
    /// Returns [`MockServerError::Timeout`] if `timeout` elapses first.
    pub async fn wait_for_metrics(
        &self,
        count: usize,
        timeout: Duration,
    ) -> Result<(), MockServerError> {
        self.wait_for("metrics", count, timeout, Captures::metric_count)
            .await
    }

    async fn wait_for<F>(
        &self,
        signal: &'static str,
        expected: usize,
        timeout: Duration,
        count: F,
    ) -> Result<(), MockServerError>
    where
        F: Fn(&Captures) -> usize,
    {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let found = self.store.with_captures(&count).await;
            if found >= expected {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(MockServerError::Timeout {
                    signal,
                    expected,
                    found,
                    timeout,
                });
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }

    /// Stops both listeners and waits for them to finish.
    ///
    /// # Errors
    ///
    /// Returns an error if a listener task panicked or the HTTP server failed.
    pub async fn shutdown(mut self) -> Result<(), MockServerError> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(true);
        }
        for task in self.tasks.drain(..) {
            task.await??;
        }
        tracing::debug!("mock Datadog server stopped");
        Ok(())
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(true);
        }
    }
}

fn router(store: CaptureStore) -> Router {
    Router::new()
        .route("/status", get(handle_status).post(handle_event))
        .fallback(handle_fallback)
        .with_state(store)
}

async fn handle_fallback(
    State(store): State<CaptureStore>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Response {
    if method == Method::POST {
        handle_event(State(store), uri, body).await.into_response()
    } else if method == Method::GET {
        StatusCode::NOT_FOUND.into_response()
    } else {
        StatusCode::METHOD_NOT_ALLOWED.into_response()
    }
}

/// Accepts any JSON body on any path. Bodies that fail to decode are
/// acknowledged but not stored.
async fn handle_event(State(store): State<CaptureStore>, uri: Uri, body: Bytes) -> Json<Value> {
    let path = uri
        .path_and_query()
        .map_or_else(|| uri.path().to_string(), |pq| pq.as_str().to_string());

    let payload = std::str::from_utf8(&body)
        .map_err(|e| e.to_string())
        .and_then(|text| serde_json::from_str::<Value>(text).map_err(|e| e.to_string()));

    let event_id = match payload {
        Ok(payload) => {
            log_event(&path, &payload);
            store.append_event(payload, path).await
        }
        Err(error) => {
            tracing::warn!(%path, %error, "Invalid JSON received");
            store.event_count().await
        }
    };

    Json(json!({ "status": "ok", "event_id": event_id }))
}

async fn handle_status(State(store): State<CaptureStore>) -> Response {
    let snapshot = store.snapshot().await;
    match serde_json::to_string_pretty(&snapshot) {
        Ok(body) => ([(header::CONTENT_TYPE, "application/json")], body).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to encode status: {}", e),
        )
            .into_response(),
    }
}

fn str_field<'a>(payload: &'a Value, key: &str) -> &'a str {
    payload.get(key).and_then(Value::as_str).unwrap_or("N/A")
}

fn log_event(path: &str, payload: &Value) {
    let tags = payload
        .get("tags")
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_default();

    tracing::info!(
        path,
        title = str_field(payload, "title"),
        alert_type = str_field(payload, "alert_type"),
        tags = %tags,
        host = str_field(payload, "host"),
        text = truncate_chars(str_field(payload, "text"), 100),
        "Event received"
    );
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_str_field_defaults_to_na() {
        let payload = json!({"title": "Pool degraded", "priority": 3});
        assert_eq!(str_field(&payload, "title"), "Pool degraded");
        assert_eq!(str_field(&payload, "priority"), "N/A");
        assert_eq!(str_field(&payload, "host"), "N/A");
        assert_eq!(str_field(&json!("scalar"), "title"), "N/A");
    }

    #[test]
    fn test_builder_defaults_to_localhost_ephemeral_ports() {
        let builder = MockServer::builder();
        assert_eq!(builder.http_addr.to_string(), "127.0.0.1:0");
        assert_eq!(builder.statsd_addr.to_string(), "127.0.0.1:0");
    }

    #[test]
    fn test_builder_from_config() {
        let builder = MockServer::builder().config(&ServerConfig::default());
        assert_eq!(builder.http_addr.to_string(), "0.0.0.0:8080");
        assert_eq!(builder.statsd_addr.to_string(), "0.0.0.0:8125");
    }

    #[tokio::test]
    async fn test_start_and_shutdown() {
        let server = MockServer::new().start().await.unwrap();
        assert_ne!(server.http_addr().port(), 0);
        assert_ne!(server.statsd_addr().port(), 0);
        server.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_shared_store_survives_shutdown() {
        let store = CaptureStore::new();
        let server = MockServer::builder()
            .store(store.clone())
            .start()
            .await
            .unwrap();

        server
            .store()
            .append_event(json!({"title": "kept"}), "/api/v1/events")
            .await;
        server.shutdown().await.unwrap();

        assert_eq!(store.event_count().await, 1);
    }

    #[tokio::test]
    async fn test_wait_for_times_out() {
        let server = MockServer::new().start().await.unwrap();
        let err = server
            .wait_for_metrics(1, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MockServerError::Timeout {
                signal: "metrics",
                expected: 1,
                found: 0,
                ..
            }
        ));
        server.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_bind_conflict_is_reported() {
        let first = MockServer::new().start().await.unwrap();
        let err = MockServer::builder()
            .http_addr(first.http_addr())
            .start()
            .await
            .unwrap_err();
        match err {
            MockServerError::BindError { addr, .. } => assert_eq!(addr, first.http_addr()),
            other => panic!("expected bind error, got {other:?}"),
        }
        first.shutdown().await.unwrap();
    }
}
