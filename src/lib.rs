//! A mock Datadog server for testing.
//!
//! This library runs a stand-in for the two Datadog ingestion surfaces a
//! monitoring client talks to: the Events API over HTTP and DogStatsD metrics
//! over UDP. Everything received is captured in memory so integration tests can
//! assert on exactly what the client sent.
//!
//! # Features
//!
//! - **Events API**: `POST` any JSON body to any path, read it back from `GET /status`
//! - **DogStatsD**: `name:value|type|#tags` datagrams over UDP, captured even when malformed
//! - **Fluent Assertion API**: builder-style assertions on events and metrics
//! - **Parallel-Safe**: binds OS-assigned localhost ports by default
//! - **Async-Ready**: Built with Tokio for async/await compatibility
//!
//! # Quick Start
//!
//! ```no_run
//! use mock_datadog::MockServer;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = MockServer::new().start().await?;
//!
//!     // Point your client at server.http_addr() and server.statsd_addr()...
//!
//!     server.wait_for_metrics(1, Duration::from_secs(5)).await?;
//!
//!     server.with_captures(|captures| {
//!         captures
//!             .expect_event()
//!             .with_field("alert_type", "error")
//!             .with_tag("pool:tank")
//!             .assert_exists();
//!
//!         captures
//!             .expect_metric_with_name("zfs.pool.health")
//!             .with_type("g")
//!             .with_tag("pool:tank")
//!             .assert_count(1);
//!     }).await;
//!
//!     server.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! # HTTP surface
//!
//! | Method | Path      | Response                                  |
//! |--------|-----------|-------------------------------------------|
//! | POST   | any       | `200 {"status":"ok","event_id":N}`        |
//! | GET    | `/status` | `200` with counts and the last 10 of each |
//! | GET    | other     | `404`, empty body                         |
//!
//! A POST whose body is not valid JSON is still answered with `200`, but
//! nothing is stored and `event_id` is the current event count.

mod config;
mod error;
mod server;
mod statsd;
mod store;

pub use config::{DEFAULT_HTTP_PORT, DEFAULT_STATSD_PORT, ServerConfig};
pub use error::MockServerError;
pub use server::{MockServer, MockServerBuilder, ServerHandle};
pub use statsd::{Ingest, MAX_DATAGRAM_SIZE, MetricLine};
pub use store::{
    CaptureStore, CapturedEvent, CapturedMetric, Captures, EventAssertion, MetricAssertion,
    RECENT_LIMIT, Snapshot,
};
