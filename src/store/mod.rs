mod assertions;
mod helpers;
mod predicates;
mod types;

pub use assertions::{EventAssertion, MetricAssertion};
pub use types::{CapturedEvent, CapturedMetric, Snapshot};

pub(crate) use helpers::truncate_chars;

use helpers::{format_payload, tail};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Number of records of each kind returned by [`Captures::snapshot`].
pub const RECENT_LIMIT: usize = 10;

/// The captured history: every event and metric received, in arrival order.
///
/// History only grows. There is no eviction.
#[derive(Debug, Clone, Default)]
pub struct Captures {
    events: Vec<CapturedEvent>,
    metrics: Vec<CapturedMetric>,
}

impl Captures {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event and returns its 1-based id, which is the new event count.
    pub fn push_event(&mut self, payload: Value, path: impl Into<String>) -> usize {
        self.events.push(CapturedEvent::new(payload, path.into()));
        self.events.len()
    }

    pub fn push_metric(&mut self, metric: CapturedMetric) {
        self.metrics.push(metric);
    }

    pub fn events(&self) -> &[CapturedEvent] {
        &self.events
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn metrics(&self) -> &[CapturedMetric] {
        &self.metrics
    }

    pub fn metric_count(&self) -> usize {
        self.metrics.len()
    }

    /// Totals plus the last [`RECENT_LIMIT`] events and metrics, oldest first.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            events_received: self.events.len(),
            metrics_received: self.metrics.len(),
            events: tail(&self.events, RECENT_LIMIT),
            metrics: tail(&self.metrics, RECENT_LIMIT),
        }
    }

    pub fn dump(&self) -> String {
        let mut output = format!(
            "Mock Datadog: {} event(s), {} metric(s)\n",
            self.events.len(),
            self.metrics.len()
        );
        for (idx, event) in self.events.iter().enumerate() {
            output.push_str(&format!(
                "\n[event {}] path={:?} payload={}",
                idx,
                event.path,
                format_payload(&event.payload, 120)
            ));
        }
        for (idx, metric) in self.metrics.iter().enumerate() {
            output.push_str(&format!(
                "\n[metric {}] {:?} from {}",
                idx, metric.raw_line, metric.source_address
            ));
            if metric.parsed.is_none() {
                output.push_str(" (unparsed)");
            }
        }
        output
    }

    /// Starts building an assertion over all captured events.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use mock_datadog::Captures;
    /// # let captures = Captures::new();
    /// captures
    ///     .expect_event()
    ///     .with_field("alert_type", "error")
    ///     .with_tag("pool:tank")
    ///     .assert_count(1);
    /// ```
    pub fn expect_event(&self) -> EventAssertion<'_> {
        EventAssertion::new(&self.events, None)
    }

    pub fn expect_event_at_path<S: Into<String>>(&self, path: S) -> EventAssertion<'_> {
        EventAssertion::new(&self.events, Some(path.into()))
    }

    pub fn expect_metric_with_name<S: Into<String>>(&self, name: S) -> MetricAssertion<'_> {
        MetricAssertion::new(&self.metrics, Some(name.into()))
    }

    /// Starts building an assertion for metrics without specifying a name.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use mock_datadog::Captures;
    /// # let captures = Captures::new();
    /// captures
    ///     .expect_metric()
    ///     .with_tag("env:prod")
    ///     .assert_at_least(3);
    /// ```
    pub fn expect_metric(&self) -> MetricAssertion<'_> {
        MetricAssertion::new(&self.metrics, None)
    }
}

/// Thread-safe handle to the captured history, shared by both listeners.
///
/// Cloning is cheap and every clone refers to the same history. Each append
/// holds the write lock for the whole push, so a concurrent [`snapshot`]
/// either sees a record in full or not at all.
///
/// [`snapshot`]: CaptureStore::snapshot
#[derive(Debug, Clone, Default)]
pub struct CaptureStore {
    inner: Arc<RwLock<Captures>>,
}

impl CaptureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event and returns its id. Ids are assigned under the same
    /// lock as the push, so concurrent callers never share an id.
    pub async fn append_event(&self, payload: Value, path: impl Into<String>) -> usize {
        self.inner.write().await.push_event(payload, path)
    }

    pub async fn append_metric(&self, metric: CapturedMetric) {
        self.inner.write().await.push_metric(metric);
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.inner.read().await.snapshot()
    }

    pub async fn event_count(&self) -> usize {
        self.inner.read().await.event_count()
    }

    pub async fn metric_count(&self) -> usize {
        self.inner.read().await.metric_count()
    }

    /// Runs a closure with read access to the full history.
    pub async fn with_captures<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&Captures) -> R,
    {
        let captures = self.inner.read().await;
        f(&captures)
    }
}
