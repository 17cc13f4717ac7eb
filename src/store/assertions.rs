use serde_json::Value;

use super::helpers::{check_fields, format_payload, payload_has_tag};
use super::predicates::impl_assertion_methods;
use super::types::{CapturedEvent, CapturedMetric};

/// A builder for constructing event assertions.
#[derive(Debug)]
pub struct EventAssertion<'a> {
    events: &'a [CapturedEvent],
    path: Option<String>,
    fields: Option<Vec<(String, Value)>>,
    tags: Vec<String>,
}

impl<'a> EventAssertion<'a> {
    pub(crate) fn new(events: &'a [CapturedEvent], path: Option<String>) -> Self {
        Self {
            events,
            path,
            fields: None,
            tags: Vec::new(),
        }
    }

    impl_assertion_methods!(events, CapturedEvent, "events", format_matching_events);

    /// Restricts the assertion to events posted to `path`.
    #[must_use]
    pub fn with_path<S: Into<String>>(mut self, path: S) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Adds top-level payload field criteria.
    ///
    /// All values must have the same type. For mixed types, use
    /// [`with_field`](Self::with_field) instead.
    #[must_use]
    pub fn with_fields<I, K, V>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.fields = Some(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Adds a single top-level payload field criterion.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use mock_datadog::Captures;
    /// # let captures = Captures::new();
    /// captures
    ///     .expect_event()
    ///     .with_field("title", "Pool degraded")
    ///     .with_field("alert_type", "error")
    ///     .assert_exists();
    /// ```
    #[must_use]
    pub fn with_field<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.fields
            .get_or_insert_with(Vec::new)
            .push((key.into(), value.into()));
        self
    }

    /// Requires the payload's `tags` array to contain `tag`.
    #[must_use]
    pub fn with_tag<S: Into<String>>(mut self, tag: S) -> Self {
        self.tags.push(tag.into());
        self
    }

    fn matches(&self, event: &CapturedEvent) -> bool {
        if let Some(expected_path) = &self.path
            && &event.path != expected_path
        {
            return false;
        }

        if let Some(expected_fields) = &self.fields
            && !check_fields(&event.payload, expected_fields)
        {
            return false;
        }

        self.tags
            .iter()
            .all(|tag| payload_has_tag(&event.payload, tag))
    }

    fn format_criteria(&self) -> String {
        let mut criteria = Vec::new();
        if let Some(path) = &self.path {
            criteria.push(format!("path={:?}", path));
        }
        if let Some(fields) = &self.fields {
            criteria.push(format!("fields={:?}", fields));
        }
        if !self.tags.is_empty() {
            criteria.push(format!("tags={:?}", self.tags));
        }
        if criteria.is_empty() {
            criteria.push("<any event>".to_string());
        }
        criteria.join(", ")
    }

    fn format_matching_events(&self) -> String {
        let matching = self.get_all();
        if matching.is_empty() {
            return String::new();
        }

        let mut output = String::from("Matching events:\n");
        for (idx, event) in matching.iter().enumerate() {
            output.push_str(&format!(
                "  [{}] path={:?} payload={}\n",
                idx,
                event.path,
                format_payload(&event.payload, 80)
            ));
        }
        output
    }

    fn build_error_message(&self) -> String {
        let mut msg = String::from("No events matched the assertion.\n\n");
        msg.push_str(&format!("Expected:\n  {}\n\n", self.format_criteria()));
        msg.push_str(&format!("Found {} event(s) in store", self.events.len()));

        if !self.events.is_empty() {
            msg.push_str(":\n");
            for (idx, event) in self.events.iter().enumerate().take(10) {
                msg.push_str(&format!(
                    "  [{}] path={:?} payload={}\n",
                    idx,
                    event.path,
                    format_payload(&event.payload, 80)
                ));
            }

            if self.events.len() > 10 {
                msg.push_str(&format!("  ... and {} more\n", self.events.len() - 10));
            }
        }

        msg
    }
}

/// A builder for constructing DogStatsD metric assertions.
///
/// Criteria on name, value, type or tags only match lines that parsed; use
/// [`with_raw_line`](Self::with_raw_line) to match unparseable lines.
#[derive(Debug)]
pub struct MetricAssertion<'a> {
    metrics: &'a [CapturedMetric],
    name: Option<String>,
    value: Option<String>,
    metric_type: Option<String>,
    tags: Vec<String>,
    raw_line: Option<String>,
    source_address: Option<String>,
    parsed: Option<bool>,
}

impl<'a> MetricAssertion<'a> {
    pub(crate) fn new(metrics: &'a [CapturedMetric], name: Option<String>) -> Self {
        Self {
            metrics,
            name,
            value: None,
            metric_type: None,
            tags: Vec::new(),
            raw_line: None,
            source_address: None,
            parsed: None,
        }
    }

    impl_assertion_methods!(metrics, CapturedMetric, "metrics", format_matching_metrics);

    /// Matches the value text exactly as sent, e.g. `"1"` or `"73.5"`.
    #[must_use]
    pub fn with_value<S: Into<String>>(mut self, value: S) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Matches the type segment, e.g. `"c"`, `"g"`, `"h"`.
    #[must_use]
    pub fn with_type<S: Into<String>>(mut self, metric_type: S) -> Self {
        self.metric_type = Some(metric_type.into());
        self
    }

    /// Requires `tag` (e.g. `"env:prod"`) among the comma-separated tags.
    #[must_use]
    pub fn with_tag<S: Into<String>>(mut self, tag: S) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Requires all of `tags` among the comma-separated tags.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Matches the trimmed datagram text exactly.
    #[must_use]
    pub fn with_raw_line<S: Into<String>>(mut self, raw_line: S) -> Self {
        self.raw_line = Some(raw_line.into());
        self
    }

    #[must_use]
    pub fn with_source_address<S: Into<String>>(mut self, source_address: S) -> Self {
        self.source_address = Some(source_address.into());
        self
    }

    /// Only matches lines that could not be parsed into structured fields.
    #[must_use]
    pub fn unparsed(mut self) -> Self {
        self.parsed = Some(false);
        self
    }

    fn needs_parsed_line(&self) -> bool {
        self.name.is_some()
            || self.value.is_some()
            || self.metric_type.is_some()
            || !self.tags.is_empty()
    }

    fn matches(&self, metric: &CapturedMetric) -> bool {
        if let Some(expected_raw) = &self.raw_line
            && &metric.raw_line != expected_raw
        {
            return false;
        }

        if let Some(expected_source) = &self.source_address
            && &metric.source_address != expected_source
        {
            return false;
        }

        if let Some(expected_parsed) = self.parsed
            && metric.parsed.is_some() != expected_parsed
        {
            return false;
        }

        if !self.needs_parsed_line() {
            return true;
        }

        let Some(line) = &metric.parsed else {
            return false;
        };

        if let Some(expected_name) = &self.name
            && &line.name != expected_name
        {
            return false;
        }

        if let Some(expected_value) = &self.value
            && &line.value != expected_value
        {
            return false;
        }

        if let Some(expected_type) = &self.metric_type
            && &line.metric_type != expected_type
        {
            return false;
        }

        let tag_list = line.tag_list();
        self.tags.iter().all(|tag| tag_list.contains(&tag.as_str()))
    }

    fn format_criteria(&self) -> String {
        let mut criteria = Vec::new();
        if let Some(name) = &self.name {
            criteria.push(format!("name={:?}", name));
        }
        if let Some(value) = &self.value {
            criteria.push(format!("value={:?}", value));
        }
        if let Some(metric_type) = &self.metric_type {
            criteria.push(format!("type={:?}", metric_type));
        }
        if !self.tags.is_empty() {
            criteria.push(format!("tags={:?}", self.tags));
        }
        if let Some(raw_line) = &self.raw_line {
            criteria.push(format!("raw_line={:?}", raw_line));
        }
        if let Some(source) = &self.source_address {
            criteria.push(format!("source_address={:?}", source));
        }
        if self.parsed == Some(false) {
            criteria.push("unparsed".to_string());
        }
        if criteria.is_empty() {
            criteria.push("<any metric>".to_string());
        }
        criteria.join(", ")
    }

    fn format_matching_metrics(&self) -> String {
        let matching = self.get_all();
        if matching.is_empty() {
            return String::new();
        }

        let mut output = String::from("Matching metrics:\n");
        for (idx, metric) in matching.iter().enumerate() {
            output.push_str(&format!(
                "  [{}] {:?} from {}\n",
                idx, metric.raw_line, metric.source_address
            ));
        }
        output
    }

    fn build_error_message(&self) -> String {
        let mut msg = String::from("No metrics matched the assertion.\n\n");
        msg.push_str(&format!("Expected:\n  {}\n\n", self.format_criteria()));
        msg.push_str(&format!("Found {} metric(s) in store", self.metrics.len()));

        if !self.metrics.is_empty() {
            msg.push_str(":\n");
            for (idx, metric) in self.metrics.iter().enumerate().take(10) {
                msg.push_str(&format!(
                    "  [{}] {:?} from {}\n",
                    idx, metric.raw_line, metric.source_address
                ));
            }

            if self.metrics.len() > 10 {
                msg.push_str(&format!("  ... and {} more\n", self.metrics.len() - 10));
            }
        }

        msg
    }
}
