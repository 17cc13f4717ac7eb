use chrono::{DateTime, Local};
use serde::Serialize;
use serde_json::Value;
use std::net::IpAddr;

use super::helpers::serialize_timestamp;
use crate::statsd::MetricLine;

/// An event posted to the Events API.
///
/// The payload is kept exactly as decoded; no schema is applied.
#[derive(Debug, Clone, Serialize)]
pub struct CapturedEvent {
    #[serde(serialize_with = "serialize_timestamp")]
    pub(crate) received_at: DateTime<Local>,
    pub(crate) path: String,
    pub(crate) payload: Value,
}

impl CapturedEvent {
    pub(crate) fn new(payload: Value, path: String) -> Self {
        Self {
            received_at: Local::now(),
            path,
            payload,
        }
    }

    pub fn received_at(&self) -> DateTime<Local> {
        self.received_at
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }
}

/// A DogStatsD datagram received over UDP.
///
/// `raw_line` is always kept, even when the line could not be parsed. The parsed
/// form is available to in-process assertions but is not part of the status JSON.
#[derive(Debug, Clone, Serialize)]
pub struct CapturedMetric {
    #[serde(serialize_with = "serialize_timestamp")]
    pub(crate) received_at: DateTime<Local>,
    pub(crate) raw_line: String,
    pub(crate) source_address: String,
    #[serde(skip)]
    pub(crate) parsed: Option<MetricLine>,
}

impl CapturedMetric {
    pub fn new(raw_line: impl Into<String>, source: IpAddr, parsed: Option<MetricLine>) -> Self {
        Self {
            received_at: Local::now(),
            raw_line: raw_line.into(),
            source_address: source.to_string(),
            parsed,
        }
    }

    pub fn received_at(&self) -> DateTime<Local> {
        self.received_at
    }

    pub fn raw_line(&self) -> &str {
        &self.raw_line
    }

    pub fn source_address(&self) -> &str {
        &self.source_address
    }

    pub fn parsed(&self) -> Option<&MetricLine> {
        self.parsed.as_ref()
    }
}

/// A point-in-time read of the store: totals plus the most recent records.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub events_received: usize,
    pub metrics_received: usize,
    pub events: Vec<CapturedEvent>,
    pub metrics: Vec<CapturedMetric>,
}
