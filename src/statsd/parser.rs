use serde::Serialize;
use std::net::IpAddr;
use std::str::Utf8Error;

use crate::store::CapturedMetric;

/// The structured interpretation of a DogStatsD line: `name:value|type|#tags`.
///
/// `value` and `metric_type` are kept as the sender wrote them; no numeric or
/// vocabulary validation is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricLine {
    pub name: String,
    pub value: String,
    pub metric_type: String,
    /// Raw tag segment with the leading `#` removed, e.g. `env:prod,service:web`.
    pub tags: Option<String>,
}

impl MetricLine {
    /// Parses a single decoded line.
    ///
    /// Returns `None` when the line has fewer than two `|` separated segments or
    /// when the first segment carries no `:` between name and value.
    pub fn parse(line: &str) -> Option<Self> {
        let mut segments = line.split('|');
        let name_value = segments.next()?;
        let metric_type = segments.next()?;
        let tags = segments
            .next()
            .map(|t| t.strip_prefix('#').unwrap_or(t).to_string());

        let (name, value) = name_value.split_once(':')?;

        Some(Self {
            name: name.to_string(),
            value: value.to_string(),
            metric_type: metric_type.to_string(),
            tags,
        })
    }

    /// Splits the tag string on `,`, skipping empty entries.
    pub fn tag_list(&self) -> Vec<&str> {
        self.tags
            .as_deref()
            .map(|t| t.split(',').filter(|tag| !tag.is_empty()).collect())
            .unwrap_or_default()
    }
}

/// What happened to a single received datagram.
#[derive(Debug)]
pub enum Ingest {
    /// The line decoded and parsed into structured fields.
    Parsed { raw: String, line: MetricLine },
    /// The line decoded but has no recognisable structure. The raw text is still captured.
    RawOnly { raw: String },
    /// The bytes are not valid UTF-8. The datagram is dropped.
    Rejected { error: Utf8Error },
}

impl Ingest {
    pub fn from_datagram(bytes: &[u8]) -> Self {
        match std::str::from_utf8(bytes) {
            Ok(text) => Self::from_line(text),
            Err(error) => Ingest::Rejected { error },
        }
    }

    pub fn from_line(text: &str) -> Self {
        let raw = text.trim().to_string();
        match MetricLine::parse(&raw) {
            Some(line) => Ingest::Parsed { raw, line },
            None => Ingest::RawOnly { raw },
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Ingest::Rejected { .. })
    }

    /// Builds the capture record for this datagram, or `None` if it was rejected.
    pub fn into_metric(self, source: IpAddr) -> Option<CapturedMetric> {
        match self {
            Ingest::Parsed { raw, line } => Some(CapturedMetric::new(raw, source, Some(line))),
            Ingest::RawOnly { raw } => Some(CapturedMetric::new(raw, source, None)),
            Ingest::Rejected { .. } => None,
        }
    }
}
