use std::collections::BTreeMap;

use anyhow::anyhow;
use serde::de::Error as _;
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::timestamp::{deserialize_epoch_seconds, serialize_epoch_seconds};
use crate::{LokiError, LokiTimestamp};

pub type LabelSet = BTreeMap<String, String>;

/// One `[timestamp, value]` sample of a vector or matrix result.
#[derive(Debug, Clone, PartialEq)]
pub struct ValuePoint {
    pub timestamp: LokiTimestamp,
    pub value: String,
}

impl ValuePoint {
    pub fn new(timestamp: LokiTimestamp, value: impl Into<String>) -> Self {
        ValuePoint { timestamp, value: value.into() }
    }

    pub fn from_json(point: &Value) -> Result<Self, LokiError> {
        match point.as_array().map(Vec::as_slice) {
            Some([timestamp, value]) => {
                let value = match value {
                    Value::String(text) => text.clone(),
                    Value::Number(number) => number.to_string(),
                    _ => return Err(LokiError::MalformedValuePoint(point.to_string())),
                };
                Ok(ValuePoint { timestamp: LokiTimestamp::parse_wire(timestamp)?, value })
            }
            _ => Err(LokiError::MalformedValuePoint(point.to_string())),
        }
    }

    pub fn value_as_i64(&self) -> Result<i64, LokiError> {
        self.value.parse().map_err(|_| LokiError::MalformedValue(self.value.clone()))
    }

    pub fn value_as_f64(&self) -> Result<f64, LokiError> {
        self.value.parse().map_err(|_| LokiError::MalformedValue(self.value.clone()))
    }
}

impl Serialize for ValuePoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(2))?;
        seq.serialize_element(&self.timestamp.to_epoch_seconds_f64())?;
        seq.serialize_element(&self.value)?;
        seq.end()
    }
}

impl<'de> Deserialize<'de> for ValuePoint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        ValuePoint::from_json(&value).map_err(D::Error::custom)
    }
}

/// One `[timestamp, line]` or `[timestamp, line, {metadata}]` entry of a log stream.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub timestamp: LokiTimestamp,
    pub line: String,
    pub structured_metadata: LabelSet,
}

impl LogEntry {
    pub fn new(timestamp: LokiTimestamp, line: impl Into<String>) -> Self {
        LogEntry { timestamp, line: line.into(), structured_metadata: LabelSet::new() }
    }

    pub fn with_structured_metadata(mut self, structured_metadata: LabelSet) -> Self {
        self.structured_metadata = structured_metadata;
        self
    }

    pub fn from_json(entry: &Value) -> Result<Self, LokiError> {
        let elements = entry.as_array().ok_or(LokiError::MalformedStreamEntry(0))?;
        if !(2..=3).contains(&elements.len()) {
            return Err(LokiError::MalformedStreamEntry(elements.len()));
        }

        let timestamp = LokiTimestamp::parse_wire(&elements[0])?;
        let line = elements[1]
            .as_str()
            .ok_or_else(|| LokiError::Other(anyhow!("Log line is not a string: {}", elements[1])))?
            .to_string();
        let structured_metadata = match elements.get(2) {
            Some(Value::Object(metadata)) => metadata
                .iter()
                .map(|(key, value)| {
                    let value = match value {
                        Value::String(text) => text.clone(),
                        other => other.to_string(),
                    };
                    (key.clone(), value)
                })
                .collect(),
            Some(other) => return Err(LokiError::Other(anyhow!("Structured metadata is not an object: {}", other))),
            None => LabelSet::new(),
        };

        Ok(LogEntry { timestamp, line, structured_metadata })
    }
}

impl Serialize for LogEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let with_metadata = !self.structured_metadata.is_empty();
        let mut seq = serializer.serialize_seq(Some(if with_metadata { 3 } else { 2 }))?;
        seq.serialize_element(&self.timestamp.to_epoch_nanos_string())?;
        seq.serialize_element(&self.line)?;
        if with_metadata {
            seq.serialize_element(&self.structured_metadata)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for LogEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        LogEntry::from_json(&value).map_err(D::Error::custom)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct VectorSample {
    pub metric: LabelSet,
    pub value: ValuePoint,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct MatrixSeries {
    pub metric: LabelSet,
    pub values: Vec<ValuePoint>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct LogStream {
    pub stream: LabelSet,
    pub values: Vec<LogEntry>,
}

impl LogStream {
    pub fn new(stream: LabelSet, values: Vec<LogEntry>) -> Self {
        LogStream { stream, values }
    }
}

/// Body of `POST /loki/api/v1/push`.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PushRequest {
    pub streams: Vec<LogStream>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct LabelsResponse {
    pub status: String,
    /// Absent when Loki knows no labels for the requested window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<String>>,
}

impl LabelsResponse {
    pub fn labels(&self) -> &[String] {
        self.data.as_deref().unwrap_or_default()
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct StreamsResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<LabelSet>>,
}

impl StreamsResponse {
    pub fn streams(&self) -> &[LabelSet] {
        self.data.as_deref().unwrap_or_default()
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogStatistics {
    pub streams: u64,
    pub chunks: u64,
    pub entries: u64,
    pub bytes: u64,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct DetectedPattern {
    pub pattern: String,
    pub samples: Vec<ValuePoint>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct PatternResponse {
    pub status: String,
    #[serde(default)]
    pub data: Vec<DetectedPattern>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BuildInformation {
    pub version: String,
    pub revision: String,
    pub branch: String,
    pub build_user: String,
    pub build_date: String,
    #[serde(default)]
    pub go_version: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct LogDeletionRequest {
    pub request_id: String,
    pub query: String,
    /// `received` or `processed`. Cancelled requests are not listed at all.
    pub status: String,
    #[serde(deserialize_with = "deserialize_epoch_seconds", serialize_with = "serialize_epoch_seconds")]
    pub created_at: LokiTimestamp,
    #[serde(deserialize_with = "deserialize_epoch_seconds", serialize_with = "serialize_epoch_seconds")]
    pub start_time: LokiTimestamp,
    #[serde(deserialize_with = "deserialize_epoch_seconds", serialize_with = "serialize_epoch_seconds")]
    pub end_time: LokiTimestamp,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct DroppedEntry {
    pub timestamp: LokiTimestamp,
    pub labels: LabelSet,
}

/// A message of the `/loki/api/v1/tail` WebSocket.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct TailMessage {
    #[serde(default)]
    pub streams: Vec<LogStream>,
    #[serde(default)]
    pub dropped_entries: Vec<DroppedEntry>,
}
