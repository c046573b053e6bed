use async_trait::async_trait;
use serde::{Deserialize, Serialize};

mod decoder;
mod dto;
mod duration;
mod error;
mod query;
mod response;
mod timestamp;

pub use decoder::{
    decode_json, decode_matrix, decode_matrix_or_streams, decode_streams, decode_vector, decode_vector_or_matrix,
    decode_vector_or_streams, decode_vector_response, MatrixOrStreams, VectorOrMatrix, VectorOrStreams,
};
pub use dto::{
    BuildInformation, DetectedPattern, DroppedEntry, LabelSet, LabelsResponse, LogDeletionRequest, LogEntry,
    LogStatistics, LogStream, MatrixSeries, PatternResponse, PushRequest, StreamsResponse, TailMessage, ValuePoint,
    VectorSample,
};
pub use duration::{format_duration, PrometheusDuration, PrometheusDurationUnit};
pub use error::LokiError;
pub use query::{normalize_selector, normalize_selector_with_log_line_filter, QueryParams};
pub use response::{ApiResponse, WebResponse};
pub use timestamp::LokiTimestamp;

#[derive(Deserialize, Serialize, Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ResultType {
    Vector,
    Matrix,
    Streams,
}

#[derive(Deserialize, Serialize, Debug, Copy, Clone, PartialEq, Eq)]
pub enum Direction {
    #[serde(alias = "forward")]
    #[serde(alias = "FORWARD")]
    Forward,
    #[serde(alias = "backward")]
    #[serde(alias = "BACKWARD")]
    Backward,
}

impl Direction {
    pub fn api_value(&self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Backward => "backward",
        }
    }
}

/// How `/index/volume` and `/index/volume_range` aggregate, label-value pairs by default.
#[derive(Deserialize, Serialize, Debug, Copy, Clone, PartialEq, Eq)]
pub enum AggregateBy {
    #[serde(alias = "series")]
    Series,
    #[serde(alias = "labels")]
    Labels,
}

impl AggregateBy {
    pub fn api_value(&self) -> &'static str {
        match self {
            AggregateBy::Series => "series",
            AggregateBy::Labels => "labels",
        }
    }
}

/// Credentials handed to the transport as they are.
#[derive(Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Authentication {
    Basic { username: String, password: String },
    Bearer { token: String },
}

impl std::fmt::Debug for Authentication {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Authentication::Basic { username, .. } => write!(f, "Basic({}, ***)", username),
            Authentication::Bearer { .. } => f.write_str("Bearer(***)"),
        }
    }
}

/// The HTTP transport the client talks through. Every HTTP status, 2xx or not, is an `Ok`;
/// `Err` is reserved for requests that got no response at all.
#[async_trait]
pub trait WebClient: Send + Sync {
    async fn get(&self, url: String, params: QueryParams) -> Result<WebResponse, LokiError>;
    async fn post(&self, url: String, params: QueryParams, body: Option<String>) -> Result<WebResponse, LokiError>;
    async fn put(&self, url: String, params: QueryParams, body: Option<String>) -> Result<WebResponse, LokiError>;
    async fn delete(&self, url: String, params: QueryParams) -> Result<WebResponse, LokiError>;
}
