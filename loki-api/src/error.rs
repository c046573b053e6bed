use thiserror::Error;

#[derive(Error, Debug)]
pub enum LokiError {
    #[error("Failed to query loki: {0}")]
    Transport(#[source] anyhow::Error),
    #[error("Loki responded with status {status_code}: {body}")]
    UnexpectedStatus { status_code: u16, body: String },
    #[error("Unsupported result type '{result_type}'. Full JSON:\n{body}")]
    UnsupportedResultType { result_type: String, body: String },
    #[error("Expected 2 or 3 elements in a stream entry, got {0}")]
    MalformedStreamEntry(usize),
    #[error("Expected a [timestamp, value] pair, got {0}")]
    MalformedValuePoint(String),
    #[error("Missing field '{0}'")]
    MissingField(String),
    #[error("Not a Loki timestamp: {0}")]
    MalformedTimestamp(String),
    #[error("Not a numeric sample value: {0}")]
    MalformedValue(String),
    #[error("Failed to parse response body: {0}")]
    Json(#[source] serde_json::Error),
    #[error("No data")]
    NoData,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<serde_json::Error> for LokiError {
    fn from(error: serde_json::Error) -> Self {
        // serde reports absent required fields as "missing field `name`"
        let message = error.to_string();
        if error.is_data() {
            if let Some(rest) = message.strip_prefix("missing field `") {
                if let Some(end) = rest.find('`') {
                    return LokiError::MissingField(rest[..end].to_string());
                }
            }
        }
        LokiError::Json(error)
    }
}
