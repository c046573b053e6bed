use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::future::Future;
use std::hash::Hash;

use anyhow::anyhow;
use log::{debug, warn};
use loki_api::{
    normalize_selector_with_log_line_filter, AggregateBy, ApiResponse, Direction, LabelSet, LogDeletionRequest,
    LogEntry, LogStream, LokiError, LokiTimestamp, MatrixOrStreams, MatrixSeries, PrometheusDuration, ValuePoint,
    VectorOrMatrix, VectorSample,
};
use serde::Serialize;

use crate::client::LokiClient;

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct LabelAnalysis {
    pub label: String,
    pub found_in_streams: usize,
    pub unique_values: BTreeSet<String>,
}

impl LabelAnalysis {
    pub fn count_unique_values(&self) -> usize {
        self.unique_values.len()
    }
}

/// What `logcli series --analyze-labels` prints.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct LabelAnalysisResults {
    pub streams: HashSet<LabelSet>,
    /// Sorted descending by the number of streams a label occurs in.
    pub labels: Vec<LabelAnalysis>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct LogVolume {
    pub metric: LabelSet,
    pub aggregated_value: i64,
    pub values: Vec<ValuePoint>,
}

/// A single log line to push, Loki's stream grouping is done by [LokiService::ingest_log_entries].
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntryToSave {
    pub timestamp: LokiTimestamp,
    pub message: String,
    pub labels: LabelSet,
    pub structured_metadata: LabelSet,
}

impl LogEntryToSave {
    pub fn new(timestamp: LokiTimestamp, message: impl Into<String>, labels: LabelSet) -> Self {
        LogEntryToSave { timestamp, message: message.into(), labels, structured_metadata: LabelSet::new() }
    }
}

/// Convenience operations composed of one or more [LokiClient] calls.
#[derive(Clone)]
pub struct LokiService {
    client: LokiClient,
}

impl LokiService {
    pub fn new(client: LokiClient) -> Self {
        LokiService { client }
    }

    pub fn client(&self) -> &LokiClient {
        &self.client
    }

    /// `/query_range` restricted to log queries like `{job="podlogs"} |= "line filter"`.
    pub async fn query_logs(
        &self,
        query: &str,
        start: Option<LokiTimestamp>,
        end: Option<LokiTimestamp>,
        since: Option<PrometheusDuration>,
        direction: Option<Direction>,
        limit: Option<u32>,
        interval: Option<PrometheusDuration>,
    ) -> ApiResponse<Vec<LogStream>> {
        self.client
            .range_query(query, start, end, since, limit, None, interval, direction)
            .await
            .try_map_body(|body| match body {
                MatrixOrStreams::Streams(streams) => Ok(streams),
                MatrixOrStreams::Matrix(_) => Err(LokiError::Other(anyhow!(
                    "'{}' is a metric query, use query_metrics() for count_over_time(), rate() and the like",
                    query
                ))),
            })
    }

    /// `/query_range` restricted to metric queries like `count_over_time({job="podlogs"}[5m])`.
    pub async fn query_metrics(
        &self,
        query: &str,
        start: Option<LokiTimestamp>,
        end: Option<LokiTimestamp>,
        since: Option<PrometheusDuration>,
        direction: Option<Direction>,
        limit: Option<u32>,
        step: Option<PrometheusDuration>,
    ) -> ApiResponse<Vec<MatrixSeries>> {
        self.client
            .range_query(query, start, end, since, limit, step, None, direction)
            .await
            .try_map_body(|body| match body {
                MatrixOrStreams::Matrix(series) => Ok(series),
                MatrixOrStreams::Streams(_) => Err(LokiError::Other(anyhow!(
                    "'{}' is a log query, use query_logs() for it",
                    query
                ))),
            })
    }

    /// Groups `entries` by their labels into one stream each and pushes them.
    pub async fn ingest_log_entries(&self, entries: Vec<LogEntryToSave>) -> ApiResponse<bool> {
        let mut streams: BTreeMap<LabelSet, Vec<LogEntry>> = BTreeMap::new();
        for entry in entries {
            let log_entry =
                LogEntry::new(entry.timestamp, entry.message).with_structured_metadata(entry.structured_metadata);
            streams.entry(entry.labels).or_default().push(log_entry);
        }

        let streams = streams.into_iter().map(|(labels, values)| LogStream::new(labels, values)).collect();
        self.client.ingest_logs(streams).await
    }

    /// All label names Loki ever saw, not only those of the last 30 days.
    pub async fn get_all_labels(&self) -> HashSet<String> {
        let client = &self.client;
        Self::get_all(|end| async move {
            let response = client.query_labels(None, None, Some(end), Some(PrometheusDuration::SINCE_MAX_VALUE)).await;
            Self::window_body(response).map(|labels| labels.labels().to_vec())
        })
        .await
    }

    /// The label sets of all streams matching `query`, over Loki's whole retention.
    pub async fn get_all_streams(&self, query: &str) -> HashSet<LabelSet> {
        let client = &self.client;
        Self::get_all(|end| async move {
            let response =
                client.query_streams(query, None, Some(end), Some(PrometheusDuration::SINCE_MAX_VALUE)).await;
            Self::window_body(response).map(|streams| streams.streams().to_vec())
        })
        .await
    }

    /// The equivalent of `logcli series --analyze-labels`, useful for finding high cardinality
    /// labels. An empty `query` matches all streams.
    pub async fn analyze_labels(&self, query: &str) -> LabelAnalysisResults {
        let streams = self.get_all_streams(query).await;
        let labels = analyze_streams(&streams);

        LabelAnalysisResults { streams, labels }
    }

    pub async fn get_log_volume(
        &self,
        query: &str,
        group_by_labels: Option<&[String]>,
        aggregate_by: Option<AggregateBy>,
    ) -> ApiResponse<Vec<LogVolume>> {
        self.client
            .query_index_volume(query, None, None, None, None, group_by_labels, aggregate_by)
            .await
            .try_map_body(|samples| sorted_by_volume(samples.into_iter().map(volume_of_sample).collect()))
    }

    /// Log volume per day over the last 30 days.
    pub async fn get_log_volume_range(
        &self,
        query: &str,
        group_by_labels: Option<&[String]>,
        aggregate_by: Option<AggregateBy>,
    ) -> ApiResponse<Vec<LogVolume>> {
        self.client
            .query_index_volume_range(
                query,
                None,
                None,
                Some(PrometheusDuration::SINCE_MAX_VALUE),
                None,
                Some(PrometheusDuration::days(1)),
                group_by_labels,
                aggregate_by,
            )
            .await
            .try_map_body(|body| {
                let volumes: Result<Vec<LogVolume>, LokiError> = match body {
                    VectorOrMatrix::Vector(samples) => samples.into_iter().map(volume_of_sample).collect(),
                    VectorOrMatrix::Matrix(series) => series.into_iter().map(volume_of_series).collect(),
                };
                sorted_by_volume(volumes)
            })
    }

    /// Creates a delete request and, if Loki accepted it, looks the created request up.
    ///
    /// The body is `None` if the request got created but could not be found afterwards.
    pub async fn request_log_deletion(
        &self,
        query: &str,
        start: Option<LokiTimestamp>,
        end: Option<LokiTimestamp>,
        max_interval: Option<&str>,
    ) -> ApiResponse<Option<LogDeletionRequest>> {
        let response = self.client.request_log_deletion(query, start, end, max_interval).await;
        if response.body() != Some(&true) {
            return response.map_body(|_| None);
        }

        let created = match self.client.list_log_deletion_requests().await.into_result() {
            Ok(requests) => newest_matching(requests, query),
            Err(e) => {
                warn!("Created delete request for '{}' but could not list delete requests: {}", query, e);
                None
            }
        };

        response.map_body(|_| created)
    }

    /// Pages backwards from now, one maximum `since` window per call, until a window comes back
    /// empty or failed.
    async fn get_all<T, F, Fut>(mut retrieve: F) -> HashSet<T>
    where
        T: Eq + Hash,
        F: FnMut(LokiTimestamp) -> Fut,
        Fut: Future<Output = Option<Vec<T>>>,
    {
        let mut results = HashSet::new();
        let mut end = Some(LokiTimestamp::now());

        while let Some(window_end) = end {
            match retrieve(window_end).await {
                Some(values) if !values.is_empty() => results.extend(values),
                _ => break,
            }
            end = window_end.minus(PrometheusDuration::SINCE_MAX_VALUE.to_chrono());
        }

        debug!("Retrieved {} distinct values", results.len());
        results
    }

    fn window_body<T>(response: ApiResponse<T>) -> Option<T> {
        match response.into_result() {
            Ok(body) => Some(body),
            Err(e) => {
                warn!("Stopped paging, window failed: {}", e);
                None
            }
        }
    }
}

fn analyze_streams(streams: &HashSet<LabelSet>) -> Vec<LabelAnalysis> {
    let mut found: HashMap<&str, (usize, BTreeSet<String>)> = HashMap::new();
    for stream in streams {
        for (label, value) in stream {
            let (count, values) = found.entry(label.as_str()).or_default();
            *count += 1;
            values.insert(value.clone());
        }
    }

    let mut labels: Vec<LabelAnalysis> = found
        .into_iter()
        .map(|(label, (found_in_streams, unique_values))| LabelAnalysis {
            label: label.to_string(),
            found_in_streams,
            unique_values,
        })
        .collect();
    labels.sort_by(|a, b| b.found_in_streams.cmp(&a.found_in_streams).then_with(|| a.label.cmp(&b.label)));
    labels
}

fn volume_of_sample(sample: VectorSample) -> Result<LogVolume, LokiError> {
    let aggregated_value = sample.value.value_as_i64()?;
    Ok(LogVolume { metric: sample.metric, aggregated_value, values: vec![sample.value] })
}

fn volume_of_series(series: MatrixSeries) -> Result<LogVolume, LokiError> {
    let mut aggregated_value: i64 = 0;
    for point in &series.values {
        aggregated_value = aggregated_value.saturating_add(point.value_as_i64()?);
    }
    Ok(LogVolume { metric: series.metric, aggregated_value, values: series.values })
}

fn sorted_by_volume(volumes: Result<Vec<LogVolume>, LokiError>) -> Result<Vec<LogVolume>, LokiError> {
    let mut volumes = volumes?;
    volumes.sort_by(|a, b| b.aggregated_value.cmp(&a.aggregated_value));
    Ok(volumes)
}

/// Loki stores the query of a delete request normalized, so both spellings match.
fn newest_matching(requests: Vec<LogDeletionRequest>, query: &str) -> Option<LogDeletionRequest> {
    let normalized = normalize_selector_with_log_line_filter(query);
    requests
        .into_iter()
        .filter(|request| request.query == query || request.query == normalized)
        .max_by_key(|request| request.created_at)
}
