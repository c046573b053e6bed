use std::sync::Arc;

use anyhow::anyhow;
use http_web_client::ReqwestWebClient;
use log::{error, warn};
use loki_api::{
    decode_json, decode_matrix_or_streams, decode_vector_or_matrix, decode_vector_or_streams, decode_vector_response,
    normalize_selector, normalize_selector_with_log_line_filter, AggregateBy, ApiResponse, BuildInformation, Direction,
    LabelsResponse, LogDeletionRequest, LogStatistics, LogStream, LokiError, LokiTimestamp, MatrixOrStreams,
    PatternResponse, PrometheusDuration, PushRequest, QueryParams, StreamsResponse, VectorOrMatrix, VectorOrStreams,
    VectorSample, WebClient, WebResponse,
};

use crate::config::LokiConfig;

/// One async operation per endpoint of Loki's HTTP API.
///
/// Selectors may be given without curly braces, they are added where missing. If neither
/// `start`, `end` nor `since` is given, Loki queries the last 6 hours.
#[derive(Clone)]
pub struct LokiClient {
    web_client: Arc<dyn WebClient>,
    api_endpoint: String,
    internal_endpoint: String,
}

impl LokiClient {
    pub fn new(config: LokiConfig) -> Self {
        let web_client = ReqwestWebClient::new(config.authentication.clone());
        Self::with_web_client(&config, web_client)
    }

    pub fn with_web_client(config: &LokiConfig, web_client: impl WebClient + 'static) -> Self {
        LokiClient {
            web_client: Arc::new(web_client),
            api_endpoint: config.api_endpoint(),
            internal_endpoint: config.internal_endpoint(),
        }
    }

    /// `/query_range`, for log as well as metric queries. `step` is meant for metric queries and
    /// `interval` for log queries; both are sent if both are given.
    pub async fn range_query(
        &self,
        query: &str,
        start: Option<LokiTimestamp>,
        end: Option<LokiTimestamp>,
        since: Option<PrometheusDuration>,
        limit: Option<u32>,
        step: Option<PrometheusDuration>,
        interval: Option<PrometheusDuration>,
        direction: Option<Direction>,
    ) -> ApiResponse<MatrixOrStreams> {
        let mut params = QueryParams::with_time_range(Some(query), start, end, since);
        params.push_opt("limit", limit);
        params.push_opt("step", step);
        params.push_opt("interval", interval);
        params.push_opt("direction", direction.map(|direction| direction.api_value()));

        self.get(format!("{}/query_range", self.api_endpoint), params, decode_matrix_or_streams).await
    }

    /// `/query`, evaluates `query` at a single point in time.
    pub async fn instant_query(
        &self,
        query: &str,
        limit: Option<u32>,
        time: Option<LokiTimestamp>,
        direction: Option<Direction>,
    ) -> ApiResponse<VectorOrStreams> {
        let mut params = QueryParams::with_time_range(Some(query), None, None, None);
        params.push_opt("limit", limit);
        params.push_opt("time", time.map(|time| time.to_epoch_nanos_string()));
        params.push_opt("direction", direction.map(|direction| direction.api_value()));

        self.get(format!("{}/query", self.api_endpoint), params, decode_vector_or_streams).await
    }

    /// Pushes log lines. If `block_ingestion_until` is configured Loki answers with the
    /// configured `block_ingestion_status_code`, so anything in 200..=259 counts as accepted.
    pub async fn ingest_logs(&self, streams: Vec<LogStream>) -> ApiResponse<bool> {
        let body = match serde_json::to_string(&PushRequest { streams }) {
            Ok(body) => body,
            Err(e) => {
                let error = LokiError::Other(anyhow!("Failed to serialize push request: {}", e));
                return ApiResponse::request_failure(error);
            }
        };

        match self.web_client.post(format!("{}/push", self.api_endpoint), QueryParams::new(), Some(body)).await {
            Err(error) => ApiResponse::transport_failure(error),
            Ok(response) if (200..=259).contains(&response.status_code) => ApiResponse::success(response.status_code, true),
            Ok(response) => {
                warn!("Loki rejected pushed logs with status {}: {}", response.status_code, response.body);
                let status_code = response.status_code;
                let error = LokiError::UnexpectedStatus { status_code, body: response.body };
                ApiResponse::new(Some(status_code), false, Some(false), Some(error))
            }
        }
    }

    pub async fn query_labels(
        &self,
        query: Option<&str>,
        start: Option<LokiTimestamp>,
        end: Option<LokiTimestamp>,
        since: Option<PrometheusDuration>,
    ) -> ApiResponse<LabelsResponse> {
        let params = QueryParams::with_time_range(query, start, end, since);

        self.get(format!("{}/label", self.api_endpoint), params, decode_json).await
    }

    pub async fn query_label_values(
        &self,
        label: &str,
        query: Option<&str>,
        start: Option<LokiTimestamp>,
        end: Option<LokiTimestamp>,
        since: Option<PrometheusDuration>,
    ) -> ApiResponse<LabelsResponse> {
        let params = QueryParams::with_time_range(query, start, end, since);

        self.get(format!("{}/label/{}/values", self.api_endpoint, label), params, decode_json).await
    }

    /// `/series`: the label sets of all streams matching `query`.
    pub async fn query_streams(
        &self,
        query: &str,
        start: Option<LokiTimestamp>,
        end: Option<LokiTimestamp>,
        since: Option<PrometheusDuration>,
    ) -> ApiResponse<StreamsResponse> {
        let mut params = QueryParams::with_time_range(None, start, end, since);
        params.push("match[]", normalize_selector(query));

        self.get(format!("{}/series", self.api_endpoint), params, decode_json).await
    }

    /// `/index/stats`: an estimate of streams, chunks, entries and bytes `query` resolves to.
    /// Ingester data is not included.
    pub async fn query_log_statistics(
        &self,
        query: &str,
        start: Option<LokiTimestamp>,
        end: Option<LokiTimestamp>,
        since: Option<PrometheusDuration>,
    ) -> ApiResponse<LogStatistics> {
        let params = QueryParams::with_time_range(Some(query), start, end, since);

        self.get(format!("{}/index/stats", self.api_endpoint), params, decode_json).await
    }

    /// `/index/volume`: volume per label or label-value combination, aggregated over the whole
    /// window.
    pub async fn query_index_volume(
        &self,
        query: &str,
        start: Option<LokiTimestamp>,
        end: Option<LokiTimestamp>,
        since: Option<PrometheusDuration>,
        limit: Option<u32>,
        target_labels: Option<&[String]>,
        aggregate_by: Option<AggregateBy>,
    ) -> ApiResponse<Vec<VectorSample>> {
        let mut params = QueryParams::with_time_range(Some(query), start, end, since);
        params.push_opt("limit", limit);
        params.push_opt("targetLabels", target_labels.map(|labels| labels.join(",")));
        params.push_opt("aggregateBy", aggregate_by.map(|aggregate_by| aggregate_by.api_value()));

        self.get(format!("{}/index/volume", self.api_endpoint), params, decode_vector_response).await
    }

    /// `/index/volume_range`: like [LokiClient::query_index_volume], but one data point per `step`.
    pub async fn query_index_volume_range(
        &self,
        query: &str,
        start: Option<LokiTimestamp>,
        end: Option<LokiTimestamp>,
        since: Option<PrometheusDuration>,
        limit: Option<u32>,
        step: Option<PrometheusDuration>,
        target_labels: Option<&[String]>,
        aggregate_by: Option<AggregateBy>,
    ) -> ApiResponse<VectorOrMatrix> {
        let mut params = QueryParams::with_time_range(Some(query), start, end, since);
        params.push_opt("limit", limit);
        params.push_opt("step", step);
        params.push_opt("targetLabels", target_labels.map(|labels| labels.join(",")));
        params.push_opt("aggregateBy", aggregate_by.map(|aggregate_by| aggregate_by.api_value()));

        self.get(format!("{}/index/volume_range", self.api_endpoint), params, decode_vector_or_matrix).await
    }

    /// Requires `pattern_ingester.enabled: true` on the server.
    pub async fn patterns_detection(
        &self,
        query: &str,
        start: Option<LokiTimestamp>,
        end: Option<LokiTimestamp>,
        since: Option<PrometheusDuration>,
        step: Option<PrometheusDuration>,
    ) -> ApiResponse<PatternResponse> {
        let mut params = QueryParams::with_time_range(Some(query), start, end, since);
        params.push_opt("step", step);

        self.get(format!("{}/patterns", self.api_endpoint), params, decode_json).await
    }

    /// Creates a delete request. `query` may end with a line filter like `|= "other"`.
    /// The body is `true` if Loki answered 204.
    pub async fn request_log_deletion(
        &self,
        query: &str,
        start: Option<LokiTimestamp>,
        end: Option<LokiTimestamp>,
        max_interval: Option<&str>,
    ) -> ApiResponse<bool> {
        let mut params = QueryParams::new();
        params.push("query", normalize_selector_with_log_line_filter(query));
        params.push_opt("start", start.map(|start| start.to_rfc3339()));
        params.push_opt("end", end.map(|end| end.to_rfc3339()));
        params.push_opt("max_interval", max_interval);

        let result = self.web_client.put(format!("{}/delete", self.api_endpoint), params, None).await;
        Self::no_content_response(result)
    }

    /// Processed and unprocessed delete requests. Cancelled ones are gone from Loki's storage.
    pub async fn list_log_deletion_requests(&self) -> ApiResponse<Vec<LogDeletionRequest>> {
        self.get(format!("{}/delete", self.api_endpoint), QueryParams::new(), decode_json).await
    }

    /// With `force` partially processed requests get cancelled too.
    pub async fn request_cancellation_of_delete_request(&self, request_id: &str, force: Option<bool>) -> ApiResponse<bool> {
        let mut params = QueryParams::new();
        params.push("request_id", request_id);
        params.push_opt("force", force);

        let result = self.web_client.delete(format!("{}/delete", self.api_endpoint), params).await;
        Self::no_content_response(result)
    }

    pub async fn get_build_information(&self) -> ApiResponse<BuildInformation> {
        self.get(format!("{}/status/buildinfo", self.api_endpoint), QueryParams::new(), decode_json).await
    }

    /// 200 once the instance accepts traffic.
    pub async fn ready(&self) -> ApiResponse<String> {
        self.get_internal("ready").await
    }

    pub async fn config(&self) -> ApiResponse<String> {
        self.get_internal("config").await
    }

    pub async fn services(&self) -> ApiResponse<String> {
        self.get_internal("services").await
    }

    pub async fn metrics(&self) -> ApiResponse<String> {
        self.get_internal("metrics").await
    }

    async fn get_internal(&self, endpoint: &str) -> ApiResponse<String> {
        let url = format!("{}/{}", self.internal_endpoint, endpoint);
        self.get(url, QueryParams::new(), |body: &str| Ok(body.to_string())).await
    }

    async fn get<T>(
        &self,
        url: String,
        params: QueryParams,
        decode: impl FnOnce(&str) -> Result<T, LokiError>,
    ) -> ApiResponse<T> {
        let result = self.web_client.get(url, params).await;
        Self::decode_response(result, decode)
    }

    fn decode_response<T>(
        result: Result<WebResponse, LokiError>,
        decode: impl FnOnce(&str) -> Result<T, LokiError>,
    ) -> ApiResponse<T> {
        match result {
            Err(error) => ApiResponse::transport_failure(error),
            Ok(response) if !response.is_success() => {
                warn!("Loki responded with status {}: {}", response.status_code, response.body);
                ApiResponse::unexpected_status(response)
            }
            Ok(response) => match decode(&response.body) {
                Ok(body) => ApiResponse::success(response.status_code, body),
                Err(error) => {
                    error!("Failed to decode response: {}", error);
                    ApiResponse::undecodable(response.status_code, error)
                }
            },
        }
    }

    fn no_content_response(result: Result<WebResponse, LokiError>) -> ApiResponse<bool> {
        match result {
            Err(error) => ApiResponse::transport_failure(error),
            Ok(response) if !response.is_success() => ApiResponse::unexpected_status(response),
            Ok(response) => ApiResponse::success(response.status_code, response.status_code == 204),
        }
    }
}
