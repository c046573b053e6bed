#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use loki_api::{
        AggregateBy, Direction, LogEntry, LogStream, LokiError, LokiTimestamp, MatrixOrStreams, PrometheusDuration,
        QueryParams, VectorOrMatrix, VectorOrStreams, WebResponse,
    };

    use crate::client::LokiClient;
    use crate::config::LokiConfig;
    use crate::mock_web_client::mock::{client_with, labels_body, ok, MockTestWebClient, API};

    fn timestamp(seconds: i64) -> LokiTimestamp {
        LokiTimestamp::from_epoch_seconds(seconds).unwrap()
    }

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(key, value)| (key.to_string(), value.to_string())).collect()
    }

    #[tokio::test]
    async fn it_should_query_labels_with_nanosecond_timestamps() {
        let mut web_client = MockTestWebClient::new();
        web_client
            .expect_get()
            .withf(|url, params| {
                url == &format!("{}/label", API)
                    && params.get("end") == Some("1700000000000000000")
                    && params.get("since") == Some("30d")
                    && !params.contains("query")
                    && !params.contains("start")
            })
            .times(1)
            .returning(|_, _| ok(&labels_body(&["app", "job"])));

        let response = client_with(web_client)
            .query_labels(None, None, Some(timestamp(1_700_000_000)), Some(PrometheusDuration::days(30)))
            .await;

        assert!(response.successful_and_body_set());
        assert_eq!(response.status_code(), Some(200));
        assert_eq!(response.body().unwrap().labels(), &["app".to_string(), "job".to_string()]);
    }

    #[tokio::test]
    async fn it_should_query_label_values_below_the_label_path() {
        let mut web_client = MockTestWebClient::new();
        web_client
            .expect_get()
            .withf(|url, params| url == &format!("{}/label/app/values", API) && params.get("query") == Some("{job=\"x\"}"))
            .times(1)
            .returning(|_, _| ok(&labels_body(&["loki", "grafana"])));

        let response = client_with(web_client).query_label_values("app", Some("job=\"x\""), None, None, None).await;

        assert_eq!(response.into_result().unwrap().labels().len(), 2);
    }

    #[tokio::test]
    async fn it_should_send_the_stream_selector_as_match() {
        let mut web_client = MockTestWebClient::new();
        web_client
            .expect_get()
            .withf(|url, params| {
                url == &format!("{}/series", API) && params.get("match[]") == Some("{app=\"loki\"}") && !params.contains("query")
            })
            .times(1)
            .returning(|_, _| ok(r#"{"status":"success","data":[{"app":"loki","job":"x"}]}"#));

        let response = client_with(web_client).query_streams("app=\"loki\"", None, None, None).await;

        assert_eq!(response.into_result().unwrap().streams(), &[labels(&[("app", "loki"), ("job", "x")])]);
    }

    #[tokio::test]
    async fn it_should_decode_log_streams_of_a_range_query() {
        let mut web_client = MockTestWebClient::new();
        web_client
            .expect_get()
            .withf(|url, params| {
                url == &format!("{}/query_range", API)
                    && params.get("limit") == Some("100")
                    && params.get("interval") == Some("5m")
                    && params.get("direction") == Some("forward")
                    && !params.contains("step")
            })
            .times(1)
            .returning(|_, _| {
                ok(r#"{"status":"success","data":{"resultType":"streams","result":[
                    {"stream":{"app":"loki"},"values":[["1756749695032629429","message",{"level":"info"}]]}
                ]}}"#)
            });

        let response = client_with(web_client)
            .range_query(
                "{app=\"loki\"}",
                None,
                None,
                Some(PrometheusDuration::hours(1)),
                Some(100),
                None,
                Some(PrometheusDuration::minutes(5)),
                Some(Direction::Forward),
            )
            .await;

        match response.into_result().unwrap() {
            MatrixOrStreams::Streams(streams) => {
                assert_eq!(streams.len(), 1);
                assert_eq!(streams[0].values[0].line, "message");
                assert_eq!(streams[0].values[0].structured_metadata, labels(&[("level", "info")]));
            }
            other => panic!("expected streams, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn it_should_decode_the_vector_of_an_instant_metric_query() {
        let mut web_client = MockTestWebClient::new();
        web_client
            .expect_get()
            .withf(|url, params| {
                url == &format!("{}/query", API)
                    && params.get("query") == Some("count_over_time({app=\"loki\"}[5m])")
                    && params.get("time") == Some("1700000000000000000")
            })
            .times(1)
            .returning(|_, _| {
                ok(r#"{"status":"success","data":{"resultType":"vector","result":[{"metric":{"app":"loki"},"value":[1700000000,"42"]}]}}"#)
            });

        let response = client_with(web_client)
            .instant_query("count_over_time({app=\"loki\"}[5m])", None, Some(timestamp(1_700_000_000)), None)
            .await;

        match response.into_result().unwrap() {
            VectorOrStreams::Vector(samples) => assert_eq!(samples[0].value.value_as_i64().unwrap(), 42),
            other => panic!("expected vector, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn it_should_push_streams_as_json() {
        let mut web_client = MockTestWebClient::new();
        web_client
            .expect_post()
            .withf(|url, _, body| {
                url == &format!("{}/push", API)
                    && body.as_deref()
                        == Some(r#"{"streams":[{"stream":{"app":"test"},"values":[["1700000000000000000","hello"]]}]}"#)
            })
            .times(1)
            .returning(|_, _, _| Ok(WebResponse::new(204, "")));

        let stream = LogStream::new(labels(&[("app", "test")]), vec![LogEntry::new(timestamp(1_700_000_000), "hello")]);
        let response = client_with(web_client).ingest_logs(vec![stream]).await;

        assert!(response.successful());
        assert_eq!(response.body(), Some(&true));
    }

    async fn ingest_with_status(status_code: u16) -> bool {
        let mut web_client = MockTestWebClient::new();
        web_client.expect_post().times(1).returning(move |_, _, _| Ok(WebResponse::new(status_code, "")));

        let response = client_with(web_client).ingest_logs(Vec::new()).await;
        assert_eq!(response.status_code(), Some(status_code));
        response.successful() && response.body() == Some(&true)
    }

    #[tokio::test]
    async fn it_should_take_blocked_ingestion_status_codes_as_success() {
        assert!(ingest_with_status(200).await);
        assert!(ingest_with_status(230).await);
        assert!(ingest_with_status(259).await);
    }

    #[tokio::test]
    async fn it_should_fail_ingestion_outside_of_the_blocked_ingestion_range() {
        assert!(!ingest_with_status(260).await);
        assert!(!ingest_with_status(404).await);
    }

    #[tokio::test]
    async fn it_should_request_log_deletion_with_the_line_filter_outside_of_the_selector() {
        let mut web_client = MockTestWebClient::new();
        web_client
            .expect_put()
            .withf(|url, params, body| {
                url == &format!("{}/delete", API)
                    && params.get("query") == Some("{app=\"loki\"} |= \"compacting\"")
                    && params.get("start") == Some("2023-11-14T22:13:20Z")
                    && params.get("max_interval") == Some("24h")
                    && !params.contains("end")
                    && body.is_none()
            })
            .times(1)
            .returning(|_, _, _| Ok(WebResponse::new(204, "")));

        let response = client_with(web_client)
            .request_log_deletion("app=\"loki\" |= \"compacting\"", Some(timestamp(1_700_000_000)), None, Some("24h"))
            .await;

        assert_eq!(response.body(), Some(&true));
    }

    #[tokio::test]
    async fn it_should_only_report_deletion_on_no_content() {
        let mut web_client = MockTestWebClient::new();
        web_client.expect_put().times(1).returning(|_, _, _| Ok(WebResponse::new(200, "")));

        let response = client_with(web_client).request_log_deletion("{app=\"loki\"}", None, None, None).await;

        assert!(response.successful());
        assert_eq!(response.body(), Some(&false));
    }

    #[tokio::test]
    async fn it_should_cancel_delete_requests_by_id() {
        let mut web_client = MockTestWebClient::new();
        web_client
            .expect_delete()
            .withf(|url, params| {
                url == &format!("{}/delete", API) && params.get("request_id") == Some("a1b2") && params.get("force") == Some("true")
            })
            .times(1)
            .returning(|_, _| Ok(WebResponse::new(204, "")));

        let response = client_with(web_client).request_cancellation_of_delete_request("a1b2", Some(true)).await;

        assert_eq!(response.body(), Some(&true));
    }

    #[tokio::test]
    async fn it_should_list_delete_requests_with_epoch_second_times() {
        let mut web_client = MockTestWebClient::new();
        web_client.expect_get().withf(|url, params| url == &format!("{}/delete", API) && params.is_empty()).times(1).returning(
            |_, _| {
                ok(r#"[{"request_id":"a1b2","start_time":1700000000,"end_time":1700003600.5,"query":"{app=\"loki\"}","status":"received","created_at":1700005000}]"#)
            },
        );

        let requests = client_with(web_client).list_log_deletion_requests().await.into_result().unwrap();

        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].request_id, "a1b2");
        assert_eq!(requests[0].start_time, timestamp(1_700_000_000));
        assert_eq!(requests[0].created_at, timestamp(1_700_005_000));
    }

    #[tokio::test]
    async fn it_should_send_volume_parameters() {
        let mut web_client = MockTestWebClient::new();
        web_client
            .expect_get()
            .withf(|url, params| {
                url == &format!("{}/index/volume", API)
                    && params.get("targetLabels") == Some("namespace,app")
                    && params.get("aggregateBy") == Some("labels")
                    && params.get("limit") == Some("10")
            })
            .times(1)
            .returning(|_, _| {
                ok(r#"{"status":"success","data":{"resultType":"vector","result":[{"metric":{"app":"loki"},"value":[1700000000,"1024"]}]}}"#)
            });

        let target_labels = vec!["namespace".to_string(), "app".to_string()];
        let samples = client_with(web_client)
            .query_index_volume("{app=~\".+\"}", None, None, None, Some(10), Some(&target_labels), Some(AggregateBy::Labels))
            .await
            .into_result()
            .unwrap();

        assert_eq!(samples[0].metric, labels(&[("app", "loki")]));
    }

    #[tokio::test]
    async fn it_should_accept_a_declared_vector_for_volume_range() {
        let mut web_client = MockTestWebClient::new();
        web_client
            .expect_get()
            .withf(|url, params| url == &format!("{}/index/volume_range", API) && params.get("step") == Some("1h"))
            .times(1)
            .returning(|_, _| {
                ok(r#"{"status":"success","data":{"resultType":"vector","result":[{"metric":{"app":"loki"},"value":[1700000000,"1024"]}]}}"#)
            });

        let response = client_with(web_client)
            .query_index_volume_range("{app=\"loki\"}", None, None, None, None, Some(PrometheusDuration::hours(1)), None, None)
            .await;

        assert!(matches!(response.into_result(), Ok(VectorOrMatrix::Vector(ref samples)) if samples.len() == 1));
    }

    #[tokio::test]
    async fn it_should_keep_the_status_but_no_body_when_decoding_fails() {
        let mut web_client = MockTestWebClient::new();
        web_client
            .expect_get()
            .times(1)
            .returning(|_, _| ok(r#"{"status":"success","data":{"resultType":"bogus","result":[]}}"#));

        let response = client_with(web_client).instant_query("{app=\"loki\"}", None, None, None).await;

        assert!(response.successful());
        assert!(!response.successful_and_body_set());
        assert!(matches!(response.error(), Some(LokiError::UnsupportedResultType { result_type, .. }) if result_type == "bogus"));
    }

    #[tokio::test]
    async fn it_should_not_decode_error_responses() {
        let mut web_client = MockTestWebClient::new();
        web_client
            .expect_get()
            .times(1)
            .returning(|_, _| Ok(WebResponse::new(400, "parse error at line 1, col 1: syntax error")));

        let response = client_with(web_client).query_log_statistics("app=", None, None, None).await;

        assert!(!response.successful());
        assert_eq!(response.status_code(), Some(400));
        assert!(matches!(response.into_result(), Err(LokiError::UnexpectedStatus { status_code: 400, .. })));
    }

    #[tokio::test]
    async fn it_should_report_transport_failures_without_status() {
        let mut web_client = MockTestWebClient::new();
        web_client
            .expect_get()
            .times(1)
            .returning(|_, _| Err(LokiError::Transport(anyhow::anyhow!("connection refused"))));

        let response = client_with(web_client).get_build_information().await;

        assert_eq!(response.status_code(), None);
        assert!(matches!(response.into_result(), Err(LokiError::Transport(_))));
    }

    #[tokio::test]
    async fn it_should_call_internal_endpoints_below_the_configured_prefix() {
        let mut web_client = MockTestWebClient::new();
        web_client
            .expect_get()
            .withf(|url, params: &QueryParams| url == "http://localhost:3100/loki/internal/ready" && params.is_empty())
            .times(1)
            .returning(|_, _| ok("ready\n"));

        let config = LokiConfig::new("http://localhost:3100/").with_internal_endpoints_path_prefix("/loki/internal/");
        let response = LokiClient::with_web_client(&config, web_client).ready().await;

        assert_eq!(response.into_result().unwrap(), "ready\n");
    }

    #[tokio::test]
    async fn it_should_detect_patterns() {
        let mut web_client = MockTestWebClient::new();
        web_client
            .expect_get()
            .withf(|url, params| url == &format!("{}/patterns", API) && params.get("step") == Some("5m"))
            .times(1)
            .returning(|_, _| {
                ok(r#"{"status":"success","data":[{"pattern":"<_> level=info <_>","samples":[[1711839260,1],[1711839270,3]]}]}"#)
            });

        let patterns = client_with(web_client)
            .patterns_detection("{app=\"loki\"}", None, None, None, Some(PrometheusDuration::minutes(5)))
            .await
            .into_result()
            .unwrap();

        assert_eq!(patterns.data[0].pattern, "<_> level=info <_>");
        assert_eq!(patterns.data[0].samples[1].value, "3");
    }
}
