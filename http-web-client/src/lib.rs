use anyhow::anyhow;
use async_trait::async_trait;
use log::{debug, error};
use loki_api::{Authentication, LokiError, QueryParams, WebClient, WebResponse};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, RequestBuilder};

/// [WebClient] on top of reqwest. One connection pool is shared by all requests.
#[derive(Debug, Clone)]
pub struct ReqwestWebClient {
    client: Client,
    authentication: Option<Authentication>,
}

impl ReqwestWebClient {
    pub fn new(authentication: Option<Authentication>) -> Self {
        Self::with_client(Client::new(), authentication)
    }

    /// For callers that need their own timeouts, proxies or TLS settings.
    pub fn with_client(client: Client, authentication: Option<Authentication>) -> Self {
        ReqwestWebClient { client, authentication }
    }

    fn request(&self, method: Method, url: &str, params: &QueryParams, body: Option<String>) -> RequestBuilder {
        let mut request = self.client.request(method, url).query(params.as_slice());
        request = match &self.authentication {
            Some(Authentication::Basic { username, password }) => request.basic_auth(username, Some(password)),
            Some(Authentication::Bearer { token }) => request.bearer_auth(token),
            None => request,
        };
        if let Some(body) = body {
            request = request.header(CONTENT_TYPE, "application/json").body(body);
        }
        request
    }

    async fn send(&self, method: Method, url: String, params: QueryParams, body: Option<String>) -> Result<WebResponse, LokiError> {
        debug!("{} {} {:?}", method, url, params);
        let response = self.request(method, &url, &params, body).send().await.map_err(|e| {
            error!("Failed to query loki at {}: {}", url, e);
            LokiError::Transport(anyhow!(e))
        })?;

        let status_code = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| LokiError::Transport(anyhow!("Failed to read response body: {}", e)))?;

        Ok(WebResponse { status_code, body })
    }
}

impl Default for ReqwestWebClient {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl WebClient for ReqwestWebClient {
    async fn get(&self, url: String, params: QueryParams) -> Result<WebResponse, LokiError> {
        self.send(Method::GET, url, params, None).await
    }

    async fn post(&self, url: String, params: QueryParams, body: Option<String>) -> Result<WebResponse, LokiError> {
        self.send(Method::POST, url, params, body).await
    }

    async fn put(&self, url: String, params: QueryParams, body: Option<String>) -> Result<WebResponse, LokiError> {
        self.send(Method::PUT, url, params, body).await
    }

    async fn delete(&self, url: String, params: QueryParams) -> Result<WebResponse, LokiError> {
        self.send(Method::DELETE, url, params, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> QueryParams {
        let mut params = QueryParams::new();
        params.push("query", "{app=\"loki\"}");
        params.push("match[]", "{job=\"x\"}");
        params
    }

    #[test]
    fn it_should_encode_query_params_into_the_url() {
        let client = ReqwestWebClient::default();
        let request = client.request(Method::GET, "http://localhost:3100/loki/api/v1/label", &params(), None).build().unwrap();

        assert_eq!(request.method(), Method::GET);
        assert_eq!(
            request.url().as_str(),
            "http://localhost:3100/loki/api/v1/label?query=%7Bapp%3D%22loki%22%7D&match%5B%5D=%7Bjob%3D%22x%22%7D"
        );
    }

    #[test]
    fn it_should_pass_bearer_tokens_through() {
        let client = ReqwestWebClient::new(Some(Authentication::Bearer { token: "secret".to_string() }));
        let request = client.request(Method::GET, "http://localhost:3100/ready", &QueryParams::new(), None).build().unwrap();

        assert_eq!(request.headers()["authorization"], "Bearer secret");
    }

    #[test]
    fn it_should_send_json_bodies() {
        let client = ReqwestWebClient::new(Some(Authentication::Basic { username: "user".to_string(), password: "pass".to_string() }));
        let request = client
            .request(Method::POST, "http://localhost:3100/loki/api/v1/push", &QueryParams::new(), Some("{\"streams\":[]}".to_string()))
            .build()
            .unwrap();

        assert_eq!(request.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(request.headers()["authorization"], "Basic dXNlcjpwYXNz");
        assert_eq!(request.body().and_then(|body| body.as_bytes()), Some("{\"streams\":[]}".as_bytes()));
    }

    #[tokio::test]
    async fn it_should_report_unreachable_servers_as_transport_failures() {
        let client = ReqwestWebClient::default();
        let result = client.get("http://127.0.0.1:1/ready".to_string(), QueryParams::new()).await;

        assert!(matches!(result, Err(LokiError::Transport(_))));
    }
}
