use loki_api::Authentication;
use serde::Deserialize;

fn remove_slash_at_end(url: &str) -> &str {
    url.strip_suffix('/').unwrap_or(url)
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct LokiConfig {
    pub base_url: String,
    #[serde(default)]
    pub authentication: Option<Authentication>,
    /// For deployments that serve `/ready`, `/config`, `/services` and `/metrics` below a prefix
    /// like `/loki/internal`.
    #[serde(default)]
    pub internal_endpoints_path_prefix: Option<String>,
}

impl LokiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        LokiConfig { base_url: base_url.into(), authentication: None, internal_endpoints_path_prefix: None }
    }

    pub fn with_authentication(mut self, authentication: Authentication) -> Self {
        self.authentication = Some(authentication);
        self
    }

    pub fn with_internal_endpoints_path_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.internal_endpoints_path_prefix = Some(prefix.into());
        self
    }

    pub fn api_endpoint(&self) -> String {
        format!("{}/loki/api/v1", remove_slash_at_end(&self.base_url))
    }

    pub fn internal_endpoint(&self) -> String {
        let prefix = self.internal_endpoints_path_prefix.as_deref().unwrap_or("");
        format!("{}{}", remove_slash_at_end(&self.base_url), remove_slash_at_end(prefix))
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct DebugConfig {
    pub log_level: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    pub loki: LokiConfig,
    #[serde(default)]
    pub debug: Option<DebugConfig>,
}
