use crate::LokiError;

/// What the transport hands back for any HTTP status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebResponse {
    pub status_code: u16,
    pub body: String,
}

impl WebResponse {
    pub fn new(status_code: u16, body: impl Into<String>) -> Self {
        WebResponse { status_code, body: body.into() }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// The outcome of one endpoint operation.
///
/// `successful` reflects the HTTP status, the body is only set if it could be decoded. A
/// transport failure has no status code at all.
#[derive(Debug)]
pub struct ApiResponse<T> {
    status_code: Option<u16>,
    successful: bool,
    body: Option<T>,
    error: Option<LokiError>,
}

impl<T> ApiResponse<T> {
    pub fn success(status_code: u16, body: T) -> Self {
        ApiResponse { status_code: Some(status_code), successful: true, body: Some(body), error: None }
    }

    pub fn new(status_code: Option<u16>, successful: bool, body: Option<T>, error: Option<LokiError>) -> Self {
        ApiResponse { status_code, successful, body, error }
    }

    pub fn transport_failure(error: LokiError) -> Self {
        ApiResponse { status_code: None, successful: false, body: None, error: Some(error) }
    }

    /// The request was never sent because building it failed.
    pub fn request_failure(error: LokiError) -> Self {
        ApiResponse { status_code: None, successful: false, body: None, error: Some(error) }
    }

    pub fn unexpected_status(response: WebResponse) -> Self {
        ApiResponse {
            status_code: Some(response.status_code),
            successful: false,
            body: None,
            error: Some(LokiError::UnexpectedStatus { status_code: response.status_code, body: response.body }),
        }
    }

    /// A 2xx response whose body could not be decoded.
    pub fn undecodable(status_code: u16, error: LokiError) -> Self {
        ApiResponse { status_code: Some(status_code), successful: true, body: None, error: Some(error) }
    }

    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    pub fn successful(&self) -> bool {
        self.successful
    }

    pub fn successful_and_body_set(&self) -> bool {
        self.successful && self.body.is_some()
    }

    pub fn body(&self) -> Option<&T> {
        self.body.as_ref()
    }

    pub fn error(&self) -> Option<&LokiError> {
        self.error.as_ref()
    }

    pub fn into_result(self) -> Result<T, LokiError> {
        match (self.body, self.error) {
            (Some(body), _) => Ok(body),
            (None, Some(error)) => Err(error),
            (None, None) => Err(LokiError::NoData),
        }
    }

    pub fn map_body<U>(self, f: impl FnOnce(T) -> U) -> ApiResponse<U> {
        ApiResponse { status_code: self.status_code, successful: self.successful, body: self.body.map(f), error: self.error }
    }

    /// Maps the body if there is one; a mapping failure removes the body and records the error.
    pub fn try_map_body<U>(self, f: impl FnOnce(T) -> Result<U, LokiError>) -> ApiResponse<U> {
        let (body, error) = match self.body {
            Some(body) => match f(body) {
                Ok(mapped) => (Some(mapped), self.error),
                Err(error) => (None, Some(error)),
            },
            None => (None, self.error),
        };
        ApiResponse { status_code: self.status_code, successful: self.successful, body, error }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_should_expose_the_body_of_a_success() {
        let response = ApiResponse::success(200, vec!["app".to_string()]);
        assert!(response.successful_and_body_set());
        assert_eq!(response.status_code(), Some(200));
        assert_eq!(response.into_result().unwrap(), vec!["app".to_string()]);
    }

    #[test]
    fn it_should_keep_the_error_of_an_unexpected_status() {
        let response: ApiResponse<String> = ApiResponse::unexpected_status(WebResponse::new(404, "not found"));
        assert!(!response.successful());
        assert!(response.body().is_none());
        assert!(matches!(response.into_result(), Err(LokiError::UnexpectedStatus { status_code: 404, .. })));
    }

    #[test]
    fn it_should_report_a_successful_status_without_body_on_decode_failure() {
        let response: ApiResponse<String> = ApiResponse::undecodable(200, LokiError::MissingField("status".to_string()));
        assert!(response.successful());
        assert!(!response.successful_and_body_set());
        assert!(matches!(response.into_result(), Err(LokiError::MissingField(_))));
    }

    #[test]
    fn it_should_record_mapping_failures() {
        let response = ApiResponse::success(200, "x".to_string())
            .try_map_body(|body| body.parse::<i64>().map_err(|_| LokiError::MalformedValue(body.clone())));
        assert!(response.body().is_none());
        assert!(matches!(response.error(), Some(LokiError::MalformedValue(_))));
    }

    #[test]
    fn it_should_have_no_status_code_on_transport_failure() {
        let response: ApiResponse<()> = ApiResponse::transport_failure(LokiError::Transport(anyhow::anyhow!("connection refused")));
        assert_eq!(response.status_code(), None);
        assert!(!response.successful());
    }

    #[test]
    fn it_should_keep_request_building_failures_apart_from_transport_failures() {
        let response: ApiResponse<bool> =
            ApiResponse::request_failure(LokiError::Other(anyhow::anyhow!("Failed to serialize push request")));
        assert_eq!(response.status_code(), None);
        assert!(!response.successful());
        assert!(matches!(response.error(), Some(LokiError::Other(_))));
        assert!(matches!(response.into_result(), Err(LokiError::Other(_))));
    }
}
