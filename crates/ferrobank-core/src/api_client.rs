//! Retrying request executor layered over an [`HttpClient`] transport.
//!
//! Every non-2xx response and every transport failure is classified into an
//! [`ApiError`]. Transient kinds are re-issued in a bounded loop with the
//! configured backoff; everything else propagates on the first attempt.

use std::future::Future;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::http_client::{HttpClient, HttpRequest, HttpResponse, DEFAULT_TIMEOUT_MS};
use crate::redact::{sanitize_headers, sanitize_params, truncate_body};
use crate::retry::RetryConfig;
use crate::throttling::RequestThrottle;
use crate::{ApiError, ApiErrorKind};

#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn HttpClient>,
    retry: RetryConfig,
    throttle: Option<RequestThrottle>,
    timeout_ms: u64,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("retry", &self.retry)
            .field("timeout_ms", &self.timeout_ms)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    pub fn new(transport: Arc<dyn HttpClient>) -> Self {
        Self {
            transport,
            retry: RetryConfig::default(),
            throttle: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_throttle(mut self, throttle: RequestThrottle) -> Self {
        self.throttle = Some(throttle);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Executes `request`, retrying transient failures. Returns the first 2xx
    /// response or the last classified error.
    pub async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let request = request.with_timeout_ms(self.timeout_ms);
        let max_attempts = self.retry.max_attempts();
        let mut attempt: u32 = 0;

        loop {
            if let Some(throttle) = &self.throttle {
                throttle.acquire().await;
            }

            debug!(
                method = %request.method,
                url = %sanitize_params(&request.url),
                headers = ?sanitize_headers(&request.headers),
                body = ?request.body.as_deref().map(|body| truncate_body(&sanitize_params(body))),
                attempt = attempt + 1,
                "sending provider request"
            );

            let error = match self.transport.execute(request.clone()).await {
                Ok(response) if response.is_success() => {
                    debug!(
                        status = response.status,
                        body = %truncate_body(&response.body),
                        "provider request succeeded"
                    );
                    return Ok(response);
                }
                Ok(response) => {
                    debug!(
                        status = response.status,
                        body = %truncate_body(&response.body),
                        "provider request failed"
                    );
                    ApiError::from_status(response.status, &response.body)
                }
                Err(error) => ApiError::from(error),
            };

            attempt += 1;
            if attempt >= max_attempts || !self.retry.should_retry(&error) {
                return Err(error);
            }

            let delay = self.retry.delay_for_attempt(attempt - 1);
            warn!(
                method = %request.method,
                url = %sanitize_params(&request.url),
                code = error.code(),
                attempt,
                delay_ms = delay.as_millis() as u64,
                "retrying provider request"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Executes `request` and decodes the JSON body.
    pub async fn execute_json<T: DeserializeOwned>(
        &self,
        request: HttpRequest,
    ) -> Result<T, ApiError> {
        let response = self.execute(request).await?;
        decode_json(&response.body)
    }
}

pub fn decode_json<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    if body.trim().is_empty() {
        return Err(ApiError::invalid_response("provider returned an empty body"));
    }
    serde_json::from_str(body).map_err(|error| {
        if error.is_syntax() || error.is_eof() {
            ApiError::invalid_response(format!("provider returned non-JSON body: {error}"))
        } else {
            ApiError::decoding(format!("failed to decode provider payload: {error}"))
        }
    })
}

/// Tries `candidates` in order. A 404 moves on to the next path, any other
/// error is returned immediately, the first success wins. When every
/// candidate answers 404, `exhausted` builds the surfaced error from the
/// number of paths tried and the last 404.
pub(crate) async fn probe_paths<'p, T, F, Fut>(
    candidates: &'p [String],
    mut attempt: F,
    exhausted: impl FnOnce(usize, Option<ApiError>) -> ApiError,
) -> Result<T, ApiError>
where
    F: FnMut(&'p str) -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let mut last_not_found = None;
    for path in candidates {
        match attempt(path.as_str()).await {
            Ok(value) => return Ok(value),
            Err(error) if error.kind() == ApiErrorKind::NotFound => {
                debug!(path = %path, "candidate path not found, trying next");
                last_not_found = Some(error);
            }
            Err(error) => return Err(error),
        }
    }
    Err(exhausted(candidates.len(), last_not_found))
}

#[cfg(test)]
mod tests {
    use std::pin::Pin;
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::http_client::HttpError;

    struct SequencedHttpClient {
        responses: Mutex<Vec<Result<HttpResponse, HttpError>>>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl SequencedHttpClient {
        fn new(mut responses: Vec<Result<HttpResponse, HttpError>>) -> Self {
            responses.reverse();
            Self {
                responses: Mutex::new(responses),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn request_count(&self) -> usize {
            self.requests.lock().expect("request store should not be poisoned").len()
        }
    }

    impl HttpClient for SequencedHttpClient {
        fn execute<'a>(
            &'a self,
            request: HttpRequest,
        ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
            self.requests
                .lock()
                .expect("request store should not be poisoned")
                .push(request);
            let response = self
                .responses
                .lock()
                .expect("response queue should not be poisoned")
                .pop()
                .unwrap_or_else(|| Ok(HttpResponse::new(500, "")));
            Box::pin(async move { response })
        }
    }

    fn fast_retry(max_retries: u32) -> RetryConfig {
        RetryConfig::exponential(Duration::from_millis(1), max_retries)
    }

    #[tokio::test]
    async fn server_errors_are_retried_until_success() {
        let transport = Arc::new(SequencedHttpClient::new(vec![
            Ok(HttpResponse::new(503, "")),
            Ok(HttpResponse::new(502, "")),
            Ok(HttpResponse::ok_json(r#"{"ok":true}"#)),
        ]));
        let client = ApiClient::new(transport.clone()).with_retry(fast_retry(3));

        let response = client
            .execute(HttpRequest::get("https://bank.test/accounts"))
            .await
            .expect("third attempt succeeds");

        assert_eq!(response.status, 200);
        assert_eq!(transport.request_count(), 3);
    }

    #[tokio::test]
    async fn client_errors_propagate_without_retry() {
        let transport = Arc::new(SequencedHttpClient::new(vec![Ok(HttpResponse::new(
            400,
            r#"{"message":"bad request"}"#,
        ))]));
        let client = ApiClient::new(transport.clone()).with_retry(fast_retry(3));

        let error = client
            .execute(HttpRequest::get("https://bank.test/accounts"))
            .await
            .expect_err("400 is terminal");

        assert_eq!(error.kind(), ApiErrorKind::Http);
        assert_eq!(error.message(), "bad request");
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn timeout_is_terminal_after_max_attempts() {
        let transport = Arc::new(SequencedHttpClient::new(vec![
            Err(HttpError::timeout("t1")),
            Err(HttpError::timeout("t2")),
            Err(HttpError::timeout("t3")),
            Err(HttpError::timeout("t4")),
            Err(HttpError::timeout("t5")),
        ]));
        let client = ApiClient::new(transport.clone()).with_retry(fast_retry(3));

        let error = client
            .execute(HttpRequest::get("https://bank.test/accounts"))
            .await
            .expect_err("all attempts time out");

        assert_eq!(error.kind(), ApiErrorKind::Timeout);
        assert_eq!(transport.request_count(), 4);
    }

    #[tokio::test]
    async fn configured_timeout_is_applied_to_requests() {
        let transport = Arc::new(SequencedHttpClient::new(vec![Ok(HttpResponse::ok_json("{}"))]));
        let client = ApiClient::new(transport.clone()).with_timeout_ms(1_234);

        client
            .execute(HttpRequest::get("https://bank.test/accounts"))
            .await
            .expect("success");

        let requests = transport.requests.lock().expect("not poisoned");
        assert_eq!(requests[0].timeout_ms, 1_234);
    }

    #[test]
    fn decode_distinguishes_non_json_from_shape_mismatch() {
        #[derive(Debug, serde::Deserialize)]
        struct Shape {
            #[allow(dead_code)]
            id: String,
        }

        let error = decode_json::<Shape>("<html>").expect_err("not json");
        assert_eq!(error.kind(), ApiErrorKind::InvalidResponse);

        let error = decode_json::<Shape>(r#"{"other":1}"#).expect_err("wrong shape");
        assert_eq!(error.kind(), ApiErrorKind::Decoding);
    }
}
