//! Desktop HTTP bridge over reqwest

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy},
};
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// [`HttpClient`] backed by a pooled reqwest client.
///
/// Retries transient failures with exponential backoff. TLS verification is
/// on by default; `trust_self_signed` turns it off for users running a
/// private server with a self-signed certificate.
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self::with_options(Duration::from_secs(30), false)
    }

    /// Client with an explicit request timeout and certificate policy.
    ///
    /// `trust_self_signed` disables certificate verification entirely, so it
    /// must only be set from an explicit user opt-in.
    pub fn with_options(timeout: Duration, trust_self_signed: bool) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .danger_accept_invalid_certs(trust_self_signed)
            .user_agent("note-platform-core/0.1.0")
            .build()
            .expect("reqwest client construction only fails on invalid TLS backends");

        Self { client }
    }

    /// Wrap an already-configured reqwest client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn to_reqwest(&self, request: HttpRequest) -> reqwest::RequestBuilder {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Head => reqwest::Method::HEAD,
        };

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        builder
    }

    /// One send attempt. The bool in the error case marks it retryable.
    async fn attempt(
        &self,
        request: HttpRequest,
    ) -> std::result::Result<HttpResponse, (BridgeError, bool)> {
        let sent = self.to_reqwest(request).send().await;

        let response = match sent {
            Ok(response) => response,
            Err(e) => {
                let error = if e.is_timeout() {
                    BridgeError::OperationFailed("Request timed out".to_string())
                } else if e.is_connect() {
                    BridgeError::OperationFailed(format!("Connection failed: {}", e))
                } else {
                    BridgeError::OperationFailed(e.to_string())
                };
                return Err((error, true));
            }
        };

        let status = response.status().as_u16();
        // 5xx and throttling responses are worth retrying, anything else is
        // the server's final answer.
        if status >= 500 || status == 429 {
            return Err((
                BridgeError::OperationFailed(format!("HTTP {} error", status)),
                true,
            ));
        }

        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.to_string(), s.to_string())))
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|e| (BridgeError::OperationFailed(e.to_string()), false))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.execute_with_retry(request, RetryPolicy::default())
            .await
    }

    async fn execute_with_retry(
        &self,
        request: HttpRequest,
        policy: RetryPolicy,
    ) -> Result<HttpResponse> {
        let mut last_error = None;

        for attempt in 1..=policy.max_attempts {
            debug!(attempt, max_attempts = policy.max_attempts, url = %request.url, "Sending HTTP request");

            match self.attempt(request.clone()).await {
                Ok(response) => return Ok(response),
                Err((error, retryable)) => {
                    warn!(error = %error, attempt, "HTTP request failed");
                    last_error = Some(error);
                    if !retryable {
                        break;
                    }
                }
            }

            if attempt < policy.max_attempts {
                let delay = if policy.use_exponential_backoff {
                    (policy.base_delay * 2u32.pow(attempt - 1)).min(policy.max_delay)
                } else {
                    policy.base_delay
                };
                debug!(delay_ms = delay.as_millis(), "Retrying after delay");
                sleep(delay).await;
            }
        }

        Err(last_error
            .unwrap_or_else(|| BridgeError::OperationFailed("No attempts were made".to_string())))
    }
}
