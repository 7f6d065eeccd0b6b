use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::Value;
use tracing::debug;

use hookflow_core::error::{HookflowError, Result};
use hookflow_core::traits::HttpTransport;
use hookflow_core::types::{HttpRequest, HttpResponse};

const USER_AGENT: &str = concat!("hookflow/", env!("CARGO_PKG_VERSION"));

/// reqwest-backed [`HttpTransport`].
///
/// One client is shared across runs; the timeout is applied per request.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| {
                HookflowError::external("http", format!("Failed to create HTTP client: {}", e))
            })?;
        Ok(Self { client })
    }
}

/// Parse a method name, case-insensitively.
pub(crate) fn parse_method(method: &str) -> Result<reqwest::Method> {
    reqwest::Method::from_bytes(method.trim().to_uppercase().as_bytes())
        .map_err(|_| HookflowError::external("http", format!("Invalid method: {}", method)))
}

/// Response text as JSON when it parses, raw text otherwise.
pub(crate) fn decode_body(text: String) -> Value {
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}

fn describe(e: &reqwest::Error, timeout: Duration) -> String {
    if e.is_timeout() {
        format!("timeout after {}s: {}", timeout.as_secs(), e)
    } else {
        e.to_string()
    }
}

impl HttpTransport for ReqwestTransport {
    fn request(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse>> {
        Box::pin(async move {
            let method = parse_method(&request.method)?;
            debug!(method = %method, url = %request.url, "Sending HTTP request");

            let mut req = self
                .client
                .request(method, &request.url)
                .timeout(request.timeout);
            for (k, v) in &request.headers {
                req = req.header(k.as_str(), v.as_str());
            }
            req = match request.body {
                Some(Value::String(text)) => req.body(text),
                Some(body) => req.json(&body),
                None => req,
            };

            let resp = req
                .send()
                .await
                .map_err(|e| HookflowError::external("http", describe(&e, request.timeout)))?;

            let status = resp.status().as_u16();
            let text = resp
                .text()
                .await
                .map_err(|e| HookflowError::external("http", describe(&e, request.timeout)))?;

            debug!(status, bytes = text.len(), "HTTP response received");
            Ok(HttpResponse {
                status,
                data: decode_body(text),
            })
        })
    }
}
