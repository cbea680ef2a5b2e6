//! One-shot HTTP adapter.
//!
//! Every call produces exactly one [`ApiResponse`], success or failure,
//! and publishes it on the response stream. HTTP is connectionless here:
//! no connection state is touched.

// ============================================================================
// Imports
// ============================================================================

use std::collections::HashMap;
use std::time::Instant;

use reqwest::Method;
use reqwest::header::HeaderMap;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::Result;
use crate::protocol::payload::{decode_body, error_detail};
use crate::protocol::{ApiRequest, ApiResponse, ApiType, HttpMethod};
use crate::streams::ResponseStream;

use super::validate_url;

// ============================================================================
// HttpAdapter
// ============================================================================

/// Sends [`ApiRequest`]s over HTTP.
///
/// Cheap to clone; clones share the connection pool and response stream.
#[derive(Debug, Clone)]
pub struct HttpAdapter {
    /// Underlying HTTP client (timeouts and redirects configured).
    client: reqwest::Client,
    /// Where produced responses are published.
    responses: ResponseStream,
}

impl HttpAdapter {
    /// Creates an adapter around a configured client.
    #[must_use]
    pub fn new(client: reqwest::Client, responses: ResponseStream) -> Self {
        Self { client, responses }
    }

    /// Sends the request and returns its normalized response.
    ///
    /// Never fails: transport errors, timeouts and invalid input yield a
    /// response with status `0` and the error detail as data. The
    /// response is also published on the response stream, once.
    pub async fn send(&self, request: &ApiRequest) -> ApiResponse {
        let started = Instant::now();
        let method = request.effective_method();

        debug!(request_id = %request.id, %method, url = %request.url, "Sending HTTP request");

        let response = match self.execute(request, method, started).await {
            Ok(response) => {
                debug!(
                    request_id = %request.id,
                    status = response.status.unwrap_or_default(),
                    elapsed_ms = response.response_time_ms,
                    "HTTP request completed"
                );
                response
            }
            Err(e) => {
                let detail = error_detail(&e);
                warn!(request_id = %request.id, error = %detail, "HTTP request failed");
                ApiResponse::from_http_failure(
                    request.id.clone(),
                    None,
                    None,
                    Value::String(detail),
                    started.elapsed(),
                )
            }
        };

        self.responses.publish(response.clone());
        response
    }

    /// Performs the exchange.
    async fn execute(
        &self,
        request: &ApiRequest,
        method: HttpMethod,
        started: Instant,
    ) -> Result<ApiResponse> {
        let url = validate_url(&request.url, ApiType::Http)?;

        let mut builder = self.client.request(to_reqwest_method(method), url);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if method.accepts_body()
            && let Some(body) = &request.body
        {
            builder = match body {
                Value::String(text) => builder.body(text.clone()),
                other => builder.json(other),
            };
        }

        let response = builder.send().await?;

        let status = response.status();
        let headers = extract_headers(response.headers());
        let bytes = response.bytes().await?;

        Ok(ApiResponse::from_http(
            request.id.clone(),
            status.as_u16(),
            status.canonical_reason().unwrap_or_default(),
            decode_body(&bytes),
            headers,
            started.elapsed(),
        ))
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Maps a request method to the client's method type.
fn to_reqwest_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
        HttpMethod::Head => Method::HEAD,
        HttpMethod::Options => Method::OPTIONS,
    }
}

/// Flattens response headers; repeated names are joined with `", "`.
fn extract_headers(headers: &HeaderMap) -> HashMap<String, String> {
    let mut result: HashMap<String, String> = HashMap::with_capacity(headers.keys_len());

    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes());
        result
            .entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert_with(|| value.into_owned());
    }

    result
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::SocketAddr;
    use std::time::Duration;

    use axum::Router;
    use axum::body::Bytes;
    use axum::http::{HeaderMap as AxumHeaders, Method as AxumMethod, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::{any, get};
    use futures_util::StreamExt;
    use reqwest::header::HeaderValue;
    use serde_json::json;
    use tokio::net::TcpListener;

    /// Echoes method, body and the `x-probe` header back as JSON.
    async fn echo(method: AxumMethod, headers: AxumHeaders, body: Bytes) -> impl IntoResponse {
        let probe = headers
            .get("x-probe")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        (
            [("x-served-by", "echo")],
            axum::Json(json!({
                "method": method.as_str(),
                "body": String::from_utf8_lossy(&body),
                "probe": probe,
            })),
        )
    }

    async fn spawn_server() -> SocketAddr {
        let app = Router::new()
            .route("/echo", any(echo))
            .route("/text", get(|| async { "Deleted ID: 7" }))
            .route("/missing", get(|| async { (StatusCode::NOT_FOUND, "nope") }))
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "late"
                }),
            );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn adapter(responses: ResponseStream) -> HttpAdapter {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(500))
            .build()
            .unwrap();
        HttpAdapter::new(client, responses)
    }

    #[tokio::test]
    async fn test_post_sends_json_body_and_headers() {
        let addr = spawn_server().await;
        let http = adapter(ResponseStream::default());

        let request = ApiRequest::http(HttpMethod::Post, format!("http://{addr}/echo"))
            .with_header("X-Probe", "yes")
            .with_body(json!({"value": "hello"}));

        let response = http.send(&request).await;

        assert_eq!(response.request_id, request.id);
        assert_eq!(response.status, Some(200));
        assert_eq!(response.status_text.as_deref(), Some("OK"));
        assert_eq!(response.data["method"], "POST");
        assert_eq!(response.data["body"], r#"{"value":"hello"}"#);
        assert_eq!(response.data["probe"], "yes");
        assert_eq!(response.header("X-Served-By"), Some("echo"));
        assert!(!response.is_live);
    }

    #[tokio::test]
    async fn test_string_body_sent_raw() {
        let addr = spawn_server().await;
        let http = adapter(ResponseStream::default());

        let request = ApiRequest::http(HttpMethod::Put, format!("http://{addr}/echo"))
            .with_body("plain text");
        let response = http.send(&request).await;

        assert_eq!(response.data["method"], "PUT");
        assert_eq!(response.data["body"], "plain text");
    }

    #[tokio::test]
    async fn test_body_ignored_for_get_and_delete() {
        let addr = spawn_server().await;
        let http = adapter(ResponseStream::default());

        for method in [HttpMethod::Get, HttpMethod::Delete] {
            let request = ApiRequest::http(method, format!("http://{addr}/echo"))
                .with_body(json!({"ignored": true}));
            let response = http.send(&request).await;

            assert_eq!(response.data["method"], method.as_str());
            assert_eq!(response.data["body"], "");
        }
    }

    #[tokio::test]
    async fn test_missing_method_defaults_to_get() {
        let addr = spawn_server().await;
        let http = adapter(ResponseStream::default());

        let request = ApiRequest::new(ApiType::Http, format!("http://{addr}/echo"));
        let response = http.send(&request).await;

        assert_eq!(response.data["method"], "GET");
    }

    #[tokio::test]
    async fn test_non_json_and_error_status_bodies() {
        let addr = spawn_server().await;
        let http = adapter(ResponseStream::default());

        let text = http
            .send(&ApiRequest::http(HttpMethod::Get, format!("http://{addr}/text")))
            .await;
        assert_eq!(text.data, json!("Deleted ID: 7"));

        let missing = http
            .send(&ApiRequest::http(HttpMethod::Get, format!("http://{addr}/missing")))
            .await;
        assert_eq!(missing.status, Some(404));
        assert_eq!(missing.status_text.as_deref(), Some("Not Found"));
        assert_eq!(missing.data, json!("nope"));
        assert!(!missing.is_success());
    }

    #[tokio::test]
    async fn test_connection_refused_is_normalized() {
        // Bind then drop to get a port nobody listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let http = adapter(ResponseStream::default());
        let request = ApiRequest::http(HttpMethod::Get, format!("http://{addr}/"));
        let response = http.send(&request).await;

        assert_eq!(response.request_id, request.id);
        assert_eq!(response.status, Some(0));
        assert_eq!(response.status_text.as_deref(), Some("Error"));
        assert!(response.data.is_string());
        assert!(response.headers.is_none());
    }

    #[tokio::test]
    async fn test_timeout_is_normalized() {
        let addr = spawn_server().await;
        let http = adapter(ResponseStream::default());

        let response = http
            .send(&ApiRequest::http(HttpMethod::Get, format!("http://{addr}/slow")))
            .await;

        assert!(response.is_transport_failure());
        assert!(response.response_time_ms >= 400);
    }

    #[tokio::test]
    async fn test_invalid_url_is_normalized() {
        let http = adapter(ResponseStream::default());

        let response = http
            .send(&ApiRequest::http(HttpMethod::Get, "ws://localhost/socket"))
            .await;

        assert!(response.is_transport_failure());
        assert!(response.data.as_str().unwrap().contains("Unsupported scheme"));
    }

    #[tokio::test]
    async fn test_each_send_publishes_exactly_once() {
        let addr = spawn_server().await;
        let responses = ResponseStream::default();
        let mut subscription = responses.stream();
        let http = adapter(responses);

        let request = ApiRequest::http(HttpMethod::Get, format!("http://{addr}/echo"));
        let returned = http.send(&request).await;

        let published = subscription.next().await.unwrap();
        assert_eq!(published, returned);

        let nothing_else = tokio::time::timeout(Duration::from_millis(50), subscription.next()).await;
        assert!(nothing_else.is_err());
    }

    #[test]
    fn test_extract_headers_joins_repeats() {
        let mut headers = HeaderMap::new();
        headers.append("set-cookie", HeaderValue::from_static("a=1"));
        headers.append("set-cookie", HeaderValue::from_static("b=2"));
        headers.insert("content-type", HeaderValue::from_static("text/plain"));

        let map = extract_headers(&headers);
        assert_eq!(map["set-cookie"], "a=1, b=2");
        assert_eq!(map["content-type"], "text/plain");
    }
}
