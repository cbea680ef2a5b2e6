//! Outgoing request model.
//!
//! An [`ApiRequest`] describes one action against a target endpoint:
//! an HTTP call, a WebSocket connection or message, or an SSE
//! subscription. Requests are built by the caller and handed to the
//! client for dispatch and history recording.

// ============================================================================
// Imports
// ============================================================================

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::RequestId;

// ============================================================================
// ApiType
// ============================================================================

/// Interaction style of a request or response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ApiType {
    /// One-shot request/response.
    Http,
    /// Bidirectional message stream.
    WebSocket,
    /// Server-Sent Events, receive only.
    Sse,
}

impl ApiType {
    /// Returns the wire name (`HTTP`, `WEBSOCKET`, `SSE`).
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "HTTP",
            Self::WebSocket => "WEBSOCKET",
            Self::Sse => "SSE",
        }
    }

    /// Returns the URL schemes accepted for this protocol.
    #[inline]
    #[must_use]
    pub const fn schemes(&self) -> &'static [&'static str] {
        match self {
            Self::Http | Self::Sse => &["http", "https"],
            Self::WebSocket => &["ws", "wss"],
        }
    }
}

impl fmt::Display for ApiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// HttpMethod
// ============================================================================

/// HTTP verb of an [`ApiRequest`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// `GET`, the default.
    #[default]
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `PATCH`
    Patch,
    /// `DELETE`
    Delete,
    /// `HEAD`
    Head,
    /// `OPTIONS`
    Options,
}

impl HttpMethod {
    /// All supported methods.
    pub const ALL: [Self; 7] = [
        Self::Get,
        Self::Post,
        Self::Put,
        Self::Patch,
        Self::Delete,
        Self::Head,
        Self::Options,
    ];

    /// Returns the method name.
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }

    /// Returns `true` if a request body is sent for this method.
    ///
    /// Only `POST`, `PUT` and `PATCH` carry a body.
    #[inline]
    #[must_use]
    pub const fn accepts_body(&self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }

    /// Parses a method name, falling back to `GET` when unrecognized.
    #[must_use]
    pub fn parse_or_default(name: &str) -> Self {
        name.parse().unwrap_or_default()
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|method| method.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::config(format!("Unknown HTTP method: {s}")))
    }
}

// ============================================================================
// ApiRequest
// ============================================================================

/// A request issued by the caller.
///
/// Immutable once handed to the client. The `with_*` methods consume and
/// return the request so it can be assembled in one expression.
///
/// # Example
///
/// ```
/// use api_probe::{ApiRequest, HttpMethod};
/// use serde_json::json;
///
/// let request = ApiRequest::http(HttpMethod::Post, "http://localhost:8080/api/http/post")
///     .with_header("X-Trace", "1")
///     .with_body(json!({ "value": "hello" }));
///
/// assert_eq!(request.method, Some(HttpMethod::Post));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRequest {
    /// Unique identifier.
    pub id: RequestId,

    /// Protocol this request targets.
    pub protocol: ApiType,

    /// Target URL.
    pub url: String,

    /// HTTP verb, HTTP only. `None` means `GET`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<HttpMethod>,

    /// Caller-supplied headers, sent verbatim.
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Request body (HTTP `POST`/`PUT`/`PATCH` only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,

    /// Message to send, WebSocket only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Value>,

    /// Creation time.
    pub created_at: SystemTime,
}

// ============================================================================
// ApiRequest - Constructors
// ============================================================================

impl ApiRequest {
    /// Creates a request with a generated ID and no method, headers or payload.
    #[must_use]
    pub fn new(protocol: ApiType, url: impl Into<String>) -> Self {
        Self {
            id: RequestId::generate(),
            protocol,
            url: url.into(),
            method: None,
            headers: HashMap::new(),
            body: None,
            message: None,
            created_at: SystemTime::now(),
        }
    }

    /// Creates an HTTP request.
    #[inline]
    #[must_use]
    pub fn http(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method: Some(method),
            ..Self::new(ApiType::Http, url)
        }
    }

    /// Creates a WebSocket request (connect when no message is set).
    #[inline]
    #[must_use]
    pub fn websocket(url: impl Into<String>) -> Self {
        Self::new(ApiType::WebSocket, url)
    }

    /// Creates an SSE subscription request.
    #[inline]
    #[must_use]
    pub fn sse(url: impl Into<String>) -> Self {
        Self::new(ApiType::Sse, url)
    }
}

// ============================================================================
// ApiRequest - Builder Methods
// ============================================================================

impl ApiRequest {
    /// Replaces the generated ID.
    #[inline]
    #[must_use]
    pub fn with_id(mut self, id: impl Into<RequestId>) -> Self {
        self.id = id.into();
        self
    }

    /// Adds one header.
    #[inline]
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Adds multiple headers.
    #[inline]
    #[must_use]
    pub fn with_headers(
        mut self,
        headers: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
    ) -> Self {
        self.headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Sets the body.
    #[inline]
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Value>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets the WebSocket message.
    #[inline]
    #[must_use]
    pub fn with_message(mut self, message: impl Into<Value>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Returns the effective HTTP method.
    #[inline]
    #[must_use]
    pub fn effective_method(&self) -> HttpMethod {
        self.method.unwrap_or_default()
    }
}

// ============================================================================
// Tests
// ============================================================================
