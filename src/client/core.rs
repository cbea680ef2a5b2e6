//! Unified client facade.
//!
//! [`ApiClient`] owns one adapter per protocol plus the observable
//! channels the presentation layer subscribes to. It is cheap to clone;
//! clones share adapters, history and streams.
//!
//! # Example
//!
//! ```no_run
//! use api_probe::{ApiClient, ApiRequest, HttpMethod};
//! use futures_util::StreamExt;
//!
//! # async fn example() -> api_probe::Result<()> {
//! let client = ApiClient::new()?;
//!
//! let mut states = client.connection_state_stream();
//! let mut history = client.history_stream();
//!
//! let request = ApiRequest::http(HttpMethod::Get, "http://localhost:8080/api/ping");
//! client.record_request(request.clone());
//! let response = client.send_http(&request).await;
//!
//! println!("{} in {}ms", response.status.unwrap_or_default(), response.response_time_ms);
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use futures_util::stream::BoxStream;
use reqwest::redirect::Policy;
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info};

use crate::error::Result;
use crate::protocol::{ApiRequest, ApiResponse, ApiType};
use crate::streams::{ConnectionState, ConnectionTracker, HistoryLog, ResponseStream};
use crate::transport::{HttpAdapter, SseAdapter, SseEvents, WebSocketAdapter, WebSocketEvents};

use super::builder::ApiClientBuilder;
use super::options::ClientOptions;

// ============================================================================
// Dispatch
// ============================================================================

/// Outcome of [`ApiClient::execute`], one variant per routing decision.
#[derive(Debug)]
pub enum Dispatch {
    /// HTTP request completed (successfully or not).
    Http(ApiResponse),
    /// WebSocket connection opened; events follow on the stream.
    WebSocketOpened(WebSocketEvents),
    /// WebSocket message handed to the open connection.
    WebSocketSent(Result<()>),
    /// SSE session opened; events follow on the stream.
    SseOpened(SseEvents),
}

// ============================================================================
// Types
// ============================================================================

/// Internal shared state for the client.
struct ClientInner {
    /// Options the client was built with.
    options: ClientOptions,

    /// Client without a total timeout, for long-lived streams.
    stream_client: reqwest::Client,

    /// HTTP adapter.
    http: HttpAdapter,

    /// Primary WebSocket adapter.
    websocket: WebSocketAdapter,

    /// Primary SSE adapter.
    sse: SseAdapter,

    /// Mirror of the most recent transition of any adapter.
    state: ConnectionTracker,

    /// Outgoing request history.
    history: HistoryLog,

    /// Normalized responses of all adapters.
    responses: ResponseStream,
}

// ============================================================================
// ApiClient
// ============================================================================

/// Unified HTTP, WebSocket and SSE client.
///
/// Transport operations never return errors: HTTP failures become
/// [`ApiResponse`]s with status `0`, WebSocket failures become `error`
/// events and SSE failures end the event stream with an `Err` item.
#[derive(Clone)]
pub struct ApiClient {
    /// Shared inner state.
    inner: Arc<ClientInner>,
}

// ============================================================================
// ApiClient - Display
// ============================================================================

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("state", &self.connection_state())
            .field("websocket", &self.websocket_state())
            .field("sse", &self.sse_state())
            .field("history_len", &self.inner.history.len())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// ApiClient - Construction
// ============================================================================

impl ApiClient {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::new()
    }

    /// Creates a client with default options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`](crate::Error::Http) if the HTTP client
    /// cannot be initialized.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Creates a client from validated options.
    pub(crate) fn from_options(options: ClientOptions) -> Result<Self> {
        let redirects = if options.max_redirects == 0 {
            Policy::none()
        } else {
            Policy::limited(options.max_redirects)
        };

        let http_client = reqwest::Client::builder()
            .timeout(options.request_timeout)
            .connect_timeout(options.connect_timeout)
            .user_agent(options.user_agent.as_str())
            .redirect(redirects)
            .build()?;

        let stream_client = reqwest::Client::builder()
            .connect_timeout(options.connect_timeout)
            .user_agent(options.user_agent.as_str())
            .build()?;

        let state = ConnectionTracker::new();
        let responses = ResponseStream::new(options.response_buffer);
        let history = HistoryLog::new(options.history_capacity);

        let http = HttpAdapter::new(http_client, responses.clone());
        let websocket =
            WebSocketAdapter::new(state.child(), responses.clone(), options.connect_timeout);
        let sse = SseAdapter::new(stream_client.clone(), state.child(), responses.clone());

        info!(
            user_agent = %options.user_agent,
            history_capacity = options.history_capacity,
            "API client created"
        );

        Ok(Self {
            inner: Arc::new(ClientInner {
                options,
                stream_client,
                http,
                websocket,
                sse,
                state,
                history,
                responses,
            }),
        })
    }
}

// ============================================================================
// ApiClient - Adapters
// ============================================================================

impl ApiClient {
    /// Returns the options the client was built with.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &ClientOptions {
        &self.inner.options
    }

    /// Returns the HTTP adapter.
    #[inline]
    #[must_use]
    pub fn http(&self) -> &HttpAdapter {
        &self.inner.http
    }

    /// Returns the primary WebSocket adapter.
    #[inline]
    #[must_use]
    pub fn websocket(&self) -> &WebSocketAdapter {
        &self.inner.websocket
    }

    /// Returns the primary SSE adapter.
    #[inline]
    #[must_use]
    pub fn sse(&self) -> &SseAdapter {
        &self.inner.sse
    }

    /// Creates an additional WebSocket adapter.
    ///
    /// It has its own connection and state, publishes to this client's
    /// response stream and feeds the aggregate state.
    #[must_use]
    pub fn websocket_session(&self) -> WebSocketAdapter {
        WebSocketAdapter::new(
            self.inner.state.child(),
            self.inner.responses.clone(),
            self.inner.options.connect_timeout,
        )
    }

    /// Creates an additional SSE adapter.
    ///
    /// See [`websocket_session`](Self::websocket_session).
    #[must_use]
    pub fn sse_session(&self) -> SseAdapter {
        SseAdapter::new(
            self.inner.stream_client.clone(),
            self.inner.state.child(),
            self.inner.responses.clone(),
        )
    }
}

// ============================================================================
// ApiClient - Operations
// ============================================================================

impl ApiClient {
    /// Sends an HTTP request. Never fails; see [`HttpAdapter::send`].
    pub async fn send_http(&self, request: &ApiRequest) -> ApiResponse {
        self.inner.http.send(request).await
    }

    /// Opens the primary WebSocket connection.
    pub fn open_websocket(&self, url: &str) -> WebSocketEvents {
        self.inner.websocket.open(url)
    }

    /// Opens the primary WebSocket connection with handshake headers.
    pub fn open_websocket_with_headers(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
    ) -> WebSocketEvents {
        self.inner.websocket.open_with_headers(url, headers)
    }

    /// Sends a JSON message on the primary WebSocket connection.
    ///
    /// # Errors
    ///
    /// [`Error::NotConnected`](crate::Error::NotConnected) if the
    /// connection is not open.
    pub fn send_websocket_message<T: Serialize + ?Sized>(&self, message: &T) -> Result<()> {
        self.inner.websocket.send(message)
    }

    /// Closes the primary WebSocket connection. Idempotent.
    pub fn close_websocket(&self) {
        self.inner.websocket.close();
    }

    /// Opens the primary SSE session.
    pub fn open_sse(&self, url: &str) -> SseEvents {
        self.inner.sse.open(url)
    }

    /// Opens the primary SSE session with request headers.
    pub fn open_sse_with_headers(&self, url: &str, headers: &HashMap<String, String>) -> SseEvents {
        self.inner.sse.open_with_headers(url, headers)
    }

    /// Closes the primary SSE session. Idempotent.
    pub fn close_sse(&self) {
        self.inner.sse.close();
    }

    /// Closes both primary connections.
    pub fn close_all(&self) {
        self.close_websocket();
        self.close_sse();
    }

    /// Records `request` in history and routes it by protocol.
    ///
    /// - HTTP: sends it and returns the response.
    /// - WebSocket: sends `message` if set, otherwise opens `url` with
    ///   `headers`.
    /// - SSE: opens `url` with `headers`.
    pub async fn execute(&self, request: ApiRequest) -> Dispatch {
        debug!(request_id = %request.id, protocol = %request.protocol, "Dispatching request");
        self.record_request(request.clone());

        match request.protocol {
            ApiType::Http => Dispatch::Http(self.send_http(&request).await),
            ApiType::WebSocket => match &request.message {
                Some(message) => Dispatch::WebSocketSent(self.send_websocket_message(message)),
                None => Dispatch::WebSocketOpened(
                    self.open_websocket_with_headers(&request.url, &request.headers),
                ),
            },
            ApiType::Sse => {
                Dispatch::SseOpened(self.open_sse_with_headers(&request.url, &request.headers))
            }
        }
    }
}

// ============================================================================
// ApiClient - History
// ============================================================================

impl ApiClient {
    /// Prepends `request` to history, evicting beyond capacity.
    pub fn record_request(&self, request: ApiRequest) {
        self.inner.history.record(request);
    }

    /// Empties history.
    pub fn clear_history(&self) {
        self.inner.history.clear();
    }

    /// Returns a copy of the history, newest first.
    #[must_use]
    pub fn history(&self) -> Vec<ApiRequest> {
        self.inner.history.snapshot()
    }

    /// Returns the history capacity.
    #[inline]
    #[must_use]
    pub fn history_capacity(&self) -> usize {
        self.inner.history.capacity()
    }

    /// Streams the full history, starting with the current one.
    #[must_use]
    pub fn history_stream(&self) -> WatchStream<Vec<ApiRequest>> {
        self.inner.history.stream()
    }

    /// Subscribes to history as a latest-value receiver.
    #[must_use]
    pub fn subscribe_history(&self) -> watch::Receiver<Vec<ApiRequest>> {
        self.inner.history.subscribe()
    }
}

// ============================================================================
// ApiClient - State and Responses
// ============================================================================

impl ApiClient {
    /// Returns the state of the most recent transition of any adapter.
    #[inline]
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.inner.state.current()
    }

    /// Streams the aggregate state, starting with the current one.
    #[must_use]
    pub fn connection_state_stream(&self) -> WatchStream<ConnectionState> {
        self.inner.state.stream()
    }

    /// Subscribes to the aggregate state as a latest-value receiver.
    #[must_use]
    pub fn subscribe_connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Returns the primary WebSocket adapter's state.
    #[inline]
    #[must_use]
    pub fn websocket_state(&self) -> ConnectionState {
        self.inner.websocket.state()
    }

    /// Returns the primary SSE adapter's state.
    #[inline]
    #[must_use]
    pub fn sse_state(&self) -> ConnectionState {
        self.inner.sse.state()
    }

    /// Streams responses produced after this call.
    #[must_use]
    pub fn responses(&self) -> BoxStream<'static, ApiResponse> {
        self.inner.responses.stream()
    }

    /// Subscribes to responses as a broadcast receiver.
    #[must_use]
    pub fn subscribe_responses(&self) -> broadcast::Receiver<ApiResponse> {
        self.inner.responses.subscribe()
    }
}

// ============================================================================
// Tests
// ============================================================================
