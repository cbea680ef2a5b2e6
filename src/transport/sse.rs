//! Server-Sent Events session.
//!
//! `open()` spawns a task that issues a `GET` with
//! `Accept: text/event-stream`, moves to `CONNECTED` once a 2xx status
//! arrives and then feeds the body through [`SseParser`]. Each event's
//! data is parsed as JSON and delivered as `Ok(SseEvent)`.
//!
//! Event data that is not JSON is dropped from the stream; it is logged
//! and published as a live error response. Any transport failure, a
//! non-2xx status, a line longer than the parser's limit, or the server
//! ending the body is delivered as one `Err` item, after which the stream
//! ends and the state is `ERROR`.
//! There is no reconnect.

// ============================================================================
// Imports
// ============================================================================

use std::collections::HashMap;

use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL, HeaderMap, HeaderName, HeaderValue};
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::protocol::payload::{error_detail, parse_json_text};
use crate::protocol::{ApiResponse, ApiType, SseEvent, SseFrame, SseParser};
use crate::streams::{ConnectionState, ConnectionTracker, ResponseStream};

use super::session::{SessionLink, SessionSlot};
use super::validate_url;

// ============================================================================
// Types
// ============================================================================

/// Event stream of one SSE session.
///
/// Yields `Ok` events until the session fails, then a single `Err` and
/// ends. Closing the session ends it without an `Err`.
pub type SseEvents = UnboundedReceiverStream<Result<SseEvent>>;

/// Handle to a running session task.
struct SessionHandle {
    /// Stops the task.
    shutdown: oneshot::Sender<()>,
}

// ============================================================================
// SseAdapter
// ============================================================================

/// Owns zero or one SSE session.
pub struct SseAdapter {
    /// Client without an overall request timeout.
    client: reqwest::Client,
    /// State of this adapter's session.
    tracker: ConnectionTracker,
    /// Shared response channel.
    responses: ResponseStream,
    /// The owned session.
    slot: SessionSlot<SessionHandle>,
}

impl SseAdapter {
    /// Creates a disconnected adapter.
    ///
    /// `client` must not carry a total request timeout, or long-lived
    /// streams are cut off when it expires.
    #[must_use]
    pub fn new(client: reqwest::Client, tracker: ConnectionTracker, responses: ResponseStream) -> Self {
        Self {
            client,
            tracker,
            responses,
            slot: SessionSlot::default(),
        }
    }

    /// Returns the current connection state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.tracker.current()
    }

    /// Returns this adapter's state tracker.
    #[inline]
    #[must_use]
    pub fn tracker(&self) -> &ConnectionTracker {
        &self.tracker
    }

    /// Returns `true` if a session handle is held, in any state.
    #[inline]
    #[must_use]
    pub fn has_connection(&self) -> bool {
        self.slot.is_occupied()
    }

    /// Opens a session and returns its event stream.
    pub fn open(&self, url: &str) -> SseEvents {
        self.open_with_headers(url, &HashMap::new())
    }

    /// Opens a session with extra request headers.
    ///
    /// The state moves to `CONNECTING` before this returns. Any prior
    /// session is closed first.
    ///
    /// Must be called within a tokio runtime.
    pub fn open_with_headers(&self, url: &str, headers: &HashMap<String, String>) -> SseEvents {
        if self.slot.is_occupied() {
            debug!(url, "Replacing existing SSE session");
            self.close();
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let (guard, previous) = self.slot.install(SessionHandle { shutdown: shutdown_tx }, &self.tracker);
        if let Some(previous) = previous {
            let _ = previous.shutdown.send(());
        }
        guard.transition(ConnectionState::Connecting);

        let link = SessionLink::new(guard, events_tx, self.responses.clone());

        debug!(url, "Opening SSE session");

        tokio::spawn(run_session(
            self.client.clone(),
            url.to_string(),
            headers.clone(),
            shutdown_rx,
            link,
        ));

        UnboundedReceiverStream::new(events_rx)
    }

    /// Stops the session and releases it.
    ///
    /// The state becomes `DISCONNECTED` immediately and the stream ends.
    /// Idempotent: without a session this does nothing.
    pub fn close(&self) {
        let Some(handle) = self.slot.retire() else {
            trace!("SSE close ignored: no session");
            return;
        };

        let _ = handle.shutdown.send(());
        self.tracker.set(ConnectionState::Disconnected);
        debug!("SSE session closed by caller");
    }
}

// ============================================================================
// Session Task
// ============================================================================

/// Runs one session until it fails or is shut down.
async fn run_session(
    client: reqwest::Client,
    url: String,
    headers: HashMap<String, String>,
    shutdown: oneshot::Receiver<()>,
    link: SessionLink<Result<SseEvent>>,
) {
    tokio::select! {
        _ = shutdown => {
            debug!(url = %url, "SSE task stopped");
        }

        result = consume(&client, &url, &headers, &link) => {
            if let Err(e) = result {
                fail(&link, e);
            }
        }
    }
}

/// Connects and dispatches events until the body ends.
async fn consume(
    client: &reqwest::Client,
    url: &str,
    headers: &HashMap<String, String>,
    link: &SessionLink<Result<SseEvent>>,
) -> Result<()> {
    let target = validate_url(url, ApiType::Sse)?;
    let headers = request_headers(headers)?;

    let response = client.get(target).headers(headers).send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::HttpStatus {
            status: status.as_u16(),
        });
    }

    link.transition(ConnectionState::Connected);
    info!(url, "SSE connected");

    let mut parser = SseParser::new();
    let mut body = response.bytes_stream();

    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        for frame in parser.feed(&chunk)? {
            dispatch(link, frame);
        }
    }

    Err(Error::StreamEnded)
}

/// Builds the request headers: event-stream defaults, then caller headers.
fn request_headers(extra: &HashMap<String, String>) -> Result<HeaderMap> {
    let mut headers = HeaderMap::with_capacity(extra.len() + 2);
    headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));

    for (name, value) in extra {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::invalid_header(name, e.to_string()))?;
        let header_value =
            HeaderValue::from_str(value).map_err(|e| Error::invalid_header(name, e.to_string()))?;
        headers.insert(header_name, header_value);
    }

    Ok(headers)
}

/// Delivers one parsed frame.
fn dispatch(link: &SessionLink<Result<SseEvent>>, frame: SseFrame) {
    trace!(event = %frame.event, len = frame.data.len(), "SSE frame received");

    match parse_json_text(&frame.data) {
        Ok(data) => {
            link.publish(ApiResponse::live(ApiType::Sse, data.clone()));
            link.emit(Ok(SseEvent::new(frame.event, data, frame.id)));
        }
        Err(e) => {
            let detail = error_detail(&e);
            warn!(event = %frame.event, error = %detail, "Dropping non-JSON SSE data");
            link.publish(ApiResponse::live_error(ApiType::Sse, detail));
        }
    }
}

/// Ends the session with an error.
fn fail(link: &SessionLink<Result<SseEvent>>, err: Error) {
    let detail = error_detail(&err);
    warn!(error = %detail, "SSE session failed");
    link.transition(ConnectionState::Error);
    link.publish(ApiResponse::live_error(ApiType::Sse, detail));
    link.emit(Err(err));
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::convert::Infallible;
    use std::net::SocketAddr;
    use std::time::Duration;

    use axum::Router;
    use axum::http::{HeaderMap as AxumHeaders, StatusCode};
    use axum::response::sse::{Event, Sse};
    use axum::response::{IntoResponse, Response};
    use axum::routing::get;
    use futures_util::stream;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::time::timeout;

    use crate::protocol::sse::DEFAULT_MAX_LINE_LENGTH;

    const WAIT: Duration = Duration::from_secs(5);

    /// Three JSON events around one non-JSON event, then silence.
    fn scripted_events() -> Response {
        let events = vec![
            Event::default().data(r#"{"n":1}"#),
            Event::default().event("tick").id("7").data(r#"{"n":2}"#),
            Event::default().data("not json"),
            Event::default().data(r#"{"n":3}"#),
        ];
        let body = stream::iter(events.into_iter().map(Ok::<_, Infallible>)).chain(stream::pending());
        Sse::new(body).into_response()
    }

    /// Requires `x-token` and an event-stream `Accept` header.
    async fn guarded(headers: AxumHeaders) -> Response {
        let accepts = headers
            .get("accept")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("text/event-stream"));
        if !accepts || !headers.contains_key("x-token") {
            return StatusCode::UNAUTHORIZED.into_response();
        }
        scripted_events()
    }

    async fn spawn_server() -> SocketAddr {
        let app = Router::new()
            .route("/events", get(|| async { scripted_events() }))
            .route("/guarded", get(guarded));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    /// Answers one request with a single event, then hangs up.
    async fn spawn_short_lived_server() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\n\
                      Content-Type: text/event-stream\r\n\
                      Connection: close\r\n\r\n\
                      data: {\"a\":1}\n\n",
                )
                .await
                .unwrap();
            socket.shutdown().await.unwrap();
        });

        addr
    }

    fn adapter(responses: ResponseStream) -> SseAdapter {
        SseAdapter::new(reqwest::Client::new(), ConnectionTracker::new(), responses)
    }

    async fn next_item(events: &mut SseEvents) -> Option<Result<SseEvent>> {
        timeout(WAIT, events.next()).await.expect("item should arrive")
    }

    #[tokio::test]
    async fn test_receives_json_events_and_skips_others() {
        let addr = spawn_server().await;
        let sse = adapter(ResponseStream::default());

        let mut events = sse.open(&format!("http://{addr}/events"));
        assert_eq!(sse.state(), ConnectionState::Connecting);

        let first = next_item(&mut events).await.unwrap().unwrap();
        assert_eq!(first.event_type, "message");
        assert_eq!(first.data, json!({"n": 1}));
        assert_eq!(sse.state(), ConnectionState::Connected);

        let second = next_item(&mut events).await.unwrap().unwrap();
        assert_eq!(second.event_type, "tick");
        assert_eq!(second.id.as_deref(), Some("7"));

        let third = next_item(&mut events).await.unwrap().unwrap();
        assert_eq!(third.data, json!({"n": 3}));

        sse.close();
        assert_eq!(sse.state(), ConnectionState::Disconnected);
        assert!(next_item(&mut events).await.is_none());
    }

    #[tokio::test]
    async fn test_events_published_as_live_responses() {
        let addr = spawn_server().await;
        let responses = ResponseStream::default();
        let mut published = responses.stream();
        let sse = adapter(responses);

        let _events = sse.open(&format!("http://{addr}/events"));

        let mut live = Vec::new();
        for _ in 0..4 {
            live.push(timeout(WAIT, published.next()).await.unwrap().unwrap());
        }

        assert!(live.iter().all(|r| r.is_live && r.protocol == ApiType::Sse));
        assert_eq!(live[0].data, json!({"n": 1}));
        assert!(live[2].is_transport_failure());
        assert_eq!(live[3].data, json!({"n": 3}));
    }

    #[tokio::test]
    async fn test_caller_headers_are_sent() {
        let addr = spawn_server().await;
        let sse = adapter(ResponseStream::default());

        let headers = HashMap::from([("X-Token".to_string(), "secret".to_string())]);
        let mut events = sse.open_with_headers(&format!("http://{addr}/guarded"), &headers);

        assert!(next_item(&mut events).await.unwrap().is_ok());
        assert_eq!(sse.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_error_status_fails_session() {
        let addr = spawn_server().await;
        let sse = adapter(ResponseStream::default());

        let mut events = sse.open(&format!("http://{addr}/guarded"));

        let err = next_item(&mut events).await.unwrap().unwrap_err();
        assert!(matches!(err, Error::HttpStatus { status: 401 }));
        assert_eq!(sse.state(), ConnectionState::Error);
        assert!(next_item(&mut events).await.is_none());
    }

    #[tokio::test]
    async fn test_server_hangup_ends_with_error() {
        let addr = spawn_short_lived_server().await;
        let sse = adapter(ResponseStream::default());

        let mut events = sse.open(&format!("http://{addr}/"));

        let event = next_item(&mut events).await.unwrap().unwrap();
        assert_eq!(event.data, json!({"a": 1}));

        let err = next_item(&mut events).await.unwrap().unwrap_err();
        assert!(matches!(err, Error::StreamEnded));
        assert_eq!(sse.state(), ConnectionState::Error);
        assert!(next_item(&mut events).await.is_none());
    }

    #[tokio::test]
    async fn test_refused_connection_fails_session() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let sse = adapter(ResponseStream::default());
        let mut events = sse.open(&format!("http://{addr}/"));

        let err = next_item(&mut events).await.unwrap().unwrap_err();
        assert!(err.is_connection_error());
        assert_eq!(sse.state(), ConnectionState::Error);

        sse.close();
        assert_eq!(sse.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_unterminated_line_fails_session() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\n\
                      Content-Type: text/event-stream\r\n\r\n\
                      data: ",
                )
                .await
                .unwrap();
            let filler = vec![b'x'; DEFAULT_MAX_LINE_LENGTH + 64 * 1024];
            let _ = socket.write_all(&filler).await;
            // Keep the connection open; only the line limit may end it.
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let sse = adapter(ResponseStream::default());
        let mut events = sse.open(&format!("http://{addr}/"));

        let err = next_item(&mut events).await.unwrap().unwrap_err();
        assert!(matches!(err, Error::MalformedPayload { .. }));
        assert_eq!(sse.state(), ConnectionState::Error);
        assert!(next_item(&mut events).await.is_none());
    }

    #[tokio::test]
    async fn test_wrong_scheme_fails_session() {
        let sse = adapter(ResponseStream::default());
        let mut events = sse.open("ws://127.0.0.1/events");

        let err = next_item(&mut events).await.unwrap().unwrap_err();
        assert!(matches!(err, Error::UnsupportedScheme { protocol: ApiType::Sse, .. }));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let sse = adapter(ResponseStream::default());
        sse.close();
        assert_eq!(sse.state(), ConnectionState::Disconnected);

        let addr = spawn_server().await;
        let mut events = sse.open(&format!("http://{addr}/events"));
        next_item(&mut events).await;

        sse.close();
        sse.close();
        assert_eq!(sse.state(), ConnectionState::Disconnected);
        assert!(!sse.has_connection());
    }

    #[tokio::test]
    async fn test_reopen_ends_prior_stream() {
        let addr = spawn_server().await;
        let sse = adapter(ResponseStream::default());

        let mut first = sse.open(&format!("http://{addr}/events"));
        next_item(&mut first).await;

        let mut second = sse.open(&format!("http://{addr}/events"));
        while let Some(item) = next_item(&mut first).await {
            assert!(item.is_ok());
        }
        assert!(next_item(&mut second).await.unwrap().is_ok());
        assert_eq!(sse.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_request_headers_defaults_and_validation() {
        let headers = request_headers(&HashMap::new()).unwrap();
        assert_eq!(headers[ACCEPT], "text/event-stream");
        assert_eq!(headers[CACHE_CONTROL], "no-cache");

        let bad = HashMap::from([("x-ok".to_string(), "line\nbreak".to_string())]);
        assert!(matches!(
            request_headers(&bad).unwrap_err(),
            Error::InvalidHeader { .. }
        ));
    }
}
