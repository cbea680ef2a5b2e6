//! WebSocket session and event loop.
//!
//! # State Machine
//!
//! ```text
//! DISCONNECTED ──open()──► CONNECTING ──handshake──► CONNECTED
//!                               │                        │
//!                               └────── error ──► ERROR ◄┘
//! any state ──close()──► DISCONNECTED
//! ```
//!
//! # Event Loop
//!
//! `open()` spawns a tokio task that:
//!
//! - Performs the handshake (bounded by the connect timeout)
//! - Parses each inbound frame as JSON and emits `message` events
//! - Forwards outgoing messages queued by `send()`
//! - Emits `close` when either side closes, `error` on transport failure
//!
//! # Policies
//!
//! - Opening while a connection exists closes the prior connection first
//!   (its stream receives `close`), then replaces it.
//! - A frame that is not JSON text becomes an `error` event; the stream
//!   and the connection continue.
//! - `send()` while not connected is refused with
//!   [`Error::NotConnected`] and logged; nothing is queued.
//! - A transport error is emitted as an `error` event followed by a
//!   `close` event; the state stays `ERROR` until the next `open()` or
//!   `close()`. There is no reconnect.

// ============================================================================
// Imports
// ============================================================================

use std::collections::HashMap;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request as HandshakeRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tracing::{debug, error, info, trace, warn};

use crate::error::{Error, Result};
use crate::protocol::payload::{error_detail, parse_json_text};
use crate::protocol::{ApiResponse, ApiType, WebSocketEvent};
use crate::streams::{ConnectionState, ConnectionTracker, ResponseStream};

use super::session::{SessionLink, SessionSlot};
use super::validate_url;

// ============================================================================
// Types
// ============================================================================

/// Event stream of one WebSocket connection.
///
/// Always ends with exactly one `close` event; a transport failure
/// delivers `error` first. Dropping it unsubscribes without closing.
pub type WebSocketEvents = UnboundedReceiverStream<WebSocketEvent>;

/// Commands for the event loop.
enum SessionCommand {
    /// Send a text frame.
    Send(String),
    /// Close the connection.
    Close,
}

/// Handle to a running connection task.
struct SessionHandle {
    /// Channel to the event loop.
    command_tx: mpsc::UnboundedSender<SessionCommand>,
}

// ============================================================================
// WebSocketAdapter
// ============================================================================

/// Owns zero or one WebSocket connection.
///
/// # Example
///
/// ```no_run
/// use api_probe::ApiClient;
/// use futures_util::StreamExt;
/// use serde_json::json;
///
/// # async fn example() -> api_probe::Result<()> {
/// let client = ApiClient::new()?;
/// let mut events = client.websocket().open("ws://localhost:8080/ws");
///
/// while let Some(event) = events.next().await {
///     if event.kind == api_probe::WebSocketEventKind::Open {
///         client.websocket().send(&json!({ "a": 1 }))?;
///     }
///     println!("{event:?}");
/// }
/// # Ok(())
/// # }
/// ```
pub struct WebSocketAdapter {
    /// State of this adapter's connection.
    tracker: ConnectionTracker,
    /// Shared response channel.
    responses: ResponseStream,
    /// Handshake timeout.
    connect_timeout: Duration,
    /// The owned connection.
    slot: SessionSlot<SessionHandle>,
}

impl WebSocketAdapter {
    /// Creates a disconnected adapter.
    #[must_use]
    pub fn new(
        tracker: ConnectionTracker,
        responses: ResponseStream,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            tracker,
            responses,
            connect_timeout,
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

    /// Returns `true` if a connection handle is held, in any state.
    #[inline]
    #[must_use]
    pub fn has_connection(&self) -> bool {
        self.slot.is_occupied()
    }

    /// Opens a connection and returns its event stream.
    ///
    /// See [`open_with_headers`](Self::open_with_headers).
    pub fn open(&self, url: &str) -> WebSocketEvents {
        self.open_with_headers(url, &HashMap::new())
    }

    /// Opens a connection with extra handshake headers.
    ///
    /// The state moves to `CONNECTING` before this returns. Failures,
    /// including an invalid URL, arrive as an `error` event and the
    /// `ERROR` state. Any prior connection is closed first.
    ///
    /// Must be called within a tokio runtime.
    pub fn open_with_headers(&self, url: &str, headers: &HashMap<String, String>) -> WebSocketEvents {
        if self.slot.is_occupied() {
            debug!(url, "Replacing existing WebSocket connection");
            self.close();
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let (guard, previous) = self.slot.install(SessionHandle { command_tx }, &self.tracker);
        if let Some(previous) = previous {
            let _ = previous.command_tx.send(SessionCommand::Close);
        }
        guard.transition(ConnectionState::Connecting);

        let link = SessionLink::new(guard, events_tx, self.responses.clone());

        debug!(url, "Opening WebSocket");

        tokio::spawn(run_session(
            url.to_string(),
            headers.clone(),
            self.connect_timeout,
            command_rx,
            link,
        ));

        UnboundedReceiverStream::new(events_rx)
    }

    /// Serializes `message` to JSON text and sends it.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if the state is not `CONNECTED`
    /// - [`Error::Json`] if `message` cannot be serialized
    /// - [`Error::ConnectionClosed`] if the event loop already stopped
    pub fn send<T: Serialize + ?Sized>(&self, message: &T) -> Result<()> {
        if !self.state().is_connected() {
            warn!(state = %self.state(), "WebSocket send ignored: not connected");
            return Err(Error::not_connected(ApiType::WebSocket));
        }

        let text = serde_json::to_string(message)?;

        self.slot.with(|handle| {
            let handle = handle.ok_or_else(|| Error::not_connected(ApiType::WebSocket))?;
            handle
                .command_tx
                .send(SessionCommand::Send(text))
                .map_err(|_| Error::ConnectionClosed)
        })
    }

    /// Closes the connection and releases it.
    ///
    /// The state becomes `DISCONNECTED` immediately and the stream gets
    /// one `close` event. Idempotent: without a connection this does
    /// nothing.
    pub fn close(&self) {
        let Some(handle) = self.slot.retire() else {
            trace!("WebSocket close ignored: no connection");
            return;
        };

        let _ = handle.command_tx.send(SessionCommand::Close);
        self.tracker.set(ConnectionState::Disconnected);
        debug!("WebSocket closed by caller");
    }
}

// ============================================================================
// Event Loop
// ============================================================================

/// Runs one connection from handshake to close.
async fn run_session(
    url: String,
    headers: HashMap<String, String>,
    connect_timeout: Duration,
    mut command_rx: mpsc::UnboundedReceiver<SessionCommand>,
    link: SessionLink<WebSocketEvent>,
) {
    let request = match handshake_request(&url, &headers) {
        Ok(request) => request,
        Err(e) => {
            fail(&link, &e);
            return;
        }
    };

    let connect = timeout(connect_timeout, connect_async(request));
    tokio::pin!(connect);

    let ws_stream = loop {
        tokio::select! {
            result = &mut connect => match result {
                Ok(Ok((stream, _))) => break stream,
                Ok(Err(e)) => {
                    fail(&link, &Error::from(e));
                    return;
                }
                Err(_) => {
                    let ms = u64::try_from(connect_timeout.as_millis()).unwrap_or(u64::MAX);
                    fail(&link, &Error::timeout("WebSocket handshake", ms));
                    return;
                }
            },

            command = command_rx.recv() => match command {
                Some(SessionCommand::Send(_)) => {
                    warn!("Dropping message queued before handshake");
                }
                Some(SessionCommand::Close) | None => {
                    debug!(url = %url, "WebSocket closed during handshake");
                    link.emit(WebSocketEvent::close(None, None));
                    return;
                }
            },
        }
    };

    link.transition(ConnectionState::Connected);
    link.emit(WebSocketEvent::open());
    info!(url = %url, "WebSocket connected");

    let (mut ws_write, mut ws_read) = ws_stream.split();

    loop {
        tokio::select! {
            // Incoming frames from the endpoint
            message = ws_read.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        handle_inbound(&link, text.as_str());
                    }

                    Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                        Ok(text) => handle_inbound(&link, text),
                        Err(e) => reject_frame(
                            &link,
                            &Error::malformed_payload(e.to_string(), String::from_utf8_lossy(&bytes)),
                        ),
                    },

                    Some(Ok(Message::Close(frame))) => {
                        debug!(?frame, "WebSocket closed by remote");
                        link.transition(ConnectionState::Disconnected);
                        link.emit(close_event(frame.as_ref()));
                        break;
                    }

                    Some(Err(e)) => {
                        error!(error = %e, "WebSocket error");
                        fail(&link, &Error::from(e));
                        break;
                    }

                    None => {
                        debug!("WebSocket stream ended");
                        link.transition(ConnectionState::Disconnected);
                        link.emit(WebSocketEvent::close(None, None));
                        break;
                    }

                    // Ping, Pong and raw frames are handled by the library
                    _ => {}
                }
            }

            // Commands from the adapter
            command = command_rx.recv() => {
                match command {
                    Some(SessionCommand::Send(text)) => {
                        trace!(len = text.len(), "Sending WebSocket frame");
                        if let Err(e) = ws_write.send(Message::Text(text.into())).await {
                            warn!(error = %e, "Failed to send WebSocket frame");
                            fail(&link, &Error::from(e));
                            break;
                        }
                    }

                    Some(SessionCommand::Close) | None => {
                        debug!("Close command received");
                        let _ = ws_write.close().await;
                        link.emit(WebSocketEvent::close(None, None));
                        break;
                    }
                }
            }
        }
    }

    debug!(url = %url, "WebSocket event loop terminated");
}

/// Builds the upgrade request with caller headers attached.
fn handshake_request(url: &str, headers: &HashMap<String, String>) -> Result<HandshakeRequest> {
    let url = validate_url(url, ApiType::WebSocket)?;
    let mut request = url.as_str().into_client_request()?;

    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::invalid_header(name, e.to_string()))?;
        let header_value =
            HeaderValue::from_str(value).map_err(|e| Error::invalid_header(name, e.to_string()))?;
        request.headers_mut().insert(header_name, header_value);
    }

    Ok(request)
}

/// Emits a parsed inbound message, or an `error` event if it is not JSON.
fn handle_inbound(link: &SessionLink<WebSocketEvent>, text: &str) {
    trace!(len = text.len(), "WebSocket frame received");

    match parse_json_text(text) {
        Ok(data) => {
            link.publish(ApiResponse::live(ApiType::WebSocket, data.clone()));
            link.emit(WebSocketEvent::message(data));
        }
        Err(e) => reject_frame(link, &e),
    }
}

/// Reports an unusable frame without touching the connection.
fn reject_frame(link: &SessionLink<WebSocketEvent>, err: &Error) {
    let detail = error_detail(err);
    warn!(error = %detail, "Unparseable WebSocket frame");
    link.publish(ApiResponse::live_error(ApiType::WebSocket, detail.clone()));
    link.emit(WebSocketEvent::error(detail));
}

/// Reports a fatal transport failure: `ERROR` state, then `error` and
/// `close` events.
fn fail(link: &SessionLink<WebSocketEvent>, err: &Error) {
    let detail = error_detail(err);
    warn!(error = %detail, "WebSocket connection failed");
    link.transition(ConnectionState::Error);
    link.publish(ApiResponse::live_error(ApiType::WebSocket, detail.clone()));
    link.emit(WebSocketEvent::error(detail));
    link.emit(WebSocketEvent::close(None, None));
}

/// Builds a `close` event from an optional close frame.
fn close_event(frame: Option<&CloseFrame>) -> WebSocketEvent {
    match frame {
        Some(frame) => WebSocketEvent::close(Some(u16::from(frame.code)), Some(frame.reason.as_str())),
        None => WebSocketEvent::close(None, None),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    use crate::protocol::WebSocketEventKind;

    const WAIT: Duration = Duration::from_secs(5);

    /// Accepts connections and echoes every text frame back.
    async fn spawn_echo_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let Ok(mut ws) = accept_async(stream).await else {
                        return;
                    };
                    while let Some(Ok(message)) = ws.next().await {
                        match message {
                            Message::Text(_) | Message::Binary(_) => {
                                if ws.send(message).await.is_err() {
                                    break;
                                }
                            }
                            Message::Close(_) => break,
                            _ => {}
                        }
                    }
                });
            }
        });

        format!("ws://127.0.0.1:{port}")
    }

    /// Sends `frames` to the first client, then closes with code 1000.
    async fn spawn_scripted_server(frames: Vec<Message>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            for frame in frames {
                ws.send(frame).await.unwrap();
            }
            let _ = ws
                .close(Some(CloseFrame {
                    code: 1000.into(),
                    reason: "done".into(),
                }))
                .await;
            while ws.next().await.is_some() {}
        });

        format!("ws://127.0.0.1:{port}")
    }

    fn adapter() -> WebSocketAdapter {
        WebSocketAdapter::new(
            ConnectionTracker::new(),
            ResponseStream::default(),
            Duration::from_secs(2),
        )
    }

    async fn next_event(events: &mut WebSocketEvents) -> WebSocketEvent {
        timeout(WAIT, events.next())
            .await
            .expect("event should arrive")
            .expect("stream should be open")
    }

    #[tokio::test]
    async fn test_echo_round_trip() {
        let url = spawn_echo_server().await;
        let ws = adapter();

        let mut events = ws.open(&url);
        assert_eq!(ws.state(), ConnectionState::Connecting);

        assert_eq!(next_event(&mut events).await.kind, WebSocketEventKind::Open);
        assert_eq!(ws.state(), ConnectionState::Connected);

        ws.send(&json!({"a": 1})).unwrap();

        let event = next_event(&mut events).await;
        assert_eq!(event.kind, WebSocketEventKind::Message);
        assert_eq!(event.data, Some(json!({"a": 1})));
        assert!(
            timeout(Duration::from_millis(200), events.next())
                .await
                .is_err(),
            "one send should produce one message"
        );

        ws.close();
        assert_eq!(ws.state(), ConnectionState::Disconnected);
        assert_eq!(next_event(&mut events).await.kind, WebSocketEventKind::Close);
        assert!(timeout(WAIT, events.next()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_messages_published_as_live_responses() {
        let url = spawn_echo_server().await;
        let responses = ResponseStream::default();
        let mut published = responses.stream();
        let ws = WebSocketAdapter::new(ConnectionTracker::new(), responses, WAIT);

        let mut events = ws.open(&url);
        next_event(&mut events).await;
        ws.send("hello").unwrap();
        next_event(&mut events).await;

        let response = timeout(WAIT, published.next()).await.unwrap().unwrap();
        assert!(response.is_live);
        assert!(response.request_id.is_live());
        assert_eq!(response.protocol, ApiType::WebSocket);
        assert_eq!(response.data, json!("hello"));
    }

    #[tokio::test]
    async fn test_close_never_opened_is_noop() {
        let ws = adapter();
        ws.close();
        ws.close();
        assert_eq!(ws.state(), ConnectionState::Disconnected);
        assert!(!ws.has_connection());
    }

    #[tokio::test]
    async fn test_double_close_emits_single_close_event() {
        let url = spawn_echo_server().await;
        let ws = adapter();

        let mut events = ws.open(&url);
        next_event(&mut events).await;

        ws.close();
        ws.close();
        assert_eq!(ws.state(), ConnectionState::Disconnected);

        let mut kinds = Vec::new();
        while let Ok(Some(event)) = timeout(WAIT, events.next()).await {
            kinds.push(event.kind);
        }
        assert_eq!(kinds, vec![WebSocketEventKind::Close]);
    }

    #[tokio::test]
    async fn test_send_when_disconnected_is_refused() {
        let ws = adapter();
        let err = ws.send(&json!({"a": 1})).unwrap_err();
        assert!(matches!(err, Error::NotConnected { protocol: ApiType::WebSocket }));
        assert_eq!(ws.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_non_json_frame_becomes_error_event() {
        let url = spawn_scripted_server(vec![
            Message::Text("Echo: hi".into()),
            Message::Text(r#"{"ok":true}"#.into()),
        ])
        .await;
        let ws = adapter();

        let mut events = ws.open(&url);
        assert_eq!(next_event(&mut events).await.kind, WebSocketEventKind::Open);

        let error = next_event(&mut events).await;
        assert_eq!(error.kind, WebSocketEventKind::Error);

        let message = next_event(&mut events).await;
        assert_eq!(message.data, Some(json!({"ok": true})));

        let close = next_event(&mut events).await;
        assert_eq!(close.kind, WebSocketEventKind::Close);
        assert_eq!(close.data, Some(json!({"code": 1000, "reason": "done"})));
        assert_eq!(ws.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_refused_connection_reports_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let ws = adapter();
        let mut events = ws.open(&format!("ws://127.0.0.1:{port}"));

        let event = next_event(&mut events).await;
        assert_eq!(event.kind, WebSocketEventKind::Error);
        assert_eq!(next_event(&mut events).await.kind, WebSocketEventKind::Close);
        assert_eq!(ws.state(), ConnectionState::Error);
        assert!(ws.send(&json!(1)).is_err());

        ws.close();
        assert_eq!(ws.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_transport_error_followed_by_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let ws = accept_async(stream).await.unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
            // Hang up without a closing handshake.
            drop(ws);
        });

        let ws = adapter();
        let mut events = ws.open(&format!("ws://127.0.0.1:{port}"));

        let mut kinds = Vec::new();
        while let Ok(Some(event)) = timeout(WAIT, events.next()).await {
            kinds.push(event.kind);
        }

        assert_eq!(
            kinds,
            vec![
                WebSocketEventKind::Open,
                WebSocketEventKind::Error,
                WebSocketEventKind::Close,
            ]
        );
        assert_eq!(ws.state(), ConnectionState::Error);
    }

    #[tokio::test]
    async fn test_invalid_url_reports_error() {
        let ws = adapter();
        let mut events = ws.open("http://127.0.0.1/not-a-socket");

        let event = next_event(&mut events).await;
        assert_eq!(event.kind, WebSocketEventKind::Error);
        assert_eq!(ws.state(), ConnectionState::Error);
    }

    #[tokio::test]
    async fn test_reopen_closes_prior_connection() {
        let url = spawn_echo_server().await;
        let ws = adapter();

        let mut first = ws.open(&url);
        next_event(&mut first).await;

        let mut second = ws.open(&url);
        assert_eq!(next_event(&mut first).await.kind, WebSocketEventKind::Close);
        assert_eq!(next_event(&mut second).await.kind, WebSocketEventKind::Open);
        assert_eq!(ws.state(), ConnectionState::Connected);

        ws.send(&json!({"n": 2})).unwrap();
        assert_eq!(next_event(&mut second).await.data, Some(json!({"n": 2})));
    }

    #[test]
    fn test_handshake_request_rejects_bad_header() {
        let headers = HashMap::from([("bad header".to_string(), "x".to_string())]);
        let err = handshake_request("ws://localhost", &headers).unwrap_err();
        assert!(matches!(err, Error::InvalidHeader { .. }));
    }

    #[test]
    fn test_handshake_request_attaches_headers() {
        let headers = HashMap::from([("X-Token".to_string(), "abc".to_string())]);
        let request = handshake_request("ws://localhost/ws", &headers).unwrap();
        assert_eq!(request.headers()["x-token"], "abc");
    }
}
