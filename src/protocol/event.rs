//! Push event types delivered by the WebSocket and SSE adapters.
//!
//! # Event Types
//!
//! | Stream | Item | Kinds |
//! |--------|------|-------|
//! | WebSocket | [`WebSocketEvent`] | `open`, `message`, `close`, `error` |
//! | SSE | `Result<`[`SseEvent`]`>` | server `event:` name, default `message` |
//!
//! WebSocket failures are ordinary `error` events. SSE failures end the
//! stream with an `Err` item instead.

// ============================================================================
// Imports
// ============================================================================

use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

// ============================================================================
// WebSocketEventKind
// ============================================================================

/// Kind of a [`WebSocketEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebSocketEventKind {
    /// Handshake completed.
    Open,
    /// Inbound frame, parsed as JSON.
    Message,
    /// Connection closed.
    Close,
    /// Transport failure or unparseable frame.
    Error,
}

// ============================================================================
// WebSocketEvent
// ============================================================================

/// An event on a WebSocket session stream.
///
/// # Format
///
/// ```json
/// { "type": "message", "data": { "a": 1 }, "timestamp": ... }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebSocketEvent {
    /// Event kind.
    #[serde(rename = "type")]
    pub kind: WebSocketEventKind,

    /// Event data: parsed message, close details or error detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// Time the event was observed.
    pub timestamp: SystemTime,
}

impl WebSocketEvent {
    /// Creates an event of the given kind.
    #[inline]
    #[must_use]
    pub fn new(kind: WebSocketEventKind, data: Option<Value>) -> Self {
        Self {
            kind,
            data,
            timestamp: SystemTime::now(),
        }
    }

    /// Creates an `open` event.
    #[inline]
    #[must_use]
    pub fn open() -> Self {
        Self::new(WebSocketEventKind::Open, None)
    }

    /// Creates a `message` event.
    #[inline]
    #[must_use]
    pub fn message(data: Value) -> Self {
        Self::new(WebSocketEventKind::Message, Some(data))
    }

    /// Creates a `close` event, with the close code and reason when known.
    #[inline]
    #[must_use]
    pub fn close(code: Option<u16>, reason: Option<&str>) -> Self {
        let data = code.map(|code| json!({ "code": code, "reason": reason.unwrap_or_default() }));
        Self::new(WebSocketEventKind::Close, data)
    }

    /// Creates an `error` event carrying the error detail.
    #[inline]
    #[must_use]
    pub fn error(detail: impl Into<String>) -> Self {
        Self::new(WebSocketEventKind::Error, Some(Value::String(detail.into())))
    }

    /// Returns `true` if this is a `message` event.
    #[inline]
    #[must_use]
    pub fn is_message(&self) -> bool {
        self.kind == WebSocketEventKind::Message
    }
}

// ============================================================================
// SseEvent
// ============================================================================

/// An event received on an SSE session stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SseEvent {
    /// Event type from the `event:` field, `message` by default.
    #[serde(rename = "type")]
    pub event_type: String,

    /// Parsed `data:` payload.
    pub data: Value,

    /// Last event ID seen on the stream, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Time the event was observed.
    pub timestamp: SystemTime,
}

impl SseEvent {
    /// Creates an event.
    #[inline]
    #[must_use]
    pub fn new(event_type: impl Into<String>, data: Value, id: Option<String>) -> Self {
        Self {
            event_type: event_type.into(),
            data,
            id,
            timestamp: SystemTime::now(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
