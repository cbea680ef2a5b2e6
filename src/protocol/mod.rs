//! Data model shared by the adapters and the client.
//!
//! # Overview
//!
//! | Type | Direction | Purpose |
//! |------|-----------|---------|
//! | [`ApiRequest`] | Caller → Endpoint | HTTP call, WS connect/message, SSE subscribe |
//! | [`ApiResponse`] | Endpoint → Caller | Normalized outcome of any protocol |
//! | [`WebSocketEvent`] | Endpoint → Caller | WebSocket session event |
//! | [`SseEvent`] | Endpoint → Caller | SSE session event |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `request` | Request model, protocol and method enums |
//! | `response` | Normalized response record |
//! | `event` | WebSocket and SSE event types |
//! | `payload` | JSON/text payload decoding |
//! | `sse` | `text/event-stream` wire parser |

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket and SSE event types.
pub mod event;

/// Payload decoding helpers.
pub mod payload;

/// Request model.
pub mod request;

/// Normalized response record.
pub mod response;

/// Server-Sent Events wire parser.
pub mod sse;

// ============================================================================
// Re-exports
// ============================================================================

pub use event::{SseEvent, WebSocketEvent, WebSocketEventKind};
pub use request::{ApiRequest, ApiType, HttpMethod};
pub use response::ApiResponse;
pub use sse::{SseFrame, SseParser};
