//! API Probe - unified HTTP, WebSocket and SSE client sessions.
//!
//! This library drives the three common ways of talking to a web API
//! through one client and reports everything it observes in a single
//! normalized shape.
//!
//! # Architecture
//!
//! The client is split into layers:
//!
//! - **Adapters**: one per protocol, each owning at most one connection
//! - **Normalizer**: every outcome becomes an [`ApiResponse`]
//! - **Streams**: connection state, request history and responses,
//!   each observable by any number of subscribers
//!
//! Key design principles:
//!
//! - Transport failures are data, not errors: HTTP failures are
//!   responses with status `0`, WebSocket failures are `error` events,
//!   SSE failures end the stream with an `Err` item
//! - Each connection runs in its own tokio task
//! - A closed or replaced connection can no longer change state
//!
//! # Quick Start
//!
//! ```no_run
//! use api_probe::{ApiClient, ApiRequest, HttpMethod, Result};
//! use futures_util::StreamExt;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = ApiClient::new()?;
//!
//!     // One-shot HTTP
//!     let request = ApiRequest::http(HttpMethod::Post, "http://localhost:8080/api/http/post")
//!         .with_body(json!({ "value": "hello" }));
//!     client.record_request(request.clone());
//!     let response = client.send_http(&request).await;
//!     println!("{:?} {}", response.status, response.data);
//!
//!     // WebSocket
//!     let mut events = client.open_websocket("ws://localhost:8080/ws");
//!     if let Some(event) = events.next().await {
//!         println!("{event:?}");
//!     }
//!     client.close_websocket();
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | [`ApiClient`] facade and configuration |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Request and response IDs |
//! | [`protocol`] | Requests, responses, events, SSE parser |
//! | [`streams`] | State tracker, history, response broadcast |
//! | [`transport`] | HTTP, WebSocket and SSE adapters |

// ============================================================================
// Modules
// ============================================================================

/// Client facade and configuration.
///
/// Use [`ApiClient::builder()`] to create a configured client.
pub mod client;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Identifiers for requests and responses.
pub mod identifiers;

/// Data model shared by all adapters.
pub mod protocol;

/// Observable channels.
pub mod streams;

/// Protocol adapters.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Client types
pub use client::{ApiClient, ApiClientBuilder, ClientOptions, Dispatch};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{RequestId, ResponseId};

// Protocol types
pub use protocol::{
    ApiRequest, ApiResponse, ApiType, HttpMethod, SseEvent, SseFrame, SseParser, WebSocketEvent,
    WebSocketEventKind,
};

// Stream types
pub use streams::{ConnectionState, ConnectionTracker, HistoryLog, ResponseLog, ResponseStream};

// Transport types
pub use transport::{HttpAdapter, SseAdapter, SseEvents, WebSocketAdapter, WebSocketEvents};
