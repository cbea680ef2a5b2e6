//! Protocol adapters.
//!
//! Each adapter wraps one protocol and converts everything it observes
//! into [`ApiResponse`](crate::ApiResponse) values, stream events and
//! connection state transitions. No transport error escapes an adapter
//! operation.
//!
//! # Architecture
//!
//! ```text
//!  caller ──► HttpAdapter ──────── one-shot ─────────► endpoint
//!         ──► WebSocketAdapter ─► SessionSlot ─► task ◄──► endpoint
//!         ──► SseAdapter ───────► SessionSlot ─► task ◄─── endpoint
//!                                                 │
//!                  events / ConnectionTracker / ResponseStream
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `http` | One-shot HTTP requests |
//! | `websocket` | WebSocket session and event loop |
//! | `sse` | Server-Sent Events session |
//! | `session` | Owned connection handle and generation guard |

// ============================================================================
// Imports
// ============================================================================

use url::Url;

use crate::error::{Error, Result};
use crate::protocol::ApiType;

// ============================================================================
// Submodules
// ============================================================================

/// One-shot HTTP requests.
pub mod http;

/// Owned connection handle.
mod session;

/// Server-Sent Events session.
pub mod sse;

/// WebSocket session.
pub mod websocket;

// ============================================================================
// Re-exports
// ============================================================================

pub use http::HttpAdapter;
pub use sse::{SseAdapter, SseEvents};
pub use websocket::{WebSocketAdapter, WebSocketEvents};

// ============================================================================
// URL Validation
// ============================================================================

/// Parses `raw` and checks its scheme against `protocol`.
///
/// # Errors
///
/// - [`Error::InvalidUrl`] if the URL does not parse
/// - [`Error::UnsupportedScheme`] if the scheme does not fit the protocol
pub fn validate_url(raw: &str, protocol: ApiType) -> Result<Url> {
    let url = Url::parse(raw.trim()).map_err(|e| Error::invalid_url(raw, e.to_string()))?;

    if !protocol.schemes().contains(&url.scheme()) {
        return Err(Error::unsupported_scheme(url.scheme(), protocol));
    }

    Ok(url)
}

// ============================================================================
// Tests
// ============================================================================
