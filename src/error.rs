//! Error types for the API probe.
//!
//! Transport failures never surface as [`Error`] from the send/open
//! operations: they are normalized into [`ApiResponse`](crate::ApiResponse)
//! values or stream events. [`Error`] is returned by configuration,
//! caller misuse, and carried as the terminal item of an SSE stream.
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::InvalidUrl`], [`Error::UnsupportedScheme`], [`Error::InvalidHeader`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionClosed`], [`Error::NotConnected`], [`Error::StreamEnded`] |
//! | Protocol | [`Error::HttpStatus`], [`Error::MalformedPayload`] |
//! | Execution | [`Error::Timeout`] |
//! | External | [`Error::Json`], [`Error::WebSocket`], [`Error::Http`], [`Error::Url`] |

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::protocol::ApiType;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when client options are invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Target URL could not be parsed.
    #[error("Invalid URL '{url}': {message}")]
    InvalidUrl {
        /// The URL as supplied by the caller.
        url: String,
        /// Parser detail.
        message: String,
    },

    /// URL scheme does not match the protocol.
    #[error("Unsupported scheme '{scheme}' for {protocol}")]
    UnsupportedScheme {
        /// Scheme found in the URL.
        scheme: String,
        /// Protocol the URL was used with.
        protocol: ApiType,
    },

    /// Caller-supplied header cannot be put on the wire.
    #[error("Invalid header '{name}': {message}")]
    InvalidHeader {
        /// Header name as supplied.
        name: String,
        /// Detail.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Connection could not be established or broke.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Connection closed while an operation was in progress.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Operation requires an open connection.
    ///
    /// Returned by WebSocket `send` when no connection is open.
    #[error("{protocol} session is not connected")]
    NotConnected {
        /// Protocol of the session.
        protocol: ApiType,
    },

    /// Event stream was ended by the server.
    #[error("Event stream ended by server")]
    StreamEnded,

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Server answered with a non-success status where one was required.
    #[error("Unexpected HTTP status {status}")]
    HttpStatus {
        /// Status code received.
        status: u16,
    },

    /// Inbound payload was not valid JSON text.
    #[error("Malformed payload: {message}")]
    MalformedPayload {
        /// Decoder detail.
        message: String,
        /// The raw payload text.
        raw: String,
    },

    // ========================================================================
    // Execution Errors
    // ========================================================================
    /// Operation timeout.
    #[error("Timeout after {timeout_ms}ms: {operation}")]
    Timeout {
        /// Description of the operation that timed out.
        operation: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parse error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid URL error.
    #[inline]
    pub fn invalid_url(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates an unsupported scheme error.
    #[inline]
    pub fn unsupported_scheme(scheme: impl Into<String>, protocol: ApiType) -> Self {
        Self::UnsupportedScheme {
            scheme: scheme.into(),
            protocol,
        }
    }

    /// Creates an invalid header error.
    #[inline]
    pub fn invalid_header(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidHeader {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a not connected error.
    #[inline]
    pub fn not_connected(protocol: ApiType) -> Self {
        Self::NotConnected { protocol }
    }

    /// Creates a malformed payload error.
    #[inline]
    pub fn malformed_payload(message: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::MalformedPayload {
            message: message.into(),
            raw: raw.into(),
        }
    }

    /// Creates a timeout error.
    #[inline]
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Http(e) => e.is_timeout(),
            _ => false,
        }
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        match self {
            Self::Connection { .. }
            | Self::ConnectionClosed
            | Self::NotConnected { .. }
            | Self::StreamEnded
            | Self::WebSocket(_) => true,
            Self::Http(e) => e.is_connect(),
            _ => false,
        }
    }

    /// Returns `true` if the caller supplied something unusable.
    #[inline]
    #[must_use]
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::Config { .. }
                | Self::InvalidUrl { .. }
                | Self::UnsupportedScheme { .. }
                | Self::InvalidHeader { .. }
                | Self::NotConnected { .. }
                | Self::Url(_)
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
