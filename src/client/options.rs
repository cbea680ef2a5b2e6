//! Client configuration.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use api_probe::ClientOptions;
//!
//! let options = ClientOptions::new()
//!     .with_request_timeout(Duration::from_secs(5))
//!     .with_history_capacity(50);
//!
//! assert!(options.validate().is_ok());
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::streams::{DEFAULT_HISTORY_CAPACITY, DEFAULT_RESPONSE_BUFFER};

// ============================================================================
// Constants
// ============================================================================

/// Default total timeout of an HTTP request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for establishing a connection (all protocols).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default number of redirects followed by HTTP requests.
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

/// Default `User-Agent` header.
pub const DEFAULT_USER_AGENT: &str = concat!("api-probe/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// ClientOptions
// ============================================================================

/// Settings shared by all adapters of an [`ApiClient`](crate::ApiClient).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Total timeout of an HTTP request. Not applied to SSE sessions.
    pub request_timeout: Duration,

    /// Timeout for the TCP connect and the WebSocket handshake.
    pub connect_timeout: Duration,

    /// `User-Agent` sent with HTTP and SSE requests.
    pub user_agent: String,

    /// Number of requests kept in history.
    pub history_capacity: usize,

    /// Responses buffered per subscriber before it lags.
    pub response_buffer: usize,

    /// Redirects followed by HTTP requests; `0` disables following.
    pub max_redirects: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl ClientOptions {
    /// Creates options with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            response_buffer: DEFAULT_RESPONSE_BUFFER,
            max_redirects: DEFAULT_MAX_REDIRECTS,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ClientOptions {
    /// Sets the HTTP request timeout.
    #[inline]
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the connect timeout.
    #[inline]
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the `User-Agent` header.
    #[inline]
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Sets the history capacity.
    #[inline]
    #[must_use]
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    /// Sets the per-subscriber response buffer.
    #[inline]
    #[must_use]
    pub fn with_response_buffer(mut self, buffer: usize) -> Self {
        self.response_buffer = buffer;
        self
    }

    /// Sets the redirect limit.
    #[inline]
    #[must_use]
    pub fn with_max_redirects(mut self, max: usize) -> Self {
        self.max_redirects = max;
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ClientOptions {
    /// Validates the options.
    ///
    /// # Errors
    ///
    /// Returns an error message if a capacity or timeout is zero.
    pub fn validate(&self) -> Result<(), String> {
        if self.request_timeout.is_zero() || self.connect_timeout.is_zero() {
            return Err("Timeouts must be greater than zero".to_string());
        }

        if self.history_capacity == 0 {
            return Err("History capacity must be greater than zero".to_string());
        }

        if self.response_buffer == 0 {
            return Err("Response buffer must be greater than zero".to_string());
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
