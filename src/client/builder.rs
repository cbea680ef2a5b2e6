//! Builder pattern for client configuration.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use api_probe::ApiClient;
//!
//! # fn example() -> api_probe::Result<()> {
//! let client = ApiClient::builder()
//!     .request_timeout(Duration::from_secs(5))
//!     .user_agent("my-probe/1.0")
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::error::{Error, Result};

use super::core::ApiClient;
use super::options::ClientOptions;

// ============================================================================
// ApiClientBuilder
// ============================================================================

/// Builder for configuring an [`ApiClient`].
///
/// Use [`ApiClient::builder()`] to create a new builder.
#[derive(Debug, Default, Clone)]
pub struct ApiClientBuilder {
    /// Options collected so far.
    options: ClientOptions,
}

// ============================================================================
// ApiClientBuilder Implementation
// ============================================================================

impl ApiClientBuilder {
    /// Creates a builder with default options.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces all options at once.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the total timeout of HTTP requests.
    #[inline]
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.options.request_timeout = timeout;
        self
    }

    /// Sets the connect and handshake timeout.
    #[inline]
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.options.connect_timeout = timeout;
        self
    }

    /// Sets the `User-Agent` header.
    #[inline]
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.options.user_agent = user_agent.into();
        self
    }

    /// Sets how many requests the history keeps.
    #[inline]
    #[must_use]
    pub fn history_capacity(mut self, capacity: usize) -> Self {
        self.options.history_capacity = capacity;
        self
    }

    /// Sets how many responses a slow subscriber may fall behind.
    #[inline]
    #[must_use]
    pub fn response_buffer(mut self, buffer: usize) -> Self {
        self.options.response_buffer = buffer;
        self
    }

    /// Sets the redirect limit for HTTP requests.
    #[inline]
    #[must_use]
    pub fn max_redirects(mut self, max: usize) -> Self {
        self.options.max_redirects = max;
        self
    }

    /// Builds the client with validation.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if an option is out of range
    /// - [`Error::Http`] if the HTTP client cannot be initialized
    pub fn build(self) -> Result<ApiClient> {
        self.options.validate().map_err(|message| {
            Error::config(format!(
                "{message}\n\
                 Example: ApiClient::builder().history_capacity(100)"
            ))
        })?;

        ApiClient::from_options(self.options)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_uses_default_options() {
        let builder = ApiClientBuilder::new();
        assert_eq!(builder.options, ClientOptions::default());
    }

    #[test]
    fn test_setters_update_options() {
        let builder = ApiClientBuilder::new()
            .request_timeout(Duration::from_secs(3))
            .connect_timeout(Duration::from_secs(1))
            .user_agent("probe")
            .history_capacity(7)
            .response_buffer(16)
            .max_redirects(2);

        assert_eq!(builder.options.request_timeout, Duration::from_secs(3));
        assert_eq!(builder.options.connect_timeout, Duration::from_secs(1));
        assert_eq!(builder.options.user_agent, "probe");
        assert_eq!(builder.options.history_capacity, 7);
        assert_eq!(builder.options.response_buffer, 16);
        assert_eq!(builder.options.max_redirects, 2);
    }

    #[test]
    fn test_options_replaces_everything() {
        let options = ClientOptions::new().with_history_capacity(3);
        let builder = ApiClientBuilder::new().history_capacity(9).options(options.clone());
        assert_eq!(builder.options, options);
    }

    #[test]
    fn test_build_fails_with_zero_history() {
        let err = ApiClientBuilder::new().history_capacity(0).build().unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
        assert!(err.to_string().contains("History"));
    }

    #[test]
    fn test_build_fails_with_zero_buffer() {
        let err = ApiClientBuilder::new().response_buffer(0).build().unwrap_err();
        assert!(err.is_usage_error());
    }

    #[test]
    fn test_build_succeeds_with_defaults() {
        let client = ApiClientBuilder::new().history_capacity(5).build().unwrap();
        assert_eq!(client.options().history_capacity, 5);
        assert_eq!(client.history_capacity(), 5);
    }
}
