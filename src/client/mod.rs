//! Client entry point.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ApiClient`] | Unified HTTP, WebSocket and SSE client |
//! | [`ApiClientBuilder`] | Fluent configuration builder |
//! | [`ClientOptions`] | Timeouts, capacities and user agent |
//! | [`Dispatch`] | Result of routing a request by protocol |
//!
//! # Example
//!
//! ```no_run
//! use api_probe::{ApiClient, ApiRequest, Dispatch};
//!
//! # async fn example() -> api_probe::Result<()> {
//! let client = ApiClient::builder().history_capacity(50).build()?;
//!
//! if let Dispatch::SseOpened(events) = client.execute(ApiRequest::sse("http://localhost:8080/sse")).await {
//!     // consume `events`
//! #   drop(events);
//! }
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder for client configuration.
pub mod builder;

/// Core client implementation.
pub mod core;

/// Client options.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::ApiClientBuilder;
pub use core::{ApiClient, Dispatch};
pub use options::ClientOptions;
