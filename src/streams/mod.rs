//! Observable state and logs consumed by the presentation layer.
//!
//! # Channels
//!
//! | Type | Kind | New subscriber receives |
//! |------|------|-------------------------|
//! | [`ConnectionTracker`] | latest value | current state |
//! | [`HistoryLog`] | latest value | full bounded log |
//! | [`ResponseStream`] | fan-out | only later responses |
//!
//! [`ResponseLog`] is not a channel; it is the bounded list a consumer
//! builds from a [`ResponseStream`] subscription.

// ============================================================================
// Submodules
// ============================================================================

/// Bounded request history.
pub mod history;

/// Response broadcast and response log.
pub mod responses;

/// Connection state tracking.
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use history::{DEFAULT_HISTORY_CAPACITY, HistoryLog};
pub use responses::{
    DEFAULT_RESPONSE_BUFFER, DEFAULT_RESPONSE_LOG_CAPACITY, ResponseLog, ResponseStream,
};
pub use state::{ConnectionState, ConnectionTracker};
