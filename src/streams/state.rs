//! Connection state tracking.
//!
//! A [`ConnectionTracker`] is a latest-value broadcast of
//! [`ConnectionState`]: every new subscriber first observes the current
//! state, then each transition. Only the adapter owning a tracker writes
//! to it.
//!
//! Trackers can be chained: a child created with
//! [`ConnectionTracker::child`] mirrors every transition into its parent,
//! which therefore always shows the most recent transition of any child.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::trace;

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle state of a WebSocket or SSE session.
///
/// ```text
/// DISCONNECTED ──open──► CONNECTING ──ack──► CONNECTED
///       ▲                    │                   │
///       │                    └──error──► ERROR ◄─┘
///       └───────────── close (from any state) ───┘
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConnectionState {
    /// No connection.
    #[default]
    Disconnected,
    /// `open()` called, waiting for the transport.
    Connecting,
    /// Transport acknowledged the connection.
    Connected,
    /// Transport failed. Does not recover without a new `open()`.
    Error,
}

impl ConnectionState {
    /// Returns the wire name.
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "DISCONNECTED",
            Self::Connecting => "CONNECTING",
            Self::Connected => "CONNECTED",
            Self::Error => "ERROR",
        }
    }

    /// Returns `true` if the session can carry traffic.
    #[inline]
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// ConnectionTracker
// ============================================================================

/// Shared, observable connection state.
///
/// Cloning yields another handle to the same state.
#[derive(Clone)]
pub struct ConnectionTracker {
    /// Latest-value channel holding the current state.
    sender: Arc<watch::Sender<ConnectionState>>,
    /// Parent tracker receiving every transition.
    parent: Option<Box<ConnectionTracker>>,
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConnectionTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionTracker")
            .field("state", &self.current())
            .field("mirrored", &self.parent.is_some())
            .finish()
    }
}

impl ConnectionTracker {
    /// Creates a tracker in [`ConnectionState::Disconnected`].
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            sender: Arc::new(sender),
            parent: None,
        }
    }

    /// Creates an independent tracker whose transitions are mirrored here.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            parent: Some(Box::new(self.clone())),
            ..Self::new()
        }
    }

    /// Returns the current state.
    #[inline]
    #[must_use]
    pub fn current(&self) -> ConnectionState {
        *self.sender.borrow()
    }

    /// Moves to `state`.
    ///
    /// Subscribers are only notified when the value changes. The parent,
    /// if any, is updated as well.
    ///
    /// Returns `true` if this tracker's state changed.
    pub fn set(&self, state: ConnectionState) -> bool {
        let changed = self.sender.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            trace!(from = %current, to = %state, "Connection state transition");
            *current = state;
            true
        });

        if let Some(parent) = &self.parent {
            parent.set(state);
        }

        changed
    }

    /// Returns a receiver positioned at the current state.
    #[inline]
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.sender.subscribe()
    }

    /// Returns a stream yielding the current state, then every change.
    #[inline]
    #[must_use]
    pub fn stream(&self) -> WatchStream<ConnectionState> {
        WatchStream::new(self.subscribe())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use futures_util::StreamExt;

    #[test]
    fn test_initial_state() {
        let tracker = ConnectionTracker::new();
        assert_eq!(tracker.current(), ConnectionState::Disconnected);
        assert!(!tracker.current().is_connected());
    }

    #[test]
    fn test_state_wire_names() {
        assert_eq!(serde_json::to_string(&ConnectionState::Connecting).unwrap(), "\"CONNECTING\"");
        assert_eq!(ConnectionState::Error.to_string(), "ERROR");
    }

    #[test]
    fn test_set_reports_change() {
        let tracker = ConnectionTracker::new();
        assert!(tracker.set(ConnectionState::Connecting));
        assert!(!tracker.set(ConnectionState::Connecting));
        assert_eq!(tracker.current(), ConnectionState::Connecting);
    }

    #[test]
    fn test_clones_share_state() {
        let tracker = ConnectionTracker::new();
        let clone = tracker.clone();
        clone.set(ConnectionState::Connected);
        assert_eq!(tracker.current(), ConnectionState::Connected);
    }

    #[test]
    fn test_child_mirrors_into_parent() {
        let aggregate = ConnectionTracker::new();
        let ws = aggregate.child();
        let sse = aggregate.child();

        ws.set(ConnectionState::Connected);
        assert_eq!(aggregate.current(), ConnectionState::Connected);
        assert_eq!(sse.current(), ConnectionState::Disconnected);

        sse.set(ConnectionState::Error);
        assert_eq!(aggregate.current(), ConnectionState::Error);
        assert_eq!(ws.current(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_late_subscriber_sees_latest_state() {
        let tracker = ConnectionTracker::new();
        tracker.set(ConnectionState::Connecting);
        tracker.set(ConnectionState::Connected);

        let mut stream = tracker.stream();
        assert_eq!(stream.next().await, Some(ConnectionState::Connected));

        tracker.set(ConnectionState::Disconnected);
        assert_eq!(stream.next().await, Some(ConnectionState::Disconnected));
    }

    #[tokio::test]
    async fn test_unchanged_set_does_not_notify() {
        let tracker = ConnectionTracker::new();
        let mut rx = tracker.subscribe();

        tracker.set(ConnectionState::Disconnected);
        assert!(!rx.has_changed().unwrap());

        tracker.set(ConnectionState::Connecting);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), ConnectionState::Connecting);
    }
}
