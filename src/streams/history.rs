//! Bounded request history.
//!
//! The history is a newest-first list of [`ApiRequest`]s capped at a fixed
//! capacity (100 by default). Every mutation re-broadcasts the full list;
//! new subscribers receive the current list immediately.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::debug;

use crate::protocol::ApiRequest;

// ============================================================================
// Constants
// ============================================================================

/// Default number of requests kept.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

// ============================================================================
// HistoryLog
// ============================================================================

/// Newest-first, size-bounded log of outgoing requests.
///
/// Cloning yields another handle to the same log.
#[derive(Clone)]
pub struct HistoryLog {
    /// Latest-value channel holding the full log.
    sender: Arc<watch::Sender<Vec<ApiRequest>>>,
    /// Maximum number of entries.
    capacity: usize,
}

impl Default for HistoryLog {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl fmt::Debug for HistoryLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistoryLog")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl HistoryLog {
    /// Creates an empty log. A zero capacity is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = watch::channel(Vec::with_capacity(capacity));
        Self {
            sender: Arc::new(sender),
            capacity,
        }
    }

    /// Returns the maximum number of entries kept.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of entries.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.sender.borrow().len()
    }

    /// Returns `true` if the log is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sender.borrow().is_empty()
    }

    /// Prepends a request, evicting the oldest beyond capacity, and
    /// re-broadcasts the log.
    pub fn record(&self, request: ApiRequest) {
        let capacity = self.capacity;
        let id = request.id.clone();

        self.sender.send_modify(|log| {
            log.insert(0, request);
            log.truncate(capacity);
        });

        debug!(request_id = %id, len = self.len(), "Request recorded");
    }

    /// Empties the log and re-broadcasts it.
    pub fn clear(&self) {
        self.sender.send_replace(Vec::new());
        debug!("History cleared");
    }

    /// Returns a copy of the current log, newest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ApiRequest> {
        self.sender.borrow().clone()
    }

    /// Returns a receiver positioned at the current log.
    #[inline]
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Vec<ApiRequest>> {
        self.sender.subscribe()
    }

    /// Returns a stream yielding the current log, then the log after
    /// each mutation.
    ///
    /// Slow consumers observe only the latest log, not every step.
    #[inline]
    #[must_use]
    pub fn stream(&self) -> WatchStream<Vec<ApiRequest>> {
        WatchStream::new(self.subscribe())
    }
}

// ============================================================================
// Tests
// ============================================================================
