//! Owned connection handle and per-connection context.
//!
//! An adapter owns at most one live connection through a [`SessionSlot`].
//! Each connection gets a generation number; the background task only
//! updates the adapter's [`ConnectionTracker`] while its generation is
//! current, so a connection that was closed or replaced can no longer
//! overwrite the state of its successor.
//!
//! The generation check and the state write happen under one lock, which
//! [`SessionSlot::retire`] also takes. Once `retire` returns, no task of
//! the retired generation can write state any more.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::protocol::ApiResponse;
use crate::streams::{ConnectionState, ConnectionTracker, ResponseStream};

// ============================================================================
// SessionSlot
// ============================================================================

/// Holder of zero or one live connection handle.
pub(crate) struct SessionSlot<H> {
    /// The live handle, if any.
    handle: Mutex<Option<H>>,
    /// Generation of the current connection.
    generation: Arc<Mutex<u64>>,
}

impl<H> Default for SessionSlot<H> {
    fn default() -> Self {
        Self {
            handle: Mutex::new(None),
            generation: Arc::new(Mutex::new(0)),
        }
    }
}

impl<H> SessionSlot<H> {
    /// Stores a new handle and starts a new generation.
    ///
    /// Any handle still present is returned so the caller can shut it
    /// down; adapters close before installing, so this is normally `None`.
    pub(crate) fn install(&self, handle: H, tracker: &ConnectionTracker) -> (SessionGuard, Option<H>) {
        let mut slot = self.handle.lock();
        let generation = {
            let mut current = self.generation.lock();
            *current += 1;
            *current
        };
        let previous = slot.replace(handle);

        let guard = SessionGuard {
            generation,
            current: Arc::clone(&self.generation),
            tracker: tracker.clone(),
        };

        (guard, previous)
    }

    /// Removes the handle and retires its generation.
    ///
    /// Returns `None` if no connection was held.
    pub(crate) fn retire(&self) -> Option<H> {
        let mut slot = self.handle.lock();
        let handle = slot.take()?;
        *self.generation.lock() += 1;
        Some(handle)
    }

    /// Runs `f` against the current handle.
    pub(crate) fn with<R>(&self, f: impl FnOnce(Option<&H>) -> R) -> R {
        f(self.handle.lock().as_ref())
    }

    /// Returns `true` if a handle is held.
    pub(crate) fn is_occupied(&self) -> bool {
        self.handle.lock().is_some()
    }
}

// ============================================================================
// SessionGuard
// ============================================================================

/// State writer for one connection generation.
#[derive(Clone)]
pub(crate) struct SessionGuard {
    /// Generation of this connection.
    generation: u64,
    /// Generation currently owned by the adapter.
    current: Arc<Mutex<u64>>,
    /// Adapter tracker.
    tracker: ConnectionTracker,
}

impl SessionGuard {
    /// Returns `true` while this connection is the adapter's current one.
    #[inline]
    pub(crate) fn is_current(&self) -> bool {
        *self.current.lock() == self.generation
    }

    /// Moves the adapter's state, unless this connection was retired.
    ///
    /// Holds the generation lock across the write so a concurrent
    /// `retire` cannot slip between the check and the update.
    pub(crate) fn transition(&self, state: ConnectionState) {
        let current = self.current.lock();
        if *current == self.generation {
            self.tracker.set(state);
        }
    }
}

// ============================================================================
// SessionLink
// ============================================================================

/// Everything a connection task needs to report to the outside.
pub(crate) struct SessionLink<E> {
    /// State writer.
    pub(crate) guard: SessionGuard,
    /// Event stream of this connection.
    events: mpsc::UnboundedSender<E>,
    /// Shared response channel.
    responses: ResponseStream,
}

impl<E> SessionLink<E> {
    /// Creates a link.
    pub(crate) fn new(
        guard: SessionGuard,
        events: mpsc::UnboundedSender<E>,
        responses: ResponseStream,
    ) -> Self {
        Self {
            guard,
            events,
            responses,
        }
    }

    /// Delivers an event. A dropped subscriber is not an error.
    #[inline]
    pub(crate) fn emit(&self, event: E) {
        let _ = self.events.send(event);
    }

    /// Moves the adapter's state.
    #[inline]
    pub(crate) fn transition(&self, state: ConnectionState) {
        self.guard.transition(state);
    }

    /// Publishes a normalized response.
    #[inline]
    pub(crate) fn publish(&self, response: ApiResponse) {
        self.responses.publish(response);
    }
}

// ============================================================================
// Tests
// ============================================================================
