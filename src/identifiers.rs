//! Type-safe identifiers for requests and responses.
//!
//! Newtype wrappers keep request and response IDs from being mixed up.
//! IDs are unique within the process lifetime only.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Constants
// ============================================================================

/// Request ID carried by live events that answer no particular request.
const LIVE_REQUEST_ID: &str = "live";

// ============================================================================
// RequestId
// ============================================================================

/// Identifier of an [`ApiRequest`](crate::ApiRequest).
///
/// Opaque string. Callers may supply their own (for example a timestamp)
/// or use [`RequestId::generate`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Creates a request ID from a caller-supplied string.
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a new unique request ID.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the sentinel used by live WebSocket/SSE events.
    #[inline]
    #[must_use]
    pub fn live() -> Self {
        Self(LIVE_REQUEST_ID.to_string())
    }

    /// Returns `true` if this is the live-event sentinel.
    #[inline]
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.0 == LIVE_REQUEST_ID
    }

    /// Returns the ID as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for RequestId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ============================================================================
// ResponseId
// ============================================================================

/// Identifier of an [`ApiResponse`](crate::ApiResponse), always generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResponseId(Uuid);

impl ResponseId {
    /// Generates a new unique response ID.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[inline]
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ResponseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================
